//! Address table for the mirror protocol
//!
//! Outbound addresses carry graph state to the renderer; inbound addresses
//! are acknowledgements (uniform `(outer id, inner id, value)` shape) or
//! commands with their own argument lists.

/// Graph state sent to the renderer
pub mod outbound {
    pub const MODULE_ADD: &str = "/modules/add";
    pub const PARAM_ADD: &str = "/modules/param/add";
    pub const INPUT_ADD: &str = "/modules/input/add";
    pub const OUTPUT_ADD: &str = "/modules/output/add";
    pub const LIGHT_ADD: &str = "/modules/light/add";
    pub const LIGHT_UPDATE: &str = "/modules/light/update";
    pub const DISPLAY_ADD: &str = "/modules/display/add";
    pub const MODULE_DESTROY: &str = "/modules/destroy";
    pub const CABLE_ADD: &str = "/cables/add";
    pub const MODULE_SYNC_COMPLETE: &str = "/module_sync_complete";
    pub const PARAM_SYNC: &str = "/param/sync";
    pub const MENU_ITEM_ADD: &str = "/menu/item/add";
    pub const MENU_SYNCED: &str = "/menu/synced";
    pub const LIBRARY_PLUGIN_ADD: &str = "/library/plugin/add";
    pub const LIBRARY_MODULE_ADD: &str = "/library/module/add";
    pub const LIBRARY_MODULE_TAG_ADD: &str = "/library/module_tag/add";
    pub const LIBRARY_TAG_ADD: &str = "/library/tag/add";
    pub const LIBRARY_JSON_PATH: &str = "/library/json_path";
}

/// Acknowledgements and routed updates, all `(outer, inner, value)` shaped
pub mod ack {
    pub const MODULE: &str = "/rx/module";
    pub const PARAM: &str = "/rx/param";
    pub const INPUT: &str = "/rx/input";
    pub const OUTPUT: &str = "/rx/output";
    pub const MODULE_LIGHT: &str = "/rx/module_light";
    pub const DISPLAY: &str = "/rx/display";
    pub const CABLE: &str = "/rx/cable";
    pub const DIFF_MODULE: &str = "/diff/module";
    pub const UPDATE_PARAM: &str = "/update/param";
}

/// Commands whose argument lists differ from the ack triple
pub mod command {
    pub const SYNC: &str = "/sync";
    pub const CREATE_MODULE: &str = "/create/module";
    pub const DESTROY_MODULE: &str = "/destroy/module";
    pub const CREATE_CABLE: &str = "/create/cable";
    pub const DESTROY_CABLE: &str = "/destroy/cable";
    pub const GET_MENU: &str = "/get_menu";
    pub const CLICK_MENU_ITEM: &str = "/click_menu_item";
    pub const UPDATE_MENU_ITEM_QUANTITY: &str = "/update_menu_item_quantity";
    pub const FAVORITE: &str = "/favorite";
    pub const ARRANGE_MODULES: &str = "/arrange_modules";
    pub const LOAD_PATCH: &str = "/load_patch";
    pub const AUTOSAVE_AND_EXIT: &str = "/autosave_and_exit";
    pub const SET_SERVER_PORT: &str = "/set_unreal_server_port";

    /// Every special-cased command address, checked ahead of the route table
    pub const ALL: &[&str] = &[
        SYNC,
        CREATE_MODULE,
        DESTROY_MODULE,
        CREATE_CABLE,
        DESTROY_CABLE,
        GET_MENU,
        CLICK_MENU_ITEM,
        UPDATE_MENU_ITEM_QUANTITY,
        FAVORITE,
        ARRANGE_MODULES,
        LOAD_PATCH,
        AUTOSAVE_AND_EXIT,
        SET_SERVER_PORT,
    ];
}
