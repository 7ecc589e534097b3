//! The graph editor as seen by the engine
//!
//! [`GraphHost`] is the only way the engine reads or changes the patch. It
//! hands out plain descriptors in host pixels; the collector turns those into
//! the model. Every mutation happens on the thread that owns the host (the
//! render thread), from [`SyncEngine::tick`](crate::SyncEngine::tick).

pub mod memory;

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geometry::{Rect, Vec2, DEFAULT_PX_PER_CM};
use crate::model::{
    CableId, LightShape, Library, MenuItem, ModuleId, ParamId, ParamKind, PortId, PortKind, Rgba,
};

pub use memory::MemoryHost;

#[derive(Debug, Error)]
pub enum HostError {
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: i64 },

    #[error("asset unavailable: {0}")]
    AssetUnavailable(String),

    #[error("no menu is open")]
    MenuClosed,

    #[error("menu item {0} does not exist or has no submenu")]
    InvalidMenuItem(i32),

    #[error("host rejected request: {0}")]
    Rejected(String),
}

/// An SVG-drawing child widget of a module, in module-local pixels
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SvgChild {
    pub rect: Rect,
    pub svg: String,
}

/// The panel the host reports for a module, when it reports one
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PanelDescriptor {
    pub rect: Rect,
    pub svg: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleDescriptor {
    pub id: ModuleId,
    pub plugin: String,
    pub model: String,
    pub brand: String,
    pub name: String,
    pub description: String,
    /// Module widget box in rack pixels
    pub rect: Rect,
    pub panel: Option<PanelDescriptor>,
    /// SVG children, for modules that draw their panel themselves
    pub svg_children: Vec<SvgChild>,
    pub left_expander: Option<ModuleId>,
    pub right_expander: Option<ModuleId>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ParamDescriptor {
    pub id: ParamId,
    pub kind: ParamKind,
    pub name: String,
    pub unit: String,
    pub description: String,
    pub display_value: String,
    /// Module-local pixels
    pub rect: Rect,
    pub min: f32,
    pub max: f32,
    pub default: f32,
    pub value: f32,
    pub snap: bool,
    #[serde(default = "visible")]
    pub visible: bool,
    pub min_angle: f32,
    pub max_angle: f32,
    /// Param-local pixels
    pub handle: Rect,
    pub min_handle: Vec2,
    pub max_handle: Vec2,
    pub horizontal: bool,
    pub speed: f32,
    pub latch: bool,
    pub momentary: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortDescriptor {
    pub id: PortId,
    pub kind: PortKind,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub rect: Rect,
    #[serde(default = "visible")]
    pub visible: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightDescriptor {
    /// Host-side key, unique within the module
    pub key: i32,
    /// Lights embedded in a param have a param-local rect
    #[serde(default)]
    pub param_id: Option<ParamId>,
    pub rect: Rect,
    #[serde(default)]
    pub shape: LightShape,
    pub color: Rgba,
    #[serde(default)]
    pub bg_color: Rgba,
    #[serde(default = "visible")]
    pub visible: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayDescriptor {
    pub index: i32,
    pub rect: Rect,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CableDescriptor {
    pub id: CableId,
    pub input_module: ModuleId,
    pub output_module: ModuleId,
    pub input_port: PortId,
    pub output_port: PortId,
    #[serde(default)]
    pub color: Rgba,
}

fn visible() -> bool {
    true
}

/// Capabilities the engine needs from the graph editor
pub trait GraphHost {
    /// Host pixels per renderer centimetre
    fn px_per_cm(&self) -> f32 {
        DEFAULT_PX_PER_CM
    }

    fn module_ids(&self) -> Vec<ModuleId>;
    fn cable_ids(&self) -> Vec<CableId>;

    fn module(&self, id: ModuleId) -> Option<ModuleDescriptor>;
    fn params(&self, module: ModuleId) -> Vec<ParamDescriptor>;
    fn ports(&self, module: ModuleId) -> Vec<PortDescriptor>;
    fn lights(&self, module: ModuleId) -> Vec<LightDescriptor>;
    fn displays(&self, module: ModuleId) -> Vec<DisplayDescriptor>;
    fn cable(&self, id: CableId) -> Option<CableDescriptor>;

    fn param(&self, module: ModuleId, param: ParamId) -> Option<ParamDescriptor> {
        self.params(module).into_iter().find(|p| p.id == param)
    }

    /// Frame/skin asset paths of a param widget
    fn param_assets(&self, module: ModuleId, param: ParamId) -> Result<Vec<String>, HostError>;
    fn port_asset(&self, module: ModuleId, kind: PortKind, port: PortId)
        -> Result<String, HostError>;
    /// Most common fill colour of an SVG asset
    fn dominant_color(&self, svg: &str) -> Result<Rgba, HostError>;

    /// Current colour of a light, read once per batch
    fn light_color(&self, module: ModuleId, key: i32) -> Option<Rgba>;

    fn set_param_value(
        &mut self,
        module: ModuleId,
        param: ParamId,
        value: f32,
    ) -> Result<(), HostError>;

    /// `position` is the requested top-left in host pixels
    fn create_module(
        &mut self,
        plugin: &str,
        model: &str,
        position: Option<Vec2>,
    ) -> Result<ModuleId, HostError>;
    fn destroy_module(&mut self, id: ModuleId) -> Result<(), HostError>;

    fn create_cable(
        &mut self,
        input_module: ModuleId,
        output_module: ModuleId,
        input_port: PortId,
        output_port: PortId,
    ) -> Result<CableId, HostError>;
    fn destroy_cable(&mut self, id: CableId) -> Result<(), HostError>;

    /// Place `right` directly to the right of `left`; `attach` makes them
    /// expanders of each other, otherwise they are split apart.
    fn arrange_modules(
        &mut self,
        left: ModuleId,
        right: ModuleId,
        attach: bool,
    ) -> Result<(), HostError>;

    fn open_module_menu(&mut self, module: ModuleId) -> Result<(), HostError>;
    fn open_submenu(&mut self, item_index: i32) -> Result<(), HostError>;
    /// Items of the innermost open menu
    fn menu_items(&self) -> Result<Vec<MenuItem>, HostError>;
    fn click_menu_item(&mut self, item_index: i32) -> Result<(), HostError>;
    fn set_menu_item_quantity(&mut self, item_index: i32, value: f32) -> Result<(), HostError>;
    fn close_menu(&mut self);

    fn library(&self) -> Library;
    fn set_favorite(&mut self, plugin: &str, model: &str, favorite: bool)
        -> Result<(), HostError>;

    /// Load a patch file, or the host's current/default patch when `None`
    fn load_patch(&mut self, path: Option<&Path>) -> Result<(), HostError>;
    fn autosave(&mut self) -> Result<(), HostError>;
}
