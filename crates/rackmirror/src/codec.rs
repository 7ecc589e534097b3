//! Model records as OSC messages
//!
//! Field order is fixed per address; the renderer reads arguments
//! positionally. Absent ids go out as -1.

use rackproto::address::outbound;
use rackproto::OscMessage;

use crate::geometry::{Rect, Vec2};
use crate::model::{
    Cable, Display, Library, Light, MenuId, MenuItem, Module, ModuleId, Param, Port, PortKind,
    Rgba,
};

trait MessageExt {
    fn rect(self, rect: &Rect) -> Self;
    fn vec2(self, v: Vec2) -> Self;
    fn rgba(self, color: Rgba) -> Self;
}

impl MessageExt for OscMessage {
    fn rect(self, rect: &Rect) -> Self {
        self.arg(rect.pos.x)
            .arg(rect.pos.y)
            .arg(rect.size.x)
            .arg(rect.size.y)
    }

    fn vec2(self, v: Vec2) -> Self {
        self.arg(v.x).arg(v.y)
    }

    fn rgba(self, color: Rgba) -> Self {
        self.arg(color.r).arg(color.g).arg(color.b).arg(color.a)
    }
}

pub fn module_add(module: &Module) -> OscMessage {
    OscMessage::new(outbound::MODULE_ADD)
        .arg(module.id)
        .arg(module.return_id.unwrap_or(-1))
        .arg(module.plugin.as_str())
        .arg(module.model.as_str())
        .arg(module.brand.as_str())
        .arg(module.name.as_str())
        .arg(module.description.as_str())
        .rect(&module.rect)
        .arg(module.panel_svg.as_str())
        .rgba(module.body_color)
        .arg(module.left_expander.unwrap_or(-1))
        .arg(module.right_expander.unwrap_or(-1))
}

pub fn param_add(module_id: ModuleId, param: &Param) -> OscMessage {
    let mut msg = OscMessage::new(outbound::PARAM_ADD)
        .arg(module_id)
        .arg(param.id)
        .arg(param.kind as i32)
        .arg(param.name.as_str())
        .arg(param.unit.as_str())
        .arg(param.description.as_str())
        .arg(param.display_value.as_str())
        .rect(&param.rect)
        .arg(param.min)
        .arg(param.max)
        .arg(param.default)
        .arg(param.value)
        .arg(param.snap)
        .arg(param.visible)
        .arg(param.min_angle)
        .arg(param.max_angle)
        .vec2(param.min_handle)
        .vec2(param.max_handle)
        .rect(&param.handle)
        .arg(param.horizontal)
        .arg(param.speed)
        .arg(param.latch)
        .arg(param.momentary)
        .arg(param.frames.len() as i32);
    for frame in &param.frames {
        msg.push(frame.as_str());
    }
    msg
}

pub fn port_add(module_id: ModuleId, kind: PortKind, port: &Port) -> OscMessage {
    let address = match kind {
        PortKind::Input => outbound::INPUT_ADD,
        PortKind::Output => outbound::OUTPUT_ADD,
    };
    OscMessage::new(address)
        .arg(module_id)
        .arg(port.id)
        .arg(port.name.as_str())
        .arg(port.description.as_str())
        .rect(&port.rect)
        .arg(port.svg.as_str())
        .rgba(port.color)
        .arg(port.visible)
}

pub fn light_add(light: &Light) -> OscMessage {
    OscMessage::new(outbound::LIGHT_ADD)
        .arg(light.module_id)
        .arg(light.id)
        .arg(light.param_id.unwrap_or(-1))
        .rect(&light.rect)
        .arg(light.shape as i32)
        .rgba(light.color)
        .rgba(light.bg_color)
        .arg(light.visible)
}

pub fn light_update(module_id: ModuleId, light_id: i32, color: Rgba) -> OscMessage {
    OscMessage::new(outbound::LIGHT_UPDATE)
        .arg(module_id)
        .arg(light_id)
        .rgba(color)
}

pub fn display_add(module_id: ModuleId, display: &Display) -> OscMessage {
    OscMessage::new(outbound::DISPLAY_ADD)
        .arg(module_id)
        .arg(display.index)
        .rect(&display.rect)
}

pub fn module_destroy(module_id: ModuleId) -> OscMessage {
    OscMessage::new(outbound::MODULE_DESTROY).arg(module_id)
}

pub fn cable_add(cable: &Cable) -> OscMessage {
    OscMessage::new(outbound::CABLE_ADD)
        .arg(cable.id)
        .arg(cable.input_module_id)
        .arg(cable.output_module_id)
        .arg(cable.input_port_id)
        .arg(cable.output_port_id)
        .rgba(cable.color)
}

pub fn module_sync_complete(module_id: ModuleId, return_id: Option<i64>) -> OscMessage {
    OscMessage::new(outbound::MODULE_SYNC_COMPLETE)
        .arg(module_id)
        .arg(return_id.unwrap_or(-1))
}

pub fn param_sync(module_id: ModuleId, param: &Param) -> OscMessage {
    OscMessage::new(outbound::PARAM_SYNC)
        .arg(module_id)
        .arg(param.id)
        .arg(param.display_value.as_str())
        .arg(param.value)
        .arg(param.visible)
}

pub fn menu_item_add(module_id: ModuleId, menu_id: MenuId, item: &MenuItem) -> OscMessage {
    let quantity = item.quantity.clone().unwrap_or_default();
    OscMessage::new(outbound::MENU_ITEM_ADD)
        .arg(module_id)
        .arg(menu_id)
        .arg(item.index)
        .arg(item.kind as i32)
        .arg(item.text.as_str())
        .arg(item.checked)
        .arg(item.disabled)
        .arg(quantity.label)
        .arg(quantity.unit)
        .arg(quantity.value)
        .arg(quantity.min)
        .arg(quantity.max)
        .arg(quantity.default)
}

pub fn menu_synced(module_id: ModuleId, menu_id: MenuId) -> OscMessage {
    OscMessage::new(outbound::MENU_SYNCED)
        .arg(module_id)
        .arg(menu_id)
}

/// Module-add first, then every child not yet acknowledged
pub fn module_records(module: &Module) -> Vec<OscMessage> {
    let mut records = vec![module_add(module)];

    records.extend(
        module
            .params
            .values()
            .filter(|p| !p.synced)
            .map(|p| param_add(module.id, p)),
    );
    for kind in [PortKind::Input, PortKind::Output] {
        records.extend(
            module
                .ports(kind)
                .values()
                .filter(|p| !p.synced)
                .map(|p| port_add(module.id, kind, p)),
        );
    }
    records.extend(unsynced_light_records(module));
    records.extend(
        module
            .displays
            .values()
            .filter(|d| !d.synced)
            .map(|d| display_add(module.id, d)),
    );
    records
}

pub fn unsynced_light_records(module: &Module) -> Vec<OscMessage> {
    module
        .lights
        .values()
        .filter(|l| !l.synced)
        .map(light_add)
        .collect()
}

pub fn menu_records(module_id: ModuleId, menu_id: MenuId, items: &[MenuItem]) -> Vec<OscMessage> {
    items
        .iter()
        .map(|item| menu_item_add(module_id, menu_id, item))
        .chain(std::iter::once(menu_synced(module_id, menu_id)))
        .collect()
}

/// Tags, then plugins, then models and their tag links
pub fn library_records(library: &Library) -> Vec<OscMessage> {
    let mut records = Vec::new();
    for tag in &library.tags {
        records.push(
            OscMessage::new(outbound::LIBRARY_TAG_ADD)
                .arg(tag.id)
                .arg(tag.name.as_str()),
        );
    }
    for plugin in &library.plugins {
        records.push(
            OscMessage::new(outbound::LIBRARY_PLUGIN_ADD)
                .arg(plugin.slug.as_str())
                .arg(plugin.name.as_str())
                .arg(plugin.brand.as_str())
                .arg(plugin.version.as_str()),
        );
    }
    for model in &library.models {
        records.push(
            OscMessage::new(outbound::LIBRARY_MODULE_ADD)
                .arg(model.plugin.as_str())
                .arg(model.model.as_str())
                .arg(model.name.as_str())
                .arg(model.description.as_str())
                .arg(model.favorite),
        );
        for tag in &model.tags {
            records.push(
                OscMessage::new(outbound::LIBRARY_MODULE_TAG_ADD)
                    .arg(model.plugin.as_str())
                    .arg(model.model.as_str())
                    .arg(*tag),
            );
        }
    }
    records
}

pub fn library_json_path(path: &str) -> OscMessage {
    OscMessage::new(outbound::LIBRARY_JSON_PATH).arg(path)
}
