//! In-memory graph host
//!
//! Holds a patch as plain descriptors. Used as the test fixture host and by
//! the `rackmirror` binary, which loads one from a JSON patch file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{
    CableDescriptor, DisplayDescriptor, GraphHost, HostError, LightDescriptor, ModuleDescriptor,
    PanelDescriptor, ParamDescriptor, PortDescriptor,
};
use crate::geometry::{Rect, Vec2, DEFAULT_PX_PER_CM};
use crate::model::{
    CableId, Library, LibraryModel, LibraryPlugin, LightShape, MenuItem, MenuItemKind, ModuleId,
    ParamId, ParamKind, PortId, PortKind, RangeQuantity, Rgba,
};

/// 6HP at 75 px/inch
const DEFAULT_MODULE_SIZE: Vec2 = Vec2 { x: 90.0, y: 380.0 };

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortAsset {
    pub kind: PortKind,
    pub id: PortId,
    pub svg: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryMenuItem {
    pub item: MenuItem,
    pub submenu: Vec<MemoryMenuItem>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryModule {
    pub info: ModuleDescriptor,
    pub params: Vec<ParamDescriptor>,
    pub ports: Vec<PortDescriptor>,
    pub lights: Vec<LightDescriptor>,
    pub displays: Vec<DisplayDescriptor>,
    pub param_assets: BTreeMap<ParamId, Vec<String>>,
    pub port_assets: Vec<PortAsset>,
    pub menu: Vec<MemoryMenuItem>,
}

impl MemoryModule {
    /// A module with a regular panel at `position` (host pixels)
    pub fn new(id: ModuleId, plugin: &str, model: &str, position: Vec2) -> Self {
        Self {
            info: ModuleDescriptor {
                id,
                plugin: plugin.to_string(),
                model: model.to_string(),
                brand: plugin.to_string(),
                name: model.to_string(),
                rect: Rect {
                    pos: position,
                    size: DEFAULT_MODULE_SIZE,
                },
                panel: Some(PanelDescriptor {
                    rect: Rect {
                        pos: Vec2::ZERO,
                        size: DEFAULT_MODULE_SIZE,
                    },
                    svg: Some(format!("res/{plugin}/{model}.svg")),
                }),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn port(&self, kind: PortKind, id: PortId) -> Option<&PortDescriptor> {
        self.ports.iter().find(|p| p.kind == kind && p.id == id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryHost {
    pub px_per_cm: f32,
    pub modules: BTreeMap<ModuleId, MemoryModule>,
    pub cables: BTreeMap<CableId, CableDescriptor>,
    pub library: Library,
    /// Dominant colour per asset path
    pub asset_colors: BTreeMap<String, Rgba>,

    #[serde(skip)]
    menu_cursor: Option<(ModuleId, Vec<i32>)>,
    #[serde(skip)]
    pub autosaves: usize,
    #[serde(skip)]
    pub loaded_patches: Vec<Option<PathBuf>>,
    #[serde(skip)]
    pub clicked: Vec<(ModuleId, String)>,
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self {
            px_per_cm: DEFAULT_PX_PER_CM,
            modules: BTreeMap::new(),
            cables: BTreeMap::new(),
            library: Library::default(),
            asset_colors: BTreeMap::new(),
            menu_cursor: None,
            autosaves: 0,
            loaded_patches: Vec::new(),
            clicked: Vec::new(),
        }
    }
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a patch fixture. Module and cable ids are taken from the map keys.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let mut host: MemoryHost = serde_json::from_str(json)?;
        for (id, module) in host.modules.iter_mut() {
            module.info.id = *id;
        }
        for (id, cable) in host.cables.iter_mut() {
            cable.id = *id;
        }
        Ok(host)
    }

    pub fn insert_module(&mut self, module: MemoryModule) {
        self.modules.insert(module.info.id, module);
    }

    pub fn insert_cable(&mut self, cable: CableDescriptor) {
        self.cables.insert(cable.id, cable);
    }

    pub fn set_light_color(&mut self, module: ModuleId, key: i32, color: Rgba) {
        if let Some(light) = self
            .modules
            .get_mut(&module)
            .and_then(|m| m.lights.iter_mut().find(|l| l.key == key))
        {
            light.color = color;
        }
    }

    /// Two oscillators and a filter, cabled together
    pub fn demo() -> Self {
        let mut host = Self::new();
        host.library = Library {
            plugins: vec![LibraryPlugin {
                slug: "Fundamental".into(),
                name: "VCV Fundamental".into(),
                brand: "VCV".into(),
                version: "2.6.0".into(),
            }],
            models: ["VCO", "VCF", "LFO"]
                .iter()
                .map(|m| LibraryModel {
                    plugin: "Fundamental".into(),
                    model: (*m).into(),
                    name: (*m).into(),
                    tags: vec![0],
                    ..Default::default()
                })
                .collect(),
            tags: vec![crate::model::LibraryTag {
                id: 0,
                name: "Oscillator".into(),
            }],
        };

        for (id, model, x) in [(1, "VCO", 0.0), (2, "VCO", 90.0), (3, "VCF", 180.0)] {
            let mut module = MemoryModule::new(id, "Fundamental", model, Vec2::new(x, 0.0));
            module.params.push(ParamDescriptor {
                id: 0,
                kind: ParamKind::Knob,
                name: "Frequency".into(),
                unit: " Hz".into(),
                display_value: "261.63 Hz".into(),
                rect: Rect::new(25.0, 60.0, 40.0, 40.0),
                min: -4.0,
                max: 4.0,
                visible: true,
                min_angle: -2.6,
                max_angle: 2.6,
                ..Default::default()
            });
            module.params.push(ParamDescriptor {
                id: 1,
                kind: ParamKind::Switch,
                name: "Mode".into(),
                rect: Rect::new(35.0, 130.0, 20.0, 30.0),
                max: 1.0,
                visible: true,
                ..Default::default()
            });
            module.ports.push(PortDescriptor {
                id: 0,
                kind: PortKind::Input,
                name: "V/Oct".into(),
                description: String::new(),
                rect: Rect::new(30.0, 280.0, 30.0, 30.0),
                visible: true,
            });
            module.ports.push(PortDescriptor {
                id: 0,
                kind: PortKind::Output,
                name: "Out".into(),
                description: String::new(),
                rect: Rect::new(30.0, 330.0, 30.0, 30.0),
                visible: true,
            });
            module.lights.push(LightDescriptor {
                key: 0,
                param_id: None,
                rect: Rect::new(40.0, 20.0, 8.0, 8.0),
                shape: LightShape::Round,
                color: Rgba::new(0.0, 1.0, 0.0, 1.0),
                bg_color: Rgba::BLACK,
                visible: true,
            });
            module.menu = vec![
                MemoryMenuItem {
                    item: MenuItem {
                        index: 0,
                        kind: MenuItemKind::Label,
                        text: model.into(),
                        ..Default::default()
                    },
                    submenu: Vec::new(),
                },
                MemoryMenuItem {
                    item: MenuItem {
                        index: 1,
                        kind: MenuItemKind::Action,
                        text: "Anti-alias".into(),
                        ..Default::default()
                    },
                    submenu: Vec::new(),
                },
            ];
            host.insert_module(module);
        }

        host.insert_cable(CableDescriptor {
            id: 10,
            input_module: 3,
            output_module: 1,
            input_port: 0,
            output_port: 0,
            color: Rgba::new(0.9, 0.2, 0.2, 1.0),
        });
        host
    }

    fn module_ref(&self, id: ModuleId) -> Result<&MemoryModule, HostError> {
        self.modules
            .get(&id)
            .ok_or(HostError::NotFound { kind: "module", id })
    }

    fn module_mut(&mut self, id: ModuleId) -> Result<&mut MemoryModule, HostError> {
        self.modules
            .get_mut(&id)
            .ok_or(HostError::NotFound { kind: "module", id })
    }

    fn open_level(&self) -> Result<&[MemoryMenuItem], HostError> {
        let (module, path) = self.menu_cursor.as_ref().ok_or(HostError::MenuClosed)?;
        let module = self.module_ref(*module)?;
        menu_level(&module.menu, path).ok_or(HostError::MenuClosed)
    }

    fn open_level_mut(&mut self) -> Result<&mut Vec<MemoryMenuItem>, HostError> {
        let (module, path) = self.menu_cursor.clone().ok_or(HostError::MenuClosed)?;
        let module = self.module_mut(module)?;
        menu_level_mut(&mut module.menu, &path).ok_or(HostError::MenuClosed)
    }
}

fn menu_level<'a>(items: &'a [MemoryMenuItem], path: &[i32]) -> Option<&'a [MemoryMenuItem]> {
    let mut level = items;
    for index in path {
        level = level
            .iter()
            .find(|i| i.item.index == *index)?
            .submenu
            .as_slice();
    }
    Some(level)
}

fn menu_level_mut<'a>(
    items: &'a mut Vec<MemoryMenuItem>,
    path: &[i32],
) -> Option<&'a mut Vec<MemoryMenuItem>> {
    let mut level = items;
    for index in path {
        level = &mut level.iter_mut().find(|i| i.item.index == *index)?.submenu;
    }
    Some(level)
}

fn next_id<V>(map: &BTreeMap<i64, V>) -> i64 {
    map.keys().next_back().map_or(1, |id| id + 1)
}

impl GraphHost for MemoryHost {
    fn px_per_cm(&self) -> f32 {
        self.px_per_cm
    }

    fn module_ids(&self) -> Vec<ModuleId> {
        self.modules.keys().copied().collect()
    }

    fn cable_ids(&self) -> Vec<CableId> {
        self.cables.keys().copied().collect()
    }

    fn module(&self, id: ModuleId) -> Option<ModuleDescriptor> {
        self.modules.get(&id).map(|m| m.info.clone())
    }

    fn params(&self, module: ModuleId) -> Vec<ParamDescriptor> {
        self.modules
            .get(&module)
            .map(|m| m.params.clone())
            .unwrap_or_default()
    }

    fn ports(&self, module: ModuleId) -> Vec<PortDescriptor> {
        self.modules
            .get(&module)
            .map(|m| m.ports.clone())
            .unwrap_or_default()
    }

    fn lights(&self, module: ModuleId) -> Vec<LightDescriptor> {
        self.modules
            .get(&module)
            .map(|m| m.lights.clone())
            .unwrap_or_default()
    }

    fn displays(&self, module: ModuleId) -> Vec<DisplayDescriptor> {
        self.modules
            .get(&module)
            .map(|m| m.displays.clone())
            .unwrap_or_default()
    }

    fn cable(&self, id: CableId) -> Option<CableDescriptor> {
        self.cables.get(&id).cloned()
    }

    fn param_assets(&self, module: ModuleId, param: ParamId) -> Result<Vec<String>, HostError> {
        self.module_ref(module)?
            .param_assets
            .get(&param)
            .cloned()
            .ok_or_else(|| HostError::AssetUnavailable(format!("param {module}:{param}")))
    }

    fn port_asset(
        &self,
        module: ModuleId,
        kind: PortKind,
        port: PortId,
    ) -> Result<String, HostError> {
        self.module_ref(module)?
            .port_assets
            .iter()
            .find(|a| a.kind == kind && a.id == port)
            .map(|a| a.svg.clone())
            .ok_or_else(|| HostError::AssetUnavailable(format!("{kind:?} {module}:{port}")))
    }

    fn dominant_color(&self, svg: &str) -> Result<Rgba, HostError> {
        self.asset_colors
            .get(svg)
            .copied()
            .ok_or_else(|| HostError::AssetUnavailable(svg.to_string()))
    }

    fn light_color(&self, module: ModuleId, key: i32) -> Option<Rgba> {
        self.modules
            .get(&module)?
            .lights
            .iter()
            .find(|l| l.key == key)
            .map(|l| l.color)
    }

    fn set_param_value(
        &mut self,
        module: ModuleId,
        param: ParamId,
        value: f32,
    ) -> Result<(), HostError> {
        let param = self
            .module_mut(module)?
            .params
            .iter_mut()
            .find(|p| p.id == param)
            .ok_or(HostError::NotFound {
                kind: "param",
                id: i64::from(param),
            })?;
        param.value = if param.max > param.min {
            value.clamp(param.min, param.max)
        } else {
            value
        };
        param.display_value = format!("{:.2}{}", param.value, param.unit);
        Ok(())
    }

    fn create_module(
        &mut self,
        plugin: &str,
        model: &str,
        position: Option<Vec2>,
    ) -> Result<ModuleId, HostError> {
        let entry = self
            .library
            .model(plugin, model)
            .ok_or_else(|| HostError::Rejected(format!("unknown model {plugin}/{model}")))?;
        let name = entry.name.clone();

        let id = next_id(&self.modules);
        let position = position.unwrap_or_else(|| {
            let right_edge = self
                .modules
                .values()
                .map(|m| m.info.rect.pos.x + m.info.rect.size.x)
                .fold(0.0, f32::max);
            Vec2::new(right_edge, 0.0)
        });

        let mut module = MemoryModule::new(id, plugin, model, position);
        module.info.name = name;
        self.insert_module(module);
        debug!("memory host created module {} ({}/{})", id, plugin, model);
        Ok(id)
    }

    fn destroy_module(&mut self, id: ModuleId) -> Result<(), HostError> {
        self.modules
            .remove(&id)
            .ok_or(HostError::NotFound { kind: "module", id })?;
        self.cables
            .retain(|_, c| c.input_module != id && c.output_module != id);
        for module in self.modules.values_mut() {
            if module.info.left_expander == Some(id) {
                module.info.left_expander = None;
            }
            if module.info.right_expander == Some(id) {
                module.info.right_expander = None;
            }
        }
        Ok(())
    }

    fn create_cable(
        &mut self,
        input_module: ModuleId,
        output_module: ModuleId,
        input_port: PortId,
        output_port: PortId,
    ) -> Result<CableId, HostError> {
        let has_input = self
            .module_ref(input_module)?
            .port(PortKind::Input, input_port)
            .is_some();
        let has_output = self
            .module_ref(output_module)?
            .port(PortKind::Output, output_port)
            .is_some();
        if !has_input || !has_output {
            return Err(HostError::Rejected(format!(
                "no such ports {input_module}:{input_port} <- {output_module}:{output_port}"
            )));
        }

        let id = next_id(&self.cables);
        self.insert_cable(CableDescriptor {
            id,
            input_module,
            output_module,
            input_port,
            output_port,
            color: Rgba::new(0.8, 0.8, 0.2, 1.0),
        });
        Ok(id)
    }

    fn destroy_cable(&mut self, id: CableId) -> Result<(), HostError> {
        self.cables
            .remove(&id)
            .map(|_| ())
            .ok_or(HostError::NotFound { kind: "cable", id })
    }

    fn arrange_modules(
        &mut self,
        left: ModuleId,
        right: ModuleId,
        attach: bool,
    ) -> Result<(), HostError> {
        let left_rect = self.module_ref(left)?.info.rect;
        self.module_ref(right)?;

        {
            let right_module = self.module_mut(right)?;
            right_module.info.rect.pos =
                Vec2::new(left_rect.pos.x + left_rect.size.x, left_rect.pos.y);
            right_module.info.left_expander = attach.then_some(left);
        }
        self.module_mut(left)?.info.right_expander = attach.then_some(right);
        Ok(())
    }

    fn open_module_menu(&mut self, module: ModuleId) -> Result<(), HostError> {
        self.module_ref(module)?;
        self.menu_cursor = Some((module, Vec::new()));
        Ok(())
    }

    fn open_submenu(&mut self, item_index: i32) -> Result<(), HostError> {
        let has_submenu = self
            .open_level()?
            .iter()
            .any(|i| i.item.index == item_index && !i.submenu.is_empty());
        if !has_submenu {
            return Err(HostError::InvalidMenuItem(item_index));
        }
        if let Some((_, path)) = self.menu_cursor.as_mut() {
            path.push(item_index);
        }
        Ok(())
    }

    fn menu_items(&self) -> Result<Vec<MenuItem>, HostError> {
        Ok(self.open_level()?.iter().map(|i| i.item.clone()).collect())
    }

    fn click_menu_item(&mut self, item_index: i32) -> Result<(), HostError> {
        let module = self.menu_cursor.as_ref().map(|c| c.0).unwrap_or_default();
        let item = self
            .open_level_mut()?
            .iter_mut()
            .find(|i| i.item.index == item_index)
            .ok_or(HostError::InvalidMenuItem(item_index))?;
        if item.item.kind == MenuItemKind::Action {
            item.item.checked = !item.item.checked;
        }
        let text = item.item.text.clone();
        self.clicked.push((module, text));
        Ok(())
    }

    fn set_menu_item_quantity(&mut self, item_index: i32, value: f32) -> Result<(), HostError> {
        let quantity: &mut RangeQuantity = self
            .open_level_mut()?
            .iter_mut()
            .find(|i| i.item.index == item_index)
            .and_then(|i| i.item.quantity.as_mut())
            .ok_or(HostError::InvalidMenuItem(item_index))?;
        quantity.value = value.clamp(quantity.min, quantity.max);
        Ok(())
    }

    fn close_menu(&mut self) {
        self.menu_cursor = None;
    }

    fn library(&self) -> Library {
        self.library.clone()
    }

    fn set_favorite(&mut self, plugin: &str, model: &str, favorite: bool) -> Result<(), HostError> {
        let entry = self
            .library
            .model_mut(plugin, model)
            .ok_or_else(|| HostError::Rejected(format!("unknown model {plugin}/{model}")))?;
        entry.favorite = favorite;
        Ok(())
    }

    fn load_patch(&mut self, path: Option<&Path>) -> Result<(), HostError> {
        self.loaded_patches.push(path.map(Path::to_path_buf));
        let Some(path) = path else {
            return Ok(());
        };

        let json = std::fs::read_to_string(path)
            .map_err(|e| HostError::Rejected(format!("{}: {e}", path.display())))?;
        let loaded = MemoryHost::from_json(&json)
            .map_err(|e| HostError::Rejected(format!("{}: {e}", path.display())))?;
        self.modules = loaded.modules;
        self.cables = loaded.cables;
        self.asset_colors.extend(loaded.asset_colors);
        self.menu_cursor = None;
        Ok(())
    }

    fn autosave(&mut self) -> Result<(), HostError> {
        self.autosaves += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn menu_host() -> MemoryHost {
        let mut host = MemoryHost::demo();
        let module = host.modules.get_mut(&1).unwrap();
        module.menu.push(MemoryMenuItem {
            item: MenuItem {
                index: 2,
                kind: MenuItemKind::Submenu,
                text: "Range".into(),
                ..Default::default()
            },
            submenu: vec![MemoryMenuItem {
                item: MenuItem {
                    index: 0,
                    kind: MenuItemKind::Range,
                    text: "Depth".into(),
                    quantity: Some(RangeQuantity {
                        label: "Depth".into(),
                        unit: "%".into(),
                        value: 50.0,
                        min: 0.0,
                        max: 100.0,
                        default: 50.0,
                    }),
                    ..Default::default()
                },
                submenu: Vec::new(),
            }],
        });
        host
    }

    #[test]
    fn test_from_json_takes_ids_from_keys() {
        let json = r#"{
            "modules": {
                "7": { "info": { "plugin": "Fundamental", "model": "VCO" } }
            },
            "cables": {
                "4": { "id": 0, "input_module": 7, "output_module": 7, "input_port": 0, "output_port": 0 }
            }
        }"#;
        let host = MemoryHost::from_json(json).unwrap();
        assert_eq!(host.module_ids(), vec![7]);
        assert_eq!(host.module(7).unwrap().id, 7);
        assert_eq!(host.cable(4).unwrap().id, 4);
        assert_eq!(host.px_per_cm(), DEFAULT_PX_PER_CM);
    }

    #[test]
    fn test_create_module_requires_library_entry() {
        let mut host = MemoryHost::demo();
        let id = host.create_module("Fundamental", "LFO", None).unwrap();
        assert_eq!(id, 4);
        assert_eq!(host.module(id).unwrap().rect.pos.x, 270.0);

        assert!(matches!(
            host.create_module("Nope", "Nothing", None),
            Err(HostError::Rejected(_))
        ));
    }

    #[test]
    fn test_destroy_module_removes_attached_cables() {
        let mut host = MemoryHost::demo();
        host.destroy_module(1).unwrap();
        assert!(host.cable_ids().is_empty());
        assert!(matches!(
            host.destroy_module(1),
            Err(HostError::NotFound { kind: "module", id: 1 })
        ));
    }

    #[test]
    fn test_create_cable_checks_ports() {
        let mut host = MemoryHost::demo();
        assert!(host.create_cable(2, 3, 0, 0).is_ok());
        assert!(host.create_cable(2, 3, 5, 0).is_err());
    }

    #[test]
    fn test_menu_navigation_and_quantity() {
        let mut host = menu_host();
        assert!(matches!(host.menu_items(), Err(HostError::MenuClosed)));

        host.open_module_menu(1).unwrap();
        assert_eq!(host.menu_items().unwrap().len(), 3);
        assert!(host.open_submenu(1).is_err());

        host.open_submenu(2).unwrap();
        host.set_menu_item_quantity(0, 250.0).unwrap();
        let items = host.menu_items().unwrap();
        assert_eq!(items[0].quantity.as_ref().unwrap().value, 100.0);

        host.close_menu();
        assert!(host.menu_items().is_err());
    }

    #[test]
    fn test_click_toggles_action() {
        let mut host = menu_host();
        host.open_module_menu(1).unwrap();
        host.click_menu_item(1).unwrap();
        assert!(host.menu_items().unwrap()[1].checked);
        assert_eq!(host.clicked, vec![(1, "Anti-alias".to_string())]);
    }

    #[test]
    fn test_set_param_value_clamps_and_formats() {
        let mut host = MemoryHost::demo();
        host.set_param_value(1, 0, 9.0).unwrap();
        let param = host.param(1, 0).unwrap();
        assert_eq!(param.value, 4.0);
        assert_eq!(param.display_value, "4.00 Hz");
    }

    #[test]
    fn test_load_patch_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "modules": {{ "42": {{ "info": {{ "plugin": "Fundamental", "model": "VCF" }} }} }} }}"#
        )
        .unwrap();

        let mut host = MemoryHost::demo();
        host.load_patch(Some(file.path())).unwrap();
        assert_eq!(host.module_ids(), vec![42]);
        assert!(host.cable_ids().is_empty());
        assert_eq!(host.loaded_patches.len(), 1);
    }
}
