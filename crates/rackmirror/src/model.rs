//! Plain data snapshot of the patch
//!
//! Every entity carries its domain fields plus a `synced` flag. Flags start
//! false on collection and only flip when the renderer acknowledges the
//! matching record.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::geometry::{Rect, Vec2};

pub type ModuleId = i64;
pub type CableId = i64;
pub type ParamId = i32;
pub type PortId = i32;
pub type LightId = i32;
pub type MenuId = i32;

/// Engine-assigned light ids start here so they never collide with host
/// param or port ids.
pub const LIGHT_ID_BASE: LightId = 100_000;

/// Light id for a host light key; stable across re-collection
pub fn light_id(host_key: i32) -> LightId {
    LIGHT_ID_BASE + host_key
}

/// Straight (non-premultiplied) colour, each channel in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rgba {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Rgba {
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub const BLACK: Rgba = Rgba::new(0.0, 0.0, 0.0, 1.0);
    pub const TRANSPARENT: Rgba = Rgba::new(0.0, 0.0, 0.0, 0.0);

    /// Channel-wise comparison tolerant of float noise from the host
    pub fn approx_eq(&self, other: &Rgba) -> bool {
        const EPS: f32 = 1e-4;
        (self.r - other.r).abs() <= EPS
            && (self.g - other.g).abs() <= EPS
            && (self.b - other.b).abs() <= EPS
            && (self.a - other.a).abs() <= EPS
    }
}

/// Widget type of a param; the discriminant is the wire value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ParamKind {
    Knob = 0,
    Slider = 1,
    Button = 2,
    Switch = 3,
    #[default]
    Unknown = 4,
}

#[derive(Debug, Clone, Default)]
pub struct Param {
    pub id: ParamId,
    pub kind: ParamKind,
    pub name: String,
    pub unit: String,
    pub description: String,
    pub display_value: String,
    pub rect: Rect,

    pub min: f32,
    pub max: f32,
    pub default: f32,
    pub value: f32,
    pub snap: bool,

    // knob
    pub min_angle: f32,
    pub max_angle: f32,

    // slider
    pub handle: Rect,
    pub min_handle: Vec2,
    pub max_handle: Vec2,
    pub horizontal: bool,
    pub speed: f32,

    // switch / button
    pub latch: bool,
    pub momentary: bool,

    /// Asset paths; knobs carry [background, knob, foreground], switches one
    /// per frame, sliders [track, handle]
    pub frames: Vec<String>,

    pub visible: bool,
    pub synced: bool,
    pub light_ids: BTreeSet<LightId>,
}

/// Params compare by what the renderer shows moving: value and visibility.
impl PartialEq for Param {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value && self.visible == other.visible
    }
}

impl Param {
    /// Whether a shallow re-read shows the same value and visibility
    pub fn matches(&self, state: &ParamState) -> bool {
        self.value == state.value && self.visible == state.visible
    }

    /// Merge a shallow re-read; leaves `synced` alone
    pub fn apply(&mut self, state: &ParamState) {
        self.value = state.value;
        self.visible = state.visible;
        self.display_value.clone_from(&state.display_value);
    }
}

/// The slice of a param that changes while a patch runs
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParamState {
    pub id: ParamId,
    pub value: f32,
    pub visible: bool,
    pub display_value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortKind {
    Input,
    Output,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Port {
    pub id: PortId,
    pub name: String,
    pub description: String,
    pub rect: Rect,
    pub svg: String,
    pub color: Rgba,
    pub visible: bool,
    pub synced: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LightShape {
    #[default]
    Round = 0,
    Rectangle = 1,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Light {
    pub id: LightId,
    pub host_key: i32,
    pub module_id: ModuleId,
    pub param_id: Option<ParamId>,
    pub rect: Rect,
    pub shape: LightShape,
    pub color: Rgba,
    pub bg_color: Rgba,
    pub visible: bool,
    pub synced: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Display {
    pub index: i32,
    pub rect: Rect,
    pub synced: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Module {
    pub id: ModuleId,
    pub plugin: String,
    pub model: String,
    pub brand: String,
    pub name: String,
    pub description: String,
    pub rect: Rect,
    pub panel_svg: String,
    pub body_color: Rgba,
    pub left_expander: Option<ModuleId>,
    pub right_expander: Option<ModuleId>,
    pub return_id: Option<i64>,
    pub synced: bool,

    pub params: BTreeMap<ParamId, Param>,
    pub inputs: BTreeMap<PortId, Port>,
    pub outputs: BTreeMap<PortId, Port>,
    pub lights: BTreeMap<LightId, Light>,
    pub displays: BTreeMap<i32, Display>,

    /// light id -> owning param id, rebuilt from the params' light sets
    pub param_lights: BTreeMap<LightId, ParamId>,
}

impl Module {
    pub fn ports(&self, kind: PortKind) -> &BTreeMap<PortId, Port> {
        match kind {
            PortKind::Input => &self.inputs,
            PortKind::Output => &self.outputs,
        }
    }

    pub fn ports_mut(&mut self, kind: PortKind) -> &mut BTreeMap<PortId, Port> {
        match kind {
            PortKind::Input => &mut self.inputs,
            PortKind::Output => &mut self.outputs,
        }
    }

    pub fn rebuild_param_lights(&mut self) {
        self.param_lights = self
            .params
            .values()
            .flat_map(|p| p.light_ids.iter().map(move |l| (*l, p.id)))
            .collect();
    }

    /// Every light a param lists lives in the arena, points back at that
    /// param, and is indexed in `param_lights`.
    pub fn light_index_consistent(&self) -> bool {
        let params_ok = self.params.values().all(|param| {
            param.light_ids.iter().all(|id| {
                self.lights
                    .get(id)
                    .is_some_and(|light| light.param_id == Some(param.id))
                    && self.param_lights.get(id) == Some(&param.id)
            })
        });
        let index_ok = self.param_lights.iter().all(|(light, param)| {
            self.params
                .get(param)
                .is_some_and(|p| p.light_ids.contains(light))
        });
        params_ok && index_ok
    }

    /// Module and every child acknowledged
    pub fn fully_synced(&self) -> bool {
        self.synced
            && self.params.values().all(|p| p.synced)
            && self.inputs.values().all(|p| p.synced)
            && self.outputs.values().all(|p| p.synced)
            && self.lights.values().all(|l| l.synced)
            && self.displays.values().all(|d| d.synced)
    }

    /// Everything acknowledged except at least one light
    pub fn only_lights_unsynced(&self) -> bool {
        self.lights.values().any(|l| !l.synced)
            && self.synced
            && self.params.values().all(|p| p.synced)
            && self.inputs.values().all(|p| p.synced)
            && self.outputs.values().all(|p| p.synced)
            && self.displays.values().all(|d| d.synced)
    }

    pub fn has_port(&self, kind: PortKind, id: PortId) -> bool {
        self.ports(kind).contains_key(&id)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Cable {
    pub id: CableId,
    pub input_module_id: ModuleId,
    pub output_module_id: ModuleId,
    pub input_port_id: PortId,
    pub output_port_id: PortId,
    pub color: Rgba,
    pub synced: bool,
}

/// Tracked modules and cables
#[derive(Debug, Default)]
pub struct Patch {
    pub modules: BTreeMap<ModuleId, Module>,
    pub cables: BTreeMap<CableId, Cable>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MenuItemKind {
    Label = 0,
    Action = 1,
    Submenu = 2,
    Divider = 3,
    Range = 4,
    #[default]
    Unknown = 5,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RangeQuantity {
    pub label: String,
    pub unit: String,
    pub value: f32,
    pub min: f32,
    pub max: f32,
    pub default: f32,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MenuItem {
    pub index: i32,
    pub kind: MenuItemKind,
    pub text: String,
    pub checked: bool,
    pub disabled: bool,
    pub quantity: Option<RangeQuantity>,
}

/// A context menu the renderer asked for. Submenus remember how they were
/// reached so the path can be replayed.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Menu {
    pub id: MenuId,
    pub module_id: ModuleId,
    pub parent_menu: Option<MenuId>,
    pub parent_item_index: Option<i32>,
    pub items: Vec<MenuItem>,
}

/// Menus of one module, by menu id
pub type ModuleMenus = BTreeMap<MenuId, Menu>;

/// Item indices to click, from the root menu, to reach `menu_id`.
///
/// `None` when a menu in the chain is unknown or the chain loops.
pub fn menu_path(menus: &ModuleMenus, menu_id: MenuId) -> Option<Vec<i32>> {
    let mut path = Vec::new();
    let mut seen = BTreeSet::new();
    let mut current = menus.get(&menu_id)?;

    while let (Some(parent), Some(index)) = (current.parent_menu, current.parent_item_index) {
        if !seen.insert(current.id) {
            return None;
        }
        path.push(index);
        current = menus.get(&parent)?;
    }

    path.reverse();
    Some(path)
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LibraryPlugin {
    pub slug: String,
    pub name: String,
    pub brand: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryModel {
    pub plugin: String,
    pub model: String,
    pub name: String,
    pub description: String,
    pub tags: Vec<i32>,
    pub favorite: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LibraryTag {
    pub id: i32,
    pub name: String,
}

/// Catalog of everything the host could instantiate
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Library {
    pub plugins: Vec<LibraryPlugin>,
    pub models: Vec<LibraryModel>,
    pub tags: Vec<LibraryTag>,
}

impl Library {
    pub fn model_mut(&mut self, plugin: &str, model: &str) -> Option<&mut LibraryModel> {
        self.models
            .iter_mut()
            .find(|m| m.plugin == plugin && m.model == model)
    }

    pub fn model(&self, plugin: &str, model: &str) -> Option<&LibraryModel> {
        self.models
            .iter()
            .find(|m| m.plugin == plugin && m.model == model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn menu(id: MenuId, parent: Option<(MenuId, i32)>) -> Menu {
        Menu {
            id,
            module_id: 1,
            parent_menu: parent.map(|p| p.0),
            parent_item_index: parent.map(|p| p.1),
            items: Vec::new(),
        }
    }

    #[test]
    fn test_menu_path_one_level() {
        let mut menus = ModuleMenus::new();
        menus.insert(5, menu(5, None));
        menus.insert(7, menu(7, Some((5, 2))));

        assert_eq!(menu_path(&menus, 7), Some(vec![2]));
        assert_eq!(menu_path(&menus, 5), Some(vec![]));
    }

    #[test]
    fn test_menu_path_nested_is_root_first() {
        let mut menus = ModuleMenus::new();
        menus.insert(0, menu(0, None));
        menus.insert(1, menu(1, Some((0, 4))));
        menus.insert(2, menu(2, Some((1, 1))));

        assert_eq!(menu_path(&menus, 2), Some(vec![4, 1]));
    }

    #[test]
    fn test_menu_path_missing_or_cyclic() {
        let mut menus = ModuleMenus::new();
        menus.insert(1, menu(1, Some((9, 0))));
        assert_eq!(menu_path(&menus, 1), None);
        assert_eq!(menu_path(&menus, 3), None);

        menus.insert(2, menu(2, Some((3, 0))));
        menus.insert(3, menu(3, Some((2, 0))));
        assert_eq!(menu_path(&menus, 2), None);
    }

    #[test]
    fn test_param_equality_ignores_everything_but_value_and_visibility() {
        let a = Param {
            id: 1,
            value: 0.5,
            visible: true,
            name: "Freq".into(),
            ..Default::default()
        };
        let mut b = a.clone();
        b.name = "Other".into();
        b.synced = true;
        assert_eq!(a, b);

        b.value = 0.6;
        assert_ne!(a, b);
    }

    #[test]
    fn test_light_index_consistency() {
        let mut module = Module {
            id: 3,
            ..Default::default()
        };
        let mut param = Param {
            id: 0,
            ..Default::default()
        };
        param.light_ids.insert(light_id(0));
        module.params.insert(0, param);
        module.lights.insert(
            light_id(0),
            Light {
                id: light_id(0),
                host_key: 0,
                module_id: 3,
                param_id: Some(0),
                rect: Rect::default(),
                shape: LightShape::Round,
                color: Rgba::BLACK,
                bg_color: Rgba::TRANSPARENT,
                visible: true,
                synced: false,
            },
        );

        assert!(!module.light_index_consistent());
        module.rebuild_param_lights();
        assert!(module.light_index_consistent());

        module.lights.clear();
        assert!(!module.light_index_consistent());
    }
}
