//! Requests waiting for the render thread
//!
//! The listener pushes; the render thread swaps each set out under its lock
//! and works on the local copy, so host calls never run with a lock held.

use std::collections::BTreeSet;
use std::mem;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::geometry::Vec2;
use crate::model::{CableId, MenuId, ModuleId, ParamId, PortId};

#[derive(Debug, Clone, PartialEq)]
pub struct ParamUpdate {
    pub module: ModuleId,
    pub param: ParamId,
    pub value: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModuleCreate {
    pub plugin: String,
    pub model: String,
    pub return_id: i64,
    /// Requested top-left in centimetres
    pub position: Option<Vec2>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CableCreate {
    pub input_module: ModuleId,
    pub output_module: ModuleId,
    pub input_port: PortId,
    pub output_port: PortId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Arrangement {
    pub left: ModuleId,
    pub right: ModuleId,
    pub attach: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MenuRequest {
    pub module: ModuleId,
    pub menu: MenuId,
    pub parent_menu: Option<MenuId>,
    pub parent_item_index: Option<i32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MenuClick {
    pub module: ModuleId,
    pub menu: MenuId,
    pub item_index: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MenuQuantity {
    pub module: ModuleId,
    pub menu: MenuId,
    pub item_index: i32,
    pub value: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Favorite {
    pub plugin: String,
    pub model: String,
    pub favorite: bool,
}

#[derive(Debug)]
pub struct PendingSet<T> {
    items: Mutex<Vec<T>>,
}

impl<T> Default for PendingSet<T> {
    fn default() -> Self {
        Self {
            items: Mutex::new(Vec::new()),
        }
    }
}

impl<T> PendingSet<T> {
    pub fn push(&self, item: T) {
        self.items.lock().unwrap().push(item);
    }

    /// Take everything queued so far, oldest first
    pub fn drain(&self) -> Vec<T> {
        mem::take(&mut *self.items.lock().unwrap())
    }

    pub fn clear(&self) {
        self.items.lock().unwrap().clear();
    }

    pub fn len(&self) -> usize {
        self.items.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Default)]
pub struct Pending {
    pub param_updates: PendingSet<ParamUpdate>,
    pub module_creates: PendingSet<ModuleCreate>,
    pub module_destroys: PendingSet<ModuleId>,
    pub cable_creates: PendingSet<CableCreate>,
    pub cable_destroys: PendingSet<CableId>,
    pub arrangements: PendingSet<Arrangement>,
    pub menu_requests: PendingSet<MenuRequest>,
    pub menu_clicks: PendingSet<MenuClick>,
    pub menu_quantities: PendingSet<MenuQuantity>,
    pub favorites: PendingSet<Favorite>,
    pub patch_loads: PendingSet<Option<PathBuf>>,
    dirty_modules: Mutex<BTreeSet<ModuleId>>,
}

impl Pending {
    pub fn mark_dirty(&self, module: ModuleId) {
        self.dirty_modules.lock().unwrap().insert(module);
    }

    pub fn take_dirty(&self) -> BTreeSet<ModuleId> {
        mem::take(&mut *self.dirty_modules.lock().unwrap())
    }

    /// Drop every queued request. Patch loads survive: they are what
    /// triggers a resync in the first place.
    pub fn clear(&self) {
        self.param_updates.clear();
        self.module_creates.clear();
        self.module_destroys.clear();
        self.cable_creates.clear();
        self.cable_destroys.clear();
        self.arrangements.clear();
        self.menu_requests.clear();
        self.menu_clicks.clear();
        self.menu_quantities.clear();
        self.favorites.clear();
        self.dirty_modules.lock().unwrap().clear();
    }
}
