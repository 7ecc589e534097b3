//! State shared by the render, worker and listener threads
//!
//! Lock order: `patch` before `lights`. No other lock is ever held while
//! taking another.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use rackconf::SyncConfig;
use tracing::debug;

use crate::lights::LightIndex;
use crate::model::{
    CableId, Library, LightId, ModuleId, ModuleMenus, ParamId, Patch, PortId, PortKind,
};
use crate::pending::Pending;
use crate::queue::CommandQueue;

pub struct SyncState {
    pub config: SyncConfig,
    /// Where the library catalog is dumped
    pub state_dir: PathBuf,

    pub queue: CommandQueue,
    pub patch: Mutex<Patch>,
    pub lights: Mutex<LightIndex>,
    pub menus: Mutex<BTreeMap<ModuleId, ModuleMenus>>,
    pub library: Mutex<Library>,
    pub pending: Pending,

    pub needs_full_sync: AtomicBool,
    pub needs_presence_diff: AtomicBool,
    pub exit_requested: AtomicBool,
    pub running: AtomicBool,
}

impl SyncState {
    pub fn new(config: SyncConfig, state_dir: PathBuf) -> Self {
        Self {
            config,
            state_dir,
            queue: CommandQueue::new(),
            patch: Mutex::new(Patch::default()),
            lights: Mutex::new(LightIndex::new()),
            menus: Mutex::new(BTreeMap::new()),
            library: Mutex::new(Library::default()),
            pending: Pending::default(),
            needs_full_sync: AtomicBool::new(false),
            needs_presence_diff: AtomicBool::new(false),
            exit_requested: AtomicBool::new(false),
            running: AtomicBool::new(true),
        }
    }

    pub fn request_full_sync(&self) {
        self.needs_full_sync.store(true, Ordering::SeqCst);
    }

    pub fn request_presence_diff(&self) {
        self.needs_presence_diff.store(true, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn ack_module(&self, module: ModuleId) -> bool {
        let mut patch = self.patch.lock().unwrap();
        match patch.modules.get_mut(&module) {
            Some(m) => {
                m.synced = true;
                true
            }
            None => {
                debug!("ack for unknown module {}", module);
                false
            }
        }
    }

    pub fn ack_param(&self, module: ModuleId, param: ParamId) -> bool {
        let mut patch = self.patch.lock().unwrap();
        match patch
            .modules
            .get_mut(&module)
            .and_then(|m| m.params.get_mut(&param))
        {
            Some(p) => {
                p.synced = true;
                true
            }
            None => {
                debug!("ack for unknown param {}:{}", module, param);
                false
            }
        }
    }

    pub fn ack_port(&self, kind: PortKind, module: ModuleId, port: PortId) -> bool {
        let mut patch = self.patch.lock().unwrap();
        match patch
            .modules
            .get_mut(&module)
            .and_then(|m| m.ports_mut(kind).get_mut(&port))
        {
            Some(p) => {
                p.synced = true;
                true
            }
            None => {
                debug!("ack for unknown {:?} {}:{}", kind, module, port);
                false
            }
        }
    }

    /// Marks the light synced and starts streaming its colour
    pub fn ack_light(&self, module: ModuleId, light: LightId) -> bool {
        let mut patch = self.patch.lock().unwrap();
        let Some(l) = patch
            .modules
            .get_mut(&module)
            .and_then(|m| m.lights.get_mut(&light))
        else {
            debug!("ack for unknown light {}:{}", module, light);
            return false;
        };
        l.synced = true;
        let (host_key, color) = (l.host_key, l.color);

        self.lights
            .lock()
            .unwrap()
            .insert(module, light, host_key, color);
        true
    }

    pub fn ack_display(&self, module: ModuleId, index: i32) -> bool {
        let mut patch = self.patch.lock().unwrap();
        match patch
            .modules
            .get_mut(&module)
            .and_then(|m| m.displays.get_mut(&index))
        {
            Some(d) => {
                d.synced = true;
                true
            }
            None => {
                debug!("ack for unknown display {}:{}", module, index);
                false
            }
        }
    }

    pub fn ack_cable(&self, cable: CableId) -> bool {
        let mut patch = self.patch.lock().unwrap();
        match patch.cables.get_mut(&cable) {
            Some(c) => {
                c.synced = true;
                true
            }
            None => {
                debug!("ack for unknown cable {}", cable);
                false
            }
        }
    }

    /// Drop a module and everything hanging off it, model before lights
    pub fn forget_module(&self, module: ModuleId) {
        let mut patch = self.patch.lock().unwrap();
        patch.modules.remove(&module);
        self.lights.lock().unwrap().remove_module(module);
        drop(patch);
        self.menus.lock().unwrap().remove(&module);
    }
}

/// Handle the host uses to tell the engine its graph changed
#[derive(Clone)]
pub struct HostNotifier {
    state: Arc<SyncState>,
}

impl HostNotifier {
    pub(crate) fn new(state: Arc<SyncState>) -> Self {
        Self { state }
    }

    /// Modules or cables were added or removed
    pub fn graph_changed(&self) {
        self.state.request_presence_diff();
    }

    /// A param of this module moved on the host side
    pub fn params_changed(&self, module: ModuleId) {
        self.state.pending.mark_dirty(module);
    }

    /// Throw away everything mirrored and start over
    pub fn request_full_sync(&self) {
        self.state.request_full_sync();
    }
}
