//! Sync worker thread
//!
//! Pops commands one at a time and turns them into outbound bundles. The
//! only command that comes back is `CheckModuleSync`, which polls a module's
//! acknowledgement state until it is complete or the retry budget runs out.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use rackproto::OscMessage;
use tracing::{debug, error, info, warn};

use crate::codec;
use crate::model::{CableId, MenuId, ModuleId, ParamId};
use crate::queue::Command;
use crate::state::SyncState;
use crate::transport::{send_messages, PacketSink};

/// File name of the library catalog under the state directory
pub const LIBRARY_FILE: &str = "library.json";

/// What the worker should do after a command
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Step {
    Continue,
    /// Nothing is due for this long
    Park(Duration),
}

/// Result of one acknowledgement poll
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CheckOutcome {
    NotDue(Duration),
    Requeued,
    Abandoned,
    Complete,
    /// Module is no longer tracked
    Gone,
}

pub struct SyncWorker {
    handle: Option<JoinHandle<()>>,
}

impl SyncWorker {
    pub fn spawn(state: Arc<SyncState>, sink: Arc<dyn PacketSink>) -> std::io::Result<Self> {
        let handle = thread::Builder::new()
            .name("rackmirror-sync".to_string())
            .spawn(move || run(state, sink))?;
        Ok(Self {
            handle: Some(handle),
        })
    }

    /// Caller clears the running flag and pushes `Noop` first
    pub fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("sync worker panicked");
            }
        }
    }
}

/// A run of consecutive not-due checks. Once it has covered the whole queue
/// the worker sleeps until the earliest check is due or new work arrives.
#[derive(Debug)]
struct IdlePass {
    generation: u64,
    remaining: usize,
    wait: Duration,
}

fn run(state: Arc<SyncState>, sink: Arc<dyn PacketSink>) {
    debug!("sync worker started");
    let mut idle = None;
    while state.is_running() {
        let command = state.queue.pop();
        if !state.is_running() {
            break;
        }
        run_command(&state, sink.as_ref(), command, &mut idle);
    }
    debug!("sync worker stopped");
}

fn run_command(
    state: &SyncState,
    sink: &dyn PacketSink,
    command: Command,
    idle: &mut Option<IdlePass>,
) {
    let Step::Park(wait) = execute(state, sink, command, Instant::now()) else {
        *idle = None;
        return;
    };

    let pass = idle.get_or_insert_with(|| IdlePass {
        generation: state.queue.generation(),
        remaining: state.queue.len(),
        wait,
    });
    pass.wait = pass.wait.min(wait);
    pass.remaining = pass.remaining.saturating_sub(1);
    if pass.remaining == 0 {
        state.queue.park(pass.generation, pass.wait);
        *idle = None;
    }
}

pub fn execute(state: &SyncState, sink: &dyn PacketSink, command: Command, now: Instant) -> Step {
    match command {
        Command::SyncModule(id) => sync_module(state, sink, id, now),
        Command::SyncCable(id) => sync_cable(state, sink, id),
        Command::SyncParam { module, param } => sync_param(state, sink, module, param),
        Command::SyncMenu { module, menu } => sync_menu(state, sink, module, menu),
        Command::SyncLibrary => sync_library(state, sink),
        Command::UpdateLights(module) => update_lights(state, sink, module),
        Command::CheckModuleSync {
            module,
            last_check,
            attempts,
        } => {
            if let CheckOutcome::NotDue(wait) =
                check_module_sync(state, sink, module, last_check, attempts, now)
            {
                return Step::Park(wait);
            }
        }
        Command::Noop => {}
    }
    Step::Continue
}

fn send(state: &SyncState, sink: &dyn PacketSink, records: &[OscMessage]) {
    send_messages(sink, records, state.config.send_buffer_size);
}

fn sync_module(state: &SyncState, sink: &dyn PacketSink, id: ModuleId, now: Instant) {
    let records = {
        let patch = state.patch.lock().unwrap();
        match patch.modules.get(&id) {
            Some(module) => codec::module_records(module),
            None => {
                debug!("module {} gone before sync", id);
                return;
            }
        }
    };

    debug!("syncing module {} ({} records)", id, records.len());
    send(state, sink, &records);
    state.queue.push(Command::CheckModuleSync {
        module: id,
        last_check: now,
        attempts: 0,
    });
}

fn sync_cable(state: &SyncState, sink: &dyn PacketSink, id: CableId) {
    let record = state.patch.lock().unwrap().cables.get(&id).map(codec::cable_add);
    match record {
        Some(record) => send(state, sink, &[record]),
        None => debug!("cable {} gone before sync", id),
    }
}

fn sync_param(state: &SyncState, sink: &dyn PacketSink, module: ModuleId, param: ParamId) {
    let record = state
        .patch
        .lock()
        .unwrap()
        .modules
        .get(&module)
        .and_then(|m| m.params.get(&param))
        .map(|p| codec::param_sync(module, p));
    if let Some(record) = record {
        send(state, sink, &[record]);
    }
}

fn sync_menu(state: &SyncState, sink: &dyn PacketSink, module: ModuleId, menu: MenuId) {
    let records = state
        .menus
        .lock()
        .unwrap()
        .get(&module)
        .and_then(|menus| menus.get(&menu))
        .map(|m| codec::menu_records(module, menu, &m.items));
    match records {
        Some(records) => send(state, sink, &records),
        None => debug!("menu {}:{} gone before sync", module, menu),
    }
}

fn sync_library(state: &SyncState, sink: &dyn PacketSink) {
    let library = state.library.lock().unwrap().clone();
    let mut records = codec::library_records(&library);

    if state.config.library_dump {
        match dump_library(state, &library) {
            Ok(path) => records.push(codec::library_json_path(&path.display().to_string())),
            Err(e) => warn!("library dump failed: {}", e),
        }
    }

    info!(
        "syncing library: {} plugins, {} models",
        library.plugins.len(),
        library.models.len()
    );
    send(state, sink, &records);
}

fn dump_library(state: &SyncState, library: &crate::model::Library) -> anyhow::Result<PathBuf> {
    fs::create_dir_all(&state.state_dir)?;
    let path = state.state_dir.join(LIBRARY_FILE);
    fs::write(&path, serde_json::to_string_pretty(library)?)?;
    Ok(path)
}

fn update_lights(state: &SyncState, sink: &dyn PacketSink, module: ModuleId) {
    let records = state
        .patch
        .lock()
        .unwrap()
        .modules
        .get(&module)
        .map(codec::unsynced_light_records)
        .unwrap_or_default();
    if !records.is_empty() {
        send(state, sink, &records);
    }
}

/// Poll one module. Every path that keeps polling pushes the command back.
pub fn check_module_sync(
    state: &SyncState,
    sink: &dyn PacketSink,
    module: ModuleId,
    last_check: Instant,
    attempts: u32,
    now: Instant,
) -> CheckOutcome {
    let interval = state.config.check_interval();
    let elapsed = now.saturating_duration_since(last_check);
    if elapsed < interval {
        state.queue.requeue(Command::CheckModuleSync {
            module,
            last_check,
            attempts,
        });
        return CheckOutcome::NotDue(interval - elapsed);
    }

    let status = state
        .patch
        .lock()
        .unwrap()
        .modules
        .get(&module)
        .map(|m| (m.fully_synced(), m.return_id, m.only_lights_unsynced()));

    match status {
        None => {
            debug!("module {} removed while waiting for acks", module);
            CheckOutcome::Gone
        }
        Some((true, return_id, _)) => {
            debug!("module {} fully synced", module);
            send(
                state,
                sink,
                &[codec::module_sync_complete(module, return_id)],
            );
            CheckOutcome::Complete
        }
        Some((false, ..)) if attempts >= state.config.retry_limit => {
            info!(
                "module {} still unsynced after {} checks, giving up",
                module, attempts
            );
            CheckOutcome::Abandoned
        }
        Some((false, _, lights_missing)) => {
            if lights_missing {
                debug!("module {} waiting on light acks, resending", module);
                state.queue.push(Command::UpdateLights(module));
            }
            state.queue.requeue(Command::CheckModuleSync {
                module,
                last_check: now,
                attempts: attempts + 1,
            });
            CheckOutcome::Requeued
        }
    }
}
