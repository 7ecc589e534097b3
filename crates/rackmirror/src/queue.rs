//! Single-consumer command FIFO feeding the sync worker

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::model::{CableId, MenuId, ModuleId, ParamId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    SyncModule(ModuleId),
    SyncCable(CableId),
    SyncParam {
        module: ModuleId,
        param: ParamId,
    },
    SyncMenu {
        module: ModuleId,
        menu: MenuId,
    },
    SyncLibrary,
    /// Re-send light-add records for the module's unacknowledged lights
    UpdateLights(ModuleId),
    CheckModuleSync {
        module: ModuleId,
        last_check: Instant,
        attempts: u32,
    },
    /// Wakes the worker so it can observe shutdown
    Noop,
}

#[derive(Debug, Default)]
struct Inner {
    commands: VecDeque<Command>,
    /// Bumped by every `push`, never by `requeue`
    generation: u64,
}

#[derive(Debug, Default)]
pub struct CommandQueue {
    inner: Mutex<Inner>,
    ready: Condvar,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, command: Command) {
        let mut inner = self.inner.lock().unwrap();
        inner.generation += 1;
        inner.commands.push_back(command);
        self.ready.notify_one();
    }

    /// Put a popped command back at the tail without counting as new work
    pub fn requeue(&self, command: Command) {
        self.inner.lock().unwrap().commands.push_back(command);
    }

    /// Block until a command is available
    pub fn pop(&self) -> Command {
        let mut inner = self.inner.lock().unwrap();
        loop {
            if let Some(command) = inner.commands.pop_front() {
                return command;
            }
            inner = self.ready.wait(inner).unwrap();
        }
    }

    pub fn try_pop(&self) -> Option<Command> {
        self.inner.lock().unwrap().commands.pop_front()
    }

    pub fn retain(&self, keep: impl FnMut(&Command) -> bool) {
        self.inner.lock().unwrap().commands.retain(keep);
    }

    pub fn clear(&self) {
        self.inner.lock().unwrap().commands.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn generation(&self) -> u64 {
        self.inner.lock().unwrap().generation
    }

    /// Wait up to `timeout` unless something was pushed after `generation`
    pub fn park(&self, generation: u64, timeout: Duration) {
        let inner = self.inner.lock().unwrap();
        let _ = self
            .ready
            .wait_timeout_while(inner, timeout, |inner| inner.generation == generation)
            .unwrap();
    }

    /// Copy of the queue contents, front first
    pub fn snapshot(&self) -> Vec<Command> {
        self.inner.lock().unwrap().commands.iter().copied().collect()
    }
}
