//! Drift repair between the host graph and the mirrored model
//!
//! All three passes run on the render thread. They read the host without
//! holding any lock and only take the model lock to merge results.

use std::collections::BTreeSet;

use tracing::{debug, info};

use crate::codec;
use crate::collector::Collector;
use crate::host::GraphHost;
use crate::model::{CableId, ModuleId, Patch};
use crate::queue::Command;
use crate::state::SyncState;
use crate::transport::{send_messages, PacketSink};

/// What a presence diff changed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PresenceDiff {
    pub added_modules: Vec<ModuleId>,
    pub removed_modules: Vec<ModuleId>,
    pub added_cables: Vec<CableId>,
    pub removed_cables: Vec<CableId>,
}

impl PresenceDiff {
    pub fn is_empty(&self) -> bool {
        self.added_modules.is_empty()
            && self.removed_modules.is_empty()
            && self.added_cables.is_empty()
            && self.removed_cables.is_empty()
    }
}

/// Forget everything mirrored, snapshot the whole host and queue it.
pub fn collect_and_sync<H: GraphHost + ?Sized>(host: &H, state: &SyncState) {
    state.queue.clear();
    state.pending.clear();
    {
        let mut patch = state.patch.lock().unwrap();
        *patch = Patch::default();
        state.lights.lock().unwrap().clear();
    }
    state.menus.lock().unwrap().clear();

    let collector = Collector::new(host);
    let modules: Vec<_> = host
        .module_ids()
        .into_iter()
        .filter_map(|id| collector.collect_module(id, None))
        .collect();
    let cables: Vec<_> = host
        .cable_ids()
        .into_iter()
        .filter_map(|id| collector.collect_cable(id))
        .collect();

    info!(
        "full sync: {} modules, {} cables",
        modules.len(),
        cables.len()
    );

    {
        let mut patch = state.patch.lock().unwrap();
        for module in modules {
            state.queue.push(Command::SyncModule(module.id));
            patch.modules.insert(module.id, module);
        }
        for cable in cables {
            state.queue.push(Command::SyncCable(cable.id));
            patch.cables.insert(cable.id, cable);
        }
    }

    *state.library.lock().unwrap() = host.library();
    state.queue.push(Command::SyncLibrary);
}

/// Re-read params of every dirty module and queue a `SyncParam` for each
/// one whose value or visibility moved. Returns how many were queued.
pub fn process_module_diffs<H: GraphHost + ?Sized>(host: &H, state: &SyncState) -> usize {
    let dirty = state.pending.take_dirty();
    if dirty.is_empty() {
        return 0;
    }

    let collector = Collector::new(host);
    let mut queued = 0;
    for module_id in dirty {
        let Some(live) = collector.collect_module_shallow(module_id) else {
            debug!("dirty module {} no longer on the host", module_id);
            continue;
        };

        let mut patch = state.patch.lock().unwrap();
        let Some(module) = patch.modules.get_mut(&module_id) else {
            continue;
        };
        for (param_id, param_state) in live {
            let Some(param) = module.params.get_mut(&param_id) else {
                continue;
            };
            if !param.matches(&param_state) {
                param.apply(&param_state);
                state.queue.push(Command::SyncParam {
                    module: module_id,
                    param: param_id,
                });
                queued += 1;
            }
        }
    }
    queued
}

/// Compare tracked ids with the host's. New modules and cables are collected
/// and queued; vanished modules are dropped and announced, vanished cables
/// are dropped silently.
pub fn diff_module_and_cable_presence<H: GraphHost + ?Sized>(
    host: &H,
    state: &SyncState,
    sink: &dyn PacketSink,
) -> PresenceDiff {
    let live_modules: BTreeSet<ModuleId> = host.module_ids().into_iter().collect();
    let live_cables: BTreeSet<CableId> = host.cable_ids().into_iter().collect();
    let (tracked_modules, tracked_cables) = {
        let patch = state.patch.lock().unwrap();
        (
            patch.modules.keys().copied().collect::<BTreeSet<_>>(),
            patch.cables.keys().copied().collect::<BTreeSet<_>>(),
        )
    };

    let mut diff = PresenceDiff::default();

    for &id in tracked_modules.difference(&live_modules) {
        state.forget_module(id);
        diff.removed_modules.push(id);
    }
    if !diff.removed_modules.is_empty() {
        let notices: Vec<_> = diff
            .removed_modules
            .iter()
            .map(|&id| codec::module_destroy(id))
            .collect();
        send_messages(sink, &notices, state.config.send_buffer_size);
    }

    let collector = Collector::new(host);
    for &id in live_modules.difference(&tracked_modules) {
        if let Some(module) = collector.collect_module(id, None) {
            state.patch.lock().unwrap().modules.insert(id, module);
            state.queue.push(Command::SyncModule(id));
            diff.added_modules.push(id);
        }
    }

    {
        let mut patch = state.patch.lock().unwrap();
        for &id in tracked_cables.difference(&live_cables) {
            patch.cables.remove(&id);
            diff.removed_cables.push(id);
        }
    }
    for &id in live_cables.difference(&tracked_cables) {
        if let Some(cable) = collector.collect_cable(id) {
            state.patch.lock().unwrap().cables.insert(id, cable);
            state.queue.push(Command::SyncCable(id));
            diff.added_cables.push(id);
        }
    }

    if !diff.is_empty() {
        info!(
            "presence diff: +{:?} -{:?} modules, +{:?} -{:?} cables",
            diff.added_modules, diff.removed_modules, diff.added_cables, diff.removed_cables
        );
    }
    diff
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Vec2;
    use crate::host::memory::MemoryModule;
    use crate::host::{MemoryHost, ParamDescriptor};
    use crate::model::ParamKind;
    use crate::testing::MockSink;
    use pretty_assertions::assert_eq;
    use rackconf::SyncConfig;
    use std::path::PathBuf;

    fn module(id: ModuleId) -> MemoryModule {
        let mut module = MemoryModule::new(id, "Fundamental", "VCO", Vec2::ZERO);
        for param in 0..5 {
            module.params.push(ParamDescriptor {
                id: param,
                kind: ParamKind::Knob,
                rect: crate::geometry::Rect::new(10.0, 10.0 + param as f32 * 40.0, 30.0, 30.0),
                max: 1.0,
                visible: true,
                ..Default::default()
            });
        }
        module
    }

    fn host_with(ids: &[ModuleId]) -> MemoryHost {
        let mut host = MemoryHost::new();
        for &id in ids {
            host.insert_module(module(id));
        }
        host
    }

    fn state() -> SyncState {
        SyncState::new(SyncConfig::default(), PathBuf::new())
    }

    #[test]
    fn test_collect_and_sync_queues_everything() {
        let host = MemoryHost::demo();
        let state = state();
        state.queue.push(Command::SyncModule(99));
        state.pending.mark_dirty(99);

        collect_and_sync(&host, &state);

        assert_eq!(
            state.queue.snapshot(),
            vec![
                Command::SyncModule(1),
                Command::SyncModule(2),
                Command::SyncModule(3),
                Command::SyncCable(10),
                Command::SyncLibrary,
            ]
        );
        assert!(state.pending.take_dirty().is_empty());
        assert_eq!(state.library.lock().unwrap().models.len(), 3);
        let patch = state.patch.lock().unwrap();
        assert!(patch.modules.values().all(|m| !m.synced));
        assert!(patch.modules.values().all(|m| m.light_index_consistent()));
    }

    #[test]
    fn test_presence_diff() {
        let host = host_with(&[1, 2, 3]);
        let state = state();
        let sink = MockSink::new();
        collect_and_sync(&host, &state);
        state.queue.clear();

        let host = host_with(&[2, 3, 4]);
        let diff = diff_module_and_cable_presence(&host, &state, &sink);

        assert_eq!(diff.added_modules, vec![4]);
        assert_eq!(diff.removed_modules, vec![1]);
        assert_eq!(state.queue.snapshot(), vec![Command::SyncModule(4)]);
        let destroys = sink.messages_to("/modules/destroy");
        assert_eq!(destroys.len(), 1);
        assert_eq!(destroys[0].arg_i64(0).unwrap(), 1);
        let tracked: Vec<_> = state.patch.lock().unwrap().modules.keys().copied().collect();
        assert_eq!(tracked, vec![2, 3, 4]);
    }

    #[test]
    fn test_removed_cable_sends_no_notice() {
        let mut host = MemoryHost::demo();
        let state = state();
        let sink = MockSink::new();
        collect_and_sync(&host, &state);

        host.cables.clear();
        let diff = diff_module_and_cable_presence(&host, &state, &sink);

        assert_eq!(diff.removed_cables, vec![10]);
        assert_eq!(sink.packet_count(), 0);
        assert!(state.patch.lock().unwrap().cables.is_empty());
    }

    #[test]
    fn test_diff_minimality() {
        let mut host = host_with(&[1]);
        let state = state();
        collect_and_sync(&host, &state);
        state.queue.clear();
        for param in 0..5 {
            state.ack_param(1, param);
        }

        host.modules.get_mut(&1).unwrap().params[3].value = 0.75;
        state.pending.mark_dirty(1);

        assert_eq!(process_module_diffs(&host, &state), 1);
        assert_eq!(
            state.queue.snapshot(),
            vec![Command::SyncParam {
                module: 1,
                param: 3
            }]
        );
        let patch = state.patch.lock().unwrap();
        let params = &patch.modules[&1].params;
        assert_eq!(params[&3].value, 0.75);
        assert!(params.values().all(|p| p.synced));
    }

    #[test]
    fn test_clean_modules_are_not_diffed() {
        let host = host_with(&[1]);
        let state = state();
        collect_and_sync(&host, &state);
        state.queue.clear();

        state.pending.mark_dirty(1);
        assert_eq!(process_module_diffs(&host, &state), 0);
        assert!(state.queue.is_empty());
    }
}
