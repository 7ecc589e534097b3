//! The per-frame driver
//!
//! [`SyncEngine`] owns the host and runs on the render thread. Each
//! [`tick`](SyncEngine::tick) streams light colours, applies whatever the
//! peer asked for since the last frame, and runs any reconciliation that was
//! requested. None of it waits on the network or on the worker.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use rackconf::{MirrorConfig, SyncConfig};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::collector::{collect_menu, with_menu, Collector};
use crate::host::GraphHost;
use crate::lights::LightThrottle;
use crate::model::{Menu, MenuId, ModuleId, ModuleMenus, ParamState, PortKind};
use crate::pending::{
    Arrangement, CableCreate, Favorite, MenuClick, MenuQuantity, MenuRequest, ModuleCreate,
    ParamUpdate,
};
use crate::queue::Command;
use crate::reconciler;
use crate::router::Router;
use crate::state::{HostNotifier, SyncState};
use crate::transport::{send_messages, Listener, PacketSink, UdpSender};
use crate::worker::SyncWorker;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to start sync worker: {0}")]
    Worker(#[from] std::io::Error),

    #[error("transport setup failed: {0:#}")]
    Transport(anyhow::Error),
}

pub struct SyncEngine<H: GraphHost> {
    host: H,
    state: Arc<SyncState>,
    sink: Arc<dyn PacketSink>,
    router: Router,
    worker: SyncWorker,
    listener: Option<Listener>,
    throttle: LightThrottle,
    autosaved: bool,
}

impl<H: GraphHost> SyncEngine<H> {
    /// Bind the UDP endpoints from `config` and start both threads. The
    /// first tick runs a full sync.
    pub fn new(host: H, config: &MirrorConfig) -> Result<Self, EngineError> {
        let bind = &config.infra.bind;
        let sender =
            UdpSender::new(&bind.peer_host, bind.peer_port).map_err(EngineError::Transport)?;
        let mut engine = Self::with_sink(
            host,
            config.sync.clone(),
            config.infra.paths.state_dir.clone(),
            Arc::new(sender),
        )?;

        let listener = Listener::spawn(&bind.listen_addr(), engine.router.clone())
            .map_err(EngineError::Transport)?;
        info!(
            "mirroring to {} from {}",
            bind.peer_addr(),
            listener.local_addr()
        );
        engine.listener = Some(listener);
        Ok(engine)
    }

    /// Engine without a listener, sending through `sink`. Inbound messages
    /// can still be fed in through [`router`](Self::router).
    pub fn with_sink(
        host: H,
        config: SyncConfig,
        state_dir: PathBuf,
        sink: Arc<dyn PacketSink>,
    ) -> Result<Self, EngineError> {
        let throttle = LightThrottle::new(config.light_update_interval());
        let state = Arc::new(SyncState::new(config, state_dir));
        state.request_full_sync();

        let worker = SyncWorker::spawn(Arc::clone(&state), Arc::clone(&sink))?;
        let router = Router::new(Arc::clone(&state), Arc::clone(&sink));

        Ok(Self {
            host,
            state,
            sink,
            router,
            worker,
            listener: None,
            throttle,
            autosaved: false,
        })
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    /// Mutating the host directly should be followed by a [`HostNotifier`]
    /// call so the engine notices.
    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn state(&self) -> &Arc<SyncState> {
        &self.state
    }

    pub fn notifier(&self) -> HostNotifier {
        HostNotifier::new(Arc::clone(&self.state))
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.as_ref().map(Listener::local_addr)
    }

    pub fn exit_requested(&self) -> bool {
        self.state.exit_requested.load(Ordering::SeqCst)
    }

    /// One frame's worth of sync work
    pub fn tick(&mut self) {
        self.update_lights(Instant::now());
        self.apply_pending();

        reconciler::process_module_diffs(&self.host, &self.state);

        if self.state.needs_presence_diff.swap(false, Ordering::SeqCst) {
            reconciler::diff_module_and_cable_presence(
                &self.host,
                &self.state,
                self.sink.as_ref(),
            );
        }
        if self.state.needs_full_sync.swap(false, Ordering::SeqCst) {
            reconciler::collect_and_sync(&self.host, &self.state);
        }
    }

    fn update_lights(&mut self, now: Instant) {
        if !self.throttle.due(now) {
            return;
        }
        let updates = self
            .state
            .lights
            .lock()
            .unwrap()
            .collect_updates(&self.host);
        if !updates.is_empty() {
            send_messages(
                self.sink.as_ref(),
                &updates,
                self.state.config.send_buffer_size,
            );
        }
    }

    fn apply_pending(&mut self) {
        let pending = &self.state.pending;
        let param_updates = pending.param_updates.drain();
        let module_creates = pending.module_creates.drain();
        let module_destroys = pending.module_destroys.drain();
        let cable_creates = pending.cable_creates.drain();
        let cable_destroys = pending.cable_destroys.drain();
        let arrangements = pending.arrangements.drain();
        let menu_requests = pending.menu_requests.drain();
        let menu_clicks = pending.menu_clicks.drain();
        let menu_quantities = pending.menu_quantities.drain();
        let favorites = pending.favorites.drain();
        let patch_loads = pending.patch_loads.drain();

        for update in param_updates {
            self.apply_param_update(update);
        }
        for create in module_creates {
            self.create_module(create);
        }
        if !module_destroys.is_empty() {
            self.destroy_modules(module_destroys);
        }
        for create in cable_creates {
            self.create_cable(create);
        }
        for id in cable_destroys {
            self.destroy_cable(id);
        }
        for arrangement in arrangements {
            self.arrange(arrangement);
        }
        for request in menu_requests {
            self.open_menu(request);
        }
        for click in menu_clicks {
            self.click_menu_item(click);
        }
        for update in menu_quantities {
            self.update_menu_quantity(update);
        }
        for favorite in favorites {
            self.set_favorite(favorite);
        }
        for path in patch_loads {
            self.load_patch(path);
        }

        if self.exit_requested() && !self.autosaved {
            self.autosaved = true;
            info!("autosaving before exit");
            if let Err(e) = self.host.autosave() {
                warn!("autosave failed: {}", e);
            }
        }
    }

    /// Write the value, read back what the host made of it, and echo the
    /// result so the peer sees the formatted display value.
    fn apply_param_update(&mut self, update: ParamUpdate) {
        if let Err(e) = self
            .host
            .set_param_value(update.module, update.param, update.value)
        {
            warn!(
                "param update {}:{} failed: {}",
                update.module, update.param, e
            );
            return;
        }
        let Some(desc) = self.host.param(update.module, update.param) else {
            return;
        };
        let param_state = ParamState {
            id: desc.id,
            value: desc.value,
            visible: desc.visible,
            display_value: desc.display_value,
        };

        let tracked = {
            let mut patch = self.state.patch.lock().unwrap();
            match patch
                .modules
                .get_mut(&update.module)
                .and_then(|m| m.params.get_mut(&update.param))
            {
                Some(param) => {
                    param.apply(&param_state);
                    true
                }
                None => false,
            }
        };
        if tracked {
            self.state.queue.push(Command::SyncParam {
                module: update.module,
                param: update.param,
            });
        }
    }

    /// Re-collect one module from scratch and queue it. Its lights leave the
    /// index until the peer acknowledges them again, and any acknowledgement
    /// poll from an earlier sync of it is dropped.
    fn resync_module(&mut self, id: ModuleId, return_id: Option<i64>) {
        let Some(module) = Collector::new(&self.host).collect_module(id, return_id) else {
            return;
        };
        {
            let mut patch = self.state.patch.lock().unwrap();
            patch.modules.insert(id, module);
            self.state.lights.lock().unwrap().remove_module(id);
        }
        self.state.queue.retain(
            |c| !matches!(c, Command::CheckModuleSync { module, .. } if *module == id),
        );
        self.state.queue.push(Command::SyncModule(id));
    }

    fn tracked_return_id(&self, id: ModuleId) -> Option<i64> {
        self.state
            .patch
            .lock()
            .unwrap()
            .modules
            .get(&id)
            .and_then(|m| m.return_id)
    }

    fn create_module(&mut self, create: ModuleCreate) {
        let px_per_cm = self.host.px_per_cm();
        let position = create.position.map(|p| p.to_px(px_per_cm));
        match self
            .host
            .create_module(&create.plugin, &create.model, position)
        {
            Ok(id) => {
                info!(
                    "created module {} ({}/{}) for request {}",
                    id, create.plugin, create.model, create.return_id
                );
                self.resync_module(id, Some(create.return_id));
            }
            Err(e) => warn!(
                "cannot create {}/{}: {}",
                create.plugin, create.model, e
            ),
        }
    }

    fn destroy_modules(&mut self, ids: Vec<ModuleId>) {
        for id in ids {
            if self.host.module(id).is_none() {
                warn!("destroy requested for unknown module {}", id);
                continue;
            }
            if let Err(e) = self.host.destroy_module(id) {
                warn!("cannot destroy module {}: {}", id, e);
            }
        }
        self.state.request_presence_diff();
    }

    fn create_cable(&mut self, create: CableCreate) {
        let ports_exist = {
            let patch = self.state.patch.lock().unwrap();
            patch
                .modules
                .get(&create.input_module)
                .is_some_and(|m| m.has_port(PortKind::Input, create.input_port))
                && patch
                    .modules
                    .get(&create.output_module)
                    .is_some_and(|m| m.has_port(PortKind::Output, create.output_port))
        };
        if !ports_exist {
            warn!(
                "cable request references missing ports {}:{} <- {}:{}",
                create.input_module, create.input_port, create.output_module, create.output_port
            );
            return;
        }

        let id = match self.host.create_cable(
            create.input_module,
            create.output_module,
            create.input_port,
            create.output_port,
        ) {
            Ok(id) => id,
            Err(e) => {
                warn!("cannot create cable: {}", e);
                return;
            }
        };
        if let Some(cable) = Collector::new(&self.host).collect_cable(id) {
            self.state.patch.lock().unwrap().cables.insert(id, cable);
            self.state.queue.push(Command::SyncCable(id));
        }
    }

    fn destroy_cable(&mut self, id: i64) {
        if self.host.cable(id).is_none() {
            warn!("destroy requested for unknown cable {}", id);
            return;
        }
        match self.host.destroy_cable(id) {
            Ok(()) => {
                self.state.patch.lock().unwrap().cables.remove(&id);
            }
            Err(e) => warn!("cannot destroy cable {}: {}", id, e),
        }
    }

    /// Arranging moves modules and rewires expanders, so both sides are
    /// re-collected and re-sent.
    fn arrange(&mut self, arrangement: Arrangement) {
        let Arrangement {
            left,
            right,
            attach,
        } = arrangement;
        if self.host.module(left).is_none() || self.host.module(right).is_none() {
            warn!("arrange requested for unknown modules {} / {}", left, right);
            return;
        }
        if let Err(e) = self.host.arrange_modules(left, right, attach) {
            warn!("cannot arrange {} / {}: {}", left, right, e);
            return;
        }
        for id in [left, right] {
            let return_id = self.tracked_return_id(id);
            self.resync_module(id, return_id);
        }
    }

    fn module_menus(&self, module: ModuleId) -> ModuleMenus {
        self.state
            .menus
            .lock()
            .unwrap()
            .get(&module)
            .cloned()
            .unwrap_or_default()
    }

    /// Snapshot a known menu's items and queue it for the peer
    fn refresh_menu(&mut self, module: ModuleId, mut menus: ModuleMenus, menu: MenuId) {
        let items = match collect_menu(&mut self.host, module, &menus, menu) {
            Ok(items) => items,
            Err(e) => {
                warn!("cannot read menu {}:{}: {}", module, menu, e);
                return;
            }
        };
        if let Some(entry) = menus.get_mut(&menu) {
            entry.items = items;
        }
        self.state.menus.lock().unwrap().insert(module, menus);
        self.state.queue.push(Command::SyncMenu { module, menu });
    }

    fn open_menu(&mut self, request: MenuRequest) {
        if self.host.module(request.module).is_none() {
            warn!("menu requested for unknown module {}", request.module);
            return;
        }
        let mut menus = self.module_menus(request.module);
        menus.insert(
            request.menu,
            Menu {
                id: request.menu,
                module_id: request.module,
                parent_menu: request.parent_menu,
                parent_item_index: request.parent_item_index,
                items: Vec::new(),
            },
        );
        self.refresh_menu(request.module, menus, request.menu);
    }

    fn click_menu_item(&mut self, click: MenuClick) {
        let menus = self.module_menus(click.module);
        if !menus.contains_key(&click.menu) {
            warn!("click on unknown menu {}:{}", click.module, click.menu);
            return;
        }
        let result = with_menu(&mut self.host, click.module, &menus, click.menu, |h| {
            h.click_menu_item(click.item_index)
        });
        match result {
            Ok(()) => {
                debug!(
                    "clicked item {} of menu {}:{}",
                    click.item_index, click.module, click.menu
                );
                self.refresh_menu(click.module, menus, click.menu);
                self.state.pending.mark_dirty(click.module);
            }
            Err(e) => warn!(
                "cannot click item {} of menu {}:{}: {}",
                click.item_index, click.module, click.menu, e
            ),
        }
    }

    fn update_menu_quantity(&mut self, update: MenuQuantity) {
        let menus = self.module_menus(update.module);
        if !menus.contains_key(&update.menu) {
            warn!("quantity update on unknown menu {}:{}", update.module, update.menu);
            return;
        }
        let result = with_menu(&mut self.host, update.module, &menus, update.menu, |h| {
            h.set_menu_item_quantity(update.item_index, update.value)
        });
        match result {
            Ok(()) => self.refresh_menu(update.module, menus, update.menu),
            Err(e) => warn!(
                "cannot set quantity of item {} in menu {}:{}: {}",
                update.item_index, update.module, update.menu, e
            ),
        }
    }

    fn set_favorite(&mut self, favorite: Favorite) {
        if let Err(e) = self
            .host
            .set_favorite(&favorite.plugin, &favorite.model, favorite.favorite)
        {
            warn!(
                "cannot mark {}/{} favorite: {}",
                favorite.plugin, favorite.model, e
            );
            return;
        }
        if let Some(model) = self
            .state
            .library
            .lock()
            .unwrap()
            .model_mut(&favorite.plugin, &favorite.model)
        {
            model.favorite = favorite.favorite;
        }
        self.state.queue.push(Command::SyncLibrary);
    }

    fn load_patch(&mut self, path: Option<PathBuf>) {
        match self.host.load_patch(path.as_deref()) {
            Ok(()) => {
                info!("loaded patch {:?}", path);
                self.state.request_full_sync();
            }
            Err(e) => warn!("cannot load patch {:?}: {}", path, e),
        }
    }

    /// Stop both threads. Safe to call more than once.
    pub fn shutdown(&mut self) {
        self.state.running.store(false, Ordering::SeqCst);
        self.state.queue.push(Command::Noop);
        self.worker.join();
        if let Some(listener) = self.listener.as_mut() {
            listener.join();
        }
    }
}

impl<H: GraphHost> Drop for SyncEngine<H> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Vec2;
    use crate::model::{light_id, Rgba};
    use crate::router::InboundRequest;
    use crate::testing::{wait_for, MockSink};
    use crate::MemoryHost;
    use rackproto::OscMessage;
    use std::thread;

    fn engine() -> (SyncEngine<MemoryHost>, Arc<MockSink>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let sink = Arc::new(MockSink::new());
        let config = SyncConfig {
            light_update_interval_ms: 0,
            ..Default::default()
        };
        let engine = SyncEngine::with_sink(
            MemoryHost::demo(),
            config,
            dir.path().to_path_buf(),
            sink.clone(),
        )
        .unwrap();
        (engine, sink, dir)
    }

    fn count(sink: &MockSink, address: &str) -> usize {
        sink.messages_to(address).len()
    }

    #[test]
    fn test_first_tick_syncs_everything() {
        let (mut engine, sink, dir) = engine();
        engine.tick();

        assert!(wait_for(|| count(&sink, "/library/json_path") == 1));
        assert_eq!(count(&sink, "/modules/add"), 3);
        assert_eq!(count(&sink, "/cables/add"), 1);
        assert!(dir.path().join("library.json").exists());
    }

    #[test]
    fn test_create_module_carries_return_id() {
        let (mut engine, sink, _dir) = engine();
        engine.tick();
        engine
            .router()
            .apply(InboundRequest::CreateModule(ModuleCreate {
                plugin: "Fundamental".into(),
                model: "LFO".into(),
                return_id: 77,
                position: Some(Vec2::new(10.0, 0.0)),
            }));
        engine.tick();

        assert_eq!(engine.host().modules.len(), 4);
        let x = engine.host().modules[&4].info.rect.pos.x;
        assert!((x - 10.0 * engine.host().px_per_cm).abs() < 1e-3);
        assert!(wait_for(|| sink
            .messages_to("/modules/add")
            .iter()
            .any(|m| m.arg_i64(1).unwrap() == 77)));
    }

    #[test]
    fn test_unknown_model_is_a_no_op() {
        let (mut engine, _sink, _dir) = engine();
        engine.tick();
        engine
            .router()
            .apply(InboundRequest::CreateModule(ModuleCreate {
                plugin: "Fundamental".into(),
                model: "Nope".into(),
                return_id: 1,
                position: None,
            }));
        engine.tick();
        assert_eq!(engine.host().modules.len(), 3);
    }

    #[test]
    fn test_destroy_module_announces_removal() {
        let (mut engine, sink, _dir) = engine();
        engine.tick();
        engine
            .router()
            .dispatch(&OscMessage::new("/destroy/module").arg(2i64));
        engine.tick();

        assert!(!engine.host().modules.contains_key(&2));
        assert!(!engine.state().patch.lock().unwrap().modules.contains_key(&2));
        let destroys = sink.messages_to("/modules/destroy");
        assert_eq!(destroys.len(), 1);
        assert_eq!(destroys[0].arg_i64(0).unwrap(), 2);
    }

    #[test]
    fn test_cable_with_missing_port_is_rejected() {
        let (mut engine, _sink, _dir) = engine();
        engine.tick();
        engine
            .router()
            .apply(InboundRequest::CreateCable(CableCreate {
                input_module: 2,
                output_module: 1,
                input_port: 9,
                output_port: 0,
            }));
        engine.tick();
        assert_eq!(engine.host().cables.len(), 1);

        engine
            .router()
            .apply(InboundRequest::CreateCable(CableCreate {
                input_module: 2,
                output_module: 1,
                input_port: 0,
                output_port: 0,
            }));
        engine.tick();
        assert_eq!(engine.host().cables.len(), 2);
        assert_eq!(engine.state().patch.lock().unwrap().cables.len(), 2);
    }

    #[test]
    fn test_remote_param_update_echoes_display_value() {
        let (mut engine, sink, _dir) = engine();
        engine.tick();
        engine.router().dispatch(
            &OscMessage::new("/update/param")
                .arg(1i64)
                .arg(0i32)
                .arg(1.5f32),
        );
        engine.tick();

        assert_eq!(engine.host().modules[&1].params[0].value, 1.5);
        assert!(wait_for(|| count(&sink, "/param/sync") == 1));
        let sync = &sink.messages_to("/param/sync")[0];
        assert_eq!(sync.arg_str(2).unwrap(), "1.50 Hz");
    }

    #[test]
    fn test_acknowledged_lights_stream_colour_changes() {
        let (mut engine, sink, _dir) = engine();
        engine.tick();
        engine.state().ack_light(1, light_id(0));

        engine.tick();
        assert_eq!(count(&sink, "/modules/light/update"), 0);

        engine
            .host_mut()
            .set_light_color(1, 0, Rgba::new(1.0, 0.0, 0.0, 1.0));
        engine.tick();
        let updates = sink.messages_to("/modules/light/update");
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].arg_i32(1).unwrap(), light_id(0));
    }

    #[test]
    fn test_menu_open_and_click() {
        let (mut engine, sink, _dir) = engine();
        engine.tick();
        engine.router().apply(InboundRequest::GetMenu(MenuRequest {
            module: 1,
            menu: 0,
            parent_menu: None,
            parent_item_index: None,
        }));
        engine.tick();
        assert!(wait_for(|| count(&sink, "/menu/synced") == 1));
        assert_eq!(count(&sink, "/menu/item/add"), 2);

        engine
            .router()
            .apply(InboundRequest::ClickMenuItem(MenuClick {
                module: 1,
                menu: 0,
                item_index: 1,
            }));
        engine.tick();
        assert_eq!(engine.host().clicked, vec![(1, "Anti-alias".to_string())]);
        let menus = engine.state().menus.lock().unwrap();
        assert!(menus[&1][&0].items[1].checked);
    }

    #[test]
    fn test_autosave_runs_once() {
        let (mut engine, _sink, _dir) = engine();
        engine.router().apply(InboundRequest::AutosaveAndExit);
        engine.tick();
        engine.tick();
        assert!(engine.exit_requested());
        assert_eq!(engine.host().autosaves, 1);
    }

    #[test]
    fn test_load_patch_triggers_full_sync() {
        let (mut engine, sink, _dir) = engine();
        engine.tick();
        assert!(wait_for(|| count(&sink, "/modules/add") == 3));

        engine.router().apply(InboundRequest::LoadPatch(None));
        engine.tick();
        assert_eq!(engine.host().loaded_patches, vec![None]);
        assert!(wait_for(|| count(&sink, "/modules/add") == 6));
    }

    #[test]
    fn test_resync_completes_module_once() {
        let (mut engine, sink, _dir) = engine();
        engine.tick();
        assert!(wait_for(|| count(&sink, "/modules/add") == 3));

        engine.router().dispatch(
            &OscMessage::new("/arrange_modules")
                .arg(1i64)
                .arg(2i64)
                .arg(true),
        );
        engine.tick();
        assert!(wait_for(|| count(&sink, "/modules/add") == 5));

        {
            let mut patch = engine.state().patch.lock().unwrap();
            let module = patch.modules.get_mut(&1).unwrap();
            module.synced = true;
            module.params.values_mut().for_each(|p| p.synced = true);
            module.inputs.values_mut().for_each(|p| p.synced = true);
            module.outputs.values_mut().for_each(|p| p.synced = true);
            module.lights.values_mut().for_each(|l| l.synced = true);
            module.displays.values_mut().for_each(|d| d.synced = true);
        }

        let completions = |sink: &MockSink| {
            sink.messages_to("/module_sync_complete")
                .iter()
                .filter(|m| m.arg_i64(0).ok() == Some(1))
                .count()
        };
        assert!(wait_for(|| completions(&sink) == 1));
        thread::sleep(engine.state().config.check_interval() * 3);
        assert_eq!(completions(&sink), 1);
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let (mut engine, _sink, _dir) = engine();
        engine.shutdown();
        engine.shutdown();
        assert!(!engine.state().is_running());
    }
}
