//! End-to-end over loopback UDP: the engine on one side, a scripted renderer
//! on the other.

use std::net::{SocketAddr, UdpSocket};
use std::time::{Duration, Instant};

use rackconf::MirrorConfig;
use rackmirror::{MemoryHost, SyncEngine};
use rackproto::{pack_bundles, OscMessage, OscPacket};

struct FakeRenderer {
    socket: UdpSocket,
    received: Vec<OscMessage>,
}

impl FakeRenderer {
    fn bind() -> Self {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        socket
            .set_read_timeout(Some(Duration::from_millis(5)))
            .unwrap();
        Self {
            socket,
            received: Vec::new(),
        }
    }

    fn port(&self) -> u16 {
        self.socket.local_addr().unwrap().port()
    }

    fn drain(&mut self) {
        let mut buf = vec![0u8; 65_536];
        while let Ok((len, _)) = self.socket.recv_from(&mut buf) {
            let packet = OscPacket::decode(&buf[..len]).unwrap();
            self.received.extend(packet.into_messages());
        }
    }

    fn send(&self, to: SocketAddr, messages: &[OscMessage]) {
        for bundle in pack_bundles(messages, 8192) {
            self.socket.send_to(&bundle, to).unwrap();
        }
    }

    fn count(&self, address: &str) -> usize {
        self.received.iter().filter(|m| m.address == address).count()
    }

    /// The acknowledgement the engine expects for each child record of a module
    fn acks_for(&self, module: i64) -> Vec<OscMessage> {
        let mut acks = vec![OscMessage::new("/rx/module").arg(module)];
        for msg in &self.received {
            if msg.arg_i64(0).ok() != Some(module) {
                continue;
            }
            let ack = match msg.address.as_str() {
                "/modules/param/add" => "/rx/param",
                "/modules/input/add" => "/rx/input",
                "/modules/output/add" => "/rx/output",
                "/modules/light/add" => "/rx/module_light",
                "/modules/display/add" => "/rx/display",
                _ => continue,
            };
            acks.push(OscMessage::new(ack).arg(module).arg(msg.arg_i32(1).unwrap()));
        }
        acks
    }
}

fn engine_for(renderer: &FakeRenderer, state_dir: &std::path::Path) -> SyncEngine<MemoryHost> {
    let mut config = MirrorConfig::default();
    config.infra.bind.listen_host = "127.0.0.1".into();
    config.infra.bind.listen_port = 0;
    config.infra.bind.peer_port = renderer.port();
    config.infra.paths.state_dir = state_dir.to_path_buf();
    config.sync.check_interval_ms = 20;
    config.sync.retry_limit = 100;
    SyncEngine::new(MemoryHost::demo(), &config).unwrap()
}

/// Tick the engine and collect traffic until `done` holds
fn pump(
    engine: &mut SyncEngine<MemoryHost>,
    renderer: &mut FakeRenderer,
    done: impl Fn(&FakeRenderer) -> bool,
) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        engine.tick();
        renderer.drain();
        if done(renderer) {
            return true;
        }
    }
    false
}

#[test]
fn module_completes_after_acks() {
    let dir = tempfile::tempdir().unwrap();
    let mut renderer = FakeRenderer::bind();
    let mut engine = engine_for(&renderer, dir.path());
    let engine_addr = engine.local_addr().unwrap();

    assert!(pump(&mut engine, &mut renderer, |r| r.count("/modules/add") == 3
        && r.count("/cables/add") == 1));
    assert_eq!(renderer.count("/module_sync_complete"), 0);

    renderer.send(engine_addr, &renderer.acks_for(1));
    assert!(pump(&mut engine, &mut renderer, |r| r
        .count("/module_sync_complete")
        == 1));

    let complete = renderer
        .received
        .iter()
        .find(|m| m.address == "/module_sync_complete")
        .unwrap();
    assert_eq!(complete.arg_i64(0).unwrap(), 1);
    assert_eq!(complete.arg_i64(1).unwrap(), -1);

    engine.shutdown();
}

#[test]
fn remote_destroy_is_announced() {
    let dir = tempfile::tempdir().unwrap();
    let mut renderer = FakeRenderer::bind();
    let mut engine = engine_for(&renderer, dir.path());
    let engine_addr = engine.local_addr().unwrap();

    assert!(pump(&mut engine, &mut renderer, |r| r.count("/modules/add") == 3));

    renderer.send(
        engine_addr,
        &[OscMessage::new("/destroy/module").arg(3i64)],
    );
    assert!(pump(&mut engine, &mut renderer, |r| r.count("/modules/destroy") == 1));
    assert!(!engine.host().modules.contains_key(&3));

    engine.shutdown();
}

#[test]
fn resync_on_request() {
    let dir = tempfile::tempdir().unwrap();
    let mut renderer = FakeRenderer::bind();
    let mut engine = engine_for(&renderer, dir.path());
    let engine_addr = engine.local_addr().unwrap();

    assert!(pump(&mut engine, &mut renderer, |r| r.count("/modules/add") == 3));
    renderer.send(engine_addr, &[OscMessage::new("/sync")]);
    assert!(pump(&mut engine, &mut renderer, |r| r.count("/modules/add") == 6));

    engine.shutdown();
}
