//! UDP transport
//!
//! Outbound datagrams go through a [`PacketSink`]; the UDP implementation
//! sends to a peer whose port can change at runtime. Inbound datagrams are
//! read by a dedicated listener thread and handed to the [`Router`].

use std::io::ErrorKind;
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicU16, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result};
use rackproto::{pack_bundles, OscMessage, OscPacket};
use tracing::{debug, error, info, warn};

use crate::router::Router;

/// How often the listener wakes up to check for shutdown
const READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Largest datagram UDP can carry
const MAX_DATAGRAM: usize = 65_507;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("send failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Where outbound datagrams go
pub trait PacketSink: Send + Sync {
    fn send(&self, packet: &[u8]) -> Result<(), TransportError>;

    /// Point subsequent sends at another peer port
    fn set_peer_port(&self, port: u16);
}

/// Pack `messages` into bundles no larger than `capacity` and send them in
/// order. Returns how many datagrams went out.
pub fn send_messages(sink: &dyn PacketSink, messages: &[OscMessage], capacity: usize) -> usize {
    let mut sent = 0;
    for bundle in pack_bundles(messages, capacity) {
        match sink.send(&bundle) {
            Ok(()) => sent += 1,
            Err(e) => warn!("dropping {} byte bundle: {}", bundle.len(), e),
        }
    }
    sent
}

/// Sends to `peer_host:peer_port` from an ephemeral local port
pub struct UdpSender {
    socket: UdpSocket,
    peer_host: String,
    peer_port: AtomicU16,
}

impl UdpSender {
    pub fn new(peer_host: &str, peer_port: u16) -> Result<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0").context("Failed to bind outbound UDP socket")?;
        Ok(Self {
            socket,
            peer_host: peer_host.to_string(),
            peer_port: AtomicU16::new(peer_port),
        })
    }

    pub fn peer_port(&self) -> u16 {
        self.peer_port.load(Ordering::SeqCst)
    }
}

impl PacketSink for UdpSender {
    fn send(&self, packet: &[u8]) -> Result<(), TransportError> {
        let port = self.peer_port();
        self.socket.send_to(packet, (self.peer_host.as_str(), port))?;
        Ok(())
    }

    fn set_peer_port(&self, port: u16) {
        let old = self.peer_port.swap(port, Ordering::SeqCst);
        info!("peer port changed {} -> {}", old, port);
    }
}

/// Listener thread handle
pub struct Listener {
    local_addr: SocketAddr,
    handle: Option<JoinHandle<()>>,
}

impl Listener {
    /// Bind `addr` (port 0 picks a free port) and start routing inbound
    /// packets.
    pub fn spawn(addr: &str, router: Router) -> Result<Self> {
        let socket =
            UdpSocket::bind(addr).with_context(|| format!("Failed to bind listener on {addr}"))?;
        socket
            .set_read_timeout(Some(READ_TIMEOUT))
            .context("Failed to set listener read timeout")?;
        let local_addr = socket.local_addr()?;

        let handle = thread::Builder::new()
            .name("rackmirror-listener".to_string())
            .spawn(move || run_listener(socket, router))
            .context("Failed to spawn listener thread")?;

        info!("listening on {}", local_addr);
        Ok(Self {
            local_addr,
            handle: Some(handle),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Wait for the thread to notice the stop flag
    pub fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("listener thread panicked");
            }
        }
    }
}

fn run_listener(socket: UdpSocket, router: Router) {
    let mut buf = vec![0u8; MAX_DATAGRAM];

    while router.state().is_running() {
        let (len, from) = match socket.recv_from(&mut buf) {
            Ok(received) => received,
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => continue,
            Err(e) => {
                warn!("listener receive error: {}", e);
                continue;
            }
        };

        match OscPacket::decode(&buf[..len]) {
            Ok(packet) => {
                for message in packet.into_messages() {
                    router.dispatch(&message);
                }
            }
            Err(e) => warn!("undecodable {} byte packet from {}: {}", len, from, e),
        }
    }

    debug!("listener stopped");
}
