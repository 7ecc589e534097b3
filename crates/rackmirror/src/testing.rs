//! Shared test fixtures

use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

use rackproto::{OscMessage, OscPacket};

use crate::transport::{PacketSink, TransportError};

/// Records every datagram instead of sending it
#[derive(Default)]
pub struct MockSink {
    packets: Mutex<Vec<Vec<u8>>>,
    peer_port: Mutex<Option<u16>>,
}

impl MockSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn packet_count(&self) -> usize {
        self.packets.lock().unwrap().len()
    }

    /// Every message sent so far, bundles flattened, in order
    pub fn messages(&self) -> Vec<OscMessage> {
        self.packets
            .lock()
            .unwrap()
            .iter()
            .flat_map(|p| OscPacket::decode(p).unwrap().into_messages())
            .collect()
    }

    pub fn addresses(&self) -> Vec<String> {
        self.messages().into_iter().map(|m| m.address).collect()
    }

    pub fn messages_to(&self, address: &str) -> Vec<OscMessage> {
        self.messages()
            .into_iter()
            .filter(|m| m.address == address)
            .collect()
    }

    pub fn clear(&self) {
        self.packets.lock().unwrap().clear();
    }

    pub fn peer_port(&self) -> Option<u16> {
        *self.peer_port.lock().unwrap()
    }
}

impl PacketSink for MockSink {
    fn send(&self, packet: &[u8]) -> Result<(), TransportError> {
        self.packets.lock().unwrap().push(packet.to_vec());
        Ok(())
    }

    fn set_peer_port(&self, port: u16) {
        *self.peer_port.lock().unwrap() = Some(port);
    }
}

/// Poll `done` until it holds or two seconds pass
pub fn wait_for(done: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if done() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    done()
}
