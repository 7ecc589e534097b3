//! Live mirror of a node-graph patch for a remote renderer.
//!
//! The engine snapshots the host graph (modules, params, ports, lights,
//! cables, context menus) into a plain model and streams it to a renderer as
//! OSC bundles over UDP. The renderer acknowledges what it received and sends
//! back edits, which are applied to the host on the next frame.
//!
//! # Threads
//!
//! - the **render thread** owns the host and calls [`SyncEngine::tick`] once
//!   per frame
//! - the **sync worker** drains the command queue and sends bundles
//! - the **listener** reads inbound packets and routes them
//!
//! They share one [`SyncState`]. Only the render thread touches the host.
//!
//! # Usage
//!
//! ```rust,no_run
//! use rackconf::MirrorConfig;
//! use rackmirror::{MemoryHost, SyncEngine};
//!
//! let config = MirrorConfig::load().unwrap();
//! let mut engine = SyncEngine::new(MemoryHost::demo(), &config).unwrap();
//! loop {
//!     engine.tick();
//!     # break;
//! }
//! ```

pub mod codec;
pub mod collector;
pub mod engine;
pub mod geometry;
pub mod host;
pub mod lights;
pub mod model;
pub mod pending;
pub mod queue;
pub mod reconciler;
pub mod router;
pub mod state;
pub mod transport;
pub mod worker;

#[cfg(test)]
mod testing;

pub use engine::{EngineError, SyncEngine};
pub use geometry::{Rect, Vec2};
pub use host::{GraphHost, HostError, MemoryHost};
pub use queue::Command;
pub use router::InboundRequest;
pub use state::{HostNotifier, SyncState};
pub use transport::{PacketSink, TransportError};
