//! Wire protocol for rackmirror
//!
//! rackmirror speaks OSC 1.0 over UDP. Graph state leaves as bundles of
//! address-tagged records; the renderer answers with acknowledgements and
//! mutation commands as single messages or bundles.
//!
//! This crate owns the byte-level codec and the address table. Turning graph
//! records into messages (and messages into typed requests) happens in the
//! `rackmirror` crate, which knows the data model.

pub mod address;
pub mod bundle;
pub mod osc;

pub use bundle::{pack_bundles, BundleBuilder, EMPTY_BUNDLE_SIZE};
pub use osc::{OscArg, OscError, OscMessage, OscPacket};
