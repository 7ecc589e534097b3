//! Bundle assembly under a fixed datagram budget

use bytes::{BufMut, Bytes, BytesMut};

use crate::osc::{OscMessage, BUNDLE_TAG, IMMEDIATE};

/// Size of a bundle that carries no messages: tag (8) + timetag (8)
pub const EMPTY_BUNDLE_SIZE: usize = 16;

/// Per-element size prefix
const ELEMENT_PREFIX: usize = 4;

/// Accumulates messages into one `#bundle` datagram.
///
/// The builder never refuses a message on its own; callers ask [`fits`]
/// first when they need to respect the datagram budget.
///
/// [`fits`]: BundleBuilder::fits
#[derive(Debug)]
pub struct BundleBuilder {
    buf: BytesMut,
    capacity: usize,
    count: usize,
}

impl BundleBuilder {
    /// Start an empty bundle that should stay within `capacity` bytes
    pub fn new(capacity: usize) -> Self {
        let mut buf = BytesMut::with_capacity(capacity.min(64 * 1024));
        buf.put_slice(BUNDLE_TAG);
        buf.put_u64(IMMEDIATE);
        Self {
            buf,
            capacity,
            count: 0,
        }
    }

    /// Whether `msg` can be appended without exceeding the budget
    pub fn fits(&self, msg: &OscMessage) -> bool {
        self.buf.len() + ELEMENT_PREFIX + msg.encoded_len() <= self.capacity
    }

    pub fn push(&mut self, msg: &OscMessage) {
        self.buf.put_i32(msg.encoded_len() as i32);
        msg.write(&mut self.buf);
        self.count += 1;
    }

    /// Encoded size so far, header included
    pub fn size(&self) -> usize {
        self.buf.len()
    }

    pub fn message_count(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.buf.len() <= EMPTY_BUNDLE_SIZE
    }

    pub fn finish(self) -> Bytes {
        self.buf.freeze()
    }
}

/// Pack messages into as few bundles as the budget allows, preserving order.
///
/// A message larger than the budget on its own still gets a bundle of its
/// own; the transport decides whether the datagram can go out.
pub fn pack_bundles(messages: &[OscMessage], capacity: usize) -> Vec<Bytes> {
    let mut bundles = Vec::new();
    let mut current = BundleBuilder::new(capacity);

    for msg in messages {
        if !current.is_empty() && !current.fits(msg) {
            let full = std::mem::replace(&mut current, BundleBuilder::new(capacity));
            bundles.push(full.finish());
        }
        current.push(msg);
    }

    if !current.is_empty() {
        bundles.push(current.finish());
    }

    bundles
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::OscPacket;

    fn message(i: i32) -> OscMessage {
        OscMessage::new("/modules/param/add").arg(1i64).arg(i)
    }

    #[test]
    fn test_empty_bundle_size() {
        let builder = BundleBuilder::new(1024);
        assert_eq!(builder.size(), EMPTY_BUNDLE_SIZE);
        assert!(builder.is_empty());
        assert_eq!(builder.finish().len(), EMPTY_BUNDLE_SIZE);
    }

    #[test]
    fn test_push_grows_by_prefix_and_message() {
        let mut builder = BundleBuilder::new(1024);
        let msg = message(0);
        builder.push(&msg);
        assert_eq!(builder.size(), EMPTY_BUNDLE_SIZE + 4 + msg.encoded_len());
        assert_eq!(builder.message_count(), 1);
        assert!(!builder.is_empty());
    }

    #[test]
    fn test_pack_splits_at_capacity_and_keeps_order() {
        let messages: Vec<_> = (0..10).map(message).collect();
        let per_msg = 4 + messages[0].encoded_len();
        // room for three messages per bundle
        let capacity = EMPTY_BUNDLE_SIZE + per_msg * 3;

        let bundles = pack_bundles(&messages, capacity);
        assert_eq!(bundles.len(), 4);
        assert!(bundles.iter().all(|b| b.len() <= capacity));

        let decoded: Vec<i32> = bundles
            .iter()
            .flat_map(|b| OscPacket::decode(b).unwrap().into_messages())
            .map(|m| m.arg_i32(1).unwrap())
            .collect();
        assert_eq!(decoded, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_pack_oversized_message_gets_its_own_bundle() {
        let big = OscMessage::new("/library/json_path").arg("x".repeat(200));
        let bundles = pack_bundles(&[message(0), big, message(1)], 64);
        assert_eq!(bundles.len(), 3);
    }

    #[test]
    fn test_pack_nothing() {
        assert!(pack_bundles(&[], 1024).is_empty());
    }
}
