//! Byte-level checks against hand-assembled packets

use pretty_assertions::assert_eq;
use rackproto::osc::{BUNDLE_TAG, IMMEDIATE};
use rackproto::{pack_bundles, OscArg, OscMessage, OscPacket};

/// `/rx/param ,hi` with module 3, param 7, written out by hand
fn hand_written_ack() -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(b"/rx/param\0\0\0");
    buf.extend_from_slice(b",hi\0");
    buf.extend_from_slice(&3i64.to_be_bytes());
    buf.extend_from_slice(&7i32.to_be_bytes());
    buf
}

fn wrap_in_bundle(elements: &[&[u8]]) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(BUNDLE_TAG);
    buf.extend_from_slice(&IMMEDIATE.to_be_bytes());
    for element in elements {
        buf.extend_from_slice(&(element.len() as i32).to_be_bytes());
        buf.extend_from_slice(element);
    }
    buf
}

#[test]
fn decodes_hand_written_message() {
    let msg = OscMessage::decode(&hand_written_ack()).unwrap();
    assert_eq!(msg.address, "/rx/param");
    assert_eq!(msg.args, vec![OscArg::Long(3), OscArg::Int(7)]);
    assert_eq!(msg.encode().as_ref(), hand_written_ack().as_slice());
}

#[test]
fn flattens_nested_bundles_in_order() {
    let ack = hand_written_ack();
    let sync = OscMessage::new("/sync").encode();
    let inner = wrap_in_bundle(&[&ack]);
    let outer = wrap_in_bundle(&[&sync, &inner, &ack]);

    let messages = OscPacket::decode(&outer).unwrap().into_messages();
    let addresses: Vec<_> = messages.iter().map(|m| m.address.as_str()).collect();
    assert_eq!(addresses, vec!["/sync", "/rx/param", "/rx/param"]);
}

#[test]
fn rejects_element_size_past_end() {
    let ack = hand_written_ack();
    let mut packet = wrap_in_bundle(&[&ack]);
    let size_at = BUNDLE_TAG.len() + 8;
    packet[size_at..size_at + 4].copy_from_slice(&1000i32.to_be_bytes());
    assert!(OscPacket::decode(&packet).is_err());
}

#[test]
fn split_bundles_stay_under_budget_and_keep_order() {
    let messages: Vec<_> = (0..200)
        .map(|i| {
            OscMessage::new("/modules/light/update")
                .arg(1i64)
                .arg(i)
                .arg(0.5f32)
                .arg(0.5f32)
                .arg(0.5f32)
                .arg(1.0f32)
        })
        .collect();

    let bundles = pack_bundles(&messages, 1024);
    assert!(bundles.len() > 1);
    assert!(bundles.iter().all(|b| b.len() <= 1024));

    let decoded: Vec<_> = bundles
        .iter()
        .flat_map(|b| OscPacket::decode(b).unwrap().into_messages())
        .collect();
    assert_eq!(decoded, messages);
}
