//! Tests for LogRecord framing
//!
//! These tests verify:
//! - Frame layout (length, checksum, payload)
//! - Torn frames decode as incomplete, not as errors
//! - Checksum and size-limit violations are reported as corruption
//! - Version ordering used by last-write-wins

use driftkv::error::DriftError;
use driftkv::wal::{decode_frame, LogRecord, Operation, OperationKind, Version, HEADER_SIZE, MAX_RECORD_SIZE};

use super::set_record;

#[test]
fn test_frame_header_describes_payload() {
    let record = set_record(1, "key", "value");
    let frame = record.encode().unwrap();

    let len = u32::from_le_bytes([frame[0], frame[1], frame[2], frame[3]]) as usize;
    let crc = u32::from_le_bytes([frame[4], frame[5], frame[6], frame[7]]);

    assert_eq!(frame.len(), HEADER_SIZE + len);
    assert_eq!(crc, crc32fast::hash(&frame[HEADER_SIZE..]));
}

#[test]
fn test_decode_returns_consumed_length() {
    let first = set_record(1, "a", "1");
    let second = set_record(2, "b", "2");

    let mut bytes = first.encode().unwrap();
    let first_len = bytes.len();
    bytes.extend(second.encode().unwrap());

    let (decoded, consumed) = decode_frame(&bytes).unwrap().unwrap();
    assert_eq!(decoded, first);
    assert_eq!(consumed, first_len);

    let (decoded, _) = decode_frame(&bytes[consumed..]).unwrap().unwrap();
    assert_eq!(decoded, second);
}

#[test]
fn test_bulk_set_keeps_pair_order() {
    let record = LogRecord::local(
        7,
        Operation::BulkSet {
            pairs: vec![
                (b"x".to_vec(), b"1".to_vec()),
                (b"y".to_vec(), b"2".to_vec()),
                (b"x".to_vec(), b"3".to_vec()),
            ],
        },
        Version::new(42, 3),
    );

    let decoded = LogRecord::decode(&record.encode().unwrap()).unwrap();
    assert_eq!(decoded, record);
    assert_eq!(decoded.kind(), OperationKind::BulkSet);
    assert_eq!(decoded.operation.keys(), vec![&b"x"[..], &b"y"[..], &b"x"[..]]);
}

#[test]
fn test_torn_frame_is_incomplete() {
    let frame = set_record(1, "key", "value").encode().unwrap();

    for cut in [0, 3, HEADER_SIZE, frame.len() - 1] {
        assert!(decode_frame(&frame[..cut]).unwrap().is_none(), "cut at {}", cut);
    }
}

#[test]
fn test_flipped_payload_bit_is_corruption() {
    let mut frame = set_record(1, "key", "value").encode().unwrap();
    let last = frame.len() - 1;
    frame[last] ^= 0x01;

    assert!(matches!(decode_frame(&frame), Err(DriftError::WalCorruption(_))));
}

#[test]
fn test_oversized_length_is_corruption() {
    let mut frame = vec![0u8; HEADER_SIZE];
    frame[..4].copy_from_slice(&((MAX_RECORD_SIZE as u32) + 1).to_le_bytes());

    assert!(matches!(decode_frame(&frame), Err(DriftError::WalCorruption(_))));
}

#[test]
fn test_relogged_keeps_origin() {
    let remote = LogRecord::local(
        9,
        Operation::Delete { key: b"k".to_vec() },
        Version::new(500, 2),
    );
    let local = remote.relogged(3);

    assert_eq!(local.seq, 3);
    assert_eq!(local.origin_seq, 9);
    assert_eq!(local.version, remote.version);
    assert_eq!(local.operation, remote.operation);
}

#[test]
fn test_version_orders_by_timestamp_then_origin() {
    assert!(Version::new(2, 1) > Version::new(1, 9));
    assert!(Version::new(5, 2) > Version::new(5, 1));
    assert_eq!(Version::new(5, 2), Version::new(5, 2));
}
