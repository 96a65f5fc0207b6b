//! Codec Tests
//!
//! Tests for command and response encoding/decoding.

use std::io::Cursor;

use driftkv::error::DriftError;
use driftkv::protocol::{
    decode_command, decode_response, encode_command, encode_response, read_command,
    read_response, write_command, write_response, Command, Response, Status, HEADER_SIZE,
    MAX_PAYLOAD_SIZE,
};
use driftkv::wal::{LogRecord, Operation, Version};

fn round_trip(command: Command) -> Command {
    let encoded = encode_command(&command).unwrap();
    decode_command(&encoded).unwrap()
}

fn is_protocol_error<T: std::fmt::Debug>(result: driftkv::Result<T>) -> bool {
    matches!(result, Err(DriftError::Protocol(_)))
}

// =============================================================================
// Command Encoding/Decoding Tests
// =============================================================================

#[test]
fn test_encode_decode_key_commands() {
    let get = Command::Get { key: b"hello".to_vec() };
    assert_eq!(round_trip(get.clone()), get);

    let set = Command::Set {
        key: b"mykey".to_vec(),
        value: b"myvalue".to_vec(),
    };
    assert_eq!(round_trip(set.clone()), set);

    let delete = Command::Delete { key: b"todelete".to_vec() };
    assert_eq!(round_trip(delete.clone()), delete);
}

#[test]
fn test_encode_decode_empty_and_binary() {
    let set = Command::Set {
        key: Vec::new(),
        value: Vec::new(),
    };
    assert_eq!(round_trip(set.clone()), set);

    let binary = Command::Set {
        key: vec![0x00, 0xFF, 0x7F],
        value: (0..=255u8).collect(),
    };
    assert_eq!(round_trip(binary.clone()), binary);
}

#[test]
fn test_encode_decode_bulk_set() {
    let bulk = Command::BulkSet {
        pairs: vec![
            (b"a".to_vec(), b"1".to_vec()),
            (b"b".to_vec(), Vec::new()),
            (vec![0x00], vec![0xFF; 300]),
        ],
    };
    assert_eq!(round_trip(bulk.clone()), bulk);
}

#[test]
fn test_encode_decode_replicate() {
    let record = LogRecord {
        seq: 9,
        origin_seq: 4,
        operation: Operation::BulkSet {
            pairs: vec![(b"x".to_vec(), b"1".to_vec()), (b"y".to_vec(), b"2".to_vec())],
        },
        version: Version::new(1_700_000_000_000, 3),
    };
    let replicate = Command::Replicate { record: record.clone() };
    assert_eq!(round_trip(replicate), Command::Replicate { record });
}

#[test]
fn test_encode_decode_bodyless_commands() {
    for command in [Command::Ping, Command::Promote, Command::Status] {
        let encoded = encode_command(&command).unwrap();
        assert_eq!(encoded.len(), HEADER_SIZE);
        assert_eq!(decode_command(&encoded).unwrap(), command);
    }
}

// =============================================================================
// Response Encoding/Decoding Tests
// =============================================================================

#[test]
fn test_encode_decode_responses() {
    let responses = [
        Response::ok(Some(b"value".to_vec())),
        Response::ok(None),
        Response::not_found(),
        Response::error("Something went wrong"),
        Response::not_primary("secondary"),
    ];
    for response in responses {
        let decoded = decode_response(&encode_response(&response)).unwrap();
        assert_eq!(decoded, response);
    }
}

#[test]
fn test_not_primary_carries_role() {
    let decoded = decode_response(&encode_response(&Response::not_primary("secondary"))).unwrap();
    assert_eq!(decoded.status, Status::NotPrimary);
    assert_eq!(decoded.message(), "secondary");
}

// =============================================================================
// Error Handling Tests
// =============================================================================

#[test]
fn test_incomplete_header() {
    assert!(is_protocol_error(decode_command(&[0x01, 0x00, 0x00])));
    assert!(is_protocol_error(decode_response(&[0x00])));
}

#[test]
fn test_incomplete_payload() {
    // GET claims 10 payload bytes but carries 3
    let bytes = [0x01, 0x00, 0x00, 0x00, 0x0A, 0x00, 0x00, 0x00];
    assert!(is_protocol_error(decode_command(&bytes)));
}

#[test]
fn test_unknown_command_type() {
    assert!(is_protocol_error(decode_command(&[0xFF, 0x00, 0x00, 0x00, 0x00])));
    assert!(is_protocol_error(decode_command(&[0x00, 0x00, 0x00, 0x00, 0x00])));
}

#[test]
fn test_unknown_response_status() {
    assert!(is_protocol_error(decode_response(&[0x09, 0x00, 0x00, 0x00, 0x00])));
}

#[test]
fn test_oversized_payload_rejected() {
    let mut bytes = vec![0x02];
    bytes.extend_from_slice(&(MAX_PAYLOAD_SIZE + 1).to_be_bytes());
    assert!(is_protocol_error(decode_command(&bytes)));

    let mut stream = Cursor::new(bytes);
    assert!(is_protocol_error(read_command(&mut stream)));
}

#[test]
fn test_trailing_bytes_rejected() {
    // PING with a one-byte payload
    assert!(is_protocol_error(decode_command(&[0x04, 0x00, 0x00, 0x00, 0x01, 0x00])));

    // GET with an extra byte after the key
    let mut bytes = encode_command(&Command::Get { key: b"k".to_vec() }).unwrap();
    bytes[4] += 1;
    bytes.push(0xAA);
    assert!(is_protocol_error(decode_command(&bytes)));
}

#[test]
fn test_get_missing_key_length() {
    assert!(is_protocol_error(decode_command(&[0x01, 0x00, 0x00, 0x00, 0x02, 0x00, 0x00])));
}

#[test]
fn test_bulk_set_count_exceeds_payload() {
    // Claims 1000 pairs in a 4-byte payload
    let mut bytes = vec![0x05, 0x00, 0x00, 0x00, 0x04];
    bytes.extend_from_slice(&1000u32.to_be_bytes());
    assert!(is_protocol_error(decode_command(&bytes)));
}

#[test]
fn test_replicate_with_bad_checksum() {
    let record = LogRecord::local(
        1,
        Operation::Set {
            key: b"k".to_vec(),
            value: b"v".to_vec(),
        },
        Version::new(1000, 1),
    );
    let mut bytes = encode_command(&Command::Replicate { record }).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xFF;
    assert!(is_protocol_error(decode_command(&bytes)));
}

#[test]
fn test_replicate_with_trailing_bytes() {
    let record = LogRecord::local(
        1,
        Operation::Delete { key: b"k".to_vec() },
        Version::new(1000, 1),
    );
    let mut bytes = encode_command(&Command::Replicate { record }).unwrap();

    // Grow the payload by two bytes that follow the record frame
    let payload_len = u32::from_be_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]) + 2;
    bytes[1..5].copy_from_slice(&payload_len.to_be_bytes());
    bytes.extend_from_slice(&[0xDE, 0xAD]);

    assert!(is_protocol_error(decode_command(&bytes)));
}

// =============================================================================
// Stream I/O Tests
// =============================================================================

#[test]
fn test_stream_multiple_commands() {
    let commands = vec![
        Command::Set {
            key: b"k1".to_vec(),
            value: b"v1".to_vec(),
        },
        Command::Get { key: b"k1".to_vec() },
        Command::BulkSet {
            pairs: vec![(b"k2".to_vec(), b"v2".to_vec())],
        },
        Command::Status,
    ];

    let mut buffer = Vec::new();
    for command in &commands {
        write_command(&mut buffer, command).unwrap();
    }

    let mut cursor = Cursor::new(buffer);
    for expected in &commands {
        assert_eq!(&read_command(&mut cursor).unwrap(), expected);
    }

    // Nothing left: a clean EOF surfaces as an I/O error
    assert!(matches!(read_command(&mut cursor), Err(DriftError::Io(_))));
}

#[test]
fn test_stream_multiple_responses() {
    let responses = vec![
        Response::ok(Some(b"v1".to_vec())),
        Response::not_found(),
        Response::not_primary("secondary"),
    ];

    let mut buffer = Vec::new();
    for response in &responses {
        write_response(&mut buffer, response).unwrap();
    }

    let mut cursor = Cursor::new(buffer);
    for expected in &responses {
        assert_eq!(&read_response(&mut cursor).unwrap(), expected);
    }
}

// =============================================================================
// Wire Format Verification Tests
// =============================================================================

#[test]
fn test_wire_format_set() {
    let encoded = encode_command(&Command::Set {
        key: b"ab".to_vec(),
        value: b"xyz".to_vec(),
    })
    .unwrap();

    assert_eq!(
        encoded,
        vec![
            0x02, // SET
            0x00, 0x00, 0x00, 0x09, // payload length
            0x00, 0x00, 0x00, 0x02, // key length
            b'a', b'b', b'x', b'y', b'z',
        ]
    );
}

#[test]
fn test_wire_format_bulk_set() {
    let encoded = encode_command(&Command::BulkSet {
        pairs: vec![(b"k".to_vec(), b"v".to_vec())],
    })
    .unwrap();

    assert_eq!(
        encoded,
        vec![
            0x05, // BULK_SET
            0x00, 0x00, 0x00, 0x0E, // payload length
            0x00, 0x00, 0x00, 0x01, // pair count
            0x00, 0x00, 0x00, 0x01, b'k',
            0x00, 0x00, 0x00, 0x01, b'v',
        ]
    );
}

#[test]
fn test_wire_format_not_primary() {
    let encoded = encode_response(&Response::not_primary("peer"));
    assert_eq!(encoded, vec![0x03, 0x00, 0x00, 0x00, 0x04, b'p', b'e', b'e', b'r']);
}
