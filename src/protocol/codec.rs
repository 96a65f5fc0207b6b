//! Protocol codec
//!
//! Encoding and decoding functions for the wire protocol.
//!
//! ## Wire Format
//!
//! ### Request (Command) Format
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │ Cmd (1)  │ Len (4)  │         Payload             │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```
//!
//! All integers are big-endian. The REPLICATE payload is a WAL frame, so the
//! record keeps its CRC across the wire.
//!
//! ### Response Format
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │Status(1) │ Len (4)  │         Payload             │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```

use std::io::{Read, Write};

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{DriftError, Result};
use crate::wal::decode_frame;
use super::{Command, CommandType, Response, Status};

/// Header size: 1 byte command/status + 4 bytes length
pub const HEADER_SIZE: usize = 5;

/// Maximum payload size (65 MB): room for the largest WAL frame
pub const MAX_PAYLOAD_SIZE: u32 = 65 * 1024 * 1024;

// =============================================================================
// Command Encoding/Decoding
// =============================================================================

/// Encode a command to bytes
///
/// Format: cmd_type (1) + payload_len (4) + payload
pub fn encode_command(command: &Command) -> Result<Vec<u8>> {
    let mut payload = BytesMut::new();

    match command {
        Command::Get { key } | Command::Delete { key } => {
            put_len_prefixed(&mut payload, key);
        }
        Command::Set { key, value } => {
            put_len_prefixed(&mut payload, key);
            payload.put_slice(value);
        }
        Command::BulkSet { pairs } => {
            payload.put_u32(pairs.len() as u32);
            for (key, value) in pairs {
                put_len_prefixed(&mut payload, key);
                put_len_prefixed(&mut payload, value);
            }
        }
        Command::Replicate { record } => {
            payload.put_slice(&record.encode()?);
        }
        Command::Promote | Command::Status | Command::Ping => {}
    }

    Ok(frame(command.command_type() as u8, &payload))
}

/// Decode a command from bytes
pub fn decode_command(bytes: &[u8]) -> Result<Command> {
    let (cmd_type, payload) = split_frame(bytes, "command")?;

    let cmd_type = CommandType::from_u8(cmd_type).ok_or_else(|| {
        DriftError::Protocol(format!("Unknown command type: 0x{:02x}", cmd_type))
    })?;

    let mut buf = payload;
    let command = match cmd_type {
        CommandType::Get => Command::Get {
            key: get_len_prefixed(&mut buf, "GET key")?,
        },
        CommandType::Set => {
            let key = get_len_prefixed(&mut buf, "SET key")?;
            let value = buf.to_vec();
            buf.advance(buf.len());
            Command::Set { key, value }
        }
        CommandType::Delete => Command::Delete {
            key: get_len_prefixed(&mut buf, "DEL key")?,
        },
        CommandType::BulkSet => decode_bulk_set(&mut buf)?,
        CommandType::Replicate => {
            let (record, consumed) = decode_frame(buf)
                .map_err(|e| DriftError::Protocol(format!("REPLICATE: {}", e)))?
                .ok_or_else(|| DriftError::Protocol("REPLICATE: incomplete record frame".to_string()))?;
            buf.advance(consumed);
            Command::Replicate { record }
        }
        CommandType::Promote => Command::Promote,
        CommandType::Status => Command::Status,
        CommandType::Ping => Command::Ping,
    };

    if buf.has_remaining() {
        return Err(DriftError::Protocol(format!(
            "{:?} command: unexpected {} trailing bytes",
            cmd_type,
            buf.remaining()
        )));
    }

    Ok(command)
}

fn decode_bulk_set(buf: &mut &[u8]) -> Result<Command> {
    if buf.remaining() < 4 {
        return Err(DriftError::Protocol(
            "BULK_SET command: missing pair count".to_string(),
        ));
    }
    let count = buf.get_u32() as usize;

    // Each pair needs at least its two length fields
    if count > buf.remaining() / 8 {
        return Err(DriftError::Protocol(format!(
            "BULK_SET command: {} pairs cannot fit in {} bytes",
            count,
            buf.remaining()
        )));
    }

    let mut pairs = Vec::with_capacity(count);
    for _ in 0..count {
        let key = get_len_prefixed(buf, "BULK_SET key")?;
        let value = get_len_prefixed(buf, "BULK_SET value")?;
        pairs.push((key, value));
    }
    Ok(Command::BulkSet { pairs })
}

// =============================================================================
// Response Encoding/Decoding
// =============================================================================

/// Encode a response to bytes
///
/// Format: status (1) + payload_len (4) + payload
pub fn encode_response(response: &Response) -> Vec<u8> {
    let payload = response.payload.as_deref().unwrap_or(&[]);
    frame(response.status as u8, payload)
}

/// Decode a response from bytes
pub fn decode_response(bytes: &[u8]) -> Result<Response> {
    let (status_byte, payload) = split_frame(bytes, "response")?;

    let status = Status::from_u8(status_byte).ok_or_else(|| {
        DriftError::Protocol(format!("Unknown response status: 0x{:02x}", status_byte))
    })?;

    let payload = if payload.is_empty() {
        None
    } else {
        Some(payload.to_vec())
    };

    Ok(Response { status, payload })
}

// =============================================================================
// Framing helpers
// =============================================================================

fn frame(tag: u8, payload: &[u8]) -> Vec<u8> {
    let mut message = BytesMut::with_capacity(HEADER_SIZE + payload.len());
    message.put_u8(tag);
    message.put_u32(payload.len() as u32);
    message.put_slice(payload);
    message.to_vec()
}

/// Split a complete message into its tag byte and payload
fn split_frame<'a>(bytes: &'a [u8], what: &str) -> Result<(u8, &'a [u8])> {
    if bytes.len() < HEADER_SIZE {
        return Err(DriftError::Protocol(format!(
            "Incomplete {} header: expected {} bytes, got {}",
            what,
            HEADER_SIZE,
            bytes.len()
        )));
    }

    let mut header = &bytes[..HEADER_SIZE];
    let tag = header.get_u8();
    let payload_len = check_payload_len(header.get_u32(), what)?;

    let total_len = HEADER_SIZE + payload_len;
    if bytes.len() < total_len {
        return Err(DriftError::Protocol(format!(
            "Incomplete {} payload: expected {} bytes, got {}",
            what,
            total_len,
            bytes.len()
        )));
    }

    Ok((tag, &bytes[HEADER_SIZE..total_len]))
}

fn check_payload_len(len: u32, what: &str) -> Result<usize> {
    if len > MAX_PAYLOAD_SIZE {
        return Err(DriftError::Protocol(format!(
            "{} payload too large: {} bytes (max {})",
            what, len, MAX_PAYLOAD_SIZE
        )));
    }
    Ok(len as usize)
}

fn put_len_prefixed(buf: &mut BytesMut, bytes: &[u8]) {
    buf.put_u32(bytes.len() as u32);
    buf.put_slice(bytes);
}

fn get_len_prefixed(buf: &mut &[u8], what: &str) -> Result<Vec<u8>> {
    if buf.remaining() < 4 {
        return Err(DriftError::Protocol(format!("{}: missing length", what)));
    }
    let len = buf.get_u32() as usize;

    if buf.remaining() < len {
        return Err(DriftError::Protocol(format!(
            "{}: incomplete (expected {}, got {})",
            what,
            len,
            buf.remaining()
        )));
    }

    let bytes = buf[..len].to_vec();
    buf.advance(len);
    Ok(bytes)
}

// =============================================================================
// Stream-based I/O helpers
// =============================================================================

/// Read one complete message (header + payload) from a stream
fn read_message<R: Read>(reader: &mut R, what: &str) -> Result<Vec<u8>> {
    let mut header = [0u8; HEADER_SIZE];
    reader.read_exact(&mut header)?;

    let len = u32::from_be_bytes([header[1], header[2], header[3], header[4]]);
    let payload_len = check_payload_len(len, what)?;

    let mut message = vec![0u8; HEADER_SIZE + payload_len];
    message[..HEADER_SIZE].copy_from_slice(&header);
    if payload_len > 0 {
        reader.read_exact(&mut message[HEADER_SIZE..])?;
    }
    Ok(message)
}

/// Read a complete command from a stream
///
/// Blocks until a complete command is received or an error occurs
pub fn read_command<R: Read>(reader: &mut R) -> Result<Command> {
    let message = read_message(reader, "command")?;
    decode_command(&message)
}

/// Write a command to a stream
pub fn write_command<W: Write>(writer: &mut W, command: &Command) -> Result<()> {
    let bytes = encode_command(command)?;
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}

/// Read a complete response from a stream
pub fn read_response<R: Read>(reader: &mut R) -> Result<Response> {
    let message = read_message(reader, "response")?;
    decode_response(&message)
}

/// Write a response to a stream
pub fn write_response<W: Write>(writer: &mut W, response: &Response) -> Result<()> {
    let bytes = encode_response(response);
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}
