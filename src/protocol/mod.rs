//! Protocol Module
//!
//! Defines the wire protocol spoken by clients, peers and the failover
//! coordinator.
//!
//! ## Protocol Format (Simple Binary)
//!
//! ### Request Format
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │ Cmd (1)  │ Len (4)  │         Payload             │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```
//!
//! ### Commands
//! - 0x01: GET        - Payload: key_len (4) + key
//! - 0x02: SET        - Payload: key_len (4) + key + value
//! - 0x03: DEL        - Payload: key_len (4) + key
//! - 0x04: PING       - Payload: empty
//! - 0x05: BULK_SET   - Payload: count (4) + count × (key_len (4) + key + value_len (4) + value)
//! - 0x06: REPLICATE  - Payload: one WAL frame (len + crc + bincode record)
//! - 0x07: PROMOTE    - Payload: empty
//! - 0x08: STATUS     - Payload: empty
//!
//! ### Response Format
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │Status(1) │ Len (4)  │         Payload             │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```
//!
//! ### Status Codes
//! - 0x00: OK
//! - 0x01: NOT_FOUND
//! - 0x02: ERROR
//! - 0x03: NOT_PRIMARY

mod command;
mod response;
mod codec;

pub use command::{Command, CommandType};
pub use response::{Response, Status};
pub use codec::{
    decode_command, decode_response, encode_command, encode_response, read_command,
    read_response, write_command, write_response, HEADER_SIZE, MAX_PAYLOAD_SIZE,
};
