//! Command definitions
//!
//! Represents requests from clients and peers.

use crate::wal::LogRecord;

/// Command types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CommandType {
    Get = 0x01,
    Set = 0x02,
    Delete = 0x03,
    Ping = 0x04,
    BulkSet = 0x05,
    Replicate = 0x06,
    Promote = 0x07,
    Status = 0x08,
}

impl CommandType {
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(CommandType::Get),
            0x02 => Some(CommandType::Set),
            0x03 => Some(CommandType::Delete),
            0x04 => Some(CommandType::Ping),
            0x05 => Some(CommandType::BulkSet),
            0x06 => Some(CommandType::Replicate),
            0x07 => Some(CommandType::Promote),
            0x08 => Some(CommandType::Status),
            _ => None,
        }
    }
}

/// A parsed command
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Get a value by key
    Get { key: Vec<u8> },

    /// Set a key-value pair
    Set { key: Vec<u8>, value: Vec<u8> },

    /// Delete a key
    Delete { key: Vec<u8> },

    /// Set every pair atomically
    BulkSet { pairs: Vec<(Vec<u8>, Vec<u8>)> },

    /// A committed record forwarded by another node
    Replicate { record: LogRecord },

    /// Promote a secondary to primary
    Promote,

    /// Report role, sequence and peers
    Status,

    /// Ping (health check)
    Ping,
}

impl Command {
    /// Get the command type
    pub fn command_type(&self) -> CommandType {
        match self {
            Command::Get { .. } => CommandType::Get,
            Command::Set { .. } => CommandType::Set,
            Command::Delete { .. } => CommandType::Delete,
            Command::BulkSet { .. } => CommandType::BulkSet,
            Command::Replicate { .. } => CommandType::Replicate,
            Command::Promote => CommandType::Promote,
            Command::Status => CommandType::Status,
            Command::Ping => CommandType::Ping,
        }
    }
}
