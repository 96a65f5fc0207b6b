//! Blocking client
//!
//! Speaks the wire protocol over one TCP connection. Used by the CLI, by
//! `TcpTransport` for forwarding, and by remote failover members.

use std::io::{BufReader, BufWriter};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::cluster::{NodeStatus, Promotion};
use crate::error::{DriftError, Result};
use crate::protocol::{read_response, write_command, Command, Response, Status};
use crate::wal::LogRecord;

pub struct Client {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
    addr: String,
}

impl Client {
    /// Connect without timeouts
    pub fn connect(addr: &str) -> Result<Self> {
        let stream = TcpStream::connect(addr)?;
        Self::from_stream(stream, addr)
    }

    /// Connect with a connect timeout and per-call read/write timeouts
    pub fn connect_timeout(addr: &str, connect: Duration, io: Duration) -> Result<Self> {
        let mut last_err = None;

        for socket_addr in addr.to_socket_addrs()? {
            match TcpStream::connect_timeout(&socket_addr, connect) {
                Ok(stream) => {
                    stream.set_read_timeout(Some(io))?;
                    stream.set_write_timeout(Some(io))?;
                    return Self::from_stream(stream, addr);
                }
                Err(e) => last_err = Some(e),
            }
        }

        Err(match last_err {
            Some(e) => DriftError::Io(e),
            None => DriftError::Network(format!("{} did not resolve to any address", addr)),
        })
    }

    fn from_stream(stream: TcpStream, addr: &str) -> Result<Self> {
        stream.set_nodelay(true)?;
        let read_stream = stream.try_clone()?;
        Ok(Self {
            reader: BufReader::new(read_stream),
            writer: BufWriter::new(stream),
            addr: addr.to_string(),
        })
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// `None` when the key does not exist
    pub fn get(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let response = self.call(&Command::Get { key: key.to_vec() })?;
        match response.status {
            Status::NotFound => Ok(None),
            _ => expect_ok(response).map(|payload| Some(payload.unwrap_or_default())),
        }
    }

    pub fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.call_ok(&Command::Set {
            key: key.to_vec(),
            value: value.to_vec(),
        })
    }

    pub fn delete(&mut self, key: &[u8]) -> Result<()> {
        self.call_ok(&Command::Delete { key: key.to_vec() })
    }

    pub fn bulk_set(&mut self, pairs: Vec<(Vec<u8>, Vec<u8>)>) -> Result<()> {
        self.call_ok(&Command::BulkSet { pairs })
    }

    /// Forward a committed record to this node
    pub fn replicate(&mut self, record: &LogRecord) -> Result<()> {
        self.call_ok(&Command::Replicate {
            record: record.clone(),
        })
    }

    pub fn promote(&mut self) -> Result<Promotion> {
        let response = self.call(&Command::Promote)?;
        decode_payload(expect_ok(response)?)
    }

    pub fn status(&mut self) -> Result<NodeStatus> {
        let response = self.call(&Command::Status)?;
        decode_payload(expect_ok(response)?)
    }

    pub fn ping(&mut self) -> Result<()> {
        self.call_ok(&Command::Ping)
    }

    fn call(&mut self, command: &Command) -> Result<Response> {
        write_command(&mut self.writer, command)?;
        read_response(&mut self.reader)
    }

    fn call_ok(&mut self, command: &Command) -> Result<()> {
        let response = self.call(command)?;
        expect_ok(response).map(|_| ())
    }
}

fn expect_ok(response: Response) -> Result<Option<Vec<u8>>> {
    match response.status {
        Status::Ok => Ok(response.payload),
        Status::NotPrimary => Err(DriftError::NotPrimary(response.message())),
        Status::Error => Err(DriftError::Remote(response.message())),
        Status::NotFound => Err(DriftError::Remote("not found".to_string())),
    }
}

fn decode_payload<T: DeserializeOwned>(payload: Option<Vec<u8>>) -> Result<T> {
    let payload = payload
        .ok_or_else(|| DriftError::Protocol("expected a payload, got none".to_string()))?;
    bincode::deserialize(&payload).map_err(|e| DriftError::Serialization(e.to_string()))
}
