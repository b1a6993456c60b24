//! Engine Module
//!
//! The keyspace behind the bundled server and the command dispatcher that
//! turns requests into replies.
//!
//! ## Supported Commands
//! - `PING [message]`
//! - `ECHO message`
//! - `SET key value`
//! - `GET key`
//!
//! Client bytes quoted in error replies have CR and LF turned into spaces.
//!
//! ## Concurrency Model
//! A `HashMap` behind a `parking_lot::RwLock`: any number of concurrent
//! `GET`s, one `SET` at a time. Sessions share the engine through an `Arc`.

use std::collections::HashMap;

use bytes::Bytes;
use parking_lot::RwLock;

use crate::protocol::{Command, RespValue};

/// In-memory key-value engine
#[derive(Debug, Default)]
pub struct Engine {
    data: RwLock<HashMap<Bytes, Bytes>>,
}

impl Engine {
    /// Create an empty engine
    pub fn new() -> Self {
        Self::default()
    }

    /// Execute a command and return its reply
    ///
    /// Never fails: bad input becomes a RESP error reply so the session can
    /// keep going.
    pub fn execute(&self, command: &Command) -> RespValue {
        let name = command.name().to_ascii_uppercase();
        let args = command.args();

        match (name.as_slice(), args) {
            (b"PING", []) => RespValue::simple("PONG"),
            (b"PING", [message]) => RespValue::BulkString(Some(message.clone())),
            (b"ECHO", [message]) => RespValue::BulkString(Some(message.clone())),
            (b"SET", [key, value]) => {
                self.set(key.clone(), value.clone());
                RespValue::simple("OK")
            }
            (b"GET", [key]) => RespValue::BulkString(self.get(key)),
            (b"PING" | b"ECHO" | b"SET" | b"GET", _) => RespValue::error(format!(
                "ERR wrong number of arguments for '{}' command",
                printable(command.name()).to_ascii_lowercase()
            )),
            _ => RespValue::error(format!(
                "ERR unknown command '{}'",
                printable(command.name())
            )),
        }
    }

    /// Get a value by key (read lock)
    pub fn get(&self, key: &[u8]) -> Option<Bytes> {
        self.data.read().get(key).cloned()
    }

    /// Store a value, replacing any previous one (write lock)
    pub fn set(&self, key: Bytes, value: Bytes) {
        self.data.write().insert(key, value);
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }
}

/// Client bytes quoted inside an error line; CR and LF become spaces
fn printable(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).replace(['\r', '\n'], " ")
}
