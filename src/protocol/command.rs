//! Command definitions
//!
//! A command is what a client sends: a name followed by arguments, all
//! binary-safe, always framed as an array of bulk strings.

use bytes::Bytes;

use super::RespValue;
use crate::error::{RespError, Result};

/// A request to a RESP server
///
/// Always holds at least one part, the command name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    parts: Vec<Bytes>,
}

impl Command {
    /// Start a command with the given name
    pub fn new(name: impl AsRef<[u8]>) -> Self {
        Self {
            parts: vec![Bytes::copy_from_slice(name.as_ref())],
        }
    }

    /// Append an argument (builder style)
    pub fn arg(mut self, arg: impl AsRef<[u8]>) -> Self {
        self.push_arg(arg);
        self
    }

    /// Append an argument in place
    pub fn push_arg(&mut self, arg: impl AsRef<[u8]>) {
        self.parts.push(Bytes::copy_from_slice(arg.as_ref()));
    }

    /// Build a command from a full argument list, name first
    ///
    /// Fails with `EmptyCommand` when the list is empty.
    pub fn from_parts<I, A>(parts: I) -> Result<Self>
    where
        I: IntoIterator<Item = A>,
        A: AsRef<[u8]>,
    {
        let parts: Vec<Bytes> = parts
            .into_iter()
            .map(|p| Bytes::copy_from_slice(p.as_ref()))
            .collect();

        if parts.is_empty() {
            return Err(RespError::EmptyCommand);
        }
        Ok(Self { parts })
    }

    /// Rebuild a command from a decoded request
    ///
    /// The request must be a non-empty array whose elements are bulk or
    /// simple strings.
    pub fn from_value(value: RespValue) -> Result<Self> {
        let items = match value {
            RespValue::Array(Some(items)) => items,
            other => {
                return Err(RespError::InvalidCommand(format!(
                    "expected array of bulk strings, got {}",
                    kind_name(&other)
                )))
            }
        };

        let mut parts = Vec::with_capacity(items.len());
        for item in items {
            match item {
                RespValue::BulkString(Some(b)) => parts.push(b),
                RespValue::SimpleString(s) => parts.push(Bytes::from(s)),
                other => {
                    return Err(RespError::InvalidCommand(format!(
                        "expected bulk string argument, got {}",
                        kind_name(&other)
                    )))
                }
            }
        }

        if parts.is_empty() {
            return Err(RespError::EmptyCommand);
        }
        Ok(Self { parts })
    }

    /// The command name (first part)
    pub fn name(&self) -> &[u8] {
        &self.parts[0]
    }

    /// Arguments after the name
    pub fn args(&self) -> &[Bytes] {
        &self.parts[1..]
    }

    /// All parts, name included
    pub fn parts(&self) -> &[Bytes] {
        &self.parts
    }

    /// The array-of-bulk-strings value this command encodes to
    pub fn to_value(&self) -> RespValue {
        RespValue::Array(Some(
            self.parts
                .iter()
                .map(|p| RespValue::BulkString(Some(p.clone())))
                .collect(),
        ))
    }
}

fn kind_name(value: &RespValue) -> &'static str {
    match value {
        RespValue::SimpleString(_) => "simple string",
        RespValue::Error(_) => "error",
        RespValue::Integer(_) => "integer",
        RespValue::BulkString(Some(_)) => "bulk string",
        RespValue::BulkString(None) => "null bulk string",
        RespValue::Array(Some(_)) => "array",
        RespValue::Array(None) => "null array",
    }
}
