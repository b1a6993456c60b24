//! RESP value definitions
//!
//! Represents any value that can travel over the wire in either direction.

use std::fmt;

use bytes::Bytes;

/// A single RESP2 value
///
/// Bulk strings and arrays carry an `Option` so that the null forms
/// (`$-1\r\n`, `*-1\r\n`) stay distinct from the empty ones
/// (`$0\r\n\r\n`, `*0\r\n`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RespValue {
    /// `+OK\r\n`
    SimpleString(String),

    /// `-ERR message\r\n`
    Error(String),

    /// `:1000\r\n`
    Integer(i64),

    /// `$5\r\nhello\r\n`, or `$-1\r\n` when `None`
    BulkString(Option<Bytes>),

    /// `*2\r\n...`, or `*-1\r\n` when `None`
    Array(Option<Vec<RespValue>>),
}

impl RespValue {
    /// Create a simple string value
    pub fn simple(s: impl Into<String>) -> Self {
        RespValue::SimpleString(s.into())
    }

    /// Create an error value
    pub fn error(s: impl Into<String>) -> Self {
        RespValue::Error(s.into())
    }

    /// Create a (non-null) bulk string value
    pub fn bulk(data: impl AsRef<[u8]>) -> Self {
        RespValue::BulkString(Some(Bytes::copy_from_slice(data.as_ref())))
    }

    /// The null bulk string, `$-1\r\n`
    pub fn null_bulk() -> Self {
        RespValue::BulkString(None)
    }

    /// Create a (non-null) array value
    pub fn array(items: Vec<RespValue>) -> Self {
        RespValue::Array(Some(items))
    }

    /// The null array, `*-1\r\n`
    pub fn null_array() -> Self {
        RespValue::Array(None)
    }

    /// True for the null bulk string and the null array
    pub fn is_null(&self) -> bool {
        matches!(self, RespValue::BulkString(None) | RespValue::Array(None))
    }

    /// True for `-` replies
    pub fn is_error(&self) -> bool {
        matches!(self, RespValue::Error(_))
    }

    /// Raw bytes of a simple string, error or non-null bulk string
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            RespValue::SimpleString(s) | RespValue::Error(s) => Some(s.as_bytes()),
            RespValue::BulkString(Some(b)) => Some(b.as_ref()),
            _ => None,
        }
    }

    /// Text of a simple string, error or UTF-8 bulk string
    pub fn as_str(&self) -> Option<&str> {
        self.as_bytes().and_then(|b| std::str::from_utf8(b).ok())
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            RespValue::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Elements of a non-null array
    pub fn as_array(&self) -> Option<&[RespValue]> {
        match self {
            RespValue::Array(Some(items)) => Some(items),
            _ => None,
        }
    }

    /// Write this value the way redis-cli shows it, indenting nested arrays
    fn fmt_nested(&self, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
        match self {
            RespValue::SimpleString(s) => write!(f, "{}", s),
            RespValue::Error(s) => write!(f, "(error) {}", s),
            RespValue::Integer(n) => write!(f, "(integer) {}", n),
            RespValue::BulkString(Some(b)) => {
                write!(f, "\"{}\"", String::from_utf8_lossy(b).escape_debug())
            }
            RespValue::BulkString(None) | RespValue::Array(None) => write!(f, "(nil)"),
            RespValue::Array(Some(items)) if items.is_empty() => write!(f, "(empty array)"),
            RespValue::Array(Some(items)) => {
                let width = items.len().to_string().len();
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                        write!(f, "{:indent$}", "", indent = indent)?;
                    }
                    write!(f, "{:>width$}) ", i + 1, width = width)?;
                    item.fmt_nested(f, indent + width + 2)?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for RespValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_nested(f, 0)
    }
}
