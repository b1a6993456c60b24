//! Error types for resplite
//!
//! Each layer has its own error enum so callers can match on exactly what
//! failed, and `RespError` unifies them for code that just wants `?`.

use thiserror::Error;

/// Result type alias using RespError
pub type Result<T> = std::result::Result<T, RespError>;

/// Malformed RESP input
///
/// Always fatal for the connection that produced it: the stream position is
/// unknown after a bad frame, so nothing after it can be trusted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("unknown RESP type byte: 0x{0:02x}")]
    UnknownType(u8),

    #[error("invalid integer: {0:?}")]
    InvalidInteger(String),

    #[error("invalid length: {0}")]
    InvalidLength(i64),

    #[error("no CRLF within {limit} bytes")]
    LineTooLong { limit: usize },

    #[error("bulk string body not terminated by CRLF")]
    MissingTerminator,

    #[error("bulk string of {len} bytes exceeds limit of {limit}")]
    BulkTooLarge { len: usize, limit: usize },

    #[error("array of {len} elements exceeds limit of {limit}")]
    ArrayTooLarge { len: usize, limit: usize },

    #[error("arrays nested deeper than {0} levels")]
    TooDeep(usize),

    #[error("line is not valid UTF-8")]
    InvalidUtf8,

    #[error("line contains a bare CR or LF")]
    BareLineBreak,
}

/// Failure to establish a TCP connection
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("failed to resolve {addr}: {source}")]
    Resolve {
        addr: String,
        source: std::io::Error,
    },

    #[error("{0} resolved to no addresses")]
    NoAddress(String),

    #[error("connection to {addr} refused")]
    Refused {
        addr: String,
        source: std::io::Error,
    },

    #[error("connection to {addr} timed out")]
    Timeout { addr: String },

    #[error("failed to connect to {addr}: {source}")]
    Io {
        addr: String,
        source: std::io::Error,
    },
}

/// Failure of a single request/response exchange
///
/// Every variant leaves the connection closed.
#[derive(Debug, Error)]
pub enum CallError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("connection closed")]
    Closed,

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("timed out waiting for reply")]
    Timeout,
}

/// Unified error type for resplite operations
#[derive(Debug, Error)]
pub enum RespError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Client Errors
    // -------------------------------------------------------------------------
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error(transparent)]
    Call(#[from] CallError),

    // -------------------------------------------------------------------------
    // Protocol Errors
    // -------------------------------------------------------------------------
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("command must have at least one argument")]
    EmptyCommand,

    #[error("invalid command: {0}")]
    InvalidCommand(String),
}

impl CallError {
    /// True when the error came from the peer going away rather than from
    /// something we could have prevented locally
    pub fn is_disconnect(&self) -> bool {
        match self {
            CallError::Closed => true,
            CallError::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::UnexpectedEof
            ),
            _ => false,
        }
    }
}
