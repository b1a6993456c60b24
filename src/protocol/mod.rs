//! Protocol Module
//!
//! RESP2, the wire format spoken by Redis-compatible servers.
//!
//! ## Request Format
//! ```text
//! *<N>\r\n
//! $<len>\r\n<arg 1>\r\n
//! ...
//! $<len>\r\n<arg N>\r\n
//! ```
//!
//! ## Reply Types
//! - `+` simple string
//! - `-` error
//! - `:` integer
//! - `$` bulk string (binary-safe, `$-1` is null)
//! - `*` array (`*-1` is null)

mod command;
mod value;
mod codec;

pub use command::Command;
pub use value::RespValue;
pub use codec::{
    decode, decode_with_limits, encode_command, encode_command_into, encode_value,
    encode_value_into, DecodeLimits, Decoded, Decoder, CRLF, DEFAULT_MAX_ARRAY_LEN,
    DEFAULT_MAX_BULK_LEN, DEFAULT_MAX_DEPTH, DEFAULT_MAX_LINE_LEN,
};
