//! Protocol codec
//!
//! Encoding and decoding functions for RESP2.
//!
//! ## Wire Format
//!
//! ```text
//! +<line>\r\n                simple string
//! -<line>\r\n                error
//! :<int>\r\n                 integer
//! $<len>\r\n<bytes>\r\n      bulk string   ($-1\r\n is null)
//! *<count>\r\n<values...>    array         (*-1\r\n is null)
//! ```
//!
//! ## Incremental Decoding
//! `decode` never consumes anything itself. It looks at the start of the
//! buffer and either reports a complete value plus how many bytes it spans,
//! or `Incomplete`. Callers append whatever the socket hands them and retry
//! from the same start, so arbitrary TCP chunk boundaries are harmless.
//! A `Decoder` does the same but remembers finished array elements between
//! retries, so a long reply arriving in many reads is not re-parsed from
//! the top each time.

use bytes::{BufMut, Bytes, BytesMut};

use super::{Command, RespValue};
use crate::error::ProtocolError;

/// Line terminator
pub const CRLF: &[u8] = b"\r\n";

/// Default limit on how far to scan for a CRLF (64 KB)
pub const DEFAULT_MAX_LINE_LEN: usize = 64 * 1024;

/// Default maximum bulk string length (512 MB)
pub const DEFAULT_MAX_BULK_LEN: usize = 512 * 1024 * 1024;

/// Default maximum array element count
pub const DEFAULT_MAX_ARRAY_LEN: usize = 1024 * 1024;

/// Default maximum array nesting depth
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Upper bounds applied while decoding untrusted input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeLimits {
    /// Bytes scanned for a CRLF before giving up on a line
    pub max_line_len: usize,

    /// Largest accepted bulk string body
    pub max_bulk_len: usize,

    /// Largest accepted array element count
    pub max_array_len: usize,

    /// Deepest accepted array nesting
    pub max_depth: usize,
}

impl Default for DecodeLimits {
    fn default() -> Self {
        Self {
            max_line_len: DEFAULT_MAX_LINE_LEN,
            max_bulk_len: DEFAULT_MAX_BULK_LEN,
            max_array_len: DEFAULT_MAX_ARRAY_LEN,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Outcome of a successful decode attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// A full value, spanning the first `consumed` bytes of the buffer
    Complete { value: RespValue, consumed: usize },

    /// The buffer holds only a prefix of a value; read more and retry
    Incomplete,
}

// =============================================================================
// Encoding
// =============================================================================

/// Encode a command as an array of bulk strings
///
/// Format: `*<argc>\r\n` then `$<len>\r\n<bytes>\r\n` per part
pub fn encode_command(command: &Command) -> Bytes {
    let body: usize = command.parts().iter().map(|p| p.len() + 16).sum();
    let mut buf = BytesMut::with_capacity(16 + body);
    encode_command_into(command, &mut buf);
    buf.freeze()
}

/// Encode a command into an existing buffer
pub fn encode_command_into(command: &Command, buf: &mut BytesMut) {
    put_header(buf, b'*', command.parts().len() as i64);
    for part in command.parts() {
        put_bulk(buf, part);
    }
}

/// Encode any value
pub fn encode_value(value: &RespValue) -> Bytes {
    let mut buf = BytesMut::new();
    encode_value_into(value, &mut buf);
    buf.freeze()
}

/// Encode any value into an existing buffer
pub fn encode_value_into(value: &RespValue, buf: &mut BytesMut) {
    match value {
        RespValue::SimpleString(s) => put_line(buf, b'+', s.as_bytes()),
        RespValue::Error(s) => put_line(buf, b'-', s.as_bytes()),
        RespValue::Integer(n) => put_header(buf, b':', *n),
        RespValue::BulkString(Some(data)) => put_bulk(buf, data),
        RespValue::BulkString(None) => buf.put_slice(b"$-1\r\n"),
        RespValue::Array(Some(items)) => {
            put_header(buf, b'*', items.len() as i64);
            for item in items {
                encode_value_into(item, buf);
            }
        }
        RespValue::Array(None) => buf.put_slice(b"*-1\r\n"),
    }
}

fn put_header(buf: &mut BytesMut, prefix: u8, n: i64) {
    buf.put_u8(prefix);
    buf.put_slice(n.to_string().as_bytes());
    buf.put_slice(CRLF);
}

/// Write a `+`/`-` line
///
/// CR and LF inside the text become spaces; a raw one would end the frame
/// early and turn the rest of the text into a bogus next reply.
fn put_line(buf: &mut BytesMut, prefix: u8, line: &[u8]) {
    buf.reserve(line.len() + 3);
    buf.put_u8(prefix);
    for &byte in line {
        buf.put_u8(match byte {
            b'\r' | b'\n' => b' ',
            other => other,
        });
    }
    buf.put_slice(CRLF);
}

fn put_bulk(buf: &mut BytesMut, data: &[u8]) {
    put_header(buf, b'$', data.len() as i64);
    buf.reserve(data.len() + 2);
    buf.put_slice(data);
    buf.put_slice(CRLF);
}

// =============================================================================
// Decoding
// =============================================================================

/// Decode one value from the start of `buf` using the default limits
pub fn decode(buf: &[u8]) -> Result<Decoded, ProtocolError> {
    decode_with_limits(buf, &DecodeLimits::default())
}

/// Decode one value from the start of `buf`
///
/// Returns `Incomplete` when `buf` is a strict prefix of a valid value and
/// `ProtocolError` as soon as the bytes seen so far cannot start one. Each
/// call starts from scratch; use a `Decoder` to keep progress between reads.
pub fn decode_with_limits(buf: &[u8], limits: &DecodeLimits) -> Result<Decoded, ProtocolError> {
    Decoder::new(*limits).decode(buf)
}

/// An array whose elements are still arriving
#[derive(Debug)]
struct PendingArray {
    remaining: usize,
    items: Vec<RespValue>,
}

/// Resumable decoder for one value at a time
///
/// Remembers the elements of partially received arrays and how far into
/// the buffer they reach, so a retry after more bytes arrive starts at the
/// first unfinished element instead of the start of the reply.
///
/// The buffer passed to `decode` must keep the same start (only grow at the
/// end) until a value is returned. After `Complete { consumed, .. }` the
/// caller drops those bytes from the front and the decoder starts over.
/// After an error the decoder state is meaningless; call `reset` or drop it.
#[derive(Debug, Default)]
pub struct Decoder {
    limits: DecodeLimits,

    /// Arrays waiting for elements, outermost first
    stack: Vec<PendingArray>,

    /// End of the last finished element or array header
    offset: usize,
}

impl Decoder {
    pub fn new(limits: DecodeLimits) -> Self {
        Self {
            limits,
            stack: Vec::new(),
            offset: 0,
        }
    }

    /// Forget any partially decoded value
    pub fn reset(&mut self) {
        self.stack.clear();
        self.offset = 0;
    }

    /// Bytes of the current value already accounted for
    pub fn progress(&self) -> usize {
        self.offset
    }

    /// Continue decoding the value at the start of `buf`
    pub fn decode(&mut self, buf: &[u8]) -> Result<Decoded, ProtocolError> {
        loop {
            let pos = self.offset;
            let Some(&type_byte) = buf.get(pos) else {
                return Ok(Decoded::Incomplete);
            };

            let parsed = match type_byte {
                b'+' => parse_text(buf, pos, &self.limits, RespValue::SimpleString)?,
                b'-' => parse_text(buf, pos, &self.limits, RespValue::Error)?,
                b':' => read_int(buf, pos, &self.limits)?
                    .map(|(n, next)| (RespValue::Integer(n), next)),
                b'$' => parse_bulk(buf, pos, &self.limits)?,
                b'*' => match self.parse_array_header(buf, pos)? {
                    ArrayHeader::Value(value, next) => Some((value, next)),
                    ArrayHeader::Opened(next) => {
                        self.offset = next;
                        continue;
                    }
                    ArrayHeader::Incomplete => None,
                },
                other => return Err(ProtocolError::UnknownType(other)),
            };

            let Some((value, next)) = parsed else {
                return Ok(Decoded::Incomplete);
            };
            self.offset = next;

            if let Some(value) = self.finish_element(value) {
                let consumed = self.offset;
                self.reset();
                return Ok(Decoded::Complete { value, consumed });
            }
        }
    }

    /// Read `*<count>\r\n`; empty and null arrays are values right away
    fn parse_array_header(&mut self, buf: &[u8], pos: usize) -> Result<ArrayHeader, ProtocolError> {
        if self.stack.len() >= self.limits.max_depth {
            return Err(ProtocolError::TooDeep(self.limits.max_depth));
        }

        let Some((count, next)) = read_int(buf, pos, &self.limits)? else {
            return Ok(ArrayHeader::Incomplete);
        };

        let count = match count {
            -1 => return Ok(ArrayHeader::Value(RespValue::Array(None), next)),
            0 => return Ok(ArrayHeader::Value(RespValue::Array(Some(Vec::new())), next)),
            n if n < 0 => return Err(ProtocolError::InvalidLength(n)),
            n => n as usize,
        };
        if count > self.limits.max_array_len {
            return Err(ProtocolError::ArrayTooLarge {
                len: count,
                limit: self.limits.max_array_len,
            });
        }

        self.stack.push(PendingArray {
            remaining: count,
            // Don't trust the declared count for the allocation
            items: Vec::with_capacity(count.min(1024)),
        });
        Ok(ArrayHeader::Opened(next))
    }

    /// Attach a finished value to its enclosing array, closing every array
    /// it completes; returns the top-level value once there is one
    fn finish_element(&mut self, mut value: RespValue) -> Option<RespValue> {
        loop {
            let Some(top) = self.stack.last_mut() else {
                return Some(value);
            };
            top.items.push(value);
            top.remaining -= 1;
            if top.remaining > 0 {
                return None;
            }
            let items = std::mem::take(&mut top.items);
            self.stack.pop();
            value = RespValue::Array(Some(items));
        }
    }
}

enum ArrayHeader {
    /// A null or empty array, complete on its own
    Value(RespValue, usize),

    /// A non-empty array whose elements follow at the given offset
    Opened(usize),

    Incomplete,
}

/// Find the line that follows the type byte at `pos`
///
/// Returns the line body and the offset just past its CRLF. Only
/// `max_line_len + 2` bytes are scanned, so a peer that never sends a
/// terminator is caught instead of growing the buffer forever.
fn read_line<'a>(
    buf: &'a [u8],
    pos: usize,
    limits: &DecodeLimits,
) -> Result<Option<(&'a [u8], usize)>, ProtocolError> {
    let start = pos + 1;
    let window = buf.get(start..).unwrap_or(&[]);
    let scan = window.len().min(limits.max_line_len + CRLF.len());

    match window[..scan].windows(2).position(|w| w == CRLF) {
        Some(end) => Ok(Some((&window[..end], start + end + CRLF.len()))),
        None if window.len() >= limits.max_line_len + CRLF.len() => {
            Err(ProtocolError::LineTooLong {
                limit: limits.max_line_len,
            })
        }
        None => Ok(None),
    }
}

/// Parse a decimal line: optional `-`, then digits only
fn read_int(
    buf: &[u8],
    pos: usize,
    limits: &DecodeLimits,
) -> Result<Option<(i64, usize)>, ProtocolError> {
    let Some((line, next)) = read_line(buf, pos, limits)? else {
        return Ok(None);
    };
    let invalid = || ProtocolError::InvalidInteger(String::from_utf8_lossy(line).into_owned());

    // `str::parse` would also take a leading `+`, which RESP does not allow
    if line.first() == Some(&b'+') {
        return Err(invalid());
    }
    let n = std::str::from_utf8(line)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(invalid)?;
    Ok(Some((n, next)))
}

fn parse_text(
    buf: &[u8],
    pos: usize,
    limits: &DecodeLimits,
    wrap: fn(String) -> RespValue,
) -> Result<Option<(RespValue, usize)>, ProtocolError> {
    let Some((line, next)) = read_line(buf, pos, limits)? else {
        return Ok(None);
    };
    if line.iter().any(|&b| b == b'\r' || b == b'\n') {
        return Err(ProtocolError::BareLineBreak);
    }
    let text = std::str::from_utf8(line).map_err(|_| ProtocolError::InvalidUtf8)?;
    Ok(Some((wrap(text.to_owned()), next)))
}

/// Parse `$<len>\r\n<bytes>\r\n` or `$-1\r\n`
fn parse_bulk(
    buf: &[u8],
    pos: usize,
    limits: &DecodeLimits,
) -> Result<Option<(RespValue, usize)>, ProtocolError> {
    let Some((len, body_start)) = read_int(buf, pos, limits)? else {
        return Ok(None);
    };

    let len = match len {
        -1 => return Ok(Some((RespValue::BulkString(None), body_start))),
        n if n < 0 => return Err(ProtocolError::InvalidLength(n)),
        n => n as usize,
    };
    if len > limits.max_bulk_len {
        return Err(ProtocolError::BulkTooLarge {
            len,
            limit: limits.max_bulk_len,
        });
    }

    let body_end = body_start + len;
    let next = body_end + CRLF.len();
    if buf.len() < next {
        return Ok(None);
    }
    if &buf[body_end..next] != CRLF {
        return Err(ProtocolError::MissingTerminator);
    }

    let data = Bytes::copy_from_slice(&buf[body_start..body_end]);
    Ok(Some((RespValue::BulkString(Some(data)), next)))
}
