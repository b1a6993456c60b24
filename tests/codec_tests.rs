//! Codec Tests
//!
//! Tests for command encoding and RESP value encoding/decoding.

use bytes::Bytes;
use resplite::protocol::{
    decode, decode_with_limits, encode_command, encode_value, Command, DecodeLimits, Decoded,
    Decoder, RespValue,
};
use resplite::{ProtocolError, RespError};

// =============================================================================
// Helper Functions
// =============================================================================

fn decode_complete(bytes: &[u8]) -> (RespValue, usize) {
    match decode(bytes).unwrap() {
        Decoded::Complete { value, consumed } => (value, consumed),
        Decoded::Incomplete => panic!("Expected complete value for {:?}", bytes),
    }
}

fn decode_err(bytes: &[u8]) -> ProtocolError {
    decode(bytes).expect_err("Expected protocol error")
}

/// A reply exercising every value kind, nested
fn mixed_reply() -> Vec<u8> {
    b"*6\r\n+OK\r\n-ERR nope\r\n:-42\r\n$5\r\nhe\r\no\r\n$-1\r\n*3\r\n$0\r\n\r\n*-1\r\n*0\r\n"
        .to_vec()
}

// =============================================================================
// Command Encoding Tests
// =============================================================================

#[test]
fn test_encode_echo_exact_bytes() {
    let cmd = Command::new("ECHO").arg("hey");
    assert_eq!(
        &encode_command(&cmd)[..],
        b"*2\r\n$4\r\nECHO\r\n$3\r\nhey\r\n"
    );
}

#[test]
fn test_encode_name_only() {
    let cmd = Command::new("PING");
    assert_eq!(&encode_command(&cmd)[..], b"*1\r\n$4\r\nPING\r\n");
}

#[test]
fn test_encode_empty_argument() {
    let cmd = Command::new("SET").arg("k").arg("");
    assert_eq!(
        &encode_command(&cmd)[..],
        b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$0\r\n\r\n"
    );
}

#[test]
fn test_encode_binary_argument_is_length_prefixed() {
    // CRLF and NUL inside an argument must not confuse the framing
    let payload = b"a\r\nb\0c".to_vec();
    let cmd = Command::new("SET").arg("k").arg(&payload);
    let encoded = encode_command(&cmd);

    let (value, consumed) = decode_complete(&encoded);
    assert_eq!(consumed, encoded.len());
    assert_eq!(value.as_array().unwrap()[2].as_bytes(), Some(&payload[..]));
}

#[test]
fn test_command_round_trip() {
    let commands = vec![
        Command::new("PING"),
        Command::new("ECHO").arg("hey"),
        Command::new("SET").arg("key").arg("value"),
        Command::new("SET").arg(vec![0u8, 255, 13, 10]).arg((0..=255u8).collect::<Vec<_>>()),
        Command::from_parts(["MSET", "a", "1", "b", "2", "c", "3"]).unwrap(),
    ];

    for cmd in commands {
        let encoded = encode_command(&cmd);
        let (value, consumed) = decode_complete(&encoded);
        assert_eq!(consumed, encoded.len());
        assert_eq!(value, cmd.to_value());
        assert_eq!(Command::from_value(value).unwrap(), cmd);
    }
}

#[test]
fn test_command_from_empty_parts_fails() {
    let parts: Vec<&str> = Vec::new();
    assert!(matches!(
        Command::from_parts(parts),
        Err(RespError::EmptyCommand)
    ));
}

#[test]
fn test_command_accessors() {
    let cmd = Command::new("GET").arg("k");
    assert_eq!(cmd.name(), b"GET");
    assert_eq!(cmd.args(), &[Bytes::from_static(b"k")]);
    assert_eq!(cmd.parts().len(), 2);
}

#[test]
fn test_command_from_value_accepts_simple_strings() {
    let value = RespValue::array(vec![RespValue::simple("PING")]);
    assert_eq!(Command::from_value(value).unwrap(), Command::new("PING"));
}

#[test]
fn test_command_from_value_rejects_non_arrays() {
    for value in [
        RespValue::bulk("PING"),
        RespValue::Integer(1),
        RespValue::null_array(),
    ] {
        assert!(matches!(
            Command::from_value(value),
            Err(RespError::InvalidCommand(_))
        ));
    }
}

#[test]
fn test_command_from_value_rejects_bad_elements() {
    let value = RespValue::array(vec![RespValue::bulk("GET"), RespValue::Integer(3)]);
    let err = Command::from_value(value).unwrap_err();
    assert!(err.to_string().contains("integer"));

    let value = RespValue::array(vec![RespValue::null_bulk()]);
    assert!(Command::from_value(value).is_err());

    assert!(matches!(
        Command::from_value(RespValue::array(vec![])),
        Err(RespError::EmptyCommand)
    ));
}

// =============================================================================
// Decoding Tests
// =============================================================================

#[test]
fn test_decode_simple_string() {
    assert_eq!(decode_complete(b"+OK\r\n"), (RespValue::simple("OK"), 5));
}

#[test]
fn test_decode_error() {
    let (value, _) = decode_complete(b"-ERR unknown command 'FOO'\r\n");
    assert_eq!(value, RespValue::error("ERR unknown command 'FOO'"));
    assert!(value.is_error());
}

#[test]
fn test_decode_integers() {
    assert_eq!(decode_complete(b":1000\r\n").0, RespValue::Integer(1000));
    assert_eq!(decode_complete(b":-7\r\n").0, RespValue::Integer(-7));
    assert_eq!(
        decode_complete(b":9223372036854775807\r\n").0,
        RespValue::Integer(i64::MAX)
    );
}

#[test]
fn test_decode_bulk_string() {
    let (value, consumed) = decode_complete(b"$3\r\nhey\r\n");
    assert_eq!(value, RespValue::bulk("hey"));
    assert_eq!(consumed, 9);
    assert_eq!(value.as_str(), Some("hey"));
}

#[test]
fn test_null_bulk_distinct_from_empty() {
    let (null, null_len) = decode_complete(b"$-1\r\n");
    let (empty, empty_len) = decode_complete(b"$0\r\n\r\n");

    assert_eq!(null, RespValue::BulkString(None));
    assert_eq!(empty, RespValue::BulkString(Some(Bytes::new())));
    assert_ne!(null, empty);
    assert!(null.is_null());
    assert!(!empty.is_null());
    assert_eq!(null_len, 5);
    assert_eq!(empty_len, 6);
}

#[test]
fn test_null_array_distinct_from_empty() {
    let (null, _) = decode_complete(b"*-1\r\n");
    let (empty, _) = decode_complete(b"*0\r\n");

    assert_eq!(null, RespValue::Array(None));
    assert_eq!(empty, RespValue::Array(Some(vec![])));
    assert!(null.is_null());
}

#[test]
fn test_decode_nested_array() {
    let (value, consumed) = decode_complete(&mixed_reply());
    assert_eq!(consumed, mixed_reply().len());
    assert_eq!(
        value,
        RespValue::array(vec![
            RespValue::simple("OK"),
            RespValue::error("ERR nope"),
            RespValue::Integer(-42),
            RespValue::bulk("he\r\no"),
            RespValue::null_bulk(),
            RespValue::array(vec![
                RespValue::bulk(""),
                RespValue::null_array(),
                RespValue::array(vec![]),
            ]),
        ])
    );
}

#[test]
fn test_decode_leaves_trailing_bytes() {
    let (value, consumed) = decode_complete(b"+first\r\n+second\r\n");
    assert_eq!(value, RespValue::simple("first"));
    assert_eq!(consumed, 8);
}

// =============================================================================
// Incremental Feed Tests
// =============================================================================

#[test]
fn test_empty_buffer_is_incomplete() {
    assert_eq!(decode(b"").unwrap(), Decoded::Incomplete);
}

#[test]
fn test_every_prefix_is_incomplete() {
    let replies: Vec<Vec<u8>> = vec![
        b"+OK\r\n".to_vec(),
        b"-ERR bad\r\n".to_vec(),
        b":12345\r\n".to_vec(),
        b"$3\r\nhey\r\n".to_vec(),
        b"$-1\r\n".to_vec(),
        b"*-1\r\n".to_vec(),
        b"*2\r\n$4\r\nECHO\r\n$3\r\nhey\r\n".to_vec(),
        mixed_reply(),
    ];

    for reply in replies {
        for cut in 0..reply.len() {
            assert_eq!(
                decode(&reply[..cut]).unwrap(),
                Decoded::Incomplete,
                "prefix of length {} of {:?}",
                cut,
                String::from_utf8_lossy(&reply)
            );
        }
    }
}

#[test]
fn test_split_at_every_boundary_matches_whole() {
    let reply = mixed_reply();
    let (whole, _) = decode_complete(&reply);

    for cut in 1..reply.len() {
        let mut buffer = Vec::new();

        buffer.extend_from_slice(&reply[..cut]);
        assert_eq!(decode(&buffer).unwrap(), Decoded::Incomplete);

        buffer.extend_from_slice(&reply[cut..]);
        let (value, consumed) = decode_complete(&buffer);
        assert_eq!(value, whole);
        assert_eq!(consumed, reply.len());
    }
}

#[test]
fn test_byte_at_a_time_feed() {
    let reply = mixed_reply();
    let mut buffer = Vec::new();
    let mut result = None;

    for (i, byte) in reply.iter().enumerate() {
        buffer.push(*byte);
        match decode(&buffer).unwrap() {
            Decoded::Incomplete => assert!(i + 1 < reply.len()),
            Decoded::Complete { value, consumed } => {
                assert_eq!(i + 1, reply.len());
                assert_eq!(consumed, reply.len());
                result = Some(value);
            }
        }
    }

    assert_eq!(result, Some(decode_complete(&reply).0));
}

#[test]
fn test_three_chunk_feed() {
    let reply = b"*3\r\n$5\r\nhello\r\n:7\r\n+done\r\n";
    let mut buffer = Vec::new();

    buffer.extend_from_slice(&reply[..6]);
    assert_eq!(decode(&buffer).unwrap(), Decoded::Incomplete);
    buffer.extend_from_slice(&reply[6..17]);
    assert_eq!(decode(&buffer).unwrap(), Decoded::Incomplete);
    buffer.extend_from_slice(&reply[17..]);

    let (value, _) = decode_complete(&buffer);
    assert_eq!(
        value,
        RespValue::array(vec![
            RespValue::bulk("hello"),
            RespValue::Integer(7),
            RespValue::simple("done"),
        ])
    );
}

// =============================================================================
// Decoder State Tests
// =============================================================================

#[test]
fn test_decoder_resumes_large_array_in_small_chunks() {
    let items: Vec<RespValue> = (0..100)
        .map(|i| RespValue::bulk(format!("element-{}", i)))
        .collect();
    let expected = RespValue::array(items);
    let bytes = encode_value(&expected);

    let mut decoder = Decoder::default();
    let mut buffer = Vec::new();
    let mut result = None;
    for chunk in bytes.chunks(7) {
        assert!(result.is_none(), "completed before all bytes arrived");
        buffer.extend_from_slice(chunk);
        if let Decoded::Complete { value, consumed } = decoder.decode(&buffer).unwrap() {
            result = Some((value, consumed));
        }
    }

    assert_eq!(result, Some((expected, bytes.len())));
    assert_eq!(decoder.progress(), 0);
}

#[test]
fn test_decoder_keeps_finished_elements_between_calls() {
    let mut decoder = Decoder::default();
    let whole = b"*3\r\n:1\r\n$3\r\nabc\r\n+end\r\n";

    // Header and first element
    assert_eq!(decoder.decode(&whole[..9]).unwrap(), Decoded::Incomplete);
    assert_eq!(decoder.progress(), 8);

    // Half of the bulk string: nothing more is accounted for
    assert_eq!(decoder.decode(&whole[..15]).unwrap(), Decoded::Incomplete);
    assert_eq!(decoder.progress(), 8);

    assert_eq!(
        decoder.decode(&whole[..]).unwrap(),
        Decoded::Complete {
            value: RespValue::array(vec![
                RespValue::Integer(1),
                RespValue::bulk("abc"),
                RespValue::simple("end"),
            ]),
            consumed: whole.len(),
        }
    );
}

#[test]
fn test_decoder_reused_for_following_values() {
    let mut decoder = Decoder::default();
    let mut buffer = b"*2\r\n:1\r\n:2\r\n+next\r\n".to_vec();

    let consumed = match decoder.decode(&buffer).unwrap() {
        Decoded::Complete { consumed, .. } => consumed,
        Decoded::Incomplete => panic!("Expected complete array"),
    };
    buffer.drain(..consumed);

    assert_eq!(
        decoder.decode(&buffer).unwrap(),
        Decoded::Complete {
            value: RespValue::simple("next"),
            consumed: 7,
        }
    );
}

#[test]
fn test_decoder_reset_discards_partial_array() {
    let mut decoder = Decoder::default();
    assert_eq!(decoder.decode(b"*2\r\n:1\r\n").unwrap(), Decoded::Incomplete);

    decoder.reset();
    assert_eq!(decoder.progress(), 0);
    assert_eq!(
        decoder.decode(b":7\r\n").unwrap(),
        Decoded::Complete {
            value: RespValue::Integer(7),
            consumed: 4,
        }
    );
}

// =============================================================================
// Protocol Error Tests
// =============================================================================

#[test]
fn test_unknown_type_byte() {
    assert_eq!(decode_err(b"X"), ProtocolError::UnknownType(b'X'));
    assert_eq!(decode_err(b"Xhello\r\n"), ProtocolError::UnknownType(b'X'));
}

#[test]
fn test_unknown_type_inside_array() {
    assert_eq!(decode_err(b"*2\r\n:1\r\n?\r\n"), ProtocolError::UnknownType(b'?'));
}

#[test]
fn test_malformed_integer() {
    assert!(matches!(decode_err(b":12a\r\n"), ProtocolError::InvalidInteger(_)));
    assert!(matches!(decode_err(b":\r\n"), ProtocolError::InvalidInteger(_)));
    assert!(matches!(decode_err(b"$abc\r\n"), ProtocolError::InvalidInteger(_)));
    assert!(matches!(
        decode_err(b":99999999999999999999\r\n"),
        ProtocolError::InvalidInteger(_)
    ));
    // No explicit plus sign on integers or lengths
    assert!(matches!(decode_err(b":+5\r\n"), ProtocolError::InvalidInteger(_)));
    assert!(matches!(decode_err(b"$+3\r\nhey\r\n"), ProtocolError::InvalidInteger(_)));
    assert!(matches!(decode_err(b"*+1\r\n:1\r\n"), ProtocolError::InvalidInteger(_)));
}

#[test]
fn test_negative_lengths_other_than_null() {
    assert_eq!(decode_err(b"$-2\r\n"), ProtocolError::InvalidLength(-2));
    assert_eq!(decode_err(b"*-5\r\n"), ProtocolError::InvalidLength(-5));
}

#[test]
fn test_bulk_missing_terminator() {
    assert_eq!(decode_err(b"$3\r\nheyXY"), ProtocolError::MissingTerminator);
}

#[test]
fn test_line_without_terminator_is_bounded() {
    let limits = DecodeLimits {
        max_line_len: 8,
        ..DecodeLimits::default()
    };

    // Still within the lookahead window: wait for more bytes
    assert_eq!(
        decode_with_limits(b"+12345678\r", &limits).unwrap(),
        Decoded::Incomplete
    );
    // Exactly at the limit is fine
    assert!(matches!(
        decode_with_limits(b"+12345678\r\n", &limits).unwrap(),
        Decoded::Complete { .. }
    ));
    // Past the window with no CRLF in sight
    assert_eq!(
        decode_with_limits(b"+1234567890", &limits).unwrap_err(),
        ProtocolError::LineTooLong { limit: 8 }
    );
}

#[test]
fn test_bulk_length_limit() {
    let limits = DecodeLimits {
        max_bulk_len: 4,
        ..DecodeLimits::default()
    };
    assert_eq!(
        decode_with_limits(b"$5\r\n", &limits).unwrap_err(),
        ProtocolError::BulkTooLarge { len: 5, limit: 4 }
    );
    assert!(matches!(
        decode_with_limits(b"$4\r\nabcd\r\n", &limits).unwrap(),
        Decoded::Complete { .. }
    ));
}

#[test]
fn test_array_length_and_depth_limits() {
    let limits = DecodeLimits {
        max_array_len: 2,
        max_depth: 2,
        ..DecodeLimits::default()
    };
    assert_eq!(
        decode_with_limits(b"*3\r\n", &limits).unwrap_err(),
        ProtocolError::ArrayTooLarge { len: 3, limit: 2 }
    );
    assert!(matches!(
        decode_with_limits(b"*1\r\n*1\r\n:1\r\n", &limits).unwrap(),
        Decoded::Complete { .. }
    ));
    assert_eq!(
        decode_with_limits(b"*1\r\n*1\r\n*1\r\n:1\r\n", &limits).unwrap_err(),
        ProtocolError::TooDeep(2)
    );
}

#[test]
fn test_simple_string_must_be_utf8() {
    assert_eq!(decode_err(b"+\xff\xfe\r\n"), ProtocolError::InvalidUtf8);
}

#[test]
fn test_bare_line_break_in_line_is_rejected() {
    assert_eq!(decode_err(b"+a\nb\r\n"), ProtocolError::BareLineBreak);
    assert_eq!(decode_err(b"-ERR a\rb\r\n"), ProtocolError::BareLineBreak);
    assert_eq!(decode_err(b"*1\r\n+x\ny\r\n"), ProtocolError::BareLineBreak);
}

// =============================================================================
// Value Encoding Tests
// =============================================================================

#[test]
fn test_encode_value_wire_format() {
    assert_eq!(&encode_value(&RespValue::simple("OK"))[..], b"+OK\r\n");
    assert_eq!(&encode_value(&RespValue::error("ERR x"))[..], b"-ERR x\r\n");
    assert_eq!(&encode_value(&RespValue::Integer(-3))[..], b":-3\r\n");
    assert_eq!(&encode_value(&RespValue::bulk("hey"))[..], b"$3\r\nhey\r\n");
    assert_eq!(&encode_value(&RespValue::bulk(""))[..], b"$0\r\n\r\n");
    assert_eq!(&encode_value(&RespValue::null_bulk())[..], b"$-1\r\n");
    assert_eq!(&encode_value(&RespValue::null_array())[..], b"*-1\r\n");
    assert_eq!(&encode_value(&RespValue::array(vec![]))[..], b"*0\r\n");
}

#[test]
fn test_encode_value_never_breaks_a_line() {
    assert_eq!(&encode_value(&RespValue::error("a\r\nb"))[..], b"-a  b\r\n");
    assert_eq!(&encode_value(&RespValue::simple("x\ny\rz"))[..], b"+x y z\r\n");

    // Text that looks like a second reply stays inside the first
    let bytes = encode_value(&RespValue::error("ERR unknown command 'FOO\r\n+OK'"));
    let (value, consumed) = decode_complete(&bytes);
    assert_eq!(consumed, bytes.len());
    assert_eq!(value, RespValue::error("ERR unknown command 'FOO  +OK'"));
}

#[test]
fn test_encode_value_reproduces_decoded_bytes() {
    let reply = mixed_reply();
    let (value, _) = decode_complete(&reply);
    assert_eq!(&encode_value(&value)[..], &reply[..]);
}

// =============================================================================
// Display Tests
// =============================================================================

#[test]
fn test_display_scalars() {
    assert_eq!(RespValue::simple("PONG").to_string(), "PONG");
    assert_eq!(RespValue::error("ERR x").to_string(), "(error) ERR x");
    assert_eq!(RespValue::Integer(3).to_string(), "(integer) 3");
    assert_eq!(RespValue::bulk("hey").to_string(), "\"hey\"");
    assert_eq!(RespValue::null_bulk().to_string(), "(nil)");
    assert_eq!(RespValue::null_array().to_string(), "(nil)");
    assert_eq!(RespValue::array(vec![]).to_string(), "(empty array)");
}

#[test]
fn test_display_nested_array() {
    let value = RespValue::array(vec![
        RespValue::bulk("a"),
        RespValue::array(vec![RespValue::Integer(1), RespValue::Integer(2)]),
    ]);
    assert_eq!(
        value.to_string(),
        "1) \"a\"\n2) 1) (integer) 1\n   2) (integer) 2"
    );
}
