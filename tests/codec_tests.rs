#![allow(missing_docs)]

use savegraph::codec::{
    self, DEFAULT_OBJECT, Inflated, NULL_OBJECT, ReadCursor, Utf8State, decode_text, scan_utf8,
};

fn deflated(value: i32) -> Vec<u8> {
    let mut out = Vec::new();
    codec::deflate_int(&mut out, value);
    out
}

// --- DEFLATED INTEGERS ---

#[test]
fn test_deflate_strips_leading_zero_bytes() {
    assert_eq!(deflated(300), vec![2, 0x01, 0x2C]);
    assert_eq!(deflated(7), vec![1, 7]);
    assert_eq!(deflated(0x0100_0000), vec![4, 0x01, 0, 0, 0]);
}

#[test]
fn test_deflate_zero_is_a_single_byte() {
    assert_eq!(deflated(0), vec![0]);

    let bytes = [0u8];
    let mut cursor = ReadCursor::new(&bytes);
    assert_eq!(codec::inflate_int(&mut cursor).ok(), Some(Inflated::Value(0)));
    assert!(cursor.is_at_end());
}

/// Negative values keep every byte so their length prefix never reads as a marker.
#[test]
fn test_negative_values_use_full_width() -> savegraph::Result<()> {
    assert_eq!(deflated(-1), vec![4, 0xFF, 0xFF, 0xFF, 0xFF]);
    assert_eq!(deflated(-2), vec![4, 0xFF, 0xFF, 0xFF, 0xFE]);

    for value in [-1, -2, i32::MIN, -300] {
        let bytes = deflated(value);
        let mut cursor = ReadCursor::new(&bytes);
        assert_eq!(codec::inflate_int(&mut cursor)?, Inflated::Value(value));
    }

    let mut out = Vec::new();
    codec::deflate_long(&mut out, -1);
    assert_eq!(out.len(), 9);
    let mut cursor = ReadCursor::new(&out);
    assert_eq!(codec::inflate_long(&mut cursor)?, Inflated::Value(-1));
    Ok(())
}

#[test]
fn test_markers_decode_as_markers() -> savegraph::Result<()> {
    let bytes = [NULL_OBJECT, DEFAULT_OBJECT];
    let mut cursor = ReadCursor::new(&bytes);
    assert_eq!(codec::inflate_int(&mut cursor)?, Inflated::Null);
    assert_eq!(codec::inflate_int(&mut cursor)?, Inflated::Default);
    assert!(cursor.is_at_end());

    let mut out = Vec::new();
    codec::write_null(&mut out);
    codec::write_default(&mut out);
    assert_eq!(out, vec![0xFF, 0xFE]);
    Ok(())
}

#[test]
fn test_long_values_round_trip_through_deflation() -> savegraph::Result<()> {
    let values = [0i64, 1, 255, 256, 1 << 40, i64::MAX, i64::MIN];
    let mut out = Vec::new();
    for value in values {
        codec::deflate_long(&mut out, value);
    }
    let mut cursor = ReadCursor::new(&out);
    for value in values {
        assert_eq!(codec::inflate_long(&mut cursor)?.value(), Some(value));
    }
    assert!(cursor.is_at_end());
    Ok(())
}

#[test]
fn test_oversized_deflated_length_is_rejected() {
    let bytes = [5u8, 1, 2, 3, 4, 5];
    let mut cursor = ReadCursor::new(&bytes);
    assert!(codec::inflate_int(&mut cursor).is_err());
}

#[test]
fn test_truncated_value_is_an_error() {
    let bytes = [2u8, 0x01];
    let mut cursor = ReadCursor::new(&bytes);
    assert!(codec::inflate_int(&mut cursor).is_err());
}

// --- FIXED WIDTH ---

#[test]
fn test_fixed_width_values_are_big_endian() -> savegraph::Result<()> {
    let mut out = Vec::new();
    codec::write_short(&mut out, 0x1234);
    codec::write_float(&mut out, 1.5);
    codec::write_double(&mut out, -2.25);
    codec::write_bool(&mut out, true);
    codec::write_byte(&mut out, 0xAB);

    assert_eq!(&out[..2], &[0x12, 0x34]);
    assert_eq!(&out[2..6], &1.5f32.to_bits().to_be_bytes());

    let mut cursor = ReadCursor::new(&out);
    assert_eq!(codec::read_short(&mut cursor)?, 0x1234);
    assert_eq!(codec::read_float(&mut cursor)?, 1.5);
    assert_eq!(codec::read_double(&mut cursor)?, -2.25);
    assert!(codec::read_bool(&mut cursor)?);
    assert_eq!(codec::read_byte(&mut cursor)?, 0xAB);
    assert!(cursor.is_at_end());
    Ok(())
}

// --- STRINGS ---

#[test]
fn test_utf8_string_round_trips() -> savegraph::Result<()> {
    let mut out = Vec::new();
    codec::write_string(&mut out, "café")?;
    assert_eq!(out[0], 1);
    assert_eq!(out[1], 5);

    let mut cursor = ReadCursor::new(&out);
    let decoded = codec::read_string(&mut cursor)?;
    assert_eq!(decoded.value.as_deref(), Some("café"));
    assert!(!decoded.legacy);
    Ok(())
}

#[test]
fn test_null_string_decodes_as_none() -> savegraph::Result<()> {
    let mut out = Vec::new();
    codec::write_null_string(&mut out);
    let mut cursor = ReadCursor::new(&out);
    let decoded = codec::read_string(&mut cursor)?;
    assert_eq!(decoded.value, None);
    Ok(())
}

#[test]
fn test_lone_latin1_byte_falls_back() {
    let decoded = decode_text(&[0x63, 0x61, 0x66, 0xE9]);
    assert_eq!(decoded.value.as_deref(), Some("café"));
    assert!(decoded.legacy);
}

#[test]
fn test_four_byte_sequence_decodes_as_utf8() {
    let text = "hi 😀";
    let decoded = decode_text(text.as_bytes());
    assert_eq!(decoded.value.as_deref(), Some(text));
    assert!(!decoded.legacy);
}

#[test]
fn test_broken_four_byte_sequence_falls_back() {
    let decoded = decode_text(&[0xF0, 0x41]);
    assert!(decoded.legacy);
    assert_eq!(decoded.value.as_deref(), Some("\u{F0}A"));
}

#[test]
fn test_scan_states() {
    assert_eq!(scan_utf8(b"plain ascii"), Utf8State::Start);
    assert_eq!(scan_utf8(&[0xC3]), Utf8State::TwoByte);
    assert_eq!(scan_utf8(&[0xE2]), Utf8State::ThreeByte1);
    assert_eq!(scan_utf8(&[0xE2, 0x82]), Utf8State::ThreeByte2);
    assert_eq!(scan_utf8(&[0xE2, 0x82, 0xAC]), Utf8State::Start);
    assert_eq!(scan_utf8(&[0x80]), Utf8State::Illegal);
    assert_eq!(scan_utf8(&[0xC3, 0x41, 0xA9]), Utf8State::Illegal);
}

#[test]
fn test_cursor_reports_position() -> savegraph::Result<()> {
    let bytes = [0u8, 0, 0, 9, 1, 2];
    let mut cursor = ReadCursor::new(&bytes);
    assert_eq!(cursor.read_i32()?, 9);
    assert_eq!(cursor.offset(), 4);
    assert_eq!(cursor.remaining(), 2);
    assert_eq!(cursor.rest(), &[1, 2]);
    assert!(ReadCursor::at(&bytes, 7).is_err());
    Ok(())
}
