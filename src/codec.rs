//! The Primitive Codec.
//!
//! Deterministic byte-level encoding shared by the writer and the reader:
//!
//! * fixed width: `bool` (1), `byte` (1), `short` (2), `float` (4), `double` (8),
//!   all big-endian, floats as IEEE-754 bit patterns;
//! * deflated `int`/`long`: a length byte followed by only the significant
//!   big-endian bytes, with two reserved length values acting as the
//!   [`NULL_OBJECT`] and [`DEFAULT_OBJECT`] markers;
//! * strings: deflated byte length followed by the raw bytes, decoded as UTF-8
//!   when valid and as Latin-1 otherwise so files written with a legacy
//!   platform encoding still load.
//!
//! Decoding always goes through a [`ReadCursor`], which turns every short read
//! into a [`SaveGraphError::Format`] instead of a panic.

use crate::error::{Result, SaveGraphError};
use byteorder::{BigEndian, ByteOrder};

/// Length prefix marking an absent value.
pub const NULL_OBJECT: u8 = 0xFF;

/// Length prefix marking "use the reader's default".
pub const DEFAULT_OBJECT: u8 = 0xFE;

/// A position inside a borrowed byte buffer.
///
/// Every decode call takes the cursor explicitly and advances it by exactly
/// the number of bytes it consumed.
#[derive(Debug, Clone, Copy)]
pub struct ReadCursor<'a> {
    buffer: &'a [u8],
    offset: usize,
}

impl<'a> ReadCursor<'a> {
    /// Creates a cursor at the start of `buffer`.
    pub fn new(buffer: &'a [u8]) -> Self {
        Self { buffer, offset: 0 }
    }

    /// Creates a cursor at `offset`. Fails if the offset lies past the end.
    pub fn at(buffer: &'a [u8], offset: usize) -> Result<Self> {
        if offset > buffer.len() {
            return Err(SaveGraphError::Format(format!(
                "Offset {offset} outside buffer of {} bytes",
                buffer.len()
            )));
        }
        Ok(Self { buffer, offset })
    }

    /// Current position.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Bytes left before the end of the buffer.
    pub fn remaining(&self) -> usize {
        self.buffer.len() - self.offset
    }

    /// Whether the cursor reached the end of the buffer.
    pub fn is_at_end(&self) -> bool {
        self.offset >= self.buffer.len()
    }

    /// Everything from the cursor to the end of the buffer, without advancing.
    pub fn rest(&self) -> &'a [u8] {
        &self.buffer[self.offset..]
    }

    /// Consumes `len` bytes.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .offset
            .checked_add(len)
            .filter(|end| *end <= self.buffer.len())
            .ok_or_else(|| {
                SaveGraphError::Format(format!(
                    "Unexpected end of data: wanted {len} bytes at offset {}, {} available",
                    self.offset,
                    self.remaining()
                ))
            })?;
        let bytes = &self.buffer[self.offset..end];
        self.offset = end;
        Ok(bytes)
    }

    /// Consumes one byte.
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    /// Consumes a fixed-width big-endian `i16`.
    pub fn read_i16(&mut self) -> Result<i16> {
        Ok(BigEndian::read_i16(self.read_bytes(2)?))
    }

    /// Consumes a fixed-width big-endian `i32`.
    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(BigEndian::read_i32(self.read_bytes(4)?))
    }

    /// Consumes a fixed-width big-endian `i64`.
    pub fn read_i64(&mut self) -> Result<i64> {
        Ok(BigEndian::read_i64(self.read_bytes(8)?))
    }

    /// Consumes a fixed-width `i32` that must be a non-negative count or length.
    pub fn read_len(&mut self, what: &str) -> Result<usize> {
        let value = self.read_i32()?;
        usize::try_from(value)
            .map_err(|_| SaveGraphError::Format(format!("Negative {what}: {value}")))
    }
}

// --- Fixed width ---

/// Appends a boolean as a single 0/1 byte.
pub fn write_bool(out: &mut Vec<u8>, value: bool) {
    out.push(u8::from(value));
}

/// Reads a boolean. Any non-zero byte is `true`.
pub fn read_bool(cursor: &mut ReadCursor<'_>) -> Result<bool> {
    Ok(cursor.read_u8()? != 0)
}

/// Appends a single byte.
pub fn write_byte(out: &mut Vec<u8>, value: u8) {
    out.push(value);
}

/// Reads a single byte.
pub fn read_byte(cursor: &mut ReadCursor<'_>) -> Result<u8> {
    cursor.read_u8()
}

/// Appends a big-endian `i16`.
pub fn write_short(out: &mut Vec<u8>, value: i16) {
    out.extend_from_slice(&value.to_be_bytes());
}

/// Reads a big-endian `i16`.
pub fn read_short(cursor: &mut ReadCursor<'_>) -> Result<i16> {
    cursor.read_i16()
}

/// Appends the IEEE-754 bit pattern of `value`, big-endian.
pub fn write_float(out: &mut Vec<u8>, value: f32) {
    out.extend_from_slice(&value.to_bits().to_be_bytes());
}

/// Reads an IEEE-754 single.
pub fn read_float(cursor: &mut ReadCursor<'_>) -> Result<f32> {
    Ok(f32::from_bits(BigEndian::read_u32(cursor.read_bytes(4)?)))
}

/// Appends the IEEE-754 bit pattern of `value`, big-endian.
pub fn write_double(out: &mut Vec<u8>, value: f64) {
    out.extend_from_slice(&value.to_bits().to_be_bytes());
}

/// Reads an IEEE-754 double.
pub fn read_double(cursor: &mut ReadCursor<'_>) -> Result<f64> {
    Ok(f64::from_bits(BigEndian::read_u64(cursor.read_bytes(8)?)))
}

// --- Deflated integers ---

/// Result of inflating a deflated integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inflated<T> {
    /// The [`NULL_OBJECT`] marker.
    Null,
    /// The [`DEFAULT_OBJECT`] marker.
    Default,
    /// An actual value.
    Value(T),
}

impl<T> Inflated<T> {
    /// Returns the value, or `None` for either marker.
    pub fn value(self) -> Option<T> {
        match self {
            Self::Value(v) => Some(v),
            Self::Null | Self::Default => None,
        }
    }
}

fn deflate_bytes(bytes: &[u8], out: &mut Vec<u8>) {
    let skip = bytes.iter().take_while(|b| **b == 0).count();
    let significant = &bytes[skip..];
    out.push(significant.len() as u8);
    out.extend_from_slice(significant);
}

fn inflate_bytes<const N: usize>(cursor: &mut ReadCursor<'_>) -> Result<Inflated<[u8; N]>> {
    let size = cursor.read_u8()?;
    match size {
        NULL_OBJECT => Ok(Inflated::Null),
        DEFAULT_OBJECT => Ok(Inflated::Default),
        n if usize::from(n) <= N => {
            let significant = cursor.read_bytes(usize::from(n))?;
            let mut full = [0u8; N];
            full[N - significant.len()..].copy_from_slice(significant);
            Ok(Inflated::Value(full))
        }
        n => Err(SaveGraphError::Format(format!(
            "Deflated length {n} exceeds {N}-byte integer"
        ))),
    }
}

/// Appends `value` in deflated form: length byte plus significant bytes.
///
/// Negative values keep all four bytes, so they never collide with the
/// marker prefixes.
pub fn deflate_int(out: &mut Vec<u8>, value: i32) {
    deflate_bytes(&value.to_be_bytes(), out);
}

/// Appends `value` in deflated form.
pub fn deflate_long(out: &mut Vec<u8>, value: i64) {
    deflate_bytes(&value.to_be_bytes(), out);
}

/// Appends the [`NULL_OBJECT`] marker in place of a deflated value.
pub fn write_null(out: &mut Vec<u8>) {
    out.push(NULL_OBJECT);
}

/// Appends the [`DEFAULT_OBJECT`] marker in place of a deflated value.
pub fn write_default(out: &mut Vec<u8>) {
    out.push(DEFAULT_OBJECT);
}

/// Reads a deflated `i32`.
pub fn inflate_int(cursor: &mut ReadCursor<'_>) -> Result<Inflated<i32>> {
    Ok(match inflate_bytes::<4>(cursor)? {
        Inflated::Value(bytes) => Inflated::Value(i32::from_be_bytes(bytes)),
        Inflated::Null => Inflated::Null,
        Inflated::Default => Inflated::Default,
    })
}

/// Reads a deflated `i64`.
pub fn inflate_long(cursor: &mut ReadCursor<'_>) -> Result<Inflated<i64>> {
    Ok(match inflate_bytes::<8>(cursor)? {
        Inflated::Value(bytes) => Inflated::Value(i64::from_be_bytes(bytes)),
        Inflated::Null => Inflated::Null,
        Inflated::Default => Inflated::Default,
    })
}

// --- Strings ---

/// Appends a UTF-8 string: deflated byte length, then the bytes.
pub fn write_string(out: &mut Vec<u8>, value: &str) -> Result<()> {
    let len = i32::try_from(value.len()).map_err(|_| {
        SaveGraphError::Usage(format!("String of {} bytes is too long", value.len()))
    })?;
    deflate_int(out, len);
    out.extend_from_slice(value.as_bytes());
    Ok(())
}

/// Appends an absent string.
pub fn write_null_string(out: &mut Vec<u8>) {
    write_null(out);
}

/// A decoded string field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedString {
    /// The text, `None` when the stream held the null marker.
    pub value: Option<String>,
    /// Set when the bytes were not valid UTF-8 and Latin-1 was used instead.
    pub legacy: bool,
}

/// Reads a length-prefixed string, falling back to Latin-1 for bytes that are
/// not UTF-8.
pub fn read_string(cursor: &mut ReadCursor<'_>) -> Result<DecodedString> {
    let len = match inflate_int(cursor)? {
        Inflated::Null | Inflated::Default => {
            return Ok(DecodedString {
                value: None,
                legacy: false,
            });
        }
        Inflated::Value(len) => usize::try_from(len)
            .map_err(|_| SaveGraphError::Format(format!("Negative string length: {len}")))?,
    };
    let bytes = cursor.read_bytes(len)?;
    Ok(decode_text(bytes))
}

/// Decodes raw string bytes, choosing UTF-8 or Latin-1.
pub fn decode_text(bytes: &[u8]) -> DecodedString {
    // The scan does not model four-byte sequences; those get a strict check.
    let candidate = scan_utf8(bytes) == Utf8State::Start
        || bytes.iter().any(|b| (0xF0..=0xF4).contains(b));

    if candidate && let Ok(text) = std::str::from_utf8(bytes) {
        return DecodedString {
            value: Some(text.to_string()),
            legacy: false,
        };
    }

    DecodedString {
        value: Some(decode_latin1(bytes)),
        legacy: true,
    }
}

/// States of the single-pass UTF-8 validity scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Utf8State {
    /// Between characters.
    Start,
    /// One continuation byte expected.
    TwoByte,
    /// Two continuation bytes expected.
    ThreeByte1,
    /// One continuation byte expected, second of a three byte sequence.
    ThreeByte2,
    /// The bytes cannot be UTF-8 as modelled by this scan. Absorbing.
    Illegal,
}

/// Runs the validity scan and returns the final state.
///
/// Only a scan ending in [`Utf8State::Start`] means every multi-byte sequence
/// was completed.
pub fn scan_utf8(bytes: &[u8]) -> Utf8State {
    let mut state = Utf8State::Start;
    for &byte in bytes {
        state = match state {
            Utf8State::Start => {
                if byte < 0x80 {
                    Utf8State::Start
                } else if byte & 0xE0 == 0xC0 {
                    Utf8State::TwoByte
                } else if byte & 0xF0 == 0xE0 {
                    Utf8State::ThreeByte1
                } else {
                    Utf8State::Illegal
                }
            }
            Utf8State::TwoByte | Utf8State::ThreeByte2 => {
                if byte & 0xC0 == 0x80 {
                    Utf8State::Start
                } else {
                    Utf8State::Illegal
                }
            }
            Utf8State::ThreeByte1 => {
                if byte & 0xC0 == 0x80 {
                    Utf8State::ThreeByte2
                } else {
                    Utf8State::Illegal
                }
            }
            Utf8State::Illegal => return Utf8State::Illegal,
        };
    }
    state
}

/// Maps every byte to the code point of the same value.
pub fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}
