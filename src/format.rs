//! Defines the physical binary layout of savegraph files.
//!
//! # Layout
//! All fixed-width integers are big-endian.
//!
//! ```text
//! [Magic "SGv1"] [i32 FormatVersion]
//! [Schema Table]      classes, their aliases, version stamps and field aliases
//! [Location Table]    (object id, blob offset) pairs
//! [i32 Reserved] [i32 RootObjectId]
//! [Data Blob]         per-object records addressed by offset
//! ```
//!
//! ## Object Record
//! Version 2: `[ClassAlias] [i32 DataLength] [Field Stream]`
//!
//! Version 1: `[ClassAlias] [Field Stream]`, the stream running up to the next
//! record's offset or the end of the blob.
//!
//! ## Field Stream
//! Repeated `[u8 FieldAlias] [encoded value]`, the encoding chosen by the
//! field's [`TypeTag`] in the Schema Table.

use crate::codec::ReadCursor;
use crate::error::{Result, SaveGraphError};
use byteorder::{BigEndian, WriteBytesExt};

/// Magic bytes identifying the file format.
pub const MAGIC_BYTES: [u8; 4] = *b"SGv1";

/// Highest format version this build reads, and the one it writes by default.
pub const FORMAT_VERSION: i32 = 2;

/// Oldest format version this build reads.
pub const MIN_FORMAT_VERSION: i32 = 1;

/// First version whose object records carry an explicit data length.
pub const EXPLICIT_LENGTH_VERSION: i32 = 2;

/// Returns the width in bytes of class aliases for a file holding
/// `class_count` distinct classes: `ceil(log256(class_count)) + 1`.
pub fn alias_width(class_count: usize) -> usize {
    let mut width = 0;
    let mut capacity: u128 = 1;
    while capacity < class_count as u128 {
        capacity <<= 8;
        width += 1;
    }
    width + 1
}

/// Encodes `index` as a big-endian alias of exactly `width` bytes.
pub fn encode_alias(index: usize, width: usize) -> Vec<u8> {
    let bytes = (index as u64).to_be_bytes();
    if width >= bytes.len() {
        let mut alias = vec![0u8; width - bytes.len()];
        alias.extend_from_slice(&bytes);
        alias
    } else {
        bytes[bytes.len() - width..].to_vec()
    }
}

/// Wire type of a field, stored next to each field alias in the Schema Table.
///
/// Numeric values are part of the file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
#[allow(missing_docs)]
pub enum TypeTag {
    Byte = 0,
    Byte1D = 1,
    Byte2D = 2,
    Int = 10,
    Int1D = 11,
    Int2D = 12,
    Float = 20,
    Float1D = 21,
    Float2D = 22,
    Double = 30,
    Double1D = 31,
    Double2D = 32,
    Long = 40,
    Long1D = 41,
    Long2D = 42,
    Short = 50,
    Short1D = 51,
    Short2D = 52,
    Boolean = 60,
    Boolean1D = 61,
    Boolean2D = 62,
    String = 70,
    String1D = 71,
    String2D = 72,
    BitSet = 80,
    Savable = 90,
    Savable1D = 91,
    Savable2D = 92,
    SavableArrayList = 100,
    SavableArrayList1D = 101,
    SavableArrayList2D = 102,
    SavableMap = 105,
    StringSavableMap = 106,
    IntSavableMap = 107,
    FloatBufferArrayList = 110,
    ByteBufferArrayList = 111,
    FloatBuffer = 120,
    IntBuffer = 121,
    ByteBuffer = 122,
    ShortBuffer = 123,
}

impl TypeTag {
    /// Every declared tag, in numeric order.
    pub const ALL: [TypeTag; 40] = [
        Self::Byte,
        Self::Byte1D,
        Self::Byte2D,
        Self::Int,
        Self::Int1D,
        Self::Int2D,
        Self::Float,
        Self::Float1D,
        Self::Float2D,
        Self::Double,
        Self::Double1D,
        Self::Double2D,
        Self::Long,
        Self::Long1D,
        Self::Long2D,
        Self::Short,
        Self::Short1D,
        Self::Short2D,
        Self::Boolean,
        Self::Boolean1D,
        Self::Boolean2D,
        Self::String,
        Self::String1D,
        Self::String2D,
        Self::BitSet,
        Self::Savable,
        Self::Savable1D,
        Self::Savable2D,
        Self::SavableArrayList,
        Self::SavableArrayList1D,
        Self::SavableArrayList2D,
        Self::SavableMap,
        Self::StringSavableMap,
        Self::IntSavableMap,
        Self::FloatBufferArrayList,
        Self::ByteBufferArrayList,
        Self::FloatBuffer,
        Self::IntBuffer,
        Self::ByteBuffer,
        Self::ShortBuffer,
    ];

    /// Decodes a raw tag byte. Returns `None` for undeclared values.
    pub fn from_u8(raw: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|tag| tag.as_u8() == raw)
    }

    /// Returns the raw tag byte.
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Whether this build can decode values of this type.
    pub fn is_supported(self) -> bool {
        matches!(
            self,
            Self::Boolean
                | Self::Byte
                | Self::Short
                | Self::Int
                | Self::Long
                | Self::Float
                | Self::Double
                | Self::String
                | Self::Savable
                | Self::Savable1D
                | Self::SavableArrayList
        )
    }

    /// Short human readable name, used in diagnostics and inspector output.
    pub fn name(self) -> &'static str {
        match self {
            Self::Byte => "byte",
            Self::Byte1D => "byte[]",
            Self::Byte2D => "byte[][]",
            Self::Int => "int",
            Self::Int1D => "int[]",
            Self::Int2D => "int[][]",
            Self::Float => "float",
            Self::Float1D => "float[]",
            Self::Float2D => "float[][]",
            Self::Double => "double",
            Self::Double1D => "double[]",
            Self::Double2D => "double[][]",
            Self::Long => "long",
            Self::Long1D => "long[]",
            Self::Long2D => "long[][]",
            Self::Short => "short",
            Self::Short1D => "short[]",
            Self::Short2D => "short[][]",
            Self::Boolean => "boolean",
            Self::Boolean1D => "boolean[]",
            Self::Boolean2D => "boolean[][]",
            Self::String => "string",
            Self::String1D => "string[]",
            Self::String2D => "string[][]",
            Self::BitSet => "bitset",
            Self::Savable => "object",
            Self::Savable1D => "object[]",
            Self::Savable2D => "object[][]",
            Self::SavableArrayList => "object list",
            Self::SavableArrayList1D => "object list[]",
            Self::SavableArrayList2D => "object list[][]",
            Self::SavableMap => "object map",
            Self::StringSavableMap => "string->object map",
            Self::IntSavableMap => "int->object map",
            Self::FloatBufferArrayList => "float buffer list",
            Self::ByteBufferArrayList => "byte buffer list",
            Self::FloatBuffer => "float buffer",
            Self::IntBuffer => "int buffer",
            Self::ByteBuffer => "byte buffer",
            Self::ShortBuffer => "short buffer",
        }
    }
}

/// Human readable name of a raw tag byte, including undeclared values.
pub fn tag_name(raw: u8) -> String {
    match TypeTag::from_u8(raw) {
        Some(tag) => tag.name().to_string(),
        None => format!("unknown({raw})"),
    }
}

/// The fixed prologue of every file: signature and format version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    /// Signature, always [`MAGIC_BYTES`] once validated.
    pub magic: [u8; 4],
    /// Format version the file was written with.
    pub version: i32,
}

impl FileHeader {
    /// Size of the encoded header.
    pub const SIZE: usize = 8;

    /// Creates a header for the given version.
    pub fn new(version: i32) -> Self {
        Self {
            magic: MAGIC_BYTES,
            version,
        }
    }

    /// Appends the encoded header to `out`.
    pub fn write_to(&self, out: &mut Vec<u8>) -> Result<()> {
        out.extend_from_slice(&self.magic);
        out.write_i32::<BigEndian>(self.version)?;
        Ok(())
    }

    /// Reads and validates the header.
    ///
    /// The signature is checked before anything else is parsed; a mismatch or
    /// a version outside `MIN_FORMAT_VERSION..=FORMAT_VERSION` fails the load.
    pub fn read_from(cursor: &mut ReadCursor<'_>) -> Result<Self> {
        let available = cursor.remaining().min(MAGIC_BYTES.len());
        let found = cursor.read_bytes(available)?;
        if found != MAGIC_BYTES {
            return Err(SaveGraphError::InvalidMagic {
                found: found.to_vec(),
            });
        }

        let version = cursor.read_i32()?;
        if version > FORMAT_VERSION {
            return Err(SaveGraphError::UnsupportedVersion {
                found: version,
                supported: FORMAT_VERSION,
            });
        }
        if version < MIN_FORMAT_VERSION {
            return Err(SaveGraphError::Format(format!(
                "Invalid format version: {version}"
            )));
        }

        Ok(Self {
            magic: MAGIC_BYTES,
            version,
        })
    }

    /// Whether object records carry an explicit data length.
    pub fn has_explicit_lengths(&self) -> bool {
        self.version >= EXPLICIT_LENGTH_VERSION
    }
}
