//! Local failures observed while loading.
//!
//! None of these abort a load. The affected object resolves to `None` or the
//! affected field to the caller's default, and the failure is recorded here so
//! callers can tell a clean load from a partial one.

use std::fmt;

use serde::Serialize;

/// One local failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// A reference points to an id missing from the Location Table.
    MissingLocation {
        /// Referenced id.
        object_id: i32,
    },
    /// The record's class alias is not in the Schema Table.
    UnknownClassAlias {
        /// Object being materialized.
        object_id: i32,
        /// Alias bytes found in the record.
        alias: Vec<u8>,
    },
    /// The class is in the file but no factory is registered for it.
    UnregisteredClass {
        /// Object being materialized.
        object_id: i32,
        /// Class name from the Schema Table.
        class_name: String,
    },
    /// The object record itself could not be parsed (bad offset, length...).
    BrokenRecord {
        /// Object being materialized.
        object_id: i32,
        /// What went wrong.
        reason: String,
    },
    /// A field alias in the stream has no descriptor. Decoding of the rest of
    /// the object's stream stops here.
    UnknownFieldAlias {
        /// Object being decoded.
        object_id: i32,
        /// Its class.
        class_name: String,
        /// Alias found in the stream.
        alias: u8,
    },
    /// A field's type cannot be decoded by this build. Decoding of the rest of
    /// the object's stream stops here.
    UnsupportedField {
        /// Object being decoded.
        object_id: i32,
        /// Its class.
        class_name: String,
        /// Field name.
        field: String,
        /// Raw type tag.
        type_tag: u8,
    },
    /// A field value was truncated or malformed. Decoding of the rest of the
    /// object's stream stops here.
    MalformedField {
        /// Object being decoded.
        object_id: i32,
        /// Its class.
        class_name: String,
        /// Field name.
        field: String,
        /// What went wrong.
        reason: String,
    },
    /// A string was not valid UTF-8 and was decoded as Latin-1.
    LegacyEncoding {
        /// Object being decoded.
        object_id: i32,
        /// Its class.
        class_name: String,
        /// Field name.
        field: String,
    },
    /// A typed accessor found a value of another type; the default was used.
    TypeMismatch {
        /// Object being read.
        object_id: i32,
        /// Its class.
        class_name: String,
        /// Field name.
        field: String,
        /// What the accessor expected.
        expected: String,
    },
    /// The object's own `read` returned an error. The instance stays in the
    /// graph, populated up to the failure.
    ReadFailed {
        /// Object being read.
        object_id: i32,
        /// Its class.
        class_name: String,
        /// The error message.
        message: String,
    },
}

impl Diagnostic {
    /// The object the failure belongs to.
    pub fn object_id(&self) -> i32 {
        match self {
            Self::MissingLocation { object_id }
            | Self::UnknownClassAlias { object_id, .. }
            | Self::UnregisteredClass { object_id, .. }
            | Self::BrokenRecord { object_id, .. }
            | Self::UnknownFieldAlias { object_id, .. }
            | Self::UnsupportedField { object_id, .. }
            | Self::MalformedField { object_id, .. }
            | Self::LegacyEncoding { object_id, .. }
            | Self::TypeMismatch { object_id, .. }
            | Self::ReadFailed { object_id, .. } => *object_id,
        }
    }

    /// Whether the whole object was lost, as opposed to one of its fields.
    pub fn is_object_level(&self) -> bool {
        matches!(
            self,
            Self::MissingLocation { .. }
                | Self::UnknownClassAlias { .. }
                | Self::UnregisteredClass { .. }
                | Self::BrokenRecord { .. }
        )
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingLocation { object_id } => {
                write!(f, "object {object_id}: not in location table")
            }
            Self::UnknownClassAlias { object_id, alias } => {
                write!(f, "object {object_id}: unknown class alias {alias:02X?}")
            }
            Self::UnregisteredClass {
                object_id,
                class_name,
            } => write!(f, "object {object_id}: no factory registered for '{class_name}'"),
            Self::BrokenRecord { object_id, reason } => {
                write!(f, "object {object_id}: broken record: {reason}")
            }
            Self::UnknownFieldAlias {
                object_id,
                class_name,
                alias,
            } => write!(
                f,
                "object {object_id} ({class_name}): unknown field alias {alias}"
            ),
            Self::UnsupportedField {
                object_id,
                class_name,
                field,
                type_tag,
            } => write!(
                f,
                "object {object_id} ({class_name}): field '{field}' has unsupported type {}",
                crate::format::tag_name(*type_tag)
            ),
            Self::MalformedField {
                object_id,
                class_name,
                field,
                reason,
            } => write!(
                f,
                "object {object_id} ({class_name}): field '{field}' is malformed: {reason}"
            ),
            Self::LegacyEncoding {
                object_id,
                class_name,
                field,
            } => write!(
                f,
                "object {object_id} ({class_name}): field '{field}' is not UTF-8, decoded as Latin-1"
            ),
            Self::TypeMismatch {
                object_id,
                class_name,
                field,
                expected,
            } => write!(
                f,
                "object {object_id} ({class_name}): field '{field}' is not {expected}"
            ),
            Self::ReadFailed {
                object_id,
                class_name,
                message,
            } => write!(f, "object {object_id} ({class_name}): read failed: {message}"),
        }
    }
}
