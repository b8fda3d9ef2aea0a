//! Centralized error handling for savegraph.
//!
//! Errors returned through [`Result`] are the *fatal* ones: a load or export
//! that hits one of them produces no partial result. Failures that only affect
//! a single object or field while loading are not errors at all; they are
//! collected as [`Diagnostic`](crate::diagnostics::Diagnostic)s and the rest of
//! the graph keeps loading.
//!
//! ## Error Categories
//!
//! - **I/O Errors** ([`SaveGraphError::Io`]): file system and stream failures
//! - **Header Gate** ([`SaveGraphError::InvalidMagic`]): the file signature does not match
//! - **Version Gate** ([`SaveGraphError::UnsupportedVersion`]): the file was written by a newer format
//! - **Format Errors** ([`SaveGraphError::Format`]): truncated or structurally invalid tables
//! - **Unsupported** ([`SaveGraphError::Unsupported`]): a declared type tag this build does not decode
//! - **Usage Errors** ([`SaveGraphError::Usage`]): caller misuse of the writer API
//! - **Internal Errors** ([`SaveGraphError::Internal`]): broken invariants (please report)
//!
//! ## Usage
//!
//! ```rust
//! use savegraph::{ClassRegistry, SaveGraph, SaveGraphError};
//!
//! let registry = ClassRegistry::new();
//! match SaveGraph::load_bytes(b"nope", &registry) {
//!     Err(SaveGraphError::InvalidMagic { found }) => println!("not a save file: {found:?}"),
//!     Err(e) => eprintln!("other error: {e}"),
//!     Ok(_) => unreachable!(),
//! }
//! ```

use std::fmt;
use std::io;
use std::sync::Arc;

/// A specialized `Result` type for savegraph operations.
pub type Result<T> = std::result::Result<T, SaveGraphError>;

/// The master error enum covering all fatal failure domains.
///
/// This type is `Clone`; I/O errors are wrapped in `Arc` so cloning stays cheap.
#[derive(Debug, Clone)]
pub enum SaveGraphError {
    /// Low-level I/O failure (file not found, permission denied, short read...).
    Io(Arc<io::Error>),

    /// The leading signature bytes did not match byte-for-byte.
    ///
    /// `found` holds whatever was read in place of the signature (possibly
    /// shorter than the signature if the input was truncated).
    InvalidMagic {
        /// Bytes found where the signature was expected.
        found: Vec<u8>,
    },

    /// The file declares a format version newer than this build understands.
    UnsupportedVersion {
        /// Version stored in the file.
        found: i32,
        /// Highest version this build reads.
        supported: i32,
    },

    /// The file is truncated or one of its tables is structurally invalid.
    Format(String),

    /// A declared but unimplemented type tag was encountered.
    Unsupported(String),

    /// The caller misused the writer API (empty field name, empty string value,
    /// conflicting field types, bad options...). Raised before any bytes are
    /// emitted for the offending call.
    Usage(String),

    /// Logic error inside the library. Should not occur in production.
    Internal(String),
}

impl fmt::Display for SaveGraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O Error: {e}"),
            Self::InvalidMagic { found } => {
                write!(f, "Format Error: invalid file signature {found:02X?}")
            }
            Self::UnsupportedVersion { found, supported } => write!(
                f,
                "Format Error: file version {found} is newer than supported version {supported}"
            ),
            Self::Format(s) => write!(f, "Format Error: {s}"),
            Self::Unsupported(s) => write!(f, "Unsupported: {s}"),
            Self::Usage(s) => write!(f, "Usage Error: {s}"),
            Self::Internal(s) => write!(f, "Internal Logic Error: {s}"),
        }
    }
}

impl std::error::Error for SaveGraphError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for SaveGraphError {
    fn from(err: io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}
