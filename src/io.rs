//! Byte sources for loading.
//!
//! Files are memory-mapped so that opening a large save does not copy it;
//! the decode path only ever borrows `&[u8]` from the source.

use std::fs::File;
use std::io::Read;
use std::ops::Deref;
use std::path::Path;

use memmap2::Mmap;

use crate::error::Result;

/// The bytes of one file, mapped or owned.
#[derive(Debug)]
pub enum DataSource {
    /// Memory-mapped file contents.
    Mapped(Mmap),
    /// Bytes read from a stream or handed in by the caller.
    Memory(Vec<u8>),
}

impl DataSource {
    /// Maps the file at `path` read-only.
    ///
    /// Empty files cannot be mapped on every platform and are read instead.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        if file.metadata()?.len() == 0 {
            return Ok(Self::Memory(Vec::new()));
        }

        // Safety: Mmap is fundamentally unsafe as external processes could modify the file.
        // Files are treated as immutable for the duration of a load.
        #[allow(unsafe_code)]
        let mmap = unsafe { Mmap::map(&file)? };
        tracing::debug!(path = %path.display(), bytes = mmap.len(), "mapped file");
        Ok(Self::Mapped(mmap))
    }

    /// Drains `reader` into memory.
    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Ok(Self::Memory(bytes))
    }
}

impl Deref for DataSource {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            Self::Mapped(mmap) => mmap,
            Self::Memory(bytes) => bytes,
        }
    }
}
