//! The Location Table: object id to byte offset inside the data blob.
//!
//! Offsets are handed out in increasing order at write time but are consulted
//! in any order at read time. For files without explicit record lengths the
//! table also bounds each record: it ends where the next greater offset begins,
//! and the record with the greatest offset ends at the end of the blob.

use std::collections::HashMap;

use byteorder::{BigEndian, WriteBytesExt};

use crate::codec::ReadCursor;
use crate::error::{Result, SaveGraphError};

/// One `(object id, offset)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocationEntry {
    /// Object id referenced by field streams.
    pub object_id: i32,
    /// Offset of the object record, relative to the start of the blob.
    pub byte_offset: i32,
}

/// Random-access index over the data blob.
#[derive(Debug, Clone, Default)]
pub struct LocationTable {
    entries: Vec<LocationEntry>,
    by_id: HashMap<i32, usize>,
    sorted_offsets: Vec<usize>,
}

impl LocationTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry. Fails on a duplicate id or a negative offset.
    pub fn push(&mut self, object_id: i32, byte_offset: i32) -> Result<()> {
        let offset = usize::try_from(byte_offset).map_err(|_| {
            SaveGraphError::Format(format!(
                "Object {object_id} has negative offset {byte_offset}"
            ))
        })?;
        if self.by_id.contains_key(&object_id) {
            return Err(SaveGraphError::Format(format!(
                "Object {object_id} listed twice in location table"
            )));
        }

        self.by_id.insert(object_id, offset);
        self.entries.push(LocationEntry {
            object_id,
            byte_offset,
        });
        if let Err(pos) = self.sorted_offsets.binary_search(&offset) {
            self.sorted_offsets.insert(pos, offset);
        }
        Ok(())
    }

    /// Offset of an object's record, if listed.
    pub fn offset_of(&self, object_id: i32) -> Option<usize> {
        self.by_id.get(&object_id).copied()
    }

    /// End of the record starting at `offset` when records carry no length:
    /// the next greater listed offset, or `blob_len` for the last record.
    pub fn implied_end(&self, offset: usize, blob_len: usize) -> usize {
        let next = match self.sorted_offsets.binary_search(&offset) {
            Ok(pos) => pos + 1,
            Err(pos) => pos,
        };
        self.sorted_offsets
            .get(next)
            .copied()
            .unwrap_or(blob_len)
            .min(blob_len)
    }

    /// Entries in table order.
    pub fn entries(&self) -> &[LocationEntry] {
        &self.entries
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Appends the encoded table.
    pub fn write_to(&self, out: &mut Vec<u8>) -> Result<()> {
        out.write_i32::<BigEndian>(self.entries.len() as i32)?;
        for entry in &self.entries {
            out.write_i32::<BigEndian>(entry.object_id)?;
            out.write_i32::<BigEndian>(entry.byte_offset)?;
        }
        Ok(())
    }

    /// Parses the table.
    pub fn read_from(cursor: &mut ReadCursor<'_>) -> Result<Self> {
        let count = cursor.read_len("location count")?;
        let mut table = Self::new();
        for _ in 0..count {
            let object_id = cursor.read_i32()?;
            let byte_offset = cursor.read_i32()?;
            table.push(object_id, byte_offset)?;
        }
        Ok(table)
    }
}
