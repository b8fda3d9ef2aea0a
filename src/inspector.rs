//! Tools for inspecting the physical structure of savegraph files.
//! Useful for debugging schema evolution and verifying layouts.
//!
//! Inspection parses the tables only; no class registry is needed and no
//! object is materialized.

use std::fmt;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::Serialize;

use crate::codec::ReadCursor;
use crate::error::Result;
use crate::format::{FileHeader, tag_name};
use crate::io::DataSource;
use crate::location::LocationTable;
use crate::schema::SchemaTable;

/// A structural report of one file.
#[derive(Debug, Serialize)]
pub struct FileReport {
    /// Total size of the file image.
    pub file_size: u64,
    /// Format version.
    pub format_version: i32,
    /// Width of class aliases in bytes.
    pub alias_width: usize,
    /// Root object id.
    pub root_id: i32,
    /// Size of the data blob.
    pub blob_size: u64,
    /// The Schema Table.
    pub classes: Vec<ClassInfo>,
    /// The Location Table, in offset order.
    pub objects: Vec<ObjectInfo>,
}

/// One Schema Table entry.
#[derive(Debug, Serialize)]
pub struct ClassInfo {
    /// Qualified class name.
    pub name: String,
    /// Alias bytes.
    pub alias: Vec<u8>,
    /// Hierarchy version stamps.
    pub versions: Vec<i32>,
    /// Field descriptors.
    pub fields: Vec<FieldInfo>,
}

/// One field descriptor.
#[derive(Debug, Serialize)]
pub struct FieldInfo {
    /// Field name.
    pub name: String,
    /// One-byte alias.
    pub alias: u8,
    /// Type name.
    pub type_name: String,
}

/// One Location Table entry.
#[derive(Debug, Serialize)]
pub struct ObjectInfo {
    /// Object id.
    pub id: i32,
    /// Offset inside the blob.
    pub offset: usize,
    /// Class named by the record's alias, if it resolves.
    pub class: Option<String>,
    /// Record size including alias and length prefix.
    pub span: usize,
}

/// The savegraph inspector tool.
#[derive(Debug)]
pub struct Inspector;

impl Inspector {
    /// Analyzes the file at `path`.
    pub fn inspect<P: AsRef<Path>>(path: P) -> Result<FileReport> {
        let source = DataSource::open(path)?;
        Self::inspect_bytes(&source)
    }

    /// Analyzes many files in parallel. Results keep the input order.
    pub fn inspect_batch(paths: &[PathBuf]) -> Vec<Result<FileReport>> {
        paths.par_iter().map(Self::inspect).collect()
    }

    /// Analyzes a file image held in memory.
    pub fn inspect_bytes(bytes: &[u8]) -> Result<FileReport> {
        let mut cursor = ReadCursor::new(bytes);
        let header = FileHeader::read_from(&mut cursor)?;
        let schema = SchemaTable::read_from(&mut cursor)?;
        let locations = LocationTable::read_from(&mut cursor)?;
        let _reserved = cursor.read_i32()?;
        let root_id = cursor.read_i32()?;
        let blob = cursor.rest();

        let classes = schema
            .classes()
            .map(|class| ClassInfo {
                name: class.class_name.clone(),
                alias: class.alias.clone(),
                versions: class.hierarchy_versions.clone(),
                fields: class
                    .fields()
                    .map(|field| FieldInfo {
                        name: field.name.clone(),
                        alias: field.alias,
                        type_name: tag_name(field.type_tag),
                    })
                    .collect(),
            })
            .collect();

        let mut objects: Vec<ObjectInfo> = locations
            .entries()
            .iter()
            .filter_map(|entry| {
                let offset = usize::try_from(entry.byte_offset).ok()?;
                let class = blob
                    .get(offset..offset + schema.alias_width())
                    .and_then(|alias| schema.lookup_alias(alias))
                    .map(|class| class.class_name.clone());
                let end = locations.implied_end(offset, blob.len());
                Some(ObjectInfo {
                    id: entry.object_id,
                    offset,
                    class,
                    span: end.saturating_sub(offset),
                })
            })
            .collect();
        objects.sort_by_key(|object| object.offset);

        Ok(FileReport {
            file_size: bytes.len() as u64,
            format_version: header.version,
            alias_width: schema.alias_width(),
            root_id,
            blob_size: blob.len() as u64,
            classes,
            objects,
        })
    }
}

impl fmt::Display for FileReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== SAVEGRAPH INSPECTOR REPORT ===")?;
        writeln!(f, "Format Version: {}", self.format_version)?;
        writeln!(f, "File Size:      {}b", self.file_size)?;
        writeln!(f, "Blob Size:      {}b", self.blob_size)?;
        writeln!(f, "Root Id:        {}", self.root_id)?;
        writeln!(f, "Alias Width:    {}", self.alias_width)?;

        writeln!(f, "\n[SCHEMA]")?;
        for (i, class) in self.classes.iter().enumerate() {
            let is_last = i + 1 == self.classes.len();
            class.fmt_tree(f, is_last)?;
        }

        writeln!(f, "\n[OBJECTS]")?;
        for (i, object) in self.objects.iter().enumerate() {
            let connector = if i + 1 == self.objects.len() { "└── " } else { "├── " };
            writeln!(
                f,
                "{}#{} @ {} | Size: {}b | {}",
                connector,
                object.id,
                object.offset,
                object.span,
                object.class.as_deref().unwrap_or("<unknown alias>")
            )?;
        }
        Ok(())
    }
}

impl ClassInfo {
    fn fmt_tree(&self, f: &mut fmt::Formatter<'_>, is_last: bool) -> fmt::Result {
        let connector = if is_last { "└── " } else { "├── " };
        let child_prefix = if is_last { "    " } else { "│   " };
        writeln!(
            f,
            "{}{} [alias {:02X?}] versions {:?}",
            connector, self.name, self.alias, self.versions
        )?;
        for (i, field) in self.fields.iter().enumerate() {
            let field_connector = if i + 1 == self.fields.len() { "└── " } else { "├── " };
            writeln!(
                f,
                "{}{}{} ({}) = {}",
                child_prefix, field_connector, field.name, field.alias, field.type_name
            )?;
        }
        Ok(())
    }
}
