//! The high-level facade.
//!
//! [`SaveGraph`] covers the common case: default options, whole files.
//! [`SaveGraphOptions`] (via [`SaveGraph::builder`]) selects the format
//! version to write and whether loads treat diagnostics as fatal.

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use crate::error::Result;
use crate::exportable::ObjectRef;
use crate::exporter::export_graph;
use crate::format::FORMAT_VERSION;
use crate::importer::{ImportOptions, Loaded, load};
use crate::inspector::{FileReport, Inspector};
use crate::io::DataSource;
use crate::registry::ClassRegistry;

/// The main entry point for saving and loading object graphs.
#[derive(Debug)]
pub struct SaveGraph;

impl SaveGraph {
    /// Starts a configuration with default options.
    pub fn builder() -> SaveGraphOptions {
        SaveGraphOptions::default()
    }

    /// Writes the graph reachable from `root` to `path`.
    pub fn save<P: AsRef<Path>>(path: P, root: &ObjectRef) -> Result<()> {
        Self::builder().save(path, root)
    }

    /// Writes the graph reachable from `root` to `writer`.
    pub fn write<W: Write>(writer: W, root: &ObjectRef) -> Result<()> {
        Self::builder().write(writer, root)
    }

    /// Serializes the graph reachable from `root` into memory.
    pub fn serialize(root: &ObjectRef) -> Result<Vec<u8>> {
        Self::builder().serialize(root)
    }

    /// Loads the file at `path`.
    pub fn load<P: AsRef<Path>>(path: P, registry: &ClassRegistry) -> Result<Loaded> {
        Self::builder().load(path, registry)
    }

    /// Loads a file image held in memory.
    pub fn load_bytes(bytes: &[u8], registry: &ClassRegistry) -> Result<Loaded> {
        Self::builder().load_bytes(bytes, registry)
    }

    /// Loads a file image from a stream.
    pub fn read_from<R: Read>(reader: R, registry: &ClassRegistry) -> Result<Loaded> {
        Self::builder().read_from(reader, registry)
    }

    /// Describes the tables of the file at `path` without materializing objects.
    pub fn inspect<P: AsRef<Path>>(path: P) -> Result<FileReport> {
        Inspector::inspect(path)
    }

    /// Describes the tables of a file image held in memory.
    pub fn inspect_bytes(bytes: &[u8]) -> Result<FileReport> {
        Inspector::inspect_bytes(bytes)
    }
}

/// Configuration for saving and loading.
///
/// ```rust
/// use savegraph::SaveGraph;
///
/// let options = SaveGraph::builder().format_version(1).strict(true);
/// assert_eq!(options.version(), 1);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct SaveGraphOptions {
    format_version: i32,
    strict: bool,
}

impl Default for SaveGraphOptions {
    fn default() -> Self {
        Self {
            format_version: FORMAT_VERSION,
            strict: false,
        }
    }
}

impl SaveGraphOptions {
    /// Format version to write. Version 1 omits per-record lengths.
    pub fn format_version(mut self, version: i32) -> Self {
        self.format_version = version;
        self
    }

    /// Fail loads on the first diagnostic instead of returning a partial graph.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Configured format version.
    pub fn version(&self) -> i32 {
        self.format_version
    }

    /// Whether loads are strict.
    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Serializes the graph reachable from `root` into memory.
    pub fn serialize(&self, root: &ObjectRef) -> Result<Vec<u8>> {
        export_graph(root, self.format_version)
    }

    /// Writes the graph reachable from `root` to `writer`.
    pub fn write<W: Write>(&self, mut writer: W, root: &ObjectRef) -> Result<()> {
        let bytes = self.serialize(root)?;
        writer.write_all(&bytes)?;
        writer.flush()?;
        Ok(())
    }

    /// Writes the graph reachable from `root` to `path`, truncating it.
    pub fn save<P: AsRef<Path>>(&self, path: P, root: &ObjectRef) -> Result<()> {
        let path = path.as_ref();
        let bytes = self.serialize(root)?;
        let mut writer = BufWriter::new(File::create(path)?);
        writer.write_all(&bytes)?;
        writer.flush()?;
        tracing::debug!(path = %path.display(), bytes = bytes.len(), "saved");
        Ok(())
    }

    /// Loads a file image held in memory.
    pub fn load_bytes(&self, bytes: &[u8], registry: &ClassRegistry) -> Result<Loaded> {
        load(bytes, registry, self.import_options())
    }

    /// Loads the file at `path`.
    pub fn load<P: AsRef<Path>>(&self, path: P, registry: &ClassRegistry) -> Result<Loaded> {
        let source = DataSource::open(path)?;
        self.load_bytes(&source, registry)
    }

    /// Loads a file image from a stream.
    pub fn read_from<R: Read>(&self, reader: R, registry: &ClassRegistry) -> Result<Loaded> {
        let source = DataSource::from_reader(reader)?;
        self.load_bytes(&source, registry)
    }

    fn import_options(&self) -> ImportOptions {
        ImportOptions {
            strict: self.strict,
        }
    }
}
