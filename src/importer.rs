//! Whole-file import.
//!
//! Loading happens in two stages:
//!
//! 1. **Tables.** Header, Schema Table, Location Table, reserved word and root
//!    id are parsed eagerly. Any failure here is fatal.
//! 2. **Objects.** Starting at the root, objects are materialized on demand:
//!    a record is located, its class instantiated, its fields decoded and
//!    handed to the instance's `read`. References inside `read` recurse
//!    through [`DecodeSession::read_object`].
//!
//! Each id is materialized at most once. The instance is cached *before* its
//! `read` runs, so a cycle leading back to it finds the (partially populated)
//! instance instead of recursing forever. Failures from this stage are local:
//! they become [`Diagnostic`]s and a `None` in place of the object.
//!
//! Nested `read` calls recurse at most [`MAX_EAGER_DEPTH`] levels. Deeper
//! objects are instantiated and cached at once but their `read` is queued and
//! run after the current one returns, so arbitrarily long reference chains load
//! in bounded stack space. A queued object is handed to its referrer before it
//! is populated.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::rc::Rc;

use crate::codec::ReadCursor;
use crate::diagnostics::Diagnostic;
use crate::error::{Result, SaveGraphError};
use crate::exportable::{Exportable, ObjectRef};
use crate::format::FileHeader;
use crate::location::LocationTable;
use crate::reader::{FieldValue, ReaderContext, decode_fields};
use crate::registry::ClassRegistry;
use crate::schema::{ClassAlias, SchemaTable};

/// Nesting depth up to which referenced objects are read immediately.
pub const MAX_EAGER_DEPTH: usize = 64;

/// Progress of one load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportState {
    /// Nothing parsed.
    Empty,
    /// Signature and version validated.
    HeaderChecked,
    /// Schema Table parsed.
    SchemaLoaded,
    /// Location Table parsed.
    LocationsLoaded,
    /// Root id read; the rest of the input is the blob.
    DataLoaded,
    /// Objects are being materialized.
    Reading,
    /// The root has been materialized (or failed to).
    Materialized,
}

/// Options consulted by [`load`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ImportOptions {
    /// Turn the first diagnostic into a [`SaveGraphError::Format`].
    pub strict: bool,
}

/// An instantiated object whose `read` has not run yet.
struct PendingRead {
    object_id: i32,
    instance: ObjectRef,
    class: Rc<ClassAlias>,
    fields: HashMap<u8, FieldValue>,
}

/// State shared by every object materialized during one load.
pub struct DecodeSession<'d> {
    header: FileHeader,
    schema: SchemaTable,
    locations: LocationTable,
    blob: &'d [u8],
    registry: &'d ClassRegistry,
    cache: HashMap<i32, Option<ObjectRef>>,
    diagnostics: Vec<Diagnostic>,
    materialized: usize,
    depth: usize,
    deferred: VecDeque<PendingRead>,
    state: ImportState,
}

impl<'d> DecodeSession<'d> {
    /// Parses the tables of `bytes`; nothing is materialized yet.
    pub fn open(bytes: &'d [u8], registry: &'d ClassRegistry) -> Result<(Self, i32)> {
        let mut state = ImportState::Empty;
        let mut cursor = ReadCursor::new(bytes);

        let header = FileHeader::read_from(&mut cursor)?;
        advance(&mut state, ImportState::HeaderChecked);

        let schema = SchemaTable::read_from(&mut cursor)?;
        advance(&mut state, ImportState::SchemaLoaded);

        let locations = LocationTable::read_from(&mut cursor)?;
        advance(&mut state, ImportState::LocationsLoaded);

        let _reserved = cursor.read_i32()?;
        let root_id = cursor.read_i32()?;
        let blob = cursor.rest();
        advance(&mut state, ImportState::DataLoaded);

        tracing::debug!(
            version = header.version,
            classes = schema.len(),
            objects = locations.len(),
            blob = blob.len(),
            root_id,
            "tables loaded"
        );

        let session = Self {
            header,
            schema,
            locations,
            blob,
            registry,
            cache: HashMap::new(),
            diagnostics: Vec::new(),
            materialized: 0,
            depth: 0,
            deferred: VecDeque::new(),
            state,
        };
        Ok((session, root_id))
    }

    /// Format version of the file.
    pub fn format_version(&self) -> i32 {
        self.header.version
    }

    /// The parsed Schema Table.
    pub fn schema(&self) -> &SchemaTable {
        &self.schema
    }

    /// The parsed Location Table.
    pub fn locations(&self) -> &LocationTable {
        &self.locations
    }

    /// Current stage of the load.
    pub fn state(&self) -> ImportState {
        self.state
    }

    /// Diagnostics recorded so far.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Records a local failure.
    pub fn report(&mut self, diagnostic: Diagnostic) {
        tracing::warn!(object_id = diagnostic.object_id(), "{diagnostic}");
        self.diagnostics.push(diagnostic);
    }

    fn fail(&mut self, object_id: i32, diagnostic: Diagnostic) -> Option<ObjectRef> {
        self.report(diagnostic);
        self.cache.insert(object_id, None);
        None
    }

    /// Materializes object `object_id`, or returns the cached outcome of an
    /// earlier attempt.
    pub fn read_object(&mut self, object_id: i32) -> Option<ObjectRef> {
        if let Some(cached) = self.cache.get(&object_id) {
            return cached.clone();
        }
        if self.state == ImportState::DataLoaded {
            advance(&mut self.state, ImportState::Reading);
        }

        let Some(offset) = self.locations.offset_of(object_id) else {
            return self.fail(object_id, Diagnostic::MissingLocation { object_id });
        };

        let blob = self.blob;
        let mut cursor = match ReadCursor::at(blob, offset) {
            Ok(cursor) => cursor,
            Err(e) => return self.broken(object_id, e),
        };

        let alias = match cursor.read_bytes(self.schema.alias_width()) {
            Ok(alias) => alias,
            Err(e) => return self.broken(object_id, e),
        };
        let Some(class) = self.schema.lookup_alias(alias) else {
            let alias = alias.to_vec();
            return self.fail(object_id, Diagnostic::UnknownClassAlias { object_id, alias });
        };

        let (start, end) = if self.header.has_explicit_lengths() {
            match explicit_span(&mut cursor) {
                Ok(span) => span,
                Err(e) => return self.broken(object_id, e),
            }
        } else {
            let start = cursor.offset();
            let end = self.locations.implied_end(offset, blob.len()).max(start);
            (start, end)
        };

        let Some(instance) = self.registry.instantiate(&class.class_name) else {
            let class_name = class.class_name.clone();
            return self.fail(object_id, Diagnostic::UnregisteredClass {
                object_id,
                class_name,
            });
        };

        let Some(span) = blob.get(start..end) else {
            return self.broken(
                object_id,
                SaveGraphError::Format(format!("Record span {start}..{end} outside blob")),
            );
        };
        let (fields, field_diagnostics) = decode_fields(span, &class, object_id);
        for diagnostic in field_diagnostics {
            self.report(diagnostic);
        }

        tracing::trace!(object_id, class = %class.class_name, start, end, "materializing");
        self.cache.insert(object_id, Some(instance.clone()));
        self.materialized += 1;

        let pending = PendingRead {
            object_id,
            instance: instance.clone(),
            class,
            fields,
        };
        if self.depth < MAX_EAGER_DEPTH {
            self.run_read(pending);
        } else {
            tracing::trace!(object_id, depth = self.depth, "read deferred");
            self.deferred.push_back(pending);
        }

        Some(instance)
    }

    /// Runs the object's own `read`, recording a failure as a diagnostic.
    fn run_read(&mut self, pending: PendingRead) {
        let PendingRead {
            object_id,
            instance,
            class,
            fields,
        } = pending;
        let class_name = class.class_name.clone();

        self.depth += 1;
        let outcome = match instance.try_borrow_mut() {
            Ok(mut target) => {
                let mut context = ReaderContext::new(object_id, class, fields, self);
                target.read(&mut context)
            }
            Err(_) => Err(SaveGraphError::Internal(format!(
                "Object {object_id} is already borrowed"
            ))),
        };
        self.depth -= 1;

        if let Err(e) = outcome {
            self.report(Diagnostic::ReadFailed {
                object_id,
                class_name,
                message: e.to_string(),
            });
        }
    }

    /// Runs every queued `read` until none is left.
    pub fn drain_deferred(&mut self) {
        while let Some(pending) = self.deferred.pop_front() {
            self.run_read(pending);
        }
    }

    fn broken(&mut self, object_id: i32, error: SaveGraphError) -> Option<ObjectRef> {
        let reason = error.to_string();
        self.fail(object_id, Diagnostic::BrokenRecord { object_id, reason })
    }

    /// Consumes the session, yielding its diagnostics and object count.
    fn finish(mut self) -> (Vec<Diagnostic>, usize) {
        advance(&mut self.state, ImportState::Materialized);
        (self.diagnostics, self.materialized)
    }
}

/// Reads the explicit record length and returns the field stream bounds.
fn explicit_span(cursor: &mut ReadCursor<'_>) -> Result<(usize, usize)> {
    let len = cursor.read_len("record length")?;
    let start = cursor.offset();
    if len > cursor.remaining() {
        return Err(SaveGraphError::Format(format!(
            "Record length {len} exceeds the {} bytes left in the blob",
            cursor.remaining()
        )));
    }
    Ok((start, start + len))
}

fn advance(state: &mut ImportState, next: ImportState) {
    tracing::debug!(from = ?*state, to = ?next, "import state");
    *state = next;
}

impl fmt::Debug for DecodeSession<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodeSession")
            .field("version", &self.header.version)
            .field("classes", &self.schema.len())
            .field("objects", &self.locations.len())
            .field("blob", &self.blob.len())
            .field("cached", &self.cache.len())
            .field("diagnostics", &self.diagnostics.len())
            .field("deferred", &self.deferred.len())
            .field("state", &self.state)
            .finish()
    }
}

/// The outcome of a successful load.
#[derive(Debug)]
pub struct Loaded {
    /// The root object, `None` if it could not be materialized.
    pub root: Option<ObjectRef>,
    /// Local failures, in the order they occurred.
    pub diagnostics: Vec<Diagnostic>,
    /// Format version the file was written with.
    pub format_version: i32,
    /// Number of objects materialized.
    pub materialized: usize,
}

impl Loaded {
    /// The root as a `T`, if it is one.
    pub fn root_as<T: Exportable>(&self) -> Option<Rc<RefCell<T>>> {
        self.root.as_ref()?.downcast::<T>()
    }

    /// Whether the load recorded no diagnostics.
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// Parses `bytes` and materializes the graph reachable from the root.
pub fn load(bytes: &[u8], registry: &ClassRegistry, options: ImportOptions) -> Result<Loaded> {
    let (mut session, root_id) = DecodeSession::open(bytes, registry)?;
    let format_version = session.format_version();
    let root = session.read_object(root_id);
    session.drain_deferred();
    let (diagnostics, materialized) = session.finish();

    tracing::debug!(
        materialized,
        diagnostics = diagnostics.len(),
        "import complete"
    );

    if options.strict
        && let Some(first) = diagnostics.first()
    {
        return Err(SaveGraphError::Format(format!("Strict load failed: {first}")));
    }

    Ok(Loaded {
        root,
        diagnostics,
        format_version,
        materialized,
    })
}
