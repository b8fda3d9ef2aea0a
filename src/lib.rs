//! # Savegraph
//!
//! A compact binary persistence engine for graphs of user-defined objects,
//! with shared and cyclic references, per-file schema aliasing and tolerant
//! schema evolution.
//!
//! ## Overview
//!
//! Savegraph stores an arbitrary object graph (scene trees, save games, asset
//! metadata) in a single self-describing file. Types opt in by implementing
//! [`Exportable`], usually through `#[derive(Exportable)]`: they write their
//! named fields on save and read them back by name on load.
//!
//! ### Key Features
//!
//! *   **Identity Preservation:** An object reachable through several paths is
//!     stored once; on load every path yields the same handle, cycles included.
//! *   **Schema Aliasing:** Class names become 1..N byte aliases and field names
//!     become one-byte aliases, so repeated names cost nothing per object.
//! *   **Tolerant Evolution:** Fields added after a file was written read back
//!     as the caller's default; unknown classes and fields only lose the part
//!     of the graph they describe and are reported as [`Diagnostic`]s.
//! *   **Lazy References:** Referenced objects are materialized the first time
//!     a `read` asks for them, then cached by id.
//!
//! ### File Format
//!
//! ```text
//! [Header] [Schema Table] [Location Table] [Reserved] [Root Id] [Data Blob]
//! ```
//!
//! All integers are big-endian. Each object record in the blob is:
//! ```text
//! [Class Alias] [Length (v2+)] [Field Alias][Value] [Field Alias][Value] ...
//! ```
//!
//! ## Usage Patterns
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use savegraph::{ClassRegistry, Exportable, ObjectRef, SaveGraph};
//!
//! #[derive(Default, Exportable)]
//! #[savegraph(class = "demo.Node", version = 1)]
//! struct Node {
//!     name: String,
//!     weight: i32,
//!     next: Option<Rc<RefCell<Node>>>,
//! }
//!
//! # fn main() -> savegraph::Result<()> {
//! let a = Rc::new(RefCell::new(Node { name: "a".into(), weight: 300, next: None }));
//! let b = Rc::new(RefCell::new(Node { name: "b".into(), weight: -1, next: Some(a.clone()) }));
//! a.borrow_mut().next = Some(b.clone());
//!
//! let bytes = SaveGraph::serialize(&ObjectRef::from_rc(a))?;
//!
//! let mut registry = ClassRegistry::new();
//! registry.register::<Node>();
//! let loaded = SaveGraph::load_bytes(&bytes, &registry)?;
//!
//! let root = loaded.root_as::<Node>().expect("root is a Node");
//! let next = root.borrow().next.clone().expect("a -> b");
//! let back = next.borrow().next.clone().expect("b -> a");
//! assert!(Rc::ptr_eq(&root, &back));
//! assert_eq!(root.borrow().weight, 300);
//! # Ok(())
//! # }
//! ```
//!
//! ## Safety and Error Handling
//!
//! * **Encapsulated Unsafe:** `unsafe` is used only to memory-map input files
//!   in the [`io`] module.
//! * **No Panics:** No `unwrap()` or `panic!()` calls in the library (enforced by clippy lints).
//! * **Fatal vs. Local:** Structural failures are [`SaveGraphError`]s and abort a
//!   load; per-object failures are [`Diagnostic`]s on the [`Loaded`] result.

#![deny(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]
#![warn(missing_docs)]

// --- PUBLIC API MODULES ---
pub mod api;
pub mod codec;
pub mod diagnostics;
pub mod error;
pub mod exportable;
pub mod format;
pub mod inspector;
pub mod location;
pub mod reader;
pub mod registry;
pub mod schema;
pub mod writer;

// --- INTERNAL IMPLEMENTATION MODULES (Hidden from Docs) ---
#[doc(hidden)]
pub mod exporter;
#[doc(hidden)]
pub mod importer;
#[doc(hidden)]
pub mod io;

// Private modules
mod field_impls;

// --- RE-EXPORTS ---

pub use api::{SaveGraph, SaveGraphOptions};
pub use diagnostics::Diagnostic;
pub use error::{Result, SaveGraphError};
pub use exportable::{ExportClass, Exportable, ObjectRef};
pub use field_impls::ExportField;
pub use importer::Loaded;
pub use inspector::{FileReport, Inspector};
pub use reader::ReaderContext;
pub use registry::ClassRegistry;
pub use writer::WriterSession;

// Re-export the derive macro so it is accessible as `savegraph::Exportable`
pub use savegraph_derive::Exportable;
