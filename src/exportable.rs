//! The `Exportable` capability and the shared object handle.
//!
//! Any domain object that wants to live in a savegraph file implements
//! [`Exportable`]: it writes its named fields into a
//! [`WriterSession`](crate::writer::WriterSession) and populates itself back
//! from a [`ReaderContext`](crate::reader::ReaderContext). Objects reference
//! each other through [`ObjectRef`], a reference-counted handle whose
//! allocation identity is what the engine uses to detect shared and cyclic
//! references.

use std::any::Any;
use std::cell::{BorrowError, BorrowMutError, Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

use crate::error::Result;
use crate::reader::ReaderContext;
use crate::writer::WriterSession;

/// A type that can be written to and populated from a savegraph file.
///
/// Usually derived with `#[derive(Exportable)]`; see the crate docs.
pub trait Exportable: Any {
    /// Fully qualified class name, the key the [`ClassRegistry`](crate::ClassRegistry)
    /// uses to construct instances on load.
    fn class_name(&self) -> &str;

    /// Version stamps of this class, outermost level first.
    ///
    /// Stored once per class in the file and handed back through
    /// [`ReaderContext::saved_version`] so `read` can adapt to older layouts.
    fn class_versions(&self) -> &[i32] {
        &[]
    }

    /// Writes this object's fields.
    fn write(&self, out: &mut WriterSession<'_>) -> Result<()>;

    /// Populates a freshly constructed instance from its stored fields.
    fn read(&mut self, input: &mut ReaderContext<'_, '_>) -> Result<()>;
}

/// An [`Exportable`] with a registered name and a zero-argument constructor.
///
/// This is what [`ClassRegistry::register`](crate::ClassRegistry::register)
/// needs to build instances by name.
pub trait ExportClass: Exportable + Default {
    /// Name stored in the Schema Table.
    const CLASS_NAME: &'static str;
    /// Version stamps stored in the Schema Table.
    const VERSIONS: &'static [i32] = &[];
}

/// Shared handle to an exportable object.
///
/// Cloning is cheap and preserves identity. Graphs with cycles form `Rc`
/// cycles; break them explicitly if the objects must be freed before exit.
#[derive(Clone)]
pub struct ObjectRef {
    object: Rc<RefCell<dyn Exportable>>,
    any: Rc<dyn Any>,
}

impl ObjectRef {
    /// Moves `value` into a new handle.
    pub fn new<T: Exportable>(value: T) -> Self {
        Self::from_rc(Rc::new(RefCell::new(value)))
    }

    /// Wraps an existing typed handle without copying the object.
    pub fn from_rc<T: Exportable>(rc: Rc<RefCell<T>>) -> Self {
        let object: Rc<RefCell<dyn Exportable>> = rc.clone();
        Self { object, any: rc }
    }

    /// Recovers the typed handle, or `None` if the object is not a `T`.
    pub fn downcast<T: Exportable>(&self) -> Option<Rc<RefCell<T>>> {
        Rc::clone(&self.any).downcast::<RefCell<T>>().ok()
    }

    /// Whether the object is a `T`.
    pub fn is<T: Exportable>(&self) -> bool {
        self.any.is::<RefCell<T>>()
    }

    /// Immutably borrows the object.
    ///
    /// # Panics
    /// Panics if the object is currently mutably borrowed.
    pub fn borrow(&self) -> Ref<'_, dyn Exportable> {
        self.object.borrow()
    }

    /// Immutably borrows the object, failing if it is mutably borrowed.
    pub fn try_borrow(&self) -> std::result::Result<Ref<'_, dyn Exportable>, BorrowError> {
        self.object.try_borrow()
    }

    /// Mutably borrows the object.
    ///
    /// # Panics
    /// Panics if the object is currently borrowed.
    pub fn borrow_mut(&self) -> RefMut<'_, dyn Exportable> {
        self.object.borrow_mut()
    }

    /// Mutably borrows the object, failing if it is borrowed.
    pub fn try_borrow_mut(&self) -> std::result::Result<RefMut<'_, dyn Exportable>, BorrowMutError> {
        self.object.try_borrow_mut()
    }

    /// Whether both handles point to the same object.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }

    /// Address of the shared allocation, stable for the object's lifetime.
    pub fn identity(&self) -> usize {
        Rc::as_ptr(&self.any) as *const () as usize
    }
}

impl<T: Exportable> From<Rc<RefCell<T>>> for ObjectRef {
    fn from(rc: Rc<RefCell<T>>) -> Self {
        Self::from_rc(rc)
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.object.try_borrow() {
            Ok(object) => write!(f, "ObjectRef({} @ {:#x})", object.class_name(), self.identity()),
            Err(_) => write!(f, "ObjectRef(<borrowed> @ {:#x})", self.identity()),
        }
    }
}
