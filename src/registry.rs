//! Construction of objects by class name.
//!
//! The Schema Table only tells the loader *which* class an object record
//! belongs to. Turning that name into an instance goes through an explicit
//! registry of factories populated at startup by every participating type.

use std::collections::HashMap;
use std::fmt;

use crate::exportable::{ExportClass, ObjectRef};

type Factory = Box<dyn Fn() -> ObjectRef>;

/// Maps class names to zero-argument factories.
///
/// ```rust
/// use savegraph::{ClassRegistry, Exportable};
///
/// #[derive(Default, Exportable)]
/// #[savegraph(class = "demo.Marker")]
/// struct Marker {
///     label: String,
/// }
///
/// let mut registry = ClassRegistry::new();
/// registry.register::<Marker>();
/// assert!(registry.contains("demo.Marker"));
/// ```
#[derive(Default)]
pub struct ClassRegistry {
    classes: HashMap<String, Factory>,
}

impl ClassRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `T` under [`ExportClass::CLASS_NAME`], constructing instances
    /// with `T::default()`.
    ///
    /// Registering the same name again replaces the previous factory.
    pub fn register<T: ExportClass>(&mut self) -> &mut Self {
        self.register_with(T::CLASS_NAME, || ObjectRef::new(T::default()))
    }

    /// Registers an arbitrary factory under `class_name`.
    pub fn register_with<F>(&mut self, class_name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn() -> ObjectRef + 'static,
    {
        let class_name = class_name.into();
        if self.classes.contains_key(&class_name) {
            tracing::debug!(class = %class_name, "replacing registered factory");
        }
        self.classes.insert(class_name, Box::new(factory));
        self
    }

    /// Builds a new, empty instance of `class_name`.
    pub fn instantiate(&self, class_name: &str) -> Option<ObjectRef> {
        self.classes.get(class_name).map(|factory| factory())
    }

    /// Whether `class_name` is registered.
    pub fn contains(&self, class_name: &str) -> bool {
        self.classes.contains_key(class_name)
    }

    /// Number of registered classes.
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

impl fmt::Debug for ClassRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.classes.keys().collect();
        names.sort();
        f.debug_struct("ClassRegistry")
            .field("classes", &names)
            .finish()
    }
}
