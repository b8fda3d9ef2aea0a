//! The Reader Context.
//!
//! Decodes one object's field stream into an alias-keyed map and serves it to
//! the object's [`Exportable::read`](crate::Exportable::read) through typed,
//! name-addressed accessors. Every accessor takes a caller default which is
//! returned whenever the field is unknown to the file's schema or absent from
//! this object's stream; that is how files written before a field existed
//! keep loading.
//!
//! References are kept as [`Ref::Unresolved`] ids until first read, then
//! resolved through the session's content cache and memoized in place.

use std::any::type_name;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::str::FromStr;

use crate::codec::{self, Inflated, ReadCursor};
use crate::diagnostics::Diagnostic;
use crate::error::{Result, SaveGraphError};
use crate::exportable::{Exportable, ObjectRef};
use crate::format::TypeTag;
use crate::importer::DecodeSession;
use crate::schema::ClassAlias;

/// A reference to another object, resolved at most once.
#[derive(Debug, Clone)]
pub enum Ref {
    /// Id not looked up yet.
    Unresolved(i32),
    /// Outcome of the lookup; `None` for null references and objects that
    /// failed to materialize.
    Resolved(Option<ObjectRef>),
}

impl Ref {
    /// Resolves the reference through `session`, replacing the id with the
    /// result so later calls return the same handle without another lookup.
    pub fn resolve(&mut self, session: &mut DecodeSession<'_>) -> Option<ObjectRef> {
        match self {
            Self::Resolved(object) => object.clone(),
            Self::Unresolved(id) => {
                let object = session.read_object(*id);
                *self = Self::Resolved(object.clone());
                object
            }
        }
    }
}

/// One decoded field value.
#[derive(Debug, Clone)]
#[allow(missing_docs)]
pub enum FieldValue {
    Bool(bool),
    Byte(u8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Str(Option<String>),
    Ref(Ref),
    RefArray(Option<Vec<Ref>>),
    /// The writer asked for the reader's default.
    Default,
}

fn decode_ref(cursor: &mut ReadCursor<'_>) -> Result<Ref> {
    Ok(match codec::inflate_int(cursor)? {
        Inflated::Value(id) => Ref::Unresolved(id),
        Inflated::Null | Inflated::Default => Ref::Resolved(None),
    })
}

/// Decodes exactly one value of type `tag`. The flag reports a Latin-1 fallback.
fn decode_value(cursor: &mut ReadCursor<'_>, tag: TypeTag) -> Result<(FieldValue, bool)> {
    let value = match tag {
        TypeTag::Boolean => FieldValue::Bool(codec::read_bool(cursor)?),
        TypeTag::Byte => FieldValue::Byte(codec::read_byte(cursor)?),
        TypeTag::Short => FieldValue::Short(codec::read_short(cursor)?),
        TypeTag::Int => match codec::inflate_int(cursor)? {
            Inflated::Value(v) => FieldValue::Int(v),
            Inflated::Null | Inflated::Default => FieldValue::Default,
        },
        TypeTag::Long => match codec::inflate_long(cursor)? {
            Inflated::Value(v) => FieldValue::Long(v),
            Inflated::Null | Inflated::Default => FieldValue::Default,
        },
        TypeTag::Float => FieldValue::Float(codec::read_float(cursor)?),
        TypeTag::Double => FieldValue::Double(codec::read_double(cursor)?),
        TypeTag::String => {
            let decoded = codec::read_string(cursor)?;
            return Ok((FieldValue::Str(decoded.value), decoded.legacy));
        }
        TypeTag::Savable => match codec::inflate_int(cursor)? {
            Inflated::Value(id) => FieldValue::Ref(Ref::Unresolved(id)),
            Inflated::Null => FieldValue::Ref(Ref::Resolved(None)),
            Inflated::Default => FieldValue::Default,
        },
        TypeTag::Savable1D | TypeTag::SavableArrayList => match codec::inflate_int(cursor)? {
            Inflated::Null => FieldValue::RefArray(None),
            Inflated::Default => FieldValue::Default,
            Inflated::Value(count) => {
                let count = usize::try_from(count).map_err(|_| {
                    SaveGraphError::Format(format!("Negative array length: {count}"))
                })?;
                let mut refs = Vec::with_capacity(count.min(cursor.remaining()));
                for _ in 0..count {
                    refs.push(decode_ref(cursor)?);
                }
                FieldValue::RefArray(Some(refs))
            }
        },
        other => {
            return Err(SaveGraphError::Unsupported(format!(
                "Type '{}' cannot be decoded",
                other.name()
            )));
        }
    };
    Ok((value, false))
}

/// Decodes the field stream `span` of object `object_id`.
///
/// Decoding stops at the first field whose alias is unknown, whose type is
/// unsupported or whose value is malformed, since the length of that value
/// cannot be known; fields decoded up to that point are kept.
pub fn decode_fields(
    span: &[u8],
    class: &ClassAlias,
    object_id: i32,
) -> (HashMap<u8, FieldValue>, Vec<Diagnostic>) {
    let mut values = HashMap::new();
    let mut diagnostics = Vec::new();
    let mut cursor = ReadCursor::new(span);

    while !cursor.is_at_end() {
        let alias = match cursor.read_u8() {
            Ok(alias) => alias,
            Err(_) => break,
        };

        let Some(field) = class.field_by_alias(alias) else {
            diagnostics.push(Diagnostic::UnknownFieldAlias {
                object_id,
                class_name: class.class_name.clone(),
                alias,
            });
            break;
        };

        let unsupported = || Diagnostic::UnsupportedField {
            object_id,
            class_name: class.class_name.clone(),
            field: field.name.clone(),
            type_tag: field.type_tag,
        };

        let Some(tag) = field.tag() else {
            diagnostics.push(unsupported());
            break;
        };

        match decode_value(&mut cursor, tag) {
            Ok((value, legacy)) => {
                if legacy {
                    diagnostics.push(Diagnostic::LegacyEncoding {
                        object_id,
                        class_name: class.class_name.clone(),
                        field: field.name.clone(),
                    });
                }
                values.insert(alias, value);
            }
            Err(SaveGraphError::Unsupported(_)) => {
                diagnostics.push(unsupported());
                break;
            }
            Err(e) => {
                diagnostics.push(Diagnostic::MalformedField {
                    object_id,
                    class_name: class.class_name.clone(),
                    field: field.name.clone(),
                    reason: e.to_string(),
                });
                break;
            }
        }
    }

    (values, diagnostics)
}

/// Name-addressable view of one object's decoded fields.
#[derive(Debug)]
pub struct ReaderContext<'s, 'd> {
    object_id: i32,
    class: Rc<ClassAlias>,
    fields: HashMap<u8, FieldValue>,
    session: &'s mut DecodeSession<'d>,
}

impl<'s, 'd> ReaderContext<'s, 'd> {
    /// Wraps an already decoded field map.
    pub fn new(
        object_id: i32,
        class: Rc<ClassAlias>,
        fields: HashMap<u8, FieldValue>,
        session: &'s mut DecodeSession<'d>,
    ) -> Self {
        Self {
            object_id,
            class,
            fields,
            session,
        }
    }

    /// Id of the object being read.
    pub fn object_id(&self) -> i32 {
        self.object_id
    }

    /// Class name recorded in the file.
    pub fn class_name(&self) -> &str {
        &self.class.class_name
    }

    /// Version stamps recorded for this object's class.
    pub fn hierarchy_versions(&self) -> &[i32] {
        &self.class.hierarchy_versions
    }

    /// Version stamp recorded for hierarchy `level`, 0 if the file has none.
    pub fn saved_version(&self, level: usize) -> i32 {
        self.class.version_at(level)
    }

    /// Format version of the file being read.
    pub fn format_version(&self) -> i32 {
        self.session.format_version()
    }

    /// Whether the object's stream holds a value for `name`.
    pub fn has_field(&self, name: &str) -> bool {
        self.class
            .field_by_name(name)
            .is_some_and(|field| self.fields.contains_key(&field.alias))
    }

    fn value(&self, name: &str) -> Option<&FieldValue> {
        let alias = self.class.field_by_name(name)?.alias;
        self.fields.get(&alias)
    }

    fn mismatch(&mut self, name: &str, expected: &str) {
        let diagnostic = Diagnostic::TypeMismatch {
            object_id: self.object_id,
            class_name: self.class.class_name.clone(),
            field: name.to_string(),
            expected: expected.to_string(),
        };
        self.session.report(diagnostic);
    }

    /// Runs `extract` on a present, non-default value; reports a mismatch when
    /// it yields nothing.
    fn lookup<T>(
        &mut self,
        name: &str,
        expected: &str,
        extract: impl FnOnce(&FieldValue) -> Option<T>,
    ) -> Option<T> {
        let outcome = match self.value(name) {
            None | Some(FieldValue::Default) => return None,
            Some(value) => extract(value),
        };
        if outcome.is_none() {
            self.mismatch(name, expected);
        }
        outcome
    }

    /// Reads a boolean field.
    pub fn read_bool(&mut self, name: &str, default: bool) -> bool {
        self.lookup(name, "boolean", |v| match v {
            FieldValue::Bool(b) => Some(*b),
            _ => None,
        })
        .unwrap_or(default)
    }

    /// Reads a byte field.
    pub fn read_byte(&mut self, name: &str, default: u8) -> u8 {
        self.lookup(name, "byte", |v| match v {
            FieldValue::Byte(b) => Some(*b),
            _ => None,
        })
        .unwrap_or(default)
    }

    /// Reads a short field.
    pub fn read_short(&mut self, name: &str, default: i16) -> i16 {
        self.lookup(name, "short", |v| match v {
            FieldValue::Short(s) => Some(*s),
            _ => None,
        })
        .unwrap_or(default)
    }

    /// Reads an int field.
    pub fn read_int(&mut self, name: &str, default: i32) -> i32 {
        self.lookup(name, "int", |v| match v {
            FieldValue::Int(i) => Some(*i),
            _ => None,
        })
        .unwrap_or(default)
    }

    /// Reads a long field.
    pub fn read_long(&mut self, name: &str, default: i64) -> i64 {
        self.lookup(name, "long", |v| match v {
            FieldValue::Long(l) => Some(*l),
            _ => None,
        })
        .unwrap_or(default)
    }

    /// Reads a float field.
    pub fn read_float(&mut self, name: &str, default: f32) -> f32 {
        self.lookup(name, "float", |v| match v {
            FieldValue::Float(f) => Some(*f),
            _ => None,
        })
        .unwrap_or(default)
    }

    /// Reads a double field.
    pub fn read_double(&mut self, name: &str, default: f64) -> f64 {
        self.lookup(name, "double", |v| match v {
            FieldValue::Double(d) => Some(*d),
            _ => None,
        })
        .unwrap_or(default)
    }

    /// Reads a string field; a stored null also yields `default`.
    pub fn read_string(&mut self, name: &str, default: &str) -> String {
        self.read_string_opt(name)
            .unwrap_or_else(|| default.to_string())
    }

    /// Reads a string field, `None` when absent or stored as null.
    pub fn read_string_opt(&mut self, name: &str) -> Option<String> {
        self.lookup(name, "string", |v| match v {
            FieldValue::Str(s) => Some(s.clone()),
            _ => None,
        })
        .flatten()
    }

    /// Reads an enum-like value stored by name.
    pub fn read_enum<E: FromStr>(&mut self, name: &str, default: E) -> E {
        let Some(text) = self.read_string_opt(name) else {
            return default;
        };
        match text.parse() {
            Ok(value) => value,
            Err(_) => {
                self.mismatch(name, type_name::<E>());
                default
            }
        }
    }

    /// Reads a reference, materializing the target on first access.
    ///
    /// A stored null yields `None`; an absent field yields `default`.
    pub fn read_exportable(&mut self, name: &str, default: Option<ObjectRef>) -> Option<ObjectRef> {
        let Some(alias) = self.class.field_by_name(name).map(|f| f.alias) else {
            return default;
        };

        let session = &mut *self.session;
        let outcome = match self.fields.get_mut(&alias) {
            None | Some(FieldValue::Default) => return default,
            Some(FieldValue::Ref(reference)) => Some(reference.resolve(session)),
            Some(_) => None,
        };

        match outcome {
            Some(object) => object,
            None => {
                self.mismatch(name, "object");
                default
            }
        }
    }

    /// Reads a reference to a `T`.
    ///
    /// A target of another type is reported as a mismatch and yields `None`.
    pub fn read_exportable_as<T: Exportable>(&mut self, name: &str) -> Option<Rc<RefCell<T>>> {
        let object = self.read_exportable(name, None)?;
        let typed = object.downcast::<T>();
        if typed.is_none() {
            self.mismatch(name, type_name::<T>());
        }
        typed
    }

    /// Reads an array or list of references, materializing each target on
    /// first access. A stored null array yields `default`.
    pub fn read_exportable_array(
        &mut self,
        name: &str,
        default: Vec<Option<ObjectRef>>,
    ) -> Vec<Option<ObjectRef>> {
        let Some(alias) = self.class.field_by_name(name).map(|f| f.alias) else {
            return default;
        };

        let session = &mut *self.session;
        let outcome = match self.fields.get_mut(&alias) {
            None | Some(FieldValue::Default) | Some(FieldValue::RefArray(None)) => return default,
            Some(FieldValue::RefArray(Some(refs))) => {
                Some(refs.iter_mut().map(|r| r.resolve(session)).collect())
            }
            Some(_) => None,
        };

        match outcome {
            Some(objects) => objects,
            None => {
                self.mismatch(name, "object array");
                default
            }
        }
    }

    /// Reads a list of references to `T`, dropping null elements.
    ///
    /// Elements of another type are reported as a mismatch and dropped.
    pub fn read_exportable_list_as<T: Exportable>(&mut self, name: &str) -> Vec<Rc<RefCell<T>>> {
        let objects = self.read_exportable_array(name, Vec::new());
        let mut typed = Vec::with_capacity(objects.len());
        let mut mismatched = false;
        for object in objects.into_iter().flatten() {
            match object.downcast::<T>() {
                Some(t) => typed.push(t),
                None => mismatched = true,
            }
        }
        if mismatched {
            self.mismatch(name, type_name::<T>());
        }
        typed
    }
}
