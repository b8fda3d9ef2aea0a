//! The Writer Session.
//!
//! One session serializes the named fields of one object into that object's
//! field stream. Field names are replaced by one-byte aliases recorded in the
//! class's schema entry; nested objects are replaced by object ids and handed
//! to the [exporter](crate::exporter) to be written as records of their own.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt::Display;

use crate::codec;
use crate::error::{Result, SaveGraphError};
use crate::exportable::ObjectRef;
use crate::format::TypeTag;
use crate::schema::FieldDescriptor;

/// Schema entry under construction for one class.
#[derive(Debug)]
pub(crate) struct ClassBuilder {
    pub(crate) class_name: String,
    pub(crate) versions: Vec<i32>,
    pub(crate) fields: Vec<FieldDescriptor>,
    by_name: HashMap<String, usize>,
}

impl ClassBuilder {
    pub(crate) fn new(class_name: String, versions: Vec<i32>) -> Self {
        Self {
            class_name,
            versions,
            fields: Vec::new(),
            by_name: HashMap::new(),
        }
    }

    /// Returns the alias of `name`, assigning the next free one on first use.
    fn field_alias(&mut self, name: &str, tag: TypeTag) -> Result<u8> {
        if let Some(field) = self.by_name.get(name).and_then(|i| self.fields.get(*i)) {
            if field.type_tag != tag.as_u8() {
                return Err(SaveGraphError::Usage(format!(
                    "Field '{name}' of '{}' written as {} and as {}",
                    self.class_name,
                    crate::format::tag_name(field.type_tag),
                    tag.name()
                )));
            }
            return Ok(field.alias);
        }

        let alias = u8::try_from(self.fields.len()).map_err(|_| {
            SaveGraphError::Usage(format!(
                "Class '{}' writes more than 256 distinct fields",
                self.class_name
            ))
        })?;
        self.by_name.insert(name.to_string(), self.fields.len());
        self.fields.push(FieldDescriptor::new(name, alias, tag));
        Ok(alias)
    }
}

/// Object ids handed out during one export, keyed by allocation identity.
#[derive(Debug, Default)]
pub(crate) struct ObjectIds {
    ids: HashMap<usize, i32>,
    pending: VecDeque<(i32, ObjectRef)>,
    next: i32,
}

impl ObjectIds {
    pub(crate) fn new() -> Self {
        Self {
            next: 1,
            ..Self::default()
        }
    }

    /// Returns the id of `object`, queueing it for writing when first seen.
    pub(crate) fn id_for(&mut self, object: &ObjectRef) -> Result<i32> {
        let identity = object.identity();
        if let Some(id) = self.ids.get(&identity) {
            return Ok(*id);
        }

        let id = self.next;
        self.next = id
            .checked_add(1)
            .ok_or_else(|| SaveGraphError::Usage("Object graph exceeds i32 ids".into()))?;
        self.ids.insert(identity, id);
        self.pending.push_back((id, object.clone()));
        Ok(id)
    }

    pub(crate) fn next_pending(&mut self) -> Option<(i32, ObjectRef)> {
        self.pending.pop_front()
    }
}

/// Serializes one object's fields.
///
/// Every `write_*` call validates its arguments before emitting anything and
/// appends `[field alias][encoded value]` to the object's stream. There is no
/// rollback: an error aborts the whole export.
#[derive(Debug)]
pub struct WriterSession<'e> {
    class: &'e mut ClassBuilder,
    ids: &'e mut ObjectIds,
    buffer: Vec<u8>,
    written: HashSet<u8>,
}

impl<'e> WriterSession<'e> {
    pub(crate) fn new(class: &'e mut ClassBuilder, ids: &'e mut ObjectIds) -> Self {
        Self {
            class,
            ids,
            buffer: Vec::new(),
            written: HashSet::new(),
        }
    }

    pub(crate) fn finish(self) -> Vec<u8> {
        self.buffer
    }

    /// Class of the object being written.
    pub fn class_name(&self) -> &str {
        &self.class.class_name
    }

    /// Bytes emitted so far for this object.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Returns true if nothing was written yet.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    fn begin_field(&mut self, name: &str, tag: TypeTag) -> Result<()> {
        if name.is_empty() {
            return Err(SaveGraphError::Usage(format!(
                "Empty field name in '{}'",
                self.class.class_name
            )));
        }
        let alias = self.class.field_alias(name, tag)?;
        if !self.written.insert(alias) {
            return Err(SaveGraphError::Usage(format!(
                "Field '{name}' of '{}' written twice",
                self.class.class_name
            )));
        }
        self.buffer.push(alias);
        Ok(())
    }

    /// Writes a boolean field.
    pub fn write_bool(&mut self, name: &str, value: bool) -> Result<()> {
        self.begin_field(name, TypeTag::Boolean)?;
        codec::write_bool(&mut self.buffer, value);
        Ok(())
    }

    /// Writes a byte field.
    pub fn write_byte(&mut self, name: &str, value: u8) -> Result<()> {
        self.begin_field(name, TypeTag::Byte)?;
        codec::write_byte(&mut self.buffer, value);
        Ok(())
    }

    /// Writes a short field.
    pub fn write_short(&mut self, name: &str, value: i16) -> Result<()> {
        self.begin_field(name, TypeTag::Short)?;
        codec::write_short(&mut self.buffer, value);
        Ok(())
    }

    /// Writes an int field in deflated form.
    pub fn write_int(&mut self, name: &str, value: i32) -> Result<()> {
        self.begin_field(name, TypeTag::Int)?;
        codec::deflate_int(&mut self.buffer, value);
        Ok(())
    }

    /// Writes a long field in deflated form.
    pub fn write_long(&mut self, name: &str, value: i64) -> Result<()> {
        self.begin_field(name, TypeTag::Long)?;
        codec::deflate_long(&mut self.buffer, value);
        Ok(())
    }

    /// Writes a float field.
    pub fn write_float(&mut self, name: &str, value: f32) -> Result<()> {
        self.begin_field(name, TypeTag::Float)?;
        codec::write_float(&mut self.buffer, value);
        Ok(())
    }

    /// Writes a double field.
    pub fn write_double(&mut self, name: &str, value: f64) -> Result<()> {
        self.begin_field(name, TypeTag::Double)?;
        codec::write_double(&mut self.buffer, value);
        Ok(())
    }

    /// Writes a string field. An empty value is a usage error.
    pub fn write_string(&mut self, name: &str, value: &str) -> Result<()> {
        if value.is_empty() {
            return Err(SaveGraphError::Usage(format!(
                "Empty string value for field '{name}' of '{}'",
                self.class.class_name
            )));
        }
        self.begin_field(name, TypeTag::String)?;
        codec::write_string(&mut self.buffer, value)
    }

    /// Writes a string field holding the null marker.
    pub fn write_null_string(&mut self, name: &str) -> Result<()> {
        self.begin_field(name, TypeTag::String)?;
        codec::write_null_string(&mut self.buffer);
        Ok(())
    }

    /// Writes an enum-like value by its `Display` name.
    pub fn write_enum<E: Display + ?Sized>(&mut self, name: &str, value: &E) -> Result<()> {
        self.write_string(name, &value.to_string())
    }

    /// Writes a reference to another object, or the null marker.
    pub fn write_exportable(&mut self, name: &str, value: Option<&ObjectRef>) -> Result<()> {
        self.begin_field(name, TypeTag::Savable)?;
        self.write_ref(value)
    }

    /// Writes an array of references; elements may be `None`.
    pub fn write_exportable_array(&mut self, name: &str, values: &[Option<ObjectRef>]) -> Result<()> {
        self.begin_field(name, TypeTag::Savable1D)?;
        self.write_count(values.len())?;
        for value in values {
            self.write_ref(value.as_ref())?;
        }
        Ok(())
    }

    /// Writes a list of references.
    pub fn write_exportable_list(&mut self, name: &str, values: &[ObjectRef]) -> Result<()> {
        self.begin_field(name, TypeTag::SavableArrayList)?;
        self.write_count(values.len())?;
        for value in values {
            self.write_ref(Some(value))?;
        }
        Ok(())
    }

    fn write_count(&mut self, len: usize) -> Result<()> {
        let count = i32::try_from(len)
            .map_err(|_| SaveGraphError::Usage(format!("Array of {len} elements is too long")))?;
        codec::deflate_int(&mut self.buffer, count);
        Ok(())
    }

    fn write_ref(&mut self, value: Option<&ObjectRef>) -> Result<()> {
        match value {
            Some(object) => {
                let id = self.ids.id_for(object)?;
                codec::deflate_int(&mut self.buffer, id);
            }
            None => codec::write_null(&mut self.buffer),
        }
        Ok(())
    }
}
