//! The Schema Table.
//!
//! Per-file directory of the classes appearing in a file. Each class gets a
//! short alias (its width sized to the number of classes in *this* file), the
//! version stamps of its hierarchy, and a one-byte alias for every field it
//! wrote together with the field's wire type.

use std::collections::HashMap;
use std::rc::Rc;

use byteorder::{BigEndian, WriteBytesExt};

use crate::codec::ReadCursor;
use crate::error::{Result, SaveGraphError};
use crate::format::{TypeTag, alias_width, tag_name};

/// One field of a class, as recorded in the Schema Table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Human readable field name used by the typed accessors.
    pub name: String,
    /// One-byte alias used in the field stream.
    pub alias: u8,
    /// Raw wire type. May be a tag this build cannot decode.
    pub type_tag: u8,
}

impl FieldDescriptor {
    /// Creates a descriptor.
    pub fn new(name: impl Into<String>, alias: u8, tag: TypeTag) -> Self {
        Self {
            name: name.into(),
            alias,
            type_tag: tag.as_u8(),
        }
    }

    /// The decoded wire type, `None` for undeclared tag values.
    pub fn tag(&self) -> Option<TypeTag> {
        TypeTag::from_u8(self.type_tag)
    }
}

/// Schema entry for one class.
///
/// `fields_by_name` and `fields_by_alias` always describe the same set of
/// fields; [`ClassAlias::new`] rejects duplicates on either side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassAlias {
    /// Alias bytes, unique within the file.
    pub alias: Vec<u8>,
    /// Fully qualified class name, the key into the class registry.
    pub class_name: String,
    /// Version stamps, one per versioned level of the class hierarchy.
    pub hierarchy_versions: Vec<i32>,
    fields_by_name: HashMap<String, FieldDescriptor>,
    fields_by_alias: HashMap<u8, FieldDescriptor>,
    field_order: Vec<u8>,
}

impl ClassAlias {
    /// Builds a class entry, checking that field names and aliases are unique.
    pub fn new(
        alias: Vec<u8>,
        class_name: impl Into<String>,
        hierarchy_versions: Vec<i32>,
        fields: Vec<FieldDescriptor>,
    ) -> Result<Self> {
        let class_name = class_name.into();
        let mut fields_by_name = HashMap::with_capacity(fields.len());
        let mut fields_by_alias = HashMap::with_capacity(fields.len());
        let mut field_order = Vec::with_capacity(fields.len());

        for field in fields {
            if fields_by_alias.contains_key(&field.alias) {
                return Err(SaveGraphError::Format(format!(
                    "Class '{class_name}' declares field alias {} twice",
                    field.alias
                )));
            }
            if fields_by_name.contains_key(&field.name) {
                return Err(SaveGraphError::Format(format!(
                    "Class '{class_name}' declares field '{}' twice",
                    field.name
                )));
            }
            field_order.push(field.alias);
            fields_by_name.insert(field.name.clone(), field.clone());
            fields_by_alias.insert(field.alias, field);
        }

        Ok(Self {
            alias,
            class_name,
            hierarchy_versions,
            fields_by_name,
            fields_by_alias,
            field_order,
        })
    }

    /// Looks a field up by its name.
    pub fn field_by_name(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields_by_name.get(name)
    }

    /// Looks a field up by its stream alias.
    pub fn field_by_alias(&self, alias: u8) -> Option<&FieldDescriptor> {
        self.fields_by_alias.get(&alias)
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.field_order
            .iter()
            .filter_map(|alias| self.fields_by_alias.get(alias))
    }

    /// Number of fields.
    pub fn field_count(&self) -> usize {
        self.field_order.len()
    }

    /// Version stamp for hierarchy `level`, 0 when the file has none.
    pub fn version_at(&self, level: usize) -> i32 {
        self.hierarchy_versions.get(level).copied().unwrap_or(0)
    }

    fn write_to(&self, out: &mut Vec<u8>) -> Result<()> {
        out.extend_from_slice(&self.alias);

        let depth = u8::try_from(self.hierarchy_versions.len()).map_err(|_| {
            SaveGraphError::Usage(format!(
                "Class '{}' has more than 255 hierarchy versions",
                self.class_name
            ))
        })?;
        out.push(depth);
        for version in &self.hierarchy_versions {
            out.write_i32::<BigEndian>(*version)?;
        }

        write_name(out, &self.class_name)?;

        out.write_i32::<BigEndian>(self.field_order.len() as i32)?;
        for field in self.fields() {
            out.push(field.alias);
            out.push(field.type_tag);
            write_name(out, &field.name)?;
        }
        Ok(())
    }

    fn read_from(cursor: &mut ReadCursor<'_>, width: usize) -> Result<Self> {
        let alias = cursor.read_bytes(width)?.to_vec();

        let depth = cursor.read_u8()?;
        let mut hierarchy_versions = Vec::with_capacity(usize::from(depth));
        for _ in 0..depth {
            hierarchy_versions.push(cursor.read_i32()?);
        }

        let class_name = read_name(cursor, "class name")?;

        let field_count = cursor.read_len("field count")?;
        let mut fields = Vec::with_capacity(field_count.min(256));
        for _ in 0..field_count {
            let field_alias = cursor.read_u8()?;
            let type_tag = cursor.read_u8()?;
            let name = read_name(cursor, "field name")?;
            fields.push(FieldDescriptor {
                name,
                alias: field_alias,
                type_tag,
            });
        }

        Self::new(alias, class_name, hierarchy_versions, fields)
    }
}

fn write_name(out: &mut Vec<u8>, name: &str) -> Result<()> {
    let len = i32::try_from(name.len())
        .map_err(|_| SaveGraphError::Usage(format!("Name of {} bytes is too long", name.len())))?;
    out.write_i32::<BigEndian>(len)?;
    out.extend_from_slice(name.as_bytes());
    Ok(())
}

fn read_name(cursor: &mut ReadCursor<'_>, what: &str) -> Result<String> {
    let len = cursor.read_len(what)?;
    let bytes = cursor.read_bytes(len)?;
    String::from_utf8(bytes.to_vec())
        .map_err(|_| SaveGraphError::Format(format!("{what} is not valid UTF-8")))
}

/// The per-file class directory.
#[derive(Debug, Clone, Default)]
pub struct SchemaTable {
    alias_width: usize,
    by_alias: HashMap<Vec<u8>, Rc<ClassAlias>>,
    by_name: HashMap<String, Rc<ClassAlias>>,
    order: Vec<Rc<ClassAlias>>,
}

impl SchemaTable {
    /// Creates an empty table whose aliases are `alias_width` bytes wide.
    pub fn with_alias_width(alias_width: usize) -> Self {
        Self {
            alias_width,
            ..Self::default()
        }
    }

    /// Registers one class. Called once per distinct class.
    ///
    /// Fails if the alias has the wrong width or either the alias or the class
    /// name is already registered.
    pub fn register(
        &mut self,
        alias: Vec<u8>,
        class_name: impl Into<String>,
        hierarchy_versions: Vec<i32>,
        fields: Vec<FieldDescriptor>,
    ) -> Result<Rc<ClassAlias>> {
        let class = ClassAlias::new(alias, class_name, hierarchy_versions, fields)?;
        self.insert(class)
    }

    fn insert(&mut self, class: ClassAlias) -> Result<Rc<ClassAlias>> {
        if class.alias.len() != self.alias_width {
            return Err(SaveGraphError::Format(format!(
                "Alias for '{}' is {} bytes wide, expected {}",
                class.class_name,
                class.alias.len(),
                self.alias_width
            )));
        }
        if self.by_alias.contains_key(&class.alias) {
            return Err(SaveGraphError::Format(format!(
                "Class alias {:02X?} registered twice",
                class.alias
            )));
        }
        if self.by_name.contains_key(&class.class_name) {
            return Err(SaveGraphError::Format(format!(
                "Class '{}' registered twice",
                class.class_name
            )));
        }

        let class = Rc::new(class);
        self.by_alias.insert(class.alias.clone(), Rc::clone(&class));
        self.by_name
            .insert(class.class_name.clone(), Rc::clone(&class));
        self.order.push(Rc::clone(&class));
        Ok(class)
    }

    /// Looks a class up by alias bytes.
    pub fn lookup_alias(&self, alias: &[u8]) -> Option<Rc<ClassAlias>> {
        self.by_alias.get(alias).cloned()
    }

    /// Looks a class up by its qualified name.
    pub fn lookup_class(&self, class_name: &str) -> Option<Rc<ClassAlias>> {
        self.by_name.get(class_name).cloned()
    }

    /// Width of the class aliases in this table.
    pub fn alias_width(&self) -> usize {
        self.alias_width
    }

    /// Number of classes.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns true if no classes are registered.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Classes in registration order.
    pub fn classes(&self) -> impl Iterator<Item = &Rc<ClassAlias>> {
        self.order.iter()
    }

    /// Appends the encoded table.
    pub fn write_to(&self, out: &mut Vec<u8>) -> Result<()> {
        let count = i32::try_from(self.order.len())
            .map_err(|_| SaveGraphError::Usage("Too many classes".into()))?;
        out.write_i32::<BigEndian>(count)?;
        for class in &self.order {
            class.write_to(out)?;
        }
        Ok(())
    }

    /// Parses the table, computing the alias width from the class count.
    pub fn read_from(cursor: &mut ReadCursor<'_>) -> Result<Self> {
        let count = cursor.read_len("class count")?;
        let mut table = Self::with_alias_width(alias_width(count));
        for _ in 0..count {
            let class = ClassAlias::read_from(cursor, table.alias_width)?;
            tracing::trace!(
                class = %class.class_name,
                alias = ?class.alias,
                fields = class.field_count(),
                "schema entry"
            );
            table.insert(class)?;
        }
        Ok(table)
    }
}

impl std::fmt::Display for FieldDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} (alias {}, {})",
            self.name,
            self.alias,
            tag_name(self.type_tag)
        )
    }
}
