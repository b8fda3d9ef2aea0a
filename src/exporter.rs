//! Whole-file export.
//!
//! The exporter walks the object graph breadth-first starting at the root.
//! Ids are assigned by allocation identity the first time an object is
//! referenced, so an object reachable through several paths (or through a
//! cycle) is written exactly once. Each object is written by its own
//! [`WriterSession`]; once the walk is done the number of distinct classes is
//! known, which fixes the class alias width, and the file is assembled:
//!
//! `[Header] [Schema Table] [Location Table] [Reserved] [Root Id] [Blob]`

use std::collections::HashMap;

use byteorder::{BigEndian, WriteBytesExt};

use crate::error::{Result, SaveGraphError};
use crate::exportable::ObjectRef;
use crate::format::{
    EXPLICIT_LENGTH_VERSION, FORMAT_VERSION, FileHeader, MIN_FORMAT_VERSION, alias_width,
    encode_alias,
};
use crate::location::LocationTable;
use crate::schema::SchemaTable;
use crate::writer::{ClassBuilder, ObjectIds, WriterSession};

/// A serialized object awaiting layout.
struct PendingRecord {
    object_id: i32,
    class_index: usize,
    body: Vec<u8>,
}

/// Serializes the graph reachable from `root` into a complete file image.
pub fn export_graph(root: &ObjectRef, version: i32) -> Result<Vec<u8>> {
    if !(MIN_FORMAT_VERSION..=FORMAT_VERSION).contains(&version) {
        return Err(SaveGraphError::Usage(format!(
            "Cannot write format version {version}; supported {MIN_FORMAT_VERSION}..={FORMAT_VERSION}"
        )));
    }

    let mut ids = ObjectIds::new();
    let root_id = ids.id_for(root)?;

    // --- PHASE 1: WALK ---

    let mut classes: Vec<ClassBuilder> = Vec::new();
    let mut class_index: HashMap<String, usize> = HashMap::new();
    let mut records: Vec<PendingRecord> = Vec::new();

    while let Some((object_id, handle)) = ids.next_pending() {
        let object = handle.try_borrow().map_err(|_| {
            SaveGraphError::Internal(format!(
                "Object {object_id} is mutably borrowed during export"
            ))
        })?;

        let class_name = object.class_name();
        if class_name.is_empty() {
            return Err(SaveGraphError::Usage(format!(
                "Object {object_id} reports an empty class name"
            )));
        }

        let index = match class_index.get(class_name) {
            Some(index) => *index,
            None => {
                let index = classes.len();
                classes.push(ClassBuilder::new(
                    class_name.to_string(),
                    object.class_versions().to_vec(),
                ));
                class_index.insert(class_name.to_string(), index);
                index
            }
        };

        let class = classes.get_mut(index).ok_or_else(|| {
            SaveGraphError::Internal(format!("Class slot {index} missing"))
        })?;
        let mut session = WriterSession::new(class, &mut ids);
        object.write(&mut session)?;
        let body = session.finish();

        tracing::trace!(object_id, class = %class_name, bytes = body.len(), "object written");
        records.push(PendingRecord {
            object_id,
            class_index: index,
            body,
        });
    }

    // --- PHASE 2: SCHEMA ---

    let width = alias_width(classes.len());
    let mut schema = SchemaTable::with_alias_width(width);
    let mut aliases = Vec::with_capacity(classes.len());
    for (index, class) in classes.into_iter().enumerate() {
        let alias = encode_alias(index, width);
        schema.register(alias.clone(), class.class_name, class.versions, class.fields)?;
        aliases.push(alias);
    }

    // --- PHASE 3: LAYOUT ---

    let mut blob = Vec::new();
    let mut locations = LocationTable::new();
    for record in &records {
        let offset = i32::try_from(blob.len())
            .map_err(|_| SaveGraphError::Usage("Data blob exceeds 2 GiB".into()))?;
        locations.push(record.object_id, offset)?;

        let alias = aliases.get(record.class_index).ok_or_else(|| {
            SaveGraphError::Internal(format!("No alias for class slot {}", record.class_index))
        })?;
        blob.extend_from_slice(alias);
        if version >= EXPLICIT_LENGTH_VERSION {
            let len = i32::try_from(record.body.len()).map_err(|_| {
                SaveGraphError::Usage(format!("Object {} exceeds 2 GiB", record.object_id))
            })?;
            blob.write_i32::<BigEndian>(len)?;
        }
        blob.extend_from_slice(&record.body);
    }

    // --- PHASE 4: ASSEMBLY ---

    let mut out = Vec::with_capacity(blob.len() + 64 * schema.len() + 8 * locations.len());
    FileHeader::new(version).write_to(&mut out)?;
    schema.write_to(&mut out)?;
    locations.write_to(&mut out)?;
    out.write_i32::<BigEndian>(0)?; // reserved
    out.write_i32::<BigEndian>(root_id)?;
    out.extend_from_slice(&blob);

    tracing::debug!(
        version,
        objects = records.len(),
        classes = schema.len(),
        bytes = out.len(),
        "export complete"
    );
    Ok(out)
}
