#![allow(missing_docs)]

use savegraph::codec;
use savegraph::format::{FileHeader, MAGIC_BYTES, TypeTag};
use savegraph::location::LocationTable;
use savegraph::schema::{FieldDescriptor, SchemaTable};
use savegraph::{
    ClassRegistry, Diagnostic, ExportClass, Exportable, ObjectRef, ReaderContext, Result,
    SaveGraph, SaveGraphError, WriterSession,
};

#[derive(Debug, Default)]
struct Holder {
    tag: String,
    count: i32,
    child: Option<ObjectRef>,
}

impl Exportable for Holder {
    fn class_name(&self) -> &str {
        Self::CLASS_NAME
    }

    fn write(&self, out: &mut WriterSession<'_>) -> Result<()> {
        out.write_string("tag", &self.tag)?;
        out.write_int("count", self.count)?;
        out.write_exportable("child", self.child.as_ref())
    }

    fn read(&mut self, input: &mut ReaderContext<'_, '_>) -> Result<()> {
        self.tag = input.read_string("tag", "");
        self.count = input.read_int("count", -1);
        self.child = input.read_exportable("child", None);
        Ok(())
    }
}

impl ExportClass for Holder {
    const CLASS_NAME: &'static str = "test.Holder";
}

#[derive(Debug, Default)]
struct Leaf {
    weight: i32,
}

impl Exportable for Leaf {
    fn class_name(&self) -> &str {
        Self::CLASS_NAME
    }

    fn write(&self, out: &mut WriterSession<'_>) -> Result<()> {
        out.write_int("weight", self.weight)
    }

    fn read(&mut self, input: &mut ReaderContext<'_, '_>) -> Result<()> {
        self.weight = input.read_int("weight", 0);
        if self.weight < 0 {
            return Err(SaveGraphError::Format("negative weight".into()));
        }
        Ok(())
    }
}

impl ExportClass for Leaf {
    const CLASS_NAME: &'static str = "test.Leaf";
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn full_registry() -> ClassRegistry {
    let mut registry = ClassRegistry::new();
    registry.register::<Holder>().register::<Leaf>();
    registry
}

fn holder_with_leaf(weight: i32) -> ObjectRef {
    ObjectRef::new(Holder {
        tag: "outer".into(),
        count: 5,
        child: Some(ObjectRef::new(Leaf { weight })),
    })
}

fn holder_schema(fields: Vec<FieldDescriptor>) -> Result<SchemaTable> {
    let mut schema = SchemaTable::with_alias_width(1);
    schema.register(vec![0], Holder::CLASS_NAME, vec![], fields)?;
    Ok(schema)
}

fn assemble(schema: &SchemaTable, records: &[(i32, Vec<u8>)], root: i32) -> Result<Vec<u8>> {
    let mut blob = Vec::new();
    let mut locations = LocationTable::new();
    for (id, body) in records {
        locations.push(*id, blob.len() as i32)?;
        blob.push(0);
        blob.extend_from_slice(&(body.len() as i32).to_be_bytes());
        blob.extend_from_slice(body);
    }

    let mut out = Vec::new();
    FileHeader::new(2).write_to(&mut out)?;
    schema.write_to(&mut out)?;
    locations.write_to(&mut out)?;
    out.extend_from_slice(&0i32.to_be_bytes());
    out.extend_from_slice(&root.to_be_bytes());
    out.extend_from_slice(&blob);
    Ok(out)
}

// --- FATAL GATES ---

/// The signature is checked before any table: a file whose tables would also
/// be garbage still fails with the signature error.
#[test]
fn test_bad_magic_fails_before_tables() {
    let mut bytes = b"SAVE".to_vec();
    bytes.extend_from_slice(&[0xFF; 32]);
    match SaveGraph::load_bytes(&bytes, &full_registry()) {
        Err(SaveGraphError::InvalidMagic { found }) => assert_eq!(found, b"SAVE"),
        other => panic!("expected InvalidMagic, got {other:?}"),
    }
}

#[test]
fn test_empty_and_short_inputs_fail_the_magic_check() {
    for bytes in [&b""[..], &b"SG"[..]] {
        assert!(matches!(
            SaveGraph::load_bytes(bytes, &full_registry()),
            Err(SaveGraphError::InvalidMagic { .. })
        ));
    }
}

#[test]
fn test_newer_version_is_rejected() {
    let mut bytes = MAGIC_BYTES.to_vec();
    bytes.extend_from_slice(&3i32.to_be_bytes());
    bytes.extend_from_slice(&[0; 16]);
    assert!(matches!(
        SaveGraph::load_bytes(&bytes, &full_registry()),
        Err(SaveGraphError::UnsupportedVersion { found: 3, .. })
    ));
}

#[test]
fn test_truncated_tables_are_fatal() -> Result<()> {
    let bytes = SaveGraph::serialize(&holder_with_leaf(1))?;
    for cut in [FileHeader::SIZE, FileHeader::SIZE + 3, FileHeader::SIZE + 10] {
        assert!(matches!(
            SaveGraph::load_bytes(&bytes[..cut], &full_registry()),
            Err(SaveGraphError::Format(_))
        ));
    }
    Ok(())
}

// --- LOCAL FAILURES ---

#[test]
fn test_unregistered_class_yields_none_and_diagnostic() -> Result<()> {
    init_tracing();
    let bytes = SaveGraph::serialize(&holder_with_leaf(1))?;
    let mut registry = ClassRegistry::new();
    registry.register::<Holder>();

    let loaded = SaveGraph::load_bytes(&bytes, &registry)?;
    let holder = loaded.root_as::<Holder>().expect("root");
    assert!(holder.borrow().child.is_none());
    assert_eq!(holder.borrow().count, 5);
    assert_eq!(
        loaded.diagnostics,
        vec![Diagnostic::UnregisteredClass {
            object_id: 2,
            class_name: Leaf::CLASS_NAME.into(),
        }]
    );
    assert!(loaded.diagnostics[0].is_object_level());
    Ok(())
}

#[test]
fn test_unregistered_root_yields_no_root() -> Result<()> {
    let bytes = SaveGraph::serialize(&holder_with_leaf(1))?;
    let loaded = SaveGraph::load_bytes(&bytes, &ClassRegistry::new())?;
    assert!(loaded.root.is_none());
    assert_eq!(loaded.materialized, 0);
    assert_eq!(loaded.diagnostics.len(), 1);
    Ok(())
}

#[test]
fn test_read_failure_keeps_the_instance() -> Result<()> {
    let bytes = SaveGraph::serialize(&holder_with_leaf(-4))?;
    let loaded = SaveGraph::load_bytes(&bytes, &full_registry())?;

    let holder = loaded.root_as::<Holder>().expect("root");
    let child = holder.borrow().child.clone().expect("child kept");
    assert_eq!(child.downcast::<Leaf>().expect("leaf").borrow().weight, -4);
    assert!(matches!(
        loaded.diagnostics.as_slice(),
        [Diagnostic::ReadFailed { object_id: 2, .. }]
    ));
    Ok(())
}

#[test]
fn test_strict_mode_turns_diagnostics_into_errors() -> Result<()> {
    let bytes = SaveGraph::serialize(&holder_with_leaf(1))?;
    let mut registry = ClassRegistry::new();
    registry.register::<Holder>();

    let strict = SaveGraph::builder().strict(true);
    assert!(matches!(
        strict.load_bytes(&bytes, &registry),
        Err(SaveGraphError::Format(_))
    ));
    assert!(strict.load_bytes(&bytes, &full_registry()).is_ok());
    Ok(())
}

#[test]
fn test_missing_location_is_reported() -> Result<()> {
    let schema = holder_schema(vec![
        FieldDescriptor::new("count", 0, TypeTag::Int),
        FieldDescriptor::new("child", 1, TypeTag::Savable),
    ])?;
    let mut body = vec![0];
    codec::deflate_int(&mut body, 9);
    body.push(1);
    codec::deflate_int(&mut body, 99);

    let bytes = assemble(&schema, &[(1, body)], 1)?;
    let loaded = SaveGraph::load_bytes(&bytes, &full_registry())?;
    let holder = loaded.root_as::<Holder>().expect("root");
    assert_eq!(holder.borrow().count, 9);
    assert!(holder.borrow().child.is_none());
    assert_eq!(
        loaded.diagnostics,
        vec![Diagnostic::MissingLocation { object_id: 99 }]
    );
    Ok(())
}

/// Fields before an unknown alias survive; the rest of the stream is skipped.
#[test]
fn test_unknown_field_alias_stops_the_object() -> Result<()> {
    init_tracing();
    let schema = holder_schema(vec![
        FieldDescriptor::new("tag", 0, TypeTag::String),
        FieldDescriptor::new("count", 1, TypeTag::Int),
    ])?;
    let mut body = vec![0];
    codec::write_string(&mut body, "kept")?;
    body.push(9);
    body.extend_from_slice(&[1, 2, 3]);
    body.push(1);
    codec::deflate_int(&mut body, 77);

    let bytes = assemble(&schema, &[(1, body)], 1)?;
    let loaded = SaveGraph::load_bytes(&bytes, &full_registry())?;
    let holder = loaded.root_as::<Holder>().expect("root");
    assert_eq!(holder.borrow().tag, "kept");
    assert_eq!(holder.borrow().count, -1);
    assert_eq!(
        loaded.diagnostics,
        vec![Diagnostic::UnknownFieldAlias {
            object_id: 1,
            class_name: Holder::CLASS_NAME.into(),
            alias: 9,
        }]
    );
    Ok(())
}

#[test]
fn test_unsupported_field_type_is_reported() -> Result<()> {
    let schema = holder_schema(vec![
        FieldDescriptor::new("count", 0, TypeTag::Int),
        FieldDescriptor::new("samples", 1, TypeTag::Int1D),
        FieldDescriptor {
            name: "future".into(),
            alias: 2,
            type_tag: 200,
        },
    ])?;
    let mut body = vec![0];
    codec::deflate_int(&mut body, 3);
    body.push(1);
    body.extend_from_slice(&[0, 0, 0, 1, 0, 0, 0, 5]);

    let bytes = assemble(&schema, &[(1, body)], 1)?;
    let loaded = SaveGraph::load_bytes(&bytes, &full_registry())?;
    assert_eq!(loaded.root_as::<Holder>().expect("root").borrow().count, 3);
    assert!(matches!(
        loaded.diagnostics.as_slice(),
        [Diagnostic::UnsupportedField { type_tag: 11, .. }]
    ));

    let report = SaveGraph::inspect_bytes(&bytes)?;
    let types: Vec<&str> = report.classes[0]
        .fields
        .iter()
        .map(|f| f.type_name.as_str())
        .collect();
    assert_eq!(types, vec!["int", "int[]", "unknown(200)"]);
    Ok(())
}

#[test]
fn test_malformed_value_is_reported() -> Result<()> {
    let schema = holder_schema(vec![
        FieldDescriptor::new("count", 0, TypeTag::Int),
        FieldDescriptor::new("tag", 1, TypeTag::String),
    ])?;
    let mut body = vec![0];
    codec::deflate_int(&mut body, 12);
    body.push(1);
    codec::deflate_int(&mut body, 50);
    body.extend_from_slice(b"short");

    let bytes = assemble(&schema, &[(1, body)], 1)?;
    let loaded = SaveGraph::load_bytes(&bytes, &full_registry())?;
    assert_eq!(loaded.root_as::<Holder>().expect("root").borrow().count, 12);
    assert!(matches!(
        loaded.diagnostics.as_slice(),
        [Diagnostic::MalformedField { field, .. }] if field == "tag"
    ));
    Ok(())
}

#[test]
fn test_type_mismatch_falls_back_to_default() -> Result<()> {
    let schema = holder_schema(vec![FieldDescriptor::new("count", 0, TypeTag::Long)])?;
    let mut body = vec![0];
    codec::deflate_long(&mut body, 8);

    let bytes = assemble(&schema, &[(1, body)], 1)?;
    let loaded = SaveGraph::load_bytes(&bytes, &full_registry())?;
    assert_eq!(loaded.root_as::<Holder>().expect("root").borrow().count, -1);
    assert!(matches!(
        loaded.diagnostics.as_slice(),
        [Diagnostic::TypeMismatch { expected, .. }] if expected == "int"
    ));
    Ok(())
}

#[test]
fn test_latin1_string_is_flagged() -> Result<()> {
    init_tracing();
    let schema = holder_schema(vec![FieldDescriptor::new("tag", 0, TypeTag::String)])?;
    let mut body = vec![0];
    codec::deflate_int(&mut body, 4);
    body.extend_from_slice(&[b'c', b'a', b'f', 0xE9]);

    let bytes = assemble(&schema, &[(1, body)], 1)?;
    let loaded = SaveGraph::load_bytes(&bytes, &full_registry())?;
    assert_eq!(loaded.root_as::<Holder>().expect("root").borrow().tag, "café");
    assert!(matches!(
        loaded.diagnostics.as_slice(),
        [Diagnostic::LegacyEncoding { .. }]
    ));
    Ok(())
}

#[test]
fn test_unknown_class_alias_is_reported() -> Result<()> {
    let schema = holder_schema(vec![FieldDescriptor::new("child", 0, TypeTag::Savable)])?;
    let mut root = vec![0];
    codec::deflate_int(&mut root, 2);
    let mut bytes = assemble(&schema, &[(1, root), (2, Vec::new())], 1)?;

    // Rewrite the alias byte of the second record.
    let alias_at = bytes.len() - 5;
    bytes[alias_at] = 0x7F;

    let loaded = SaveGraph::load_bytes(&bytes, &full_registry())?;
    assert!(loaded.root_as::<Holder>().expect("root").borrow().child.is_none());
    assert_eq!(
        loaded.diagnostics,
        vec![Diagnostic::UnknownClassAlias {
            object_id: 2,
            alias: vec![0x7F],
        }]
    );
    Ok(())
}

#[test]
fn test_record_length_past_blob_is_broken() -> Result<()> {
    let schema = holder_schema(vec![FieldDescriptor::new("count", 0, TypeTag::Int)])?;
    let mut bytes = assemble(&schema, &[(1, vec![0, 1, 5])], 1)?;
    let len_at = bytes.len() - 7;
    bytes[len_at..len_at + 4].copy_from_slice(&100i32.to_be_bytes());

    let loaded = SaveGraph::load_bytes(&bytes, &full_registry())?;
    assert!(loaded.root.is_none());
    assert!(matches!(
        loaded.diagnostics.as_slice(),
        [Diagnostic::BrokenRecord { object_id: 1, .. }]
    ));
    Ok(())
}

#[test]
fn test_failed_objects_are_attempted_once() -> Result<()> {
    let schema = holder_schema(vec![
        FieldDescriptor::new("child", 0, TypeTag::Savable),
        FieldDescriptor::new("count", 1, TypeTag::Int),
    ])?;
    let mut body = vec![0];
    codec::deflate_int(&mut body, 42);
    let bytes = assemble(&schema, &[(1, body)], 1)?;

    struct Twice;
    impl Exportable for Twice {
        fn class_name(&self) -> &str {
            "test.Holder"
        }
        fn write(&self, _out: &mut WriterSession<'_>) -> Result<()> {
            Ok(())
        }
        fn read(&mut self, input: &mut ReaderContext<'_, '_>) -> Result<()> {
            assert!(input.read_exportable("child", None).is_none());
            assert!(input.read_exportable("child", None).is_none());
            Ok(())
        }
    }

    let mut registry = ClassRegistry::new();
    registry.register_with("test.Holder", || ObjectRef::new(Twice));
    let loaded = SaveGraph::load_bytes(&bytes, &registry)?;
    assert_eq!(
        loaded.diagnostics,
        vec![Diagnostic::MissingLocation { object_id: 42 }]
    );
    Ok(())
}
