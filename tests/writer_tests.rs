#![allow(missing_docs)]

use savegraph::{Exportable, ObjectRef, ReaderContext, Result, SaveGraph, SaveGraphError, WriterSession};

/// Runs `body` as the `write` of a throwaway class.
struct Scripted {
    class: &'static str,
    body: fn(&mut WriterSession<'_>) -> Result<()>,
}

impl Exportable for Scripted {
    fn class_name(&self) -> &str {
        self.class
    }

    fn write(&self, out: &mut WriterSession<'_>) -> Result<()> {
        (self.body)(out)
    }

    fn read(&mut self, _input: &mut ReaderContext<'_, '_>) -> Result<()> {
        Ok(())
    }
}

fn export(body: fn(&mut WriterSession<'_>) -> Result<()>) -> Result<Vec<u8>> {
    SaveGraph::serialize(&ObjectRef::new(Scripted {
        class: "test.Scripted",
        body,
    }))
}

fn is_usage(result: Result<Vec<u8>>) -> bool {
    matches!(result, Err(SaveGraphError::Usage(_)))
}

// --- TESTS ---

#[test]
fn test_empty_field_name_is_rejected() {
    assert!(is_usage(export(|out| out.write_int("", 1))));
}

#[test]
fn test_empty_string_value_is_rejected() {
    assert!(is_usage(export(|out| out.write_string("name", ""))));
}

#[test]
fn test_duplicate_field_is_rejected() {
    assert!(is_usage(export(|out| {
        out.write_int("x", 1)?;
        out.write_int("x", 2)
    })));
}

#[test]
fn test_conflicting_field_types_are_rejected() {
    assert!(is_usage(export(|out| {
        out.write_int("x", 1)?;
        out.write_long("y", 2)?;
        out.write_string("x2", "ok")?;
        out.write_bool("y", true)
    })));
}

#[test]
fn test_more_than_256_fields_is_rejected() {
    assert!(export(|out| {
        for i in 0..256 {
            out.write_bool(&format!("f{i}"), true)?;
        }
        Ok(())
    })
    .is_ok());

    assert!(is_usage(export(|out| {
        for i in 0..257 {
            out.write_bool(&format!("f{i}"), true)?;
        }
        Ok(())
    })));
}

#[test]
fn test_empty_class_name_is_rejected() {
    let result = SaveGraph::serialize(&ObjectRef::new(Scripted {
        class: "",
        body: |_| Ok(()),
    }));
    assert!(is_usage(result));
}

#[test]
fn test_session_tracks_emitted_bytes() {
    let result = export(|out| {
        assert!(out.is_empty());
        assert_eq!(out.class_name(), "test.Scripted");
        out.write_int("big", 300)?;
        assert_eq!(out.len(), 4);
        out.write_enum("mode", "Fast")?;
        assert_eq!(out.len(), 4 + 1 + 2 + 4);
        Ok(())
    });
    assert!(result.is_ok());
}

/// Writer errors surface unchanged from the object's `write`.
#[test]
fn test_write_errors_abort_the_export() {
    let result = export(|_| Err(SaveGraphError::Internal("boom".into())));
    assert!(matches!(result, Err(SaveGraphError::Internal(msg)) if msg == "boom"));
}
