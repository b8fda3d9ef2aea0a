#![allow(missing_docs)]

use std::path::PathBuf;

use savegraph::{Exportable, Inspector, ObjectRef, Result, SaveGraph};

#[derive(Debug, Default, Exportable)]
#[savegraph(class = "demo.Room", version = 2)]
struct Room {
    name: String,
    area: i32,
    exit: Option<ObjectRef>,
}

#[derive(Debug, Default, Exportable)]
#[savegraph(class = "demo.Lamp")]
struct Lamp {
    watts: i32,
}

fn house() -> ObjectRef {
    let lamp = ObjectRef::new(Lamp { watts: 60 });
    let hall = ObjectRef::new(Room {
        name: "hall".into(),
        area: 12,
        exit: Some(lamp),
    });
    ObjectRef::new(Room {
        name: "kitchen".into(),
        area: 20,
        exit: Some(hall),
    })
}

#[test]
fn test_report_lists_tables() -> Result<()> {
    let bytes = SaveGraph::serialize(&house())?;
    let report = SaveGraph::inspect_bytes(&bytes)?;

    assert_eq!(report.format_version, 2);
    assert_eq!(report.file_size, bytes.len() as u64);
    assert_eq!(report.alias_width, 2);
    assert_eq!(report.root_id, 1);

    let names: Vec<&str> = report.classes.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["demo.Room", "demo.Lamp"]);
    assert_eq!(report.classes[0].versions, vec![2]);
    assert_eq!(report.classes[0].alias, vec![0, 0]);
    assert_eq!(report.classes[1].alias, vec![0, 1]);

    assert_eq!(report.objects.len(), 3);
    assert_eq!(report.objects[0].offset, 0);
    assert_eq!(report.objects[0].class.as_deref(), Some("demo.Room"));
    assert_eq!(report.objects[2].class.as_deref(), Some("demo.Lamp"));
    let total: usize = report.objects.iter().map(|o| o.span).sum();
    assert_eq!(total as u64, report.blob_size);
    Ok(())
}

#[test]
fn test_report_renders_tree_and_json() -> Result<()> {
    let report = SaveGraph::inspect_bytes(&SaveGraph::serialize(&house())?)?;

    let text = report.to_string();
    assert!(text.contains("=== SAVEGRAPH INSPECTOR REPORT ==="));
    assert!(text.contains("demo.Lamp"));
    assert!(text.contains("└── "));

    let json = serde_json::to_value(&report).expect("serializable report");
    assert_eq!(json["classes"][1]["name"], "demo.Lamp");
    assert_eq!(json["objects"].as_array().map(Vec::len), Some(3));
    Ok(())
}

#[test]
#[cfg(not(target_arch = "wasm32"))]
fn test_batch_inspection_keeps_order() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let good = dir.path().join("good.sav");
    let legacy = dir.path().join("legacy.sav");
    let bad = dir.path().join("bad.sav");

    SaveGraph::save(&good, &house())?;
    SaveGraph::builder().format_version(1).save(&legacy, &house())?;
    std::fs::write(&bad, b"definitely not a save file")?;

    let paths: Vec<PathBuf> = vec![good, legacy, bad, dir.path().join("missing.sav")];
    let reports = Inspector::inspect_batch(&paths);

    assert_eq!(reports.len(), 4);
    assert_eq!(reports[0].as_ref().map(|r| r.format_version).ok(), Some(2));
    assert_eq!(reports[1].as_ref().map(|r| r.format_version).ok(), Some(1));
    assert!(matches!(
        reports[2],
        Err(savegraph::SaveGraphError::InvalidMagic { .. })
    ));
    assert!(matches!(reports[3], Err(savegraph::SaveGraphError::Io(_))));
    Ok(())
}

#[test]
#[cfg(not(target_arch = "wasm32"))]
fn test_inspect_file_matches_bytes() -> Result<()> {
    let file = tempfile::NamedTempFile::new()?;
    SaveGraph::save(file.path(), &house())?;
    let from_file = SaveGraph::inspect(file.path())?;
    let from_bytes = Inspector::inspect_bytes(&std::fs::read(file.path())?)?;
    assert_eq!(from_file.file_size, from_bytes.file_size);
    assert_eq!(from_file.objects.len(), from_bytes.objects.len());
    Ok(())
}
