use codepress_inspector::{
    coalescer, ChangeSet, FileEvent, FsStore, HostMessage, InspectorConfig, InspectorError,
    PatchAction, Pipeline, PropValue, PropertyEdit, SelectionReply,
};
use pretty_assertions::assert_eq;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

fn project(files: &[(&str, &str)]) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    for (path, text) in files {
        let full = dir.path().join(path);
        fs::create_dir_all(full.parent().unwrap()).unwrap();
        fs::write(full, text).unwrap();
    }
    dir
}

fn open(dir: &TempDir, config: InspectorConfig) -> Pipeline<FsStore> {
    let store = FsStore::new(dir.path(), config.ignored_dirs.clone());
    let mut pipeline = Pipeline::new(config, store);
    pipeline.load().unwrap();
    pipeline
}

fn first_uid(pipeline: &Pipeline<FsStore>, path: &Path) -> String {
    let entry = pipeline.registry().get_entry(path).unwrap();
    entry.arena.uids().next().unwrap().to_string()
}

const BUTTON: &str = r#"export default function Button({ label }) {
  return <button type="button" className="btn">{label}</button>;
}
"#;

#[test]
fn test_edit_round_trip_on_disk() {
    let dir = project(&[("src/Button.jsx", BUTTON)]);
    let mut pipeline = open(&dir, InspectorConfig::default());
    let path = dir.path().join("src/Button.jsx");
    let uid = first_uid(&pipeline, &path);

    let outcome = pipeline
        .apply_edit(&PropertyEdit {
            uid: uid.clone(),
            name: "disabled".into(),
            value: PropValue::Bool(true),
        })
        .unwrap();
    assert_eq!(outcome.action, PatchAction::Inserted);

    let on_disk = fs::read_to_string(&path).unwrap();
    assert!(on_disk.contains("disabled"));
    assert!(!on_disk.contains("data-uid"));

    let selection = pipeline.inspect(&uid).unwrap();
    let disabled = selection.properties.iter().find(|p| p.name == "disabled").unwrap();
    assert_eq!(disabled.value, PropValue::Bool(true));
}

#[test]
fn test_persisted_identifiers_survive_reload() {
    let dir = project(&[("src/Button.jsx", BUTTON)]);
    let config = InspectorConfig {
        persist_identifiers: true,
        ..Default::default()
    };
    let mut pipeline = open(&dir, config.clone());
    let path = dir.path().join("src/Button.jsx");
    let uid = first_uid(&pipeline, &path);

    pipeline
        .apply_edit(&PropertyEdit {
            uid: uid.clone(),
            name: "className".into(),
            value: PropValue::String("btn primary".into()),
        })
        .unwrap();

    let reopened = open(&dir, config);
    assert!(reopened.inspect(&uid).is_some());
}

#[test]
fn test_broken_file_is_reported_and_recovers() {
    let dir = project(&[
        ("src/Button.jsx", BUTTON),
        ("src/Broken.tsx", "export default () => <div>;"),
        ("node_modules/lib/index.js", "export default () => <div>;"),
    ]);
    let mut pipeline = open(&dir, InspectorConfig::default());

    let diagnostics = pipeline.diagnostics();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].path, dir.path().join("src/Broken.tsx"));
    assert!(pipeline.registry().get_entry(&dir.path().join("src/Button.jsx")).is_some());

    let broken = dir.path().join("src/Broken.tsx");
    fs::write(&broken, "export default () => <div/>;").unwrap();
    let report = pipeline
        .run_cycle(&ChangeSet::default().with([FileEvent::changed(&broken)]))
        .unwrap();
    assert_eq!(report.failed, 0);
    assert!(pipeline.diagnostics().is_empty());
    assert_eq!(report.components, 2);
}

#[test]
fn test_component_map_artifact_and_collision() {
    let dir = project(&[
        ("src/Button/index.tsx", "export default function A() { return <a/>; }"),
        ("src/button.tsx", "export default function B() { return <b/>; }"),
    ]);
    let config = InspectorConfig {
        component_map_path: Some(PathBuf::from("src/componentMap.js")),
        ..Default::default()
    };
    let pipeline = open(&dir, config);

    let map = pipeline.component_map();
    assert_eq!(map.len(), 1);
    assert_eq!(map.path_for("Button"), Some(dir.path().join("src/button.tsx").as_path()));

    let artifact = fs::read_to_string(dir.path().join("src/componentMap.js")).unwrap();
    assert_eq!(
        artifact,
        "export const componentMap = {\n  Button: \"@user-project/src/button.tsx\"\n};\n"
    );
    assert!(pipeline.registry().get_entry(&dir.path().join("src/componentMap.js")).is_none());
}

#[test]
fn test_superseded_identifier_not_found_after_external_edit() {
    let dir = project(&[("src/Button.jsx", BUTTON)]);
    let mut pipeline = open(&dir, InspectorConfig::default());
    let path = dir.path().join("src/Button.jsx");
    let uid = first_uid(&pipeline, &path);

    fs::write(&path, "export default () => <span/>;").unwrap();
    pipeline
        .run_cycle(&ChangeSet::default().with([FileEvent::changed(&path)]))
        .unwrap();

    assert!(pipeline.inspect(&uid).is_none());
    assert_eq!(
        pipeline.handle_message(HostMessage::SelectUid { uid: uid.clone() }),
        SelectionReply::NotFound { uid: uid.clone() }
    );
    assert!(matches!(
        pipeline.apply_edit(&PropertyEdit {
            uid,
            name: "id".into(),
            value: PropValue::String("x".into()),
        }),
        Err(InspectorError::UnknownIdentifier(_))
    ));
}

#[tokio::test]
async fn test_debounced_burst_runs_one_cycle_with_last_content() {
    let dir = project(&[("src/Button.jsx", BUTTON)]);
    let mut pipeline = open(&dir, InspectorConfig::default());
    let path = dir.path().join("src/Button.jsx");

    let (handle, worker) = coalescer::<ChangeSet>(Duration::from_millis(30));
    for i in 1..=5 {
        fs::write(&path, format!("export default () => <p>v{i}</p>;")).unwrap();
        handle.update(|pending| pending.unwrap_or_default().with([FileEvent::changed(&path)]));
    }

    let mut cycles = 0;
    let closer = async {
        tokio::time::sleep(Duration::from_millis(300)).await;
        handle.close();
    };
    let consume = worker.run(|changes| {
        pipeline.run_cycle(&changes).unwrap();
        cycles += 1;
    });
    let (runs, ()) = tokio::join!(consume, closer);

    assert_eq!(runs, 1);
    assert_eq!(cycles, 1);
    let entry = pipeline.registry().get_entry(&path).unwrap();
    assert_eq!(entry.source, "export default () => <p>v5</p>;");
    assert_eq!(entry.version, 2);
}

#[test]
fn test_events_under_ignored_dirs_are_skipped() {
    let dir = project(&[("src/App.jsx", "export default function App() { return <div/>; }")]);
    let mut pipeline = open(&dir, InspectorConfig::default());

    let widget = dir.path().join("node_modules/widget/Widget.js");
    fs::create_dir_all(widget.parent().unwrap()).unwrap();
    fs::write(&widget, "export default function Widget() { return <i/>; }").unwrap();
    let report = pipeline
        .run_cycle(&ChangeSet::default().with([FileEvent::created(&widget)]))
        .unwrap();

    assert!(pipeline.registry().get_entry(&widget).is_none());
    assert_eq!(report.components, 1);
    assert_eq!(pipeline.component_map().path_for("Widget"), None);
}
