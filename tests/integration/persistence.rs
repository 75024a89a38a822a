//! Save and load of a mixed View tree

use meshstore::{DataStore, ViewState};
use tempfile::TempDir;

use crate::common::*;

#[test]
fn every_view_state_survives_a_file() {
    init_tracing();
    let ds = sample_store();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("sample.json");
    ds.save_json(&path).unwrap();

    let mut loaded = DataStore::new();
    loaded.load_json(&path).unwrap();
    let root = loaded.root();

    let pressure = root.view("fields/pressure").unwrap();
    assert_eq!(pressure.state(), ViewState::Buffer);
    assert_eq!(pressure.data::<f64>().unwrap(), &[0.5, 1.5, 2.5, 3.5]);

    let ids = root.view("fields/ids").unwrap();
    assert_eq!(ids.shape(), &[2, 3]);
    assert_eq!(ids.data::<i32>().unwrap(), &[0, 1, 2, 3, 4, 5]);

    assert_eq!(root.view("meta/step").unwrap().scalar::<i64>().unwrap(), 42);
    assert_eq!(root.view("meta/title").unwrap().string(), Some("run"));
    assert!(root.view("meta/pending").unwrap().is_empty());
    assert_eq!(loaded.num_buffers(), 2);
}

#[test]
fn exported_json_is_stable() {
    let ds = sample_store();
    let first = ds.export_group(ds.root_id()).unwrap();

    let mut copy = DataStore::new();
    let root = copy.root_id();
    copy.import_group(root, &first).unwrap();
    let second = copy.export_group(copy.root_id()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn malformed_json_is_rejected_without_changes() {
    let mut ds = DataStore::new();
    let root = ds.root_id();
    let bad = serde_json::json!({ "buffers": [], "group": { "views": "nope" } });
    assert!(ds.import_group(root, &bad).is_err());
    assert_eq!(ds.num_views(), 0);
    assert_eq!(ds.num_groups(), 1);
}
