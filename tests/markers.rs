// tests/markers.rs

mod common;
use crate::common::build_graph;
use crate::common::builders::{fan_out_catalog, ConfigBuilder};

use std::error::Error;
use std::fs;

use rulegraph::dag::TaskNode;
use rulegraph::errors::RulegraphError;
use rulegraph::marker::{
    self, FileMarkerStore, MarkerRecord, MarkerStatus, MarkerStore, MemoryMarkerStore,
};

type TestResult = Result<(), Box<dyn Error>>;

fn split_node(wd: &std::path::Path) -> Result<TaskNode, Box<dyn Error>> {
    let cfg = ConfigBuilder::new(wd).units(&["0"]).build();
    let graph = build_graph(&fan_out_catalog(), &cfg)?;
    let idx = graph.find_by_name("split[0]").ok_or("no split[0]")?;
    Ok(graph.node(idx).clone())
}

#[test]
fn file_store_writes_markers_under_nested_dirs() -> TestResult {
    let dir = tempfile::tempdir()?;
    let node = split_node(dir.path())?;
    let store = FileMarkerStore::new();

    assert_eq!(store.status(&node)?, MarkerStatus::Missing);
    store.save(&node.marker, &MarkerRecord::for_node(&node))?;
    assert!(node.marker.exists());
    assert_eq!(store.status(&node)?, MarkerStatus::Current);

    let text = fs::read_to_string(&node.marker)?;
    assert!(text.contains("task = \"split[0]\""), "{text}");
    assert!(text.contains(&node.fingerprint));

    store.remove(&node.marker)?;
    assert!(!node.marker.exists());
    // Removing twice is fine.
    store.remove(&node.marker)?;
    Ok(())
}

#[test]
fn marker_for_another_definition_is_stale() -> TestResult {
    let dir = tempfile::tempdir()?;
    let node = split_node(dir.path())?;
    let store = MemoryMarkerStore::new();

    let mut record = MarkerRecord::for_node(&node);
    record.fingerprint = "0".repeat(64);
    store.save(&node.marker, &record)?;

    assert_eq!(
        store.status(&node)?,
        MarkerStatus::Stale {
            recorded: "0".repeat(64)
        }
    );
    Ok(())
}

#[test]
fn corrupt_marker_is_an_error_that_check_downgrades() -> TestResult {
    let dir = tempfile::tempdir()?;
    let node = split_node(dir.path())?;
    fs::create_dir_all(node.marker.parent().ok_or("marker has no parent")?)?;
    fs::write(&node.marker, "task = ")?;

    let store = FileMarkerStore::new();
    assert!(matches!(
        store.load(&node.marker),
        Err(RulegraphError::MarkerError { .. })
    ));
    assert_eq!(marker::check(&store, &node), MarkerStatus::Missing);
    Ok(())
}

#[test]
fn fingerprint_is_stable_and_sensitive() -> TestResult {
    let dir = tempfile::tempdir()?;
    let node = split_node(dir.path())?;

    assert_eq!(marker::fingerprint(&node), node.fingerprint);
    assert_eq!(node.fingerprint.len(), 64);

    let mut changed = node.clone();
    changed.command = Some("split 0 --other".into());
    assert_ne!(marker::fingerprint(&changed), node.fingerprint);

    let mut moved = node.clone();
    moved.output = Some(dir.path().join("elsewhere.out"));
    assert_ne!(marker::fingerprint(&moved), node.fingerprint);

    // The log location is not part of the definition.
    let mut relogged = node.clone();
    relogged.log = dir.path().join("other.log");
    assert_eq!(marker::fingerprint(&relogged), node.fingerprint);
    Ok(())
}
