// tests/units_resolution.rs

mod common;
use crate::common::builders::ConfigBuilder;

use std::error::Error;

use rulegraph::errors::RulegraphError;
use rulegraph::units::{is_path_safe, UnitSet, SCALAR_META_KEY};

type TestResult = Result<(), Box<dyn Error>>;

#[test]
fn units_keep_document_order() -> TestResult {
    let table: toml::Table = toml::from_str(
        r#"
"10" = {}
"2" = { time = "2021-05-04T10:01:30", scan = 7 }
"1" = "2021-05-04T10:00:00"
"#,
    )?;

    let units = UnitSet::from_table(&table)?;
    assert_eq!(units.ids().collect::<Vec<_>>(), ["10", "2", "1"]);

    let two = units.get("2").ok_or("unit 2 missing")?;
    assert_eq!(two.meta.get("time").map(String::as_str), Some("2021-05-04T10:01:30"));
    assert_eq!(two.meta.get("scan").map(String::as_str), Some("7"));

    let one = units.get("1").ok_or("unit 1 missing")?;
    assert_eq!(
        one.meta.get(SCALAR_META_KEY).map(String::as_str),
        Some("2021-05-04T10:00:00")
    );
    Ok(())
}

#[test]
fn unit_ids_must_be_path_safe() {
    assert!(is_path_safe("0"));
    assert!(is_path_safe("pointing-3.a"));
    assert!(!is_path_safe(""));
    assert!(!is_path_safe("."));
    assert!(!is_path_safe(".."));
    assert!(!is_path_safe("a/b"));
    assert!(!is_path_safe("has space"));

    match UnitSet::from_ids(["0", "../etc"]) {
        Err(RulegraphError::ConfigError(msg)) => assert!(msg.contains("path-safe"), "{msg}"),
        other => panic!("Expected ConfigError, got {other:?}"),
    }
}

#[test]
fn duplicate_unit_ids_are_rejected() {
    match UnitSet::from_ids(["0", "1", "0"]) {
        Err(RulegraphError::ConfigError(msg)) => {
            assert!(msg.contains("duplicate unit identifier '0'"), "{msg}")
        }
        other => panic!("Expected ConfigError, got {other:?}"),
    }
}

#[test]
fn empty_units_are_an_error_only_when_rules_fan_out() -> TestResult {
    let dir = tempfile::tempdir()?;
    let cfg = ConfigBuilder::new(dir.path()).build();

    let none = UnitSet::resolve(&cfg, false)?;
    assert!(none.is_empty());

    match UnitSet::resolve(&cfg, true) {
        Err(RulegraphError::ConfigError(msg)) => assert!(msg.contains("[units] is empty"), "{msg}"),
        other => panic!("Expected ConfigError, got {other:?}"),
    }
    Ok(())
}

#[test]
fn resolve_reads_units_from_config() -> TestResult {
    let dir = tempfile::tempdir()?;
    let cfg = ConfigBuilder::new(dir.path())
        .units(&["3", "1"])
        .unit_with("2", &[("time", "t2")])
        .build();

    let units = UnitSet::resolve(&cfg, true)?;
    assert_eq!(units.len(), 3);
    assert_eq!(units.ids().collect::<Vec<_>>(), ["3", "1", "2"]);
    assert_eq!(
        units.get("2").and_then(|u| u.meta.get("time")).map(String::as_str),
        Some("t2")
    );
    Ok(())
}
