// tests/catalog_loading.rs

mod common;
use crate::common::builders::{CatalogBuilder, RuleBuilder};

use std::error::Error;
use std::path::{Path, PathBuf};

use rulegraph::catalog::pattern::normalize_path;
use rulegraph::catalog::{parse_catalog, Catalog, PathPattern, PatternError, Vars};
use rulegraph::errors::RulegraphError;

type TestResult = Result<(), Box<dyn Error>>;

fn expect_config_error(result: rulegraph::errors::Result<Catalog>, needle: &str) {
    match result {
        Err(RulegraphError::ConfigError(msg)) => {
            assert!(msg.contains(needle), "expected {needle:?} in {msg:?}");
        }
        Err(e) => panic!("Expected ConfigError, got: {e:?}"),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn pattern_renders_placeholders_and_escaped_braces() -> TestResult {
    let pattern = PathPattern::parse("{working_dir}/{{raw}}/split_{unit}.ms")?;
    assert_eq!(pattern.placeholders().collect::<Vec<_>>(), ["working_dir", "unit"]);
    assert!(pattern.uses_unit());

    let vars = Vars::new().with("working_dir", "/w").with("unit", "3");
    assert_eq!(pattern.render(&vars)?, "/w/{raw}/split_3.ms");
    Ok(())
}

#[test]
fn malformed_patterns_are_rejected() {
    assert_eq!(PathPattern::parse("{unit"), Err(PatternError::Unclosed(0)));
    assert_eq!(PathPattern::parse("a}b"), Err(PatternError::Unmatched(1)));
    assert_eq!(
        PathPattern::parse("x/{}"),
        Err(PatternError::InvalidName(String::new()))
    );
    assert!(matches!(
        PathPattern::parse("{1abc}"),
        Err(PatternError::InvalidName(_))
    ));
}

#[test]
fn unit_metadata_placeholders_count_as_unit_usage() -> TestResult {
    let pattern = PathPattern::parse("--time {unit.time}")?;
    assert!(pattern.uses_unit());
    assert!(!pattern.uses("unit"));
    Ok(())
}

#[test]
fn rendering_an_unknown_placeholder_fails() -> TestResult {
    let pattern = PathPattern::parse("{a}/{b}")?;
    let vars = Vars::new().with("a", "x");
    assert_eq!(pattern.render(&vars), Err(PatternError::Unknown("b".into())));
    Ok(())
}

#[test]
fn paths_are_normalized_lexically() {
    assert_eq!(normalize_path(Path::new("a/./b/../c")), PathBuf::from("a/c"));
    assert_eq!(normalize_path(Path::new("/w/x/../../y")), PathBuf::from("/y"));
    assert_eq!(normalize_path(Path::new("../a")), PathBuf::from("../a"));
}

#[test]
fn per_unit_rule_must_put_unit_in_output() {
    let result = CatalogBuilder::new()
        .rule(RuleBuilder::per_unit("split").output("{working_dir}/split.ms").cmd("true"))
        .try_build();
    expect_config_error(result, "must contain {unit}");
}

#[test]
fn single_rule_may_not_reference_unit() {
    let result = CatalogBuilder::new()
        .rule(RuleBuilder::single("flag").cmd("flag -i {unit}"))
        .try_build();
    expect_config_error(result, "may not reference the unit");
}

#[test]
fn join_output_may_not_reference_unit() {
    let result = CatalogBuilder::new()
        .rule(
            RuleBuilder::join("merge")
                .input("{working_dir}/{unit}.ms")
                .output("{working_dir}/merged_{unit}.ms")
                .cmd("merge"),
        )
        .try_build();
    expect_config_error(result, "may not reference the unit");
}

#[test]
fn undeclared_switch_reference_is_rejected() {
    let result = CatalogBuilder::new()
        .rule(RuleBuilder::single("a").when("ghost").cmd("true"))
        .try_build();
    expect_config_error(result, "undeclared switch 'ghost'");

    let result = CatalogBuilder::new()
        .rule(
            RuleBuilder::single("b")
                .input_unless("{working_dir}/x", "phantom")
                .cmd("true"),
        )
        .try_build();
    expect_config_error(result, "undeclared switch 'phantom'");
}

#[test]
fn exclusive_group_needs_two_declared_switches() {
    let result = CatalogBuilder::new()
        .switch("a", false)
        .exclusive(&["a"])
        .rule(RuleBuilder::single("r").cmd("true"))
        .try_build();
    expect_config_error(result, "at least two switches");

    let result = CatalogBuilder::new()
        .switch("a", false)
        .exclusive(&["a", "b"])
        .rule(RuleBuilder::single("r").cmd("true"))
        .try_build();
    expect_config_error(result, "undeclared switch 'b'");
}

#[test]
fn node_placeholders_are_only_allowed_in_commands() {
    let result = CatalogBuilder::new()
        .rule(
            RuleBuilder::single("r")
                .output("{working_dir}/{inputs}")
                .cmd("true"),
        )
        .try_build();
    expect_config_error(result, "only available in cmd");
}

#[test]
fn empty_catalog_is_rejected() {
    expect_config_error(parse_catalog(""), "at least one [rule.<name>]");
}

#[test]
fn malformed_pattern_in_catalog_file_names_the_rule() {
    let text = r#"
[rule.split]
role = "per_unit"
output = "{working_dir/{unit}.ms"
cmd = "split"
"#;
    expect_config_error(parse_catalog(text), "rule 'split'");
}

#[test]
fn unknown_catalog_keys_are_toml_errors() {
    let text = r#"
[rule.a]
cmd = "true"
retries = 3
"#;
    assert!(matches!(parse_catalog(text), Err(RulegraphError::TomlError(_))));
}

#[test]
fn markers_and_logs_default_from_rule_name() -> TestResult {
    let catalog = parse_catalog(
        r#"
[rule.split]
role = "per_unit"
output = "{working_dir}/{unit}.ms"
cmd = "split {unit}"

[rule.all]
role = "join"
inputs = ["{working_dir}/{unit}.ms"]
"#,
    )?;

    let split = catalog.rule("split").ok_or("split missing")?;
    assert_eq!(split.marker.as_str(), "{log_dir}/markers/{rule}_{unit}.done");
    assert_eq!(split.log.as_str(), "{log_dir}/{rule}_{unit}.log");
    assert!(!split.is_passthrough());

    let all = catalog.rule("all").ok_or("all missing")?;
    assert_eq!(all.marker.as_str(), "{log_dir}/markers/{rule}.done");
    assert!(all.is_passthrough());
    Ok(())
}

#[test]
fn switch_resolution_checks_names_and_exclusivity() -> TestResult {
    let catalog = CatalogBuilder::new()
        .switch("a", false)
        .switch("b", true)
        .exclusive(&["a", "b"])
        .rule(RuleBuilder::single("r").cmd("true"))
        .build();

    let defaults = catalog.resolve_switches(std::iter::empty::<(&str, bool)>())?;
    assert!(defaults.is_on("b"));
    assert!(!defaults.is_on("a"));

    let flipped = catalog.resolve_switches([("a", true), ("b", false)])?;
    assert!(flipped.is_on("a"));

    match catalog.resolve_switches([("a", true)]) {
        Err(RulegraphError::ConfigError(msg)) => {
            assert!(msg.contains("incompatible switches"), "{msg}");
            assert!(msg.contains("a and b"), "{msg}");
        }
        other => panic!("Expected incompatible switches, got {other:?}"),
    }

    match catalog.resolve_switches([("c", true)]) {
        Err(RulegraphError::ConfigError(msg)) => assert!(msg.contains("unknown switch 'c'")),
        other => panic!("Expected unknown switch, got {other:?}"),
    }
    Ok(())
}

#[test]
fn builtin_catalog_enumerates_legal_combinations() -> TestResult {
    let catalog = Catalog::builtin()?;
    assert_eq!(catalog.switches().len(), 4);

    // 16 assignments; with skip_merge on, split_calibrators and deep_clean
    // must be off, leaving 8 + 2.
    let legal = catalog.legal_switch_combinations()?;
    assert_eq!(legal.len(), 10);
    for switches in &legal {
        assert!(!(switches.is_on("skip_merge") && switches.is_on("split_calibrators")));
        assert!(!(switches.is_on("skip_merge") && switches.is_on("deep_clean")));
    }
    Ok(())
}
