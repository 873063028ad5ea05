// src/catalog/loader.rs

//! Catalog file format and its conversion into a validated [`Catalog`].
//!
//! ```toml
//! [switch.skip_merge]
//! default = false
//! description = "Keep one MS per pointing"
//!
//! [[exclusive]]
//! switches = ["split_calibrators", "skip_merge"]
//!
//! [rule.split]
//! role = "per_unit"
//! output = "{working_dir}/split/{unit}.ms"
//! cmd = "split -i {unit} -o {output}"
//!
//! [rule.merge]
//! role = "join"
//! unless = ["skip_merge"]
//! inputs = ["{working_dir}/split/{unit}.ms"]
//! output = "{output_dir}/merged.ms"
//! cmd = "merge {inputs} {output}"
//! ```
//!
//! Every malformed pattern or role violation is reported here, at load time.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;

use crate::catalog::pattern::{PathPattern, UNIT_PLACEHOLDER};
use crate::catalog::rule::{Enablement, InputSpec, RuleAction, RuleTemplate};
use crate::catalog::{Catalog, ExclusiveGroup, SwitchDecl, NODE_PLACEHOLDERS};
use crate::errors::{Result, RulegraphError};
use crate::types::RuleRole;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawCatalog {
    #[serde(default)]
    pub switch: BTreeMap<String, RawSwitch>,

    #[serde(default)]
    pub exclusive: Vec<RawExclusive>,

    #[serde(default)]
    pub rule: BTreeMap<String, RawRule>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawSwitch {
    #[serde(default)]
    pub default: bool,

    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawExclusive {
    pub switches: Vec<String>,

    #[serde(default)]
    pub reason: Option<String>,
}

/// `[rule.<name>]` section, patterns still as plain strings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawRule {
    #[serde(default)]
    pub role: RuleRole,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub inputs: Vec<RawInput>,

    #[serde(default)]
    pub sources: Vec<String>,

    #[serde(default)]
    pub output: Option<String>,

    #[serde(default)]
    pub marker: Option<String>,

    #[serde(default)]
    pub log: Option<String>,

    /// Shell command template; a rule without one is a passthrough.
    #[serde(default)]
    pub cmd: Option<String>,

    #[serde(default)]
    pub when: Vec<String>,

    #[serde(default)]
    pub unless: Vec<String>,
}

/// An input is either a bare path or a path with its own switch predicate.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawInput {
    Path(String),
    Conditional {
        path: String,
        #[serde(default)]
        when: Vec<String>,
        #[serde(default)]
        unless: Vec<String>,
    },
}

/// Parse and validate a catalog from TOML text.
pub fn parse_catalog(text: &str) -> Result<Catalog> {
    let raw: RawCatalog = toml::from_str(text)?;
    Catalog::try_from(raw)
}

/// Read, parse and validate a catalog file.
pub fn load_catalog(path: impl AsRef<Path>) -> Result<Catalog> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|e| {
        RulegraphError::config(format!("reading catalog file {:?}: {e}", path))
    })?;
    parse_catalog(&text)
}

fn rule_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_-]*$").expect("static regex"))
}

impl TryFrom<RawCatalog> for Catalog {
    type Error = RulegraphError;

    fn try_from(raw: RawCatalog) -> std::result::Result<Self, Self::Error> {
        if raw.rule.is_empty() {
            return Err(RulegraphError::config(
                "catalog must contain at least one [rule.<name>] section",
            ));
        }

        let switches: Vec<SwitchDecl> = raw
            .switch
            .into_iter()
            .map(|(name, s)| SwitchDecl {
                name,
                default: s.default,
                description: s.description,
            })
            .collect();

        let exclusive = raw
            .exclusive
            .into_iter()
            .map(|group| convert_exclusive(group, &switches))
            .collect::<Result<Vec<_>>>()?;

        let rules = raw
            .rule
            .into_iter()
            .map(|(name, rule)| convert_rule(name, rule, &switches))
            .collect::<Result<Vec<_>>>()?;

        Ok(Catalog::new_unchecked(rules, switches, exclusive))
    }
}

fn is_declared(switches: &[SwitchDecl], name: &str) -> bool {
    switches.iter().any(|s| s.name == name)
}

fn convert_exclusive(raw: RawExclusive, switches: &[SwitchDecl]) -> Result<ExclusiveGroup> {
    if raw.switches.len() < 2 {
        return Err(RulegraphError::config(format!(
            "[[exclusive]] group {:?} must name at least two switches",
            raw.switches
        )));
    }
    for name in &raw.switches {
        if !is_declared(switches, name) {
            return Err(RulegraphError::config(format!(
                "[[exclusive]] group references undeclared switch '{name}'"
            )));
        }
    }
    Ok(ExclusiveGroup {
        switches: raw.switches,
        reason: raw.reason,
    })
}

fn check_switch_refs(
    rule: &str,
    enablement: &Enablement,
    switches: &[SwitchDecl],
) -> Result<()> {
    for name in enablement.referenced() {
        if !is_declared(switches, name) {
            return Err(RulegraphError::config(format!(
                "rule '{rule}' references undeclared switch '{name}'"
            )));
        }
    }
    Ok(())
}

fn convert_rule(name: String, raw: RawRule, switches: &[SwitchDecl]) -> Result<RuleTemplate> {
    if !rule_name_re().is_match(&name) {
        return Err(RulegraphError::config(format!(
            "invalid rule name '{name}' (expected letters, digits, '_' or '-')"
        )));
    }

    let parse = |field: &str, text: &str| {
        PathPattern::parse(text).map_err(|e| {
            RulegraphError::config(format!("rule '{name}': {field} {text:?}: {e}"))
        })
    };

    let enablement = Enablement::new(raw.when, raw.unless);
    check_switch_refs(&name, &enablement, switches)?;

    let mut inputs = Vec::with_capacity(raw.inputs.len());
    for input in raw.inputs {
        let spec = match input {
            RawInput::Path(path) => InputSpec::new(parse("input", &path)?),
            RawInput::Conditional { path, when, unless } => InputSpec {
                pattern: parse("input", &path)?,
                enablement: Enablement::new(when, unless),
            },
        };
        check_switch_refs(&name, &spec.enablement, switches)?;
        inputs.push(spec);
    }

    let sources = raw
        .sources
        .iter()
        .map(|s| parse("source", s))
        .collect::<Result<Vec<_>>>()?;

    let output = raw.output.as_deref().map(|s| parse("output", s)).transpose()?;

    let per_unit = raw.role == RuleRole::PerUnit;
    let marker = match raw.marker.as_deref() {
        Some(s) => parse("marker", s)?,
        None => parse("marker", default_marker(per_unit))?,
    };
    let log = match raw.log.as_deref() {
        Some(s) => parse("log", s)?,
        None => parse("log", default_log(per_unit))?,
    };

    let action = match raw.cmd.as_deref() {
        Some(s) => RuleAction::Command(parse("cmd", s)?),
        None => RuleAction::Passthrough,
    };

    let rule = RuleTemplate {
        name,
        role: raw.role,
        description: raw.description,
        inputs,
        sources,
        output,
        marker,
        log,
        action,
        enablement,
    };

    check_role_constraints(&rule)?;
    check_node_placeholders(&rule)?;
    Ok(rule)
}

fn default_marker(per_unit: bool) -> &'static str {
    if per_unit {
        "{log_dir}/markers/{rule}_{unit}.done"
    } else {
        "{log_dir}/markers/{rule}.done"
    }
}

fn default_log(per_unit: bool) -> &'static str {
    if per_unit {
        "{log_dir}/{rule}_{unit}.log"
    } else {
        "{log_dir}/{rule}.log"
    }
}

/// `{unit}` usage must agree with how many instances a rule gets.
fn check_role_constraints(rule: &RuleTemplate) -> Result<()> {
    let fail = |what: &str, msg: &str| {
        Err(RulegraphError::config(format!(
            "rule '{}' ({:?}): {what} {msg}",
            rule.name, rule.role
        )))
    };

    let written = rule
        .output
        .iter()
        .map(|p| ("output", p))
        .chain([("marker", &rule.marker), ("log", &rule.log)]);

    match rule.role {
        RuleRole::PerUnit => {
            for (what, pattern) in written {
                if !pattern.uses(UNIT_PLACEHOLDER) {
                    return fail(
                        what,
                        "must contain {unit} so fan-out instances never share a path",
                    );
                }
            }
        }
        RuleRole::Single => {
            let read = rule
                .inputs
                .iter()
                .map(|i| ("input", &i.pattern))
                .chain(rule.sources.iter().map(|s| ("source", s)));
            for (what, pattern) in written.chain(read) {
                if pattern.uses_unit() {
                    return fail(
                        what,
                        "may not reference the unit; use role = \"join\" or \"per_unit\"",
                    );
                }
            }
            if let RuleAction::Command(cmd) = &rule.action {
                if cmd.uses_unit() {
                    return fail("cmd", "may not reference the unit");
                }
            }
        }
        RuleRole::Join => {
            for (what, pattern) in written {
                if pattern.uses_unit() {
                    return fail(what, "is written once by a join and may not reference the unit");
                }
            }
            if let RuleAction::Command(cmd) = &rule.action {
                if cmd.uses_unit() {
                    return fail("cmd", "may not reference the unit; use {inputs} instead");
                }
            }
        }
    }
    Ok(())
}

/// `{inputs}`, `{output}` and friends only make sense inside commands.
fn check_node_placeholders(rule: &RuleTemplate) -> Result<()> {
    let paths = rule
        .inputs
        .iter()
        .map(|i| &i.pattern)
        .chain(rule.sources.iter())
        .chain(rule.output.iter())
        .chain([&rule.marker, &rule.log]);

    for pattern in paths {
        if let Some(name) = pattern
            .placeholders()
            .find(|p| NODE_PLACEHOLDERS.contains(p))
        {
            return Err(RulegraphError::config(format!(
                "rule '{}': path {:?} uses {{{name}}}, which is only available in cmd",
                rule.name,
                pattern.as_str()
            )));
        }
    }
    Ok(())
}
