// src/catalog/mod.rs

//! The rule catalog: static rule templates plus the switches that gate them.
//!
//! - [`pattern`] holds the typed `{placeholder}` templates.
//! - [`rule`] defines rule templates and the enablement predicate.
//! - [`loader`] parses catalog TOML and validates it.
//!
//! The OTF to MS conversion pipeline ships as the built-in catalog
//! (`otfms.toml`, compiled into the binary).

pub mod loader;
pub mod pattern;
pub mod rule;

use tracing::debug;

use crate::errors::{Result, RulegraphError};
use crate::types::RuleRole;

pub use loader::{load_catalog, parse_catalog, RawCatalog, RawInput, RawRule};
pub use pattern::{PathPattern, PatternError, Vars};
pub use rule::{Enablement, InputSpec, RuleAction, RuleTemplate, Switches};

/// Placeholders bound per task node; only valid inside `cmd`.
pub const NODE_PLACEHOLDERS: &[&str] = &["inputs", "sources", "output", "marker", "log"];

const BUILTIN_CATALOG: &str = include_str!("otfms.toml");

/// Above this many switches, enumerating every combination is refused.
const MAX_ENUMERATED_SWITCHES: usize = 16;

/// `[switch.<name>]` declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchDecl {
    pub name: String,
    pub default: bool,
    pub description: Option<String>,
}

/// Switches that may not be on at the same time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExclusiveGroup {
    pub switches: Vec<String>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Catalog {
    rules: Vec<RuleTemplate>,
    switches: Vec<SwitchDecl>,
    exclusive: Vec<ExclusiveGroup>,
}

impl Catalog {
    pub(crate) fn new_unchecked(
        rules: Vec<RuleTemplate>,
        switches: Vec<SwitchDecl>,
        exclusive: Vec<ExclusiveGroup>,
    ) -> Self {
        Self {
            rules,
            switches,
            exclusive,
        }
    }

    /// The catalog compiled into the binary.
    pub fn builtin() -> Result<Self> {
        parse_catalog(BUILTIN_CATALOG)
    }

    pub fn rules(&self) -> &[RuleTemplate] {
        &self.rules
    }

    pub fn rule(&self, name: &str) -> Option<&RuleTemplate> {
        self.rules.iter().find(|r| r.name == name)
    }

    pub fn switches(&self) -> &[SwitchDecl] {
        &self.switches
    }

    pub fn exclusive_groups(&self) -> &[ExclusiveGroup] {
        &self.exclusive
    }

    pub fn default_switches(&self) -> Switches {
        self.switches
            .iter()
            .map(|s| (s.name.clone(), s.default))
            .collect()
    }

    /// Start from the declared defaults and apply `overrides` in order.
    pub fn resolve_switches<'a, I>(&self, overrides: I) -> Result<Switches>
    where
        I: IntoIterator<Item = (&'a str, bool)>,
    {
        let mut switches = self.default_switches();
        for (name, value) in overrides {
            switches.set(name, value);
        }
        self.check_switches(&switches)?;
        Ok(switches)
    }

    /// Reject unknown switch names and combinations an exclusive group forbids.
    pub fn check_switches(&self, switches: &Switches) -> Result<()> {
        for (name, _) in switches.iter() {
            if !self.switches.iter().any(|s| s.name == name) {
                let known: Vec<&str> = self.switches.iter().map(|s| s.name.as_str()).collect();
                return Err(RulegraphError::config(format!(
                    "unknown switch '{name}' (catalog declares: {})",
                    known.join(", ")
                )));
            }
        }

        for group in &self.exclusive {
            let on: Vec<&str> = group
                .switches
                .iter()
                .map(|s| s.as_str())
                .filter(|s| switches.is_on(s))
                .collect();
            if on.len() > 1 {
                let reason = group
                    .reason
                    .as_deref()
                    .map(|r| format!(" ({r})"))
                    .unwrap_or_default();
                return Err(RulegraphError::config(format!(
                    "incompatible switches: {} cannot be enabled together{reason}",
                    on.join(" and ")
                )));
            }
        }
        Ok(())
    }

    pub fn enabled_rules<'a>(
        &'a self,
        switches: &'a Switches,
    ) -> impl Iterator<Item = &'a RuleTemplate> + 'a {
        self.rules.iter().filter(move |r| r.is_enabled(switches))
    }

    /// Whether any enabled rule fans out or joins over units.
    pub fn requires_units(&self, switches: &Switches) -> bool {
        self.enabled_rules(switches)
            .any(|r| r.role != RuleRole::Single)
    }

    /// Every switch assignment that passes [`Catalog::check_switches`].
    pub fn legal_switch_combinations(&self) -> Result<Vec<Switches>> {
        let n = self.switches.len();
        if n > MAX_ENUMERATED_SWITCHES {
            return Err(RulegraphError::config(format!(
                "catalog declares {n} switches; refusing to enumerate more than {MAX_ENUMERATED_SWITCHES}"
            )));
        }

        let mut legal = Vec::new();
        for bits in 0u32..(1u32 << n) {
            let switches: Switches = self
                .switches
                .iter()
                .enumerate()
                .map(|(i, s)| (s.name.clone(), bits & (1 << i) != 0))
                .collect();
            if self.check_switches(&switches).is_ok() {
                legal.push(switches);
            }
        }

        debug!(
            declared = n,
            legal = legal.len(),
            "enumerated legal switch combinations"
        );
        Ok(legal)
    }
}
