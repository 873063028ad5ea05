// src/catalog/rule.rs

//! Rule templates and the switch predicate that gates them.

use std::collections::BTreeMap;

use crate::catalog::pattern::PathPattern;
use crate::types::RuleRole;

/// Resolved switch values for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Switches {
    values: BTreeMap<String, bool>,
}

impl Switches {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value of a switch; switches never set count as off.
    pub fn is_on(&self, name: &str) -> bool {
        self.values.get(name).copied().unwrap_or(false)
    }

    pub fn set(&mut self, name: impl Into<String>, value: bool) {
        self.values.insert(name.into(), value);
    }

    pub fn with(mut self, name: impl Into<String>, value: bool) -> Self {
        self.set(name, value);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn enabled(&self) -> impl Iterator<Item = &str> {
        self.iter().filter(|(_, on)| *on).map(|(name, _)| name)
    }
}

impl FromIterator<(String, bool)> for Switches {
    fn from_iter<T: IntoIterator<Item = (String, bool)>>(iter: T) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// Inclusion predicate: every `when` switch on and every `unless` switch off.
///
/// Both rules and individual inputs carry one. All conditional topology goes
/// through [`Enablement::is_enabled`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Enablement {
    pub when: Vec<String>,
    pub unless: Vec<String>,
}

impl Enablement {
    pub fn always() -> Self {
        Self::default()
    }

    pub fn new(when: Vec<String>, unless: Vec<String>) -> Self {
        Self { when, unless }
    }

    pub fn is_enabled(&self, switches: &Switches) -> bool {
        self.when.iter().all(|s| switches.is_on(s))
            && !self.unless.iter().any(|s| switches.is_on(s))
    }

    /// Every switch name this predicate mentions.
    pub fn referenced(&self) -> impl Iterator<Item = &str> {
        self.when.iter().chain(self.unless.iter()).map(|s| s.as_str())
    }
}

/// A declared input of a rule, optionally present only under some switches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputSpec {
    pub pattern: PathPattern,
    pub enablement: Enablement,
}

impl InputSpec {
    pub fn new(pattern: PathPattern) -> Self {
        Self {
            pattern,
            enablement: Enablement::always(),
        }
    }
}

/// What running a rule instance means.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleAction {
    /// A shell command template handed to the task executor.
    Command(PathPattern),
    /// No work; the node only joins its dependencies and records a marker.
    Passthrough,
}

/// One entry of the rule catalog. Immutable once the catalog is loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleTemplate {
    pub name: String,
    pub role: RuleRole,
    pub description: Option<String>,
    /// Inputs produced by other rules; these create graph edges.
    pub inputs: Vec<InputSpec>,
    /// External files the executor reads; never used for edges.
    pub sources: Vec<PathPattern>,
    pub output: Option<PathPattern>,
    pub marker: PathPattern,
    pub log: PathPattern,
    pub action: RuleAction,
    pub enablement: Enablement,
}

impl RuleTemplate {
    pub fn is_enabled(&self, switches: &Switches) -> bool {
        self.enablement.is_enabled(switches)
    }

    /// Inputs that are present under the given switches.
    pub fn active_inputs<'a>(
        &'a self,
        switches: &'a Switches,
    ) -> impl Iterator<Item = &'a InputSpec> + 'a {
        self.inputs
            .iter()
            .filter(move |input| input.enablement.is_enabled(switches))
    }

    /// Every path pattern the rule writes (output first, then marker).
    pub fn produced_patterns(&self) -> impl Iterator<Item = &PathPattern> {
        self.output.iter().chain(std::iter::once(&self.marker))
    }

    pub fn is_passthrough(&self) -> bool {
        matches!(self.action, RuleAction::Passthrough)
    }
}
