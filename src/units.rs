// src/units.rs

//! Unit set resolution: the ordered partition identifiers that drive fan-out.

use std::collections::{BTreeMap, HashSet};
use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use crate::config::model::ConfigFile;
use crate::errors::{Result, RulegraphError};

/// Canonical unit identifier type.
pub type UnitId = String;

/// Metadata key used when a unit is given as a bare scalar
/// (`"3" = "2021-05-04T10:00:00"`).
pub const SCALAR_META_KEY: &str = "value";

/// One data partition plus whatever the configuration says about it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unit {
    pub id: UnitId,
    pub meta: BTreeMap<String, String>,
}

impl Unit {
    pub fn new(id: impl Into<UnitId>) -> Self {
        Self {
            id: id.into(),
            meta: BTreeMap::new(),
        }
    }
}

/// Ordered, duplicate-free set of units. Never mutated once built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitSet {
    units: Vec<Unit>,
}

fn unit_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.+-]*$").expect("static regex"))
}

/// Whether `id` can be spliced into a path as a single component.
pub fn is_path_safe(id: &str) -> bool {
    id != "." && id != ".." && unit_id_re().is_match(id)
}

impl UnitSet {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from units in the given order, rejecting unsafe or repeated ids.
    pub fn from_units(units: Vec<Unit>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(units.len());
        for unit in &units {
            if !is_path_safe(&unit.id) {
                return Err(RulegraphError::config(format!(
                    "unit identifier {:?} is not a path-safe token",
                    unit.id
                )));
            }
            if !seen.insert(unit.id.as_str()) {
                return Err(RulegraphError::config(format!(
                    "duplicate unit identifier '{}'",
                    unit.id
                )));
            }
        }
        Ok(Self { units })
    }

    pub fn from_ids<I, S>(ids: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<UnitId>,
    {
        Self::from_units(ids.into_iter().map(Unit::new).collect())
    }

    /// Build from a `[units]` table, keeping document order.
    ///
    /// Each value is either a table of metadata or a scalar, stored under
    /// [`SCALAR_META_KEY`].
    pub fn from_table(table: &toml::Table) -> Result<Self> {
        let units = table
            .iter()
            .map(|(id, value)| {
                let meta = match value {
                    toml::Value::Table(fields) => fields
                        .iter()
                        .map(|(k, v)| (k.clone(), value_to_string(v)))
                        .collect(),
                    scalar => {
                        BTreeMap::from([(SCALAR_META_KEY.to_string(), value_to_string(scalar))])
                    }
                };
                Unit {
                    id: id.clone(),
                    meta,
                }
            })
            .collect();
        Self::from_units(units)
    }

    /// Resolve the unit set for a run.
    ///
    /// `requires_units` is true when an enabled rule fans out or joins; an
    /// empty set is then a configuration error rather than a graph with no
    /// fan-out instances.
    pub fn resolve(cfg: &ConfigFile, requires_units: bool) -> Result<Self> {
        let set = Self::from_table(&cfg.units)?;
        if requires_units && set.is_empty() {
            return Err(RulegraphError::config(
                "[units] is empty, but the enabled rules fan out over units",
            ));
        }
        debug!(units = set.len(), "resolved unit set");
        Ok(set)
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Unit> {
        self.units.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.units.iter().map(|u| u.id.as_str())
    }

    pub fn get(&self, id: &str) -> Option<&Unit> {
        self.units.iter().find(|u| u.id == id)
    }
}

fn value_to_string(value: &toml::Value) -> String {
    match value {
        toml::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
