// src/config/model.rs

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::catalog::Vars;
use crate::types::FailurePolicy;

/// Top-level run configuration as read from a TOML file.
///
/// ```toml
/// catalog = "catalog.toml"      # optional; built-in catalog otherwise
///
/// [env]
/// working_dir = "work"
/// max_concurrency = 4
///
/// [switches]
/// skip_merge = true
///
/// [params]
/// ms = "/data/obs.ms"
///
/// [units]
/// "0" = { time = "2021-05-04T10:00:00" }
/// "1" = { time = "2021-05-04T10:01:30" }
/// ```
///
/// Only `[env].working_dir` is mandatory.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    /// Catalog file, relative to the config file's directory.
    #[serde(default)]
    pub catalog: Option<PathBuf>,

    pub env: EnvSection,

    /// Switch overrides; anything not listed keeps the catalog default.
    #[serde(default)]
    pub switches: BTreeMap<String, bool>,

    /// Free-form values available as `{name}` placeholders.
    #[serde(default)]
    pub params: BTreeMap<String, String>,

    /// Unit identifier -> metadata, in document order.
    #[serde(default)]
    pub units: toml::Table,
}

/// `[env]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnvSection {
    pub working_dir: PathBuf,

    /// Defaults to `<working_dir>/output`.
    #[serde(default)]
    pub output_dir: Option<PathBuf>,

    /// Defaults to `<working_dir>/logs`. Markers live under `<log_dir>/markers`.
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// Maximum number of executor invocations in flight.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    #[serde(default)]
    pub failure_policy: FailurePolicy,
}

fn default_max_concurrency() -> usize {
    1
}

impl EnvSection {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
            output_dir: None,
            log_dir: None,
            max_concurrency: default_max_concurrency(),
            failure_policy: FailurePolicy::default(),
        }
    }
}

/// Validated configuration. Construct through `TryFrom<RawConfigFile>` or
/// [`crate::config::load_and_validate`].
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub catalog: Option<PathBuf>,
    pub env: EnvSection,
    pub switches: BTreeMap<String, bool>,
    pub params: BTreeMap<String, String>,
    pub units: toml::Table,
    /// Path of the file this config was read from, if any.
    pub source: Option<PathBuf>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(raw: RawConfigFile) -> Self {
        Self {
            catalog: raw.catalog,
            env: raw.env,
            switches: raw.switches,
            params: raw.params,
            units: raw.units,
            source: None,
        }
    }

    /// Anchor relative directories at `root` and remember the source file.
    pub fn rebase(mut self, root: &Path, source: &Path) -> Self {
        let anchor = |p: &Path| {
            if p.is_absolute() {
                p.to_path_buf()
            } else {
                root.join(p)
            }
        };
        self.env.working_dir = anchor(&self.env.working_dir);
        self.env.output_dir = self.env.output_dir.as_deref().map(anchor);
        self.env.log_dir = self.env.log_dir.as_deref().map(anchor);
        self.catalog = self.catalog.as_deref().map(anchor);
        self.source = Some(source.to_path_buf());
        self
    }

    pub fn working_dir(&self) -> &Path {
        &self.env.working_dir
    }

    pub fn output_dir(&self) -> PathBuf {
        self.env
            .output_dir
            .clone()
            .unwrap_or_else(|| self.env.working_dir.join("output"))
    }

    pub fn log_dir(&self) -> PathBuf {
        self.env
            .log_dir
            .clone()
            .unwrap_or_else(|| self.env.working_dir.join("logs"))
    }

    /// Switch overrides as `(name, value)` pairs.
    pub fn switch_overrides(&self) -> impl Iterator<Item = (&str, bool)> {
        self.switches.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Run-wide placeholder values: directories, `config_file` and `[params]`.
    pub fn base_vars(&self) -> Vars {
        let mut vars = Vars::new()
            .with("working_dir", path_str(self.working_dir()))
            .with("output_dir", path_str(&self.output_dir()))
            .with("log_dir", path_str(&self.log_dir()));
        if let Some(source) = &self.source {
            vars.insert("config_file", path_str(source));
        }
        for (name, value) in &self.params {
            vars.insert(name.clone(), value.clone());
        }
        vars
    }
}

fn path_str(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
