#![allow(dead_code)]

use std::path::Path;

use rulegraph::catalog::loader::{RawExclusive, RawSwitch};
use rulegraph::catalog::{Catalog, RawCatalog, RawInput, RawRule};
use rulegraph::config::{ConfigFile, EnvSection, RawConfigFile};
use rulegraph::errors::Result;
use rulegraph::types::{FailurePolicy, RuleRole};

/// Builder for one `[rule.<name>]` entry.
pub struct RuleBuilder {
    name: String,
    rule: RawRule,
}

impl RuleBuilder {
    fn with_role(name: &str, role: RuleRole) -> Self {
        Self {
            name: name.to_string(),
            rule: RawRule {
                role,
                ..RawRule::default()
            },
        }
    }

    pub fn single(name: &str) -> Self {
        Self::with_role(name, RuleRole::Single)
    }

    pub fn per_unit(name: &str) -> Self {
        Self::with_role(name, RuleRole::PerUnit)
    }

    pub fn join(name: &str) -> Self {
        Self::with_role(name, RuleRole::Join)
    }

    pub fn input(mut self, path: &str) -> Self {
        self.rule.inputs.push(RawInput::Path(path.to_string()));
        self
    }

    pub fn input_when(mut self, path: &str, switch: &str) -> Self {
        self.rule.inputs.push(RawInput::Conditional {
            path: path.to_string(),
            when: vec![switch.to_string()],
            unless: vec![],
        });
        self
    }

    pub fn input_unless(mut self, path: &str, switch: &str) -> Self {
        self.rule.inputs.push(RawInput::Conditional {
            path: path.to_string(),
            when: vec![],
            unless: vec![switch.to_string()],
        });
        self
    }

    pub fn source(mut self, path: &str) -> Self {
        self.rule.sources.push(path.to_string());
        self
    }

    pub fn output(mut self, path: &str) -> Self {
        self.rule.output = Some(path.to_string());
        self
    }

    pub fn marker(mut self, path: &str) -> Self {
        self.rule.marker = Some(path.to_string());
        self
    }

    pub fn cmd(mut self, cmd: &str) -> Self {
        self.rule.cmd = Some(cmd.to_string());
        self
    }

    pub fn when(mut self, switch: &str) -> Self {
        self.rule.when.push(switch.to_string());
        self
    }

    pub fn unless(mut self, switch: &str) -> Self {
        self.rule.unless.push(switch.to_string());
        self
    }
}

/// Builder for a `Catalog`, going through the same validation as a file.
pub struct CatalogBuilder {
    raw: RawCatalog,
}

impl CatalogBuilder {
    pub fn new() -> Self {
        Self {
            raw: RawCatalog::default(),
        }
    }

    pub fn switch(mut self, name: &str, default: bool) -> Self {
        self.raw.switch.insert(
            name.to_string(),
            RawSwitch {
                default,
                description: None,
            },
        );
        self
    }

    pub fn exclusive(mut self, switches: &[&str]) -> Self {
        self.raw.exclusive.push(RawExclusive {
            switches: switches.iter().map(|s| s.to_string()).collect(),
            reason: None,
        });
        self
    }

    pub fn rule(mut self, rule: RuleBuilder) -> Self {
        self.raw.rule.insert(rule.name, rule.rule);
        self
    }

    pub fn try_build(self) -> Result<Catalog> {
        Catalog::try_from(self.raw)
    }

    pub fn build(self) -> Catalog {
        self.try_build().expect("Failed to build valid catalog from builder")
    }
}

impl Default for CatalogBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigBuilder {
    raw: RawConfigFile,
}

impl ConfigBuilder {
    pub fn new(working_dir: impl AsRef<Path>) -> Self {
        Self {
            raw: RawConfigFile {
                catalog: None,
                env: EnvSection::new(working_dir.as_ref()),
                switches: Default::default(),
                params: Default::default(),
                units: toml::Table::new(),
            },
        }
    }

    pub fn max_concurrency(mut self, n: usize) -> Self {
        self.raw.env.max_concurrency = n;
        self
    }

    pub fn log_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.raw.env.log_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.raw.env.failure_policy = policy;
        self
    }

    pub fn switch(mut self, name: &str, value: bool) -> Self {
        self.raw.switches.insert(name.to_string(), value);
        self
    }

    pub fn param(mut self, name: &str, value: &str) -> Self {
        self.raw.params.insert(name.to_string(), value.to_string());
        self
    }

    pub fn unit(mut self, id: &str) -> Self {
        self.raw
            .units
            .insert(id.to_string(), toml::Value::Table(toml::Table::new()));
        self
    }

    pub fn units(mut self, ids: &[&str]) -> Self {
        for id in ids {
            self = self.unit(id);
        }
        self
    }

    pub fn unit_with(mut self, id: &str, meta: &[(&str, &str)]) -> Self {
        let table = meta
            .iter()
            .map(|(k, v)| (k.to_string(), toml::Value::String(v.to_string())))
            .collect();
        self.raw.units.insert(id.to_string(), toml::Value::Table(table));
        self
    }

    pub fn try_build(self) -> Result<ConfigFile> {
        ConfigFile::try_from(self.raw)
    }

    pub fn build(self) -> ConfigFile {
        self.try_build().expect("Failed to build valid config from builder")
    }
}

/// `split` per unit, joined by `merge` (unless `skip_merge`), terminated by
/// the passthrough `all`.
pub fn fan_out_catalog() -> Catalog {
    CatalogBuilder::new()
        .switch("skip_merge", false)
        .rule(
            RuleBuilder::per_unit("split")
                .output("{working_dir}/split/{unit}.out")
                .cmd("split {unit} {output}"),
        )
        .rule(
            RuleBuilder::join("merge")
                .unless("skip_merge")
                .input("{working_dir}/split/{unit}.out")
                .output("{output_dir}/merged.out")
                .cmd("merge {inputs} {output}"),
        )
        .rule(
            RuleBuilder::join("all")
                .input_unless("{output_dir}/merged.out", "skip_merge")
                .input_when("{working_dir}/split/{unit}.out", "skip_merge"),
        )
        .build()
}
