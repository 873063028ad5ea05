// src/config/validate.rs

use crate::catalog::NODE_PLACEHOLDERS;
use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{Result, RulegraphError};

/// Placeholder names the runtime binds itself; `[params]` may not shadow them.
const RESERVED_VARS: &[&str] = &[
    "working_dir",
    "output_dir",
    "log_dir",
    "config_file",
    "rule",
    "unit",
];

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = RulegraphError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_env(cfg)?;
    validate_params(cfg)?;
    Ok(())
}

fn validate_env(cfg: &RawConfigFile) -> Result<()> {
    if cfg.env.working_dir.as_os_str().is_empty() {
        return Err(RulegraphError::config(
            "missing mandatory parameter: [env].working_dir",
        ));
    }

    if cfg.env.max_concurrency == 0 {
        return Err(RulegraphError::config(
            "[env].max_concurrency must be >= 1 (got 0)",
        ));
    }

    Ok(())
}

fn validate_params(cfg: &RawConfigFile) -> Result<()> {
    for name in cfg.params.keys() {
        if RESERVED_VARS.contains(&name.as_str()) || NODE_PLACEHOLDERS.contains(&name.as_str()) {
            return Err(RulegraphError::config(format!(
                "[params].{name} shadows a built-in placeholder"
            )));
        }
        if name.starts_with("unit.") || name.is_empty() || name.contains(['{', '}']) {
            return Err(RulegraphError::config(format!(
                "[params] key {name:?} is not a valid placeholder name"
            )));
        }
    }
    Ok(())
}
