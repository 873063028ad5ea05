// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::catalog::{self, Catalog};
use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{Result, RulegraphError};

/// Load a configuration file from a given path and return the raw `RawConfigFile`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|e| {
        RulegraphError::config(format!("cannot read config {}: {e}", path.display()))
    })?;

    let config: RawConfigFile = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a configuration file, validate it and anchor its relative
/// directories at the file's parent directory.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let path = path.as_ref();
    let raw_config = load_from_path(path)?;
    let config = ConfigFile::try_from(raw_config)?;

    let source = fs::canonicalize(path)?;
    let root = source
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    debug!(config = %source.display(), root = %root.display(), "loaded configuration");
    Ok(config.rebase(&root, &source))
}

/// The catalog named by `cfg.catalog`, or the built-in one.
pub fn load_catalog_for(cfg: &ConfigFile) -> Result<Catalog> {
    match &cfg.catalog {
        Some(path) => catalog::load_catalog(path),
        None => Catalog::builtin(),
    }
}

/// Helper to resolve a default config path: `Rulegraph.toml` in the
/// current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Rulegraph.toml")
}
