// src/config/mod.rs

//! Run configuration.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate basic invariants (`validate.rs`).
//! - Render a starter config for a catalog (`template.rs`).

pub mod loader;
pub mod model;
pub mod template;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_catalog_for, load_from_path};
pub use model::{ConfigFile, EnvSection, RawConfigFile};
pub use template::render_template;
