// src/errors.rs

//! Crate-wide error types.
//!
//! Config and graph errors are fatal and surface before anything is
//! scheduled. Executor and marker errors are recorded per task by the
//! runtime and never abort unrelated branches.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RulegraphError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Graph error: {0}")]
    GraphError(#[from] GraphError),

    #[error("Executor error in task '{task}': {message}")]
    ExecutorError { task: String, message: String },

    #[error("Marker error at {path:?}: {message}")]
    MarkerError { path: PathBuf, message: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Structural problems found while building the task graph.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("cycle detected in task graph involving task '{0}'")]
    Cycle(String),

    #[error("dangling input: task '{task}' needs {input:?} but no rule produces it")]
    DanglingInput { task: String, input: PathBuf },

    #[error(
        "missing producer: task '{task}' needs {input:?}, which is only produced by disabled rule '{rule}'"
    )]
    MissingProducer {
        task: String,
        input: PathBuf,
        rule: String,
    },

    #[error("graph has {} sinks ({}); expected exactly one", .0.len(), .0.join(", "))]
    MultipleSinks(Vec<String>),

    #[error("graph has no tasks")]
    Empty,

    #[error("path {path:?} is written by both '{first}' and '{second}'")]
    ConflictingOutputs {
        path: PathBuf,
        first: String,
        second: String,
    },
}

impl RulegraphError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        RulegraphError::ConfigError(msg.into())
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, RulegraphError>;
