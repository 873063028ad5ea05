// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `rulegraph`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "rulegraph",
    version,
    about = "Run a switch-gated, fan-out rule catalog as a resumable task graph.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Rulegraph.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "Rulegraph.toml")]
    pub config: PathBuf,

    /// Override a switch, e.g. `--set skip_merge=true`. Repeatable.
    #[arg(long = "set", value_name = "NAME=BOOL", value_parser = parse_switch_override)]
    pub switches: Vec<(String, bool)>,

    /// Maximum number of tasks executing at once (overrides `[env]`).
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
    pub max_concurrency: Option<u32>,

    /// Dispatch nothing new after the first failure.
    #[arg(long)]
    pub stop_on_failure: bool,

    /// Ignore completion markers and run every task.
    #[arg(long)]
    pub force: bool,

    /// Build and print the task graph, marking which tasks would be skipped,
    /// without executing anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Check that the graph builds under every legal switch combination.
    #[arg(long)]
    pub check_all: bool,

    /// Delete the working directory before running.
    #[arg(long)]
    pub clear_all: bool,

    /// Refuse to run if the working directory already exists.
    #[arg(long)]
    pub overwrite_lock: bool,

    /// Write a commented starter config for the catalog to PATH and exit.
    #[arg(long, value_name = "PATH")]
    pub init_config: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `RULEGRAPH_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Parse `NAME=BOOL` (`true`/`false`, `on`/`off`, `yes`/`no`, `1`/`0`).
pub fn parse_switch_override(s: &str) -> Result<(String, bool), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=BOOL, got {s:?}"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing switch name in {s:?}"));
    }
    let value = match value.trim().to_ascii_lowercase().as_str() {
        "true" | "on" | "yes" | "1" => true,
        "false" | "off" | "no" | "0" => false,
        other => return Err(format!("invalid value {other:?} for switch '{name}'")),
    };
    Ok((name.to_string(), value))
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
