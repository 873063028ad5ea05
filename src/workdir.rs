// src/workdir.rs

//! Working-directory preparation before a run.

use std::fs;
use std::path::Path;

use tracing::{info, warn};

use crate::dag::TaskGraph;
use crate::errors::{Result, RulegraphError};
use crate::marker::MarkerStore;

/// What to do when the working directory already exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkdirPolicy {
    /// Delete it and start from scratch.
    pub clear_all: bool,
    /// Refuse to run. Takes precedence over `clear_all`.
    pub overwrite_lock: bool,
}

/// Create `dir` if needed, applying `policy` when it already exists.
///
/// Without either flag an existing directory is reused, which is what lets
/// completion markers carry over between runs.
pub fn prepare(dir: &Path, policy: WorkdirPolicy) -> Result<()> {
    if dir.exists() {
        if policy.overwrite_lock {
            return Err(RulegraphError::config(format!(
                "working directory {} exists and the overwrite lock is on",
                dir.display()
            )));
        }
        if policy.clear_all {
            warn!(dir = %dir.display(), "clearing everything from working directory");
            fs::remove_dir_all(dir)?;
        } else {
            info!(dir = %dir.display(), "reusing existing working directory");
        }
    }

    fs::create_dir_all(dir)?;
    Ok(())
}

/// Remove the completion marker of every task in `graph`.
///
/// Markers may live outside the working directory (`[env].log_dir` or a
/// rule's own `marker`), so clearing the directory alone can leave them
/// behind. Returns how many tasks were cleared.
pub fn clear_markers(graph: &TaskGraph, markers: &dyn MarkerStore) -> Result<usize> {
    let mut cleared = 0;
    for node in graph.nodes() {
        markers.remove(&node.marker)?;
        cleared += 1;
    }
    info!(tasks = cleared, "cleared completion markers");
    Ok(cleared)
}
