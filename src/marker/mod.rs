// src/marker/mod.rs

//! Completion markers.
//!
//! A marker is a small TOML file written after a task succeeds:
//!
//! ```toml
//! task = "split[3]"
//! fingerprint = "5c0f...e1"
//! completed_at = 1714816800
//! ```
//!
//! A task whose marker exists and carries its current fingerprint may be
//! skipped on the next run.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use blake3::Hasher;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::dag::graph::TaskNode;
use crate::errors::{Result, RulegraphError};

/// Contents of a completion marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerRecord {
    pub task: String,
    pub fingerprint: String,
    pub completed_at: u64,
}

impl MarkerRecord {
    pub fn for_node(node: &TaskNode) -> Self {
        let completed_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self {
            task: node.id.to_string(),
            fingerprint: node.fingerprint.clone(),
            completed_at,
        }
    }
}

/// What a marker says about a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkerStatus {
    /// No marker on disk.
    Missing,
    /// Marker present with the node's current fingerprint.
    Current,
    /// Marker present but written for a different definition.
    Stale { recorded: String },
}

/// Compute a deterministic digest of a node's concrete definition.
///
/// Covers rule, unit, inputs, sources, output and the rendered command.
/// Changing any of them invalidates existing markers.
pub fn fingerprint(node: &TaskNode) -> String {
    let mut hasher = Hasher::new();
    let mut field = |tag: &str, value: &str| {
        hasher.update(tag.as_bytes());
        hasher.update(&[0]);
        hasher.update(value.as_bytes());
        hasher.update(&[0]);
    };

    field("rule", &node.id.rule);
    field("unit", node.id.unit.as_deref().unwrap_or(""));
    for input in &node.inputs {
        field("input", &input.to_string_lossy());
    }
    for source in &node.sources {
        field("source", &source.to_string_lossy());
    }
    if let Some(output) = &node.output {
        field("output", &output.to_string_lossy());
    }
    field("command", node.command.as_deref().unwrap_or(""));

    hasher.finalize().to_hex().to_string()
}

/// Abstract storage for completion markers, keyed by marker path.
pub trait MarkerStore: Send + Sync {
    /// Read the marker at `path`. `Ok(None)` when there is none;
    /// `MarkerError` when it exists but cannot be read or parsed.
    fn load(&self, path: &Path) -> Result<Option<MarkerRecord>>;

    fn save(&self, path: &Path, record: &MarkerRecord) -> Result<()>;

    fn remove(&self, path: &Path) -> Result<()>;

    /// Compare the marker at `node.marker` with the node's fingerprint.
    fn status(&self, node: &TaskNode) -> Result<MarkerStatus> {
        Ok(match self.load(&node.marker)? {
            None => MarkerStatus::Missing,
            Some(record) if record.fingerprint == node.fingerprint => MarkerStatus::Current,
            Some(record) => MarkerStatus::Stale {
                recorded: record.fingerprint,
            },
        })
    }
}

/// Markers as TOML files on disk.
#[derive(Debug, Clone, Default)]
pub struct FileMarkerStore;

impl FileMarkerStore {
    pub fn new() -> Self {
        Self
    }
}

fn marker_error(path: &Path, message: impl ToString) -> RulegraphError {
    RulegraphError::MarkerError {
        path: path.to_path_buf(),
        message: message.to_string(),
    }
}

impl MarkerStore for FileMarkerStore {
    fn load(&self, path: &Path) -> Result<Option<MarkerRecord>> {
        if !path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(path).map_err(|e| marker_error(path, e))?;
        let record: MarkerRecord = toml::from_str(&text).map_err(|e| marker_error(path, e))?;
        Ok(Some(record))
    }

    fn save(&self, path: &Path, record: &MarkerRecord) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| marker_error(parent, e))?;
        }
        let text = toml::to_string(record).map_err(|e| marker_error(path, e))?;
        fs::write(path, text).map_err(|e| marker_error(path, e))?;
        info!(task = %record.task, marker = %path.display(), "wrote completion marker");
        Ok(())
    }

    fn remove(&self, path: &Path) -> Result<()> {
        match fs::remove_file(path) {
            Ok(()) => {
                debug!(marker = %path.display(), "removed completion marker");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(marker_error(path, e)),
        }
    }
}

/// Markers held in memory only.
#[derive(Debug, Default)]
pub struct MemoryMarkerStore {
    map: Mutex<HashMap<PathBuf, MarkerRecord>>,
}

impl MemoryMarkerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.map.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned(path: &Path) -> RulegraphError {
    marker_error(path, "marker store lock poisoned")
}

impl MarkerStore for MemoryMarkerStore {
    fn load(&self, path: &Path) -> Result<Option<MarkerRecord>> {
        let map = self.map.lock().map_err(|_| poisoned(path))?;
        Ok(map.get(path).cloned())
    }

    fn save(&self, path: &Path, record: &MarkerRecord) -> Result<()> {
        let mut map = self.map.lock().map_err(|_| poisoned(path))?;
        map.insert(path.to_path_buf(), record.clone());
        info!(task = %record.task, "stored completion marker (memory)");
        Ok(())
    }

    fn remove(&self, path: &Path) -> Result<()> {
        let mut map = self.map.lock().map_err(|_| poisoned(path))?;
        map.remove(path);
        Ok(())
    }
}

/// Status of `node`'s marker, with unreadable markers downgraded to
/// `Missing` after a warning.
pub fn check(store: &dyn MarkerStore, node: &TaskNode) -> MarkerStatus {
    match store.status(node) {
        Ok(status) => status,
        Err(err) => {
            warn!(task = %node.id, error = %err, "ignoring unreadable completion marker");
            MarkerStatus::Missing
        }
    }
}
