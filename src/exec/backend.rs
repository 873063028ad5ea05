// src/exec/backend.rs

//! Pluggable task executor abstraction.
//!
//! The runtime talks to a `TaskExecutor` instead of spawning processes
//! itself. Production uses [`super::CommandExecutor`]; tests provide a fake
//! that records requests and reports canned outcomes.

use std::collections::BTreeMap;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use crate::dag::graph::TaskNode;

/// Everything an executor needs to run one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecRequest {
    /// Display form of the task id (`split[3]`).
    pub task: String,
    pub rule: String,
    pub unit: Option<String>,
    /// Upstream products, in declaration order.
    pub inputs: Vec<PathBuf>,
    pub sources: Vec<PathBuf>,
    pub output: Option<PathBuf>,
    pub marker: PathBuf,
    pub log: PathBuf,
    /// Fully rendered command line.
    pub command: String,
    pub params: BTreeMap<String, String>,
}

impl ExecRequest {
    /// `None` for passthrough nodes, which have nothing to execute.
    pub fn from_node(node: &TaskNode) -> Option<Self> {
        let command = node.command.clone()?;
        Some(Self {
            task: node.id.to_string(),
            rule: node.id.rule.clone(),
            unit: node.id.unit.clone(),
            inputs: node.inputs.clone(),
            sources: node.sources.clone(),
            output: node.output.clone(),
            marker: node.marker.clone(),
            log: node.log.clone(),
            command,
            params: node.params.clone(),
        })
    }
}

/// Result of one executor invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecReport {
    /// Process exit status; `None` if the task never got an exit code
    /// (spawn failure, killed by a signal).
    pub exit_code: Option<i32>,
    /// Paths the task produced.
    pub outputs: Vec<PathBuf>,
    /// Human-readable failure description.
    pub error: Option<String>,
}

impl ExecReport {
    pub fn success(outputs: Vec<PathBuf>) -> Self {
        Self {
            exit_code: Some(0),
            outputs,
            error: None,
        }
    }

    pub fn failure(exit_code: Option<i32>, error: impl Into<String>) -> Self {
        Self {
            exit_code,
            outputs: Vec::new(),
            error: Some(error.into()),
        }
    }

    /// The single place exit status is interpreted.
    pub fn is_success(&self) -> bool {
        self.exit_code == Some(0) && self.error.is_none()
    }
}

/// Trait abstracting how a task is executed.
///
/// Implementations must be idempotent: running the same request twice
/// leaves the same products behind.
pub trait TaskExecutor: Send + Sync {
    fn execute(
        &self,
        request: ExecRequest,
    ) -> Pin<Box<dyn Future<Output = ExecReport> + Send + '_>>;
}
