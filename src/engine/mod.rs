// src/engine/mod.rs

//! Run orchestration.
//!
//! The pure state machine lives in [`crate::dag::scheduler`]; this module is
//! the async shell around it:
//! - [`runtime`] owns the event loop that applies the skip rule, dispatches
//!   executor calls up to the concurrency limit and writes markers.
//! - [`report`] summarises a finished run.
//! - [`plan`] predicts what a run would do, for `--dry-run`.

use petgraph::graph::NodeIndex;

use crate::exec::ExecReport;
use crate::types::FailurePolicy;

/// How a running node finished, as fed to the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Satisfied by a current completion marker; nothing ran.
    Skipped,
    /// Executed (or passed through) successfully.
    Executed,
    Failed,
}

/// Options for a single run.
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    /// Maximum executor invocations in flight. Values below 1 are treated as 1.
    pub max_concurrency: usize,
    pub failure_policy: FailurePolicy,
    /// Ignore completion markers and execute everything.
    pub force: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            max_concurrency: 1,
            failure_policy: FailurePolicy::default(),
            force: false,
        }
    }
}

/// Events flowing into the runtime from executor tasks and signal handlers.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    /// An executor call returned.
    TaskCompleted { node: NodeIndex, report: ExecReport },
    /// Graceful shutdown requested (e.g. Ctrl-C): dispatch nothing new.
    ShutdownRequested,
}

pub mod plan;
pub mod report;
pub mod runtime;

pub use plan::{plan_run, PlannedAction};
pub use report::{RunReport, TaskFailure};
pub use runtime::Runtime;
