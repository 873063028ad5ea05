// src/dag/scheduler_step.rs

//! Step-by-step result type for the scheduler.

use petgraph::graph::NodeIndex;

/// Structured result of a single scheduler "step".
///
/// Tests use it to step the graph by hand and assert on what changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerStep {
    /// Nodes that became ready as a result of this step.
    pub newly_ready: Vec<NodeIndex>,
    /// Nodes newly marked unreached (descendants of a failure, or everything
    /// pending when dispatch was halted).
    pub newly_unreached: Vec<NodeIndex>,
    /// Whether every node is now terminal.
    pub run_finished: bool,
}
