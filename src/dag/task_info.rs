// src/dag/task_info.rs

//! Per-node scheduling state.

use petgraph::graph::NodeIndex;

/// Scheduling state of one node for the current run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// Waiting on at least one upstream node.
    Pending,
    /// Every upstream node is done; not yet dispatched.
    Ready,
    /// Handed to the executor.
    Running,
    /// Finished successfully. `skipped` is true when a valid completion
    /// marker satisfied the node and nothing was executed.
    Done { skipped: bool },
    /// The executor (or marker bookkeeping) failed.
    Failed,
    /// Never ran because an ancestor failed or dispatch was halted.
    Unreached,
}

impl NodeState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            NodeState::Done { .. } | NodeState::Failed | NodeState::Unreached
        )
    }

    pub fn is_done(self) -> bool {
        matches!(self, NodeState::Done { .. })
    }

    /// Short label for reports and dry-run output.
    pub fn label(self) -> &'static str {
        match self {
            NodeState::Pending => "pending",
            NodeState::Ready => "ready",
            NodeState::Running => "running",
            NodeState::Done { skipped: true } => "skipped",
            NodeState::Done { skipped: false } => "done",
            NodeState::Failed => "failed",
            NodeState::Unreached => "unreached",
        }
    }
}

/// Static adjacency of a node plus its mutable state.
#[derive(Debug, Clone)]
pub struct TaskInfo {
    /// Display form of the task id, for logging.
    pub name: String,
    /// Position in the graph's topological order.
    pub topo_pos: usize,
    pub deps: Vec<NodeIndex>,
    pub dependents: Vec<NodeIndex>,
    pub state: NodeState,
}
