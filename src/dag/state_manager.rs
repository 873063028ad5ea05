// src/dag/state_manager.rs

//! State transitions for the nodes of one run.

use petgraph::graph::NodeIndex;
use tracing::{debug, warn};

use crate::dag::task_info::{NodeState, TaskInfo};

/// Applies state transitions to the per-node table owned by the scheduler.
pub struct StateManager<'a> {
    tasks: &'a mut [TaskInfo],
}

impl<'a> StateManager<'a> {
    pub fn new(tasks: &'a mut [TaskInfo]) -> Self {
        Self { tasks }
    }

    /// Whether every upstream node of `idx` is done.
    pub fn deps_satisfied(&self, idx: NodeIndex) -> bool {
        self.tasks[idx.index()]
            .deps
            .iter()
            .all(|dep| self.tasks[dep.index()].state.is_done())
    }

    /// Promote pending nodes with no upstream to `Ready`.
    pub fn promote_roots(&mut self) -> Vec<NodeIndex> {
        let roots: Vec<NodeIndex> = (0..self.tasks.len())
            .map(NodeIndex::new)
            .filter(|&idx| {
                let info = &self.tasks[idx.index()];
                info.state == NodeState::Pending && info.deps.is_empty()
            })
            .collect();
        for &idx in &roots {
            self.set(idx, NodeState::Ready);
        }
        roots
    }

    /// After `done` finished, promote each pending dependent whose upstream
    /// nodes are now all done.
    pub fn promote_dependents(&mut self, done: NodeIndex) -> Vec<NodeIndex> {
        let candidates = self.tasks[done.index()].dependents.clone();
        let mut ready = Vec::new();
        for idx in candidates {
            if self.tasks[idx.index()].state == NodeState::Pending && self.deps_satisfied(idx) {
                self.set(idx, NodeState::Ready);
                ready.push(idx);
            }
        }
        ready
    }

    /// Mark every non-terminal strict descendant of `failed` as `Unreached`.
    pub fn mark_descendants_unreached(&mut self, failed: NodeIndex) -> Vec<NodeIndex> {
        let mut stack = self.tasks[failed.index()].dependents.clone();
        let mut newly = Vec::new();

        while let Some(idx) = stack.pop() {
            match self.tasks[idx.index()].state {
                NodeState::Pending | NodeState::Ready => {
                    self.set(idx, NodeState::Unreached);
                    newly.push(idx);
                    stack.extend(self.tasks[idx.index()].dependents.iter().copied());
                }
                NodeState::Running => {
                    // Cannot happen: a running node had every upstream done.
                    warn!(
                        task = %self.tasks[idx.index()].name,
                        "descendant of a failed task is already running"
                    );
                }
                NodeState::Done { .. } | NodeState::Failed | NodeState::Unreached => {}
            }
        }

        newly
    }

    /// Mark everything still pending or ready as `Unreached`.
    pub fn halt(&mut self) -> Vec<NodeIndex> {
        let waiting: Vec<NodeIndex> = (0..self.tasks.len())
            .map(NodeIndex::new)
            .filter(|&idx| {
                matches!(
                    self.tasks[idx.index()].state,
                    NodeState::Pending | NodeState::Ready
                )
            })
            .collect();
        for &idx in &waiting {
            self.set(idx, NodeState::Unreached);
        }
        waiting
    }

    pub fn set(&mut self, idx: NodeIndex, state: NodeState) {
        let info = &mut self.tasks[idx.index()];
        debug!(
            task = %info.name,
            from = info.state.label(),
            to = state.label(),
            "state transition"
        );
        info.state = state;
    }
}
