// src/dag/scheduler.rs

use std::collections::BTreeSet;

use petgraph::graph::NodeIndex;
use tracing::{debug, info, warn};

use crate::dag::graph::TaskGraph;
use crate::dag::scheduler_step::SchedulerStep;
use crate::dag::state_manager::StateManager;
use crate::dag::task_info::{NodeState, TaskInfo};
use crate::engine::TaskOutcome;

/// Pure per-run state machine over a [`TaskGraph`].
///
/// It decides which nodes are ready, records outcomes and propagates
/// failure. It performs no IO; the runtime feeds it outcomes and asks it
/// for the next ready node.
///
/// Ready nodes are handed out in topological order so runs are
/// deterministic for a given graph.
#[derive(Debug)]
pub struct Scheduler {
    tasks: Vec<TaskInfo>,
    /// Topological positions of `Ready` nodes.
    ready: BTreeSet<usize>,
    order: Vec<NodeIndex>,
    running: usize,
    halted: bool,
}

impl Scheduler {
    pub fn new(graph: &TaskGraph) -> Self {
        let order = graph.topo_order().to_vec();
        let mut tasks: Vec<Option<TaskInfo>> = vec![None; graph.node_count()];

        for (pos, &idx) in order.iter().enumerate() {
            tasks[idx.index()] = Some(TaskInfo {
                name: graph.node(idx).id.to_string(),
                topo_pos: pos,
                deps: graph.dependencies_of(idx),
                dependents: graph.dependents_of(idx),
                state: NodeState::Pending,
            });
        }

        Self {
            // The topological order covers every node exactly once.
            tasks: tasks.into_iter().flatten().collect(),
            ready: BTreeSet::new(),
            order,
            running: 0,
            halted: false,
        }
    }

    /// Promote the root nodes. Call once before pulling ready nodes.
    pub fn start(&mut self) -> SchedulerStep {
        let newly_ready = StateManager::new(&mut self.tasks).promote_roots();
        self.enqueue(&newly_ready);
        info!(
            tasks = self.tasks.len(),
            roots = newly_ready.len(),
            "scheduler: starting run"
        );
        SchedulerStep {
            newly_ready,
            newly_unreached: Vec::new(),
            run_finished: self.is_finished(),
        }
    }

    /// Next ready node in topological order, without changing its state.
    pub fn peek_ready(&self) -> Option<NodeIndex> {
        self.ready.first().map(|&pos| self.order[pos])
    }

    /// Take the next ready node in topological order and mark it `Running`.
    pub fn dispatch_next(&mut self) -> Option<NodeIndex> {
        let pos = self.ready.pop_first()?;
        let idx = self.order[pos];
        StateManager::new(&mut self.tasks).set(idx, NodeState::Running);
        self.running += 1;
        Some(idx)
    }

    /// Record the outcome of a `Running` node.
    pub fn complete(&mut self, idx: NodeIndex, outcome: TaskOutcome) -> SchedulerStep {
        if self.tasks[idx.index()].state != NodeState::Running {
            warn!(
                task = %self.tasks[idx.index()].name,
                state = self.tasks[idx.index()].state.label(),
                "completion for a task that is not running; ignoring"
            );
            return SchedulerStep {
                run_finished: self.is_finished(),
                ..SchedulerStep::default()
            };
        }
        self.running -= 1;

        let mut manager = StateManager::new(&mut self.tasks);
        let step = match outcome {
            TaskOutcome::Skipped | TaskOutcome::Executed => {
                let skipped = outcome == TaskOutcome::Skipped;
                manager.set(idx, NodeState::Done { skipped });
                let newly_ready = if self.halted {
                    Vec::new()
                } else {
                    manager.promote_dependents(idx)
                };
                SchedulerStep {
                    newly_ready,
                    ..SchedulerStep::default()
                }
            }
            TaskOutcome::Failed => {
                manager.set(idx, NodeState::Failed);
                let newly_unreached = manager.mark_descendants_unreached(idx);
                warn!(
                    task = %self.tasks[idx.index()].name,
                    unreached = newly_unreached.len(),
                    "task failed; its descendants will not run"
                );
                SchedulerStep {
                    newly_unreached,
                    ..SchedulerStep::default()
                }
            }
        };

        self.enqueue(&step.newly_ready);
        let run_finished = self.is_finished();
        if run_finished {
            debug!("scheduler: every task is terminal");
        }
        SchedulerStep {
            run_finished,
            ..step
        }
    }

    /// Stop handing out work: every pending or ready node becomes
    /// `Unreached`. Running nodes still report their outcome.
    pub fn halt(&mut self) -> SchedulerStep {
        self.halted = true;
        self.ready.clear();
        let newly_unreached = StateManager::new(&mut self.tasks).halt();
        info!(
            unreached = newly_unreached.len(),
            running = self.running,
            "scheduler: dispatch halted"
        );
        SchedulerStep {
            newly_ready: Vec::new(),
            newly_unreached,
            run_finished: self.is_finished(),
        }
    }

    /// Whether every upstream node of `idx` was satisfied by its marker in
    /// this run. Vacuously true for roots.
    pub fn all_upstream_skipped(&self, idx: NodeIndex) -> bool {
        self.tasks[idx.index()]
            .deps
            .iter()
            .all(|dep| self.tasks[dep.index()].state == NodeState::Done { skipped: true })
    }

    pub fn state_of(&self, idx: NodeIndex) -> NodeState {
        self.tasks[idx.index()].state
    }

    /// `(node, state)` pairs in topological order.
    pub fn states(&self) -> impl Iterator<Item = (NodeIndex, NodeState)> + '_ {
        self.order
            .iter()
            .map(|&idx| (idx, self.tasks[idx.index()].state))
    }

    pub fn running_count(&self) -> usize {
        self.running
    }

    pub fn has_ready(&self) -> bool {
        !self.ready.is_empty()
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// True once every node is terminal.
    pub fn is_finished(&self) -> bool {
        self.running == 0
            && self.ready.is_empty()
            && self.tasks.iter().all(|t| t.state.is_terminal())
    }

    /// True when nothing is running or ready. If some nodes are still not
    /// terminal at that point, the run can make no further progress.
    pub fn is_stalled(&self) -> bool {
        self.running == 0 && self.ready.is_empty()
    }

    fn enqueue(&mut self, nodes: &[NodeIndex]) {
        for &idx in nodes {
            self.ready.insert(self.tasks[idx.index()].topo_pos);
        }
    }
}
