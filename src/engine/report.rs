// src/engine/report.rs

use std::path::PathBuf;

use tracing::warn;

use crate::dag::{NodeState, Scheduler, TaskGraph};
use crate::errors::RulegraphError;

/// A failed task and its executor's error message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFailure {
    pub task: String,
    pub message: String,
}

impl TaskFailure {
    pub fn to_error(&self) -> RulegraphError {
        RulegraphError::ExecutorError {
            task: self.task.clone(),
            message: self.message.clone(),
        }
    }
}

/// Outcome of one run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Terminal state of every task, in topological order.
    pub states: Vec<(String, NodeState)>,
    pub executed: Vec<String>,
    pub skipped: Vec<String>,
    pub failed: Vec<String>,
    pub unreached: Vec<String>,
    /// Failures in the order they happened.
    pub failures: Vec<TaskFailure>,
    /// Set when every task finished but the sink's declared output is absent.
    pub sink_output_missing: Option<PathBuf>,
}

impl RunReport {
    pub(crate) fn from_run(
        graph: &TaskGraph,
        scheduler: &Scheduler,
        failures: Vec<TaskFailure>,
    ) -> Self {
        let mut report = RunReport {
            states: Vec::with_capacity(graph.node_count()),
            executed: Vec::new(),
            skipped: Vec::new(),
            failed: Vec::new(),
            unreached: Vec::new(),
            failures,
            sink_output_missing: None,
        };

        for (idx, state) in scheduler.states() {
            let name = graph.node(idx).id.to_string();
            let state = if state.is_terminal() {
                state
            } else {
                warn!(task = %name, state = state.label(), "task never reached a terminal state");
                NodeState::Unreached
            };
            match state {
                NodeState::Done { skipped: true } => report.skipped.push(name.clone()),
                NodeState::Done { skipped: false } => report.executed.push(name.clone()),
                NodeState::Failed => report.failed.push(name.clone()),
                _ => report.unreached.push(name.clone()),
            }
            report.states.push((name, state));
        }

        if report.failed.is_empty() && report.unreached.is_empty() {
            if let Some(output) = &graph.sink_node().output {
                if !output.exists() {
                    warn!(output = %output.display(), "final output is missing");
                    report.sink_output_missing = Some(output.clone());
                }
            }
        }

        report
    }

    pub fn first_failure(&self) -> Option<&TaskFailure> {
        self.failures.first()
    }

    pub fn state_of(&self, task: &str) -> Option<NodeState> {
        self.states
            .iter()
            .find(|(name, _)| name == task)
            .map(|(_, state)| *state)
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.unreached.is_empty() && self.sink_output_missing.is_none()
    }

    pub fn exit_code(&self) -> i32 {
        if self.is_success() { 0 } else { 1 }
    }
}
