// src/engine/runtime.rs

use std::fmt;
use std::sync::Arc;

use petgraph::graph::NodeIndex;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::dag::{Scheduler, TaskGraph};
use crate::engine::report::{RunReport, TaskFailure};
use crate::engine::{RunOptions, RuntimeEvent, TaskOutcome};
use crate::errors::Result;
use crate::exec::{ExecReport, ExecRequest, TaskExecutor};
use crate::marker::{self, MarkerRecord, MarkerStatus, MarkerStore};
use crate::types::FailurePolicy;

/// Drives the [`Scheduler`] over one [`TaskGraph`], applying the skip rule
/// and delegating execution to a [`TaskExecutor`].
///
/// A single coordinating task owns all state. Each executor call runs in
/// its own Tokio task and reports back with `RuntimeEvent::TaskCompleted`.
pub struct Runtime<E: TaskExecutor + 'static> {
    graph: TaskGraph,
    scheduler: Scheduler,
    markers: Arc<dyn MarkerStore>,
    executor: Arc<E>,
    options: RunOptions,
    event_tx: mpsc::Sender<RuntimeEvent>,
    event_rx: mpsc::Receiver<RuntimeEvent>,
    failures: Vec<TaskFailure>,
}

impl<E: TaskExecutor + 'static> fmt::Debug for Runtime<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("scheduler", &self.scheduler)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<E: TaskExecutor + 'static> Runtime<E> {
    pub fn new(
        graph: TaskGraph,
        markers: Arc<dyn MarkerStore>,
        executor: Arc<E>,
        options: RunOptions,
    ) -> Self {
        let scheduler = Scheduler::new(&graph);
        let (event_tx, event_rx) = mpsc::channel(64);
        Self {
            graph,
            scheduler,
            markers,
            executor,
            options,
            event_tx,
            event_rx,
            failures: Vec::new(),
        }
    }

    /// Sender for external events such as `ShutdownRequested`.
    pub fn event_sender(&self) -> mpsc::Sender<RuntimeEvent> {
        self.event_tx.clone()
    }

    /// Main event loop. Returns once every node is terminal.
    pub async fn run(mut self) -> Result<RunReport> {
        info!(
            tasks = self.graph.node_count(),
            max_concurrency = self.max_concurrency(),
            policy = ?self.options.failure_policy,
            force = self.options.force,
            "runtime started"
        );

        self.scheduler.start();

        loop {
            self.pump();

            if self.scheduler.is_stalled() {
                break;
            }

            let event = match self.event_rx.recv().await {
                Some(e) => e,
                None => {
                    info!("runtime event channel closed; exiting");
                    break;
                }
            };

            self.handle_event(event);
        }

        let report = RunReport::from_run(&self.graph, &self.scheduler, self.failures);
        info!(
            executed = report.executed.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            unreached = report.unreached.len(),
            "runtime exiting"
        );
        Ok(report)
    }

    fn max_concurrency(&self) -> usize {
        self.options.max_concurrency.max(1)
    }

    /// Settle every ready node that needs no executor and dispatch the rest
    /// while there is capacity.
    fn pump(&mut self) {
        while let Some(idx) = self.scheduler.peek_ready() {
            if self.try_skip(idx) {
                continue;
            }

            let node = self.graph.node(idx);
            let missing = node.sources.iter().find(|p| !p.exists()).cloned();
            let passthrough = node.is_passthrough();

            if let Some(missing) = missing {
                if self.clear_marker(idx) {
                    self.scheduler.dispatch_next();
                    self.fail(idx, format!("source {} does not exist", missing.display()));
                }
                continue;
            }

            if passthrough {
                if self.clear_marker(idx) {
                    self.scheduler.dispatch_next();
                    debug!(
                        task = %self.graph.node(idx).id,
                        "passthrough task; nothing to execute"
                    );
                    self.succeed(idx);
                }
                continue;
            }

            if self.scheduler.running_count() >= self.max_concurrency() {
                break;
            }

            self.dispatch(idx);
        }
    }

    /// Apply the skip rule to a ready node. Returns true if it was skipped.
    fn try_skip(&mut self, idx: NodeIndex) -> bool {
        if self.options.force || !self.scheduler.all_upstream_skipped(idx) {
            return false;
        }

        let node = self.graph.node(idx);
        match marker::check(self.markers.as_ref(), node) {
            MarkerStatus::Current => {
                info!(task = %node.id, "completion marker is current; skipping");
                self.scheduler.dispatch_next();
                self.scheduler.complete(idx, TaskOutcome::Skipped);
                true
            }
            MarkerStatus::Stale { .. } => {
                info!(task = %node.id, "task definition changed since last completion; re-running");
                false
            }
            MarkerStatus::Missing => false,
        }
    }

    /// Remove the marker of a node about to run. A failed or interrupted
    /// attempt must not leave an earlier completion behind. Returns false,
    /// with the node failed, if the marker cannot be removed.
    fn clear_marker(&mut self, idx: NodeIndex) -> bool {
        let marker = &self.graph.node(idx).marker;
        match self.markers.remove(marker) {
            Ok(()) => true,
            Err(err) => {
                self.scheduler.dispatch_next();
                self.fail(idx, format!("clearing completion marker: {err}"));
                false
            }
        }
    }

    fn dispatch(&mut self, idx: NodeIndex) {
        let Some(request) = ExecRequest::from_node(self.graph.node(idx)) else {
            return;
        };
        if !self.clear_marker(idx) {
            return;
        }
        self.scheduler.dispatch_next();
        let node = self.graph.node(idx);

        info!(
            task = %node.id,
            running = self.scheduler.running_count(),
            "dispatching task"
        );

        let executor = Arc::clone(&self.executor);
        let tx = self.event_tx.clone();
        tokio::spawn(async move {
            let task = request.task.clone();
            let report = executor.execute(request).await;
            if tx
                .send(RuntimeEvent::TaskCompleted { node: idx, report })
                .await
                .is_err()
            {
                warn!(task = %task, "runtime gone before task completion could be reported");
            }
        });
    }

    fn handle_event(&mut self, event: RuntimeEvent) {
        match event {
            RuntimeEvent::TaskCompleted { node, report } => self.handle_completion(node, report),
            RuntimeEvent::ShutdownRequested => {
                if !self.scheduler.is_halted() {
                    warn!("shutdown requested; waiting for running tasks to finish");
                    self.scheduler.halt();
                }
            }
        }
    }

    fn handle_completion(&mut self, idx: NodeIndex, report: ExecReport) {
        if report.is_success() {
            self.succeed(idx);
        } else {
            let message = report.error.unwrap_or_else(|| match report.exit_code {
                Some(code) => format!("exited with status {code}"),
                None => "terminated without an exit status".to_string(),
            });
            self.fail(idx, message);
        }
    }

    /// Write the marker of a node that just ran, then mark it done.
    fn succeed(&mut self, idx: NodeIndex) {
        let node = self.graph.node(idx);
        let record = MarkerRecord::for_node(node);
        match self.markers.save(&node.marker, &record) {
            Ok(()) => {
                self.scheduler.complete(idx, TaskOutcome::Executed);
            }
            Err(err) => {
                let message = format!("writing completion marker: {err}");
                self.fail(idx, message);
            }
        }
    }

    fn fail(&mut self, idx: NodeIndex, message: String) {
        let failure = TaskFailure {
            task: self.graph.node(idx).id.to_string(),
            message,
        };
        warn!(error = %failure.to_error(), "task failed");
        self.failures.push(failure);
        self.scheduler.complete(idx, TaskOutcome::Failed);

        if self.options.failure_policy == FailurePolicy::StopDispatch
            && !self.scheduler.is_halted()
        {
            self.scheduler.halt();
        }
    }
}
