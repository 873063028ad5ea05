// src/engine/plan.rs

use std::collections::HashMap;

use petgraph::graph::NodeIndex;

use crate::dag::TaskGraph;
use crate::marker::{self, MarkerStatus, MarkerStore};

/// What a run would do with a task, judging by the markers on disk now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannedAction {
    Skip,
    Run,
    /// Passthrough tasks only record a marker.
    Pass,
}

/// Predict the skip rule for every task without running anything.
///
/// A task would be skipped if its marker is current and every upstream task
/// would be skipped too. Returned in topological order.
pub fn plan_run(
    graph: &TaskGraph,
    markers: &dyn MarkerStore,
    force: bool,
) -> Vec<(NodeIndex, PlannedAction)> {
    let mut skipped: HashMap<NodeIndex, bool> = HashMap::new();
    let mut plan = Vec::with_capacity(graph.node_count());

    for &idx in graph.topo_order() {
        let node = graph.node(idx);
        let upstream_skipped = graph
            .dependencies_of(idx)
            .iter()
            .all(|dep| skipped.get(dep).copied().unwrap_or(false));
        let skip =
            !force && upstream_skipped && marker::check(markers, node) == MarkerStatus::Current;
        skipped.insert(idx, skip);

        let action = if skip {
            PlannedAction::Skip
        } else if node.is_passthrough() {
            PlannedAction::Pass
        } else {
            PlannedAction::Run
        };
        plan.push((idx, action));
    }

    plan
}
