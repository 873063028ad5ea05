// src/dag/graph.rs

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;

use crate::errors::GraphError;
use crate::types::RuleRole;
use crate::units::UnitId;

/// Identity of a task node: a rule name, bound to a unit for fan-out rules.
///
/// Displayed as `rule` or `rule[unit]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId {
    pub rule: String,
    pub unit: Option<UnitId>,
}

impl TaskId {
    pub fn single(rule: impl Into<String>) -> Self {
        Self {
            rule: rule.into(),
            unit: None,
        }
    }

    pub fn per_unit(rule: impl Into<String>, unit: impl Into<UnitId>) -> Self {
        Self {
            rule: rule.into(),
            unit: Some(unit.into()),
        }
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.unit {
            Some(unit) => write!(f, "{}[{}]", self.rule, unit),
            None => f.write_str(&self.rule),
        }
    }
}

/// A concrete task: one rule template bound to (at most) one unit, with every
/// placeholder already substituted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskNode {
    pub id: TaskId,
    pub role: RuleRole,
    /// Produced by other nodes; each one is an incoming edge.
    pub inputs: Vec<PathBuf>,
    /// External files that must exist before the executor is invoked.
    pub sources: Vec<PathBuf>,
    pub output: Option<PathBuf>,
    pub marker: PathBuf,
    pub log: PathBuf,
    /// Rendered command line; `None` for passthrough nodes.
    pub command: Option<String>,
    /// Every placeholder value the node was rendered with.
    pub params: BTreeMap<String, String>,
    /// Digest of the concrete definition, stored in the completion marker.
    pub fingerprint: String,
}

impl TaskNode {
    pub fn is_passthrough(&self) -> bool {
        self.command.is_none()
    }

    /// Paths this node writes: output (if any) then marker.
    pub fn produced_paths(&self) -> impl Iterator<Item = &PathBuf> {
        self.output.iter().chain(std::iter::once(&self.marker))
    }
}

/// Validated task graph: acyclic with exactly one sink.
///
/// Edges point from producer to consumer.
#[derive(Debug, Clone)]
pub struct TaskGraph {
    graph: DiGraph<TaskNode, ()>,
    order: Vec<NodeIndex>,
    sink: NodeIndex,
}

impl TaskGraph {
    /// Check acyclicity and the single-sink rule, and record the topological
    /// order.
    pub fn from_graph(graph: DiGraph<TaskNode, ()>) -> Result<Self, GraphError> {
        if graph.node_count() == 0 {
            return Err(GraphError::Empty);
        }

        let order = toposort(&graph, None)
            .map_err(|cycle| GraphError::Cycle(graph[cycle.node_id()].id.to_string()))?;

        let sinks: Vec<NodeIndex> = order
            .iter()
            .copied()
            .filter(|&idx| {
                graph
                    .neighbors_directed(idx, Direction::Outgoing)
                    .next()
                    .is_none()
            })
            .collect();

        let sink = match sinks.as_slice() {
            [only] => *only,
            _ => {
                return Err(GraphError::MultipleSinks(
                    sinks.iter().map(|&idx| graph[idx].id.to_string()).collect(),
                ));
            }
        };

        Ok(Self { graph, order, sink })
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn node(&self, idx: NodeIndex) -> &TaskNode {
        &self.graph[idx]
    }

    /// Node indices in topological order.
    pub fn topo_order(&self) -> &[NodeIndex] {
        &self.order
    }

    /// Nodes in topological order.
    pub fn nodes(&self) -> impl Iterator<Item = &TaskNode> {
        self.order.iter().map(|&idx| &self.graph[idx])
    }

    pub fn sink(&self) -> NodeIndex {
        self.sink
    }

    pub fn sink_node(&self) -> &TaskNode {
        &self.graph[self.sink]
    }

    pub fn find(&self, id: &TaskId) -> Option<NodeIndex> {
        self.order.iter().copied().find(|&idx| &self.graph[idx].id == id)
    }

    /// Look a node up by its display form (`split[1]`, `merge`).
    pub fn find_by_name(&self, name: &str) -> Option<NodeIndex> {
        self.order
            .iter()
            .copied()
            .find(|&idx| self.graph[idx].id.to_string() == name)
    }

    /// Immediate upstream nodes.
    pub fn dependencies_of(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        self.graph
            .neighbors_directed(idx, Direction::Incoming)
            .collect()
    }

    /// Immediate downstream nodes.
    pub fn dependents_of(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        self.graph
            .neighbors_directed(idx, Direction::Outgoing)
            .collect()
    }

    /// Nodes of the given rule, in topological order.
    pub fn instances_of<'a>(&'a self, rule: &'a str) -> impl Iterator<Item = NodeIndex> + 'a {
        self.order
            .iter()
            .copied()
            .filter(move |&idx| self.graph[idx].id.rule == rule)
    }
}
