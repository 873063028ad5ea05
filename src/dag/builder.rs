// src/dag/builder.rs

//! Instantiate the concrete task graph from a catalog, a unit set and the
//! run's switches.

use std::collections::HashMap;
use std::path::PathBuf;

use petgraph::graph::{DiGraph, NodeIndex};
use tracing::{debug, error, info};

use crate::catalog::pattern::UNIT_PLACEHOLDER;
use crate::catalog::{Catalog, PathPattern, RuleAction, RuleTemplate, Switches, Vars};
use crate::dag::graph::{TaskGraph, TaskId, TaskNode};
use crate::errors::{GraphError, Result, RulegraphError};
use crate::marker;
use crate::types::RuleRole;
use crate::units::{Unit, UnitSet};

/// One-shot graph construction.
///
/// ```ignore
/// let graph = GraphBuilder::new(&catalog, &units, &switches, &cfg.base_vars()).build()?;
/// ```
#[derive(Debug)]
pub struct GraphBuilder<'a> {
    catalog: &'a Catalog,
    units: &'a UnitSet,
    switches: &'a Switches,
    vars: &'a Vars,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(
        catalog: &'a Catalog,
        units: &'a UnitSet,
        switches: &'a Switches,
        vars: &'a Vars,
    ) -> Self {
        Self {
            catalog,
            units,
            switches,
            vars,
        }
    }

    pub fn build(&self) -> Result<TaskGraph> {
        self.catalog.check_switches(self.switches)?;

        let mut graph: DiGraph<TaskNode, ()> = DiGraph::new();
        for rule in self.catalog.enabled_rules(self.switches) {
            for unit in self.instances(rule) {
                let node = self.instantiate(rule, unit)?;
                graph.add_node(node);
            }
        }

        let producers = collect_producers(&graph)?;
        self.wire_edges(&mut graph, &producers)?;

        let graph = TaskGraph::from_graph(graph)?;
        info!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            sink = %graph.sink_node().id,
            "built task graph"
        );
        Ok(graph)
    }

    /// `[None]` for single/join rules, one entry per unit for per-unit rules.
    fn instances(&self, rule: &RuleTemplate) -> Vec<Option<&'a Unit>> {
        match rule.role {
            RuleRole::PerUnit => self.units.iter().map(Some).collect(),
            RuleRole::Single | RuleRole::Join => vec![None],
        }
    }

    fn instantiate(&self, rule: &RuleTemplate, unit: Option<&Unit>) -> Result<TaskNode> {
        let id = match unit {
            Some(u) => TaskId::per_unit(&rule.name, &u.id),
            None => TaskId::single(&rule.name),
        };
        let vars = instance_vars(self.vars, &rule.name, unit);

        let mut inputs = Vec::new();
        for input in rule.active_inputs(self.switches) {
            inputs.extend(self.render_expanded(rule, &input.pattern, &vars, &id, "input")?);
        }

        let mut sources = Vec::new();
        for source in &rule.sources {
            sources.extend(self.render_expanded(rule, source, &vars, &id, "source")?);
        }

        let output = rule
            .output
            .as_ref()
            .map(|p| render_path(p, &vars, &id, "output"))
            .transpose()?;
        let marker = render_path(&rule.marker, &vars, &id, "marker")?;
        let log = render_path(&rule.log, &vars, &id, "log")?;

        let command = match &rule.action {
            RuleAction::Command(template) => {
                let cmd_vars = vars
                    .clone()
                    .with("inputs", join_paths(&inputs))
                    .with("sources", join_paths(&sources))
                    .with(
                        "output",
                        output
                            .as_ref()
                            .map(|p| p.to_string_lossy().into_owned())
                            .unwrap_or_default(),
                    )
                    .with("marker", marker.to_string_lossy())
                    .with("log", log.to_string_lossy());
                Some(template.render(&cmd_vars).map_err(|e| {
                    RulegraphError::config(format!("task '{id}': cmd {:?}: {e}", template.as_str()))
                })?)
            }
            RuleAction::Passthrough => None,
        };

        let mut node = TaskNode {
            id,
            role: rule.role,
            inputs,
            sources,
            output,
            marker,
            log,
            command,
            params: vars.into_map(),
            fingerprint: String::new(),
        };
        node.fingerprint = marker::fingerprint(&node);

        debug!(task = %node.id, inputs = node.inputs.len(), "instantiated task");
        Ok(node)
    }

    /// Render a read-side pattern. Inside a join, a `{unit}` pattern yields
    /// one path per unit; everywhere else it yields exactly one path.
    fn render_expanded(
        &self,
        rule: &RuleTemplate,
        pattern: &PathPattern,
        vars: &Vars,
        id: &TaskId,
        field: &str,
    ) -> Result<Vec<PathBuf>> {
        if rule.role == RuleRole::Join && pattern.uses_unit() {
            self.units
                .iter()
                .map(|unit| {
                    let unit_vars = instance_vars(self.vars, &rule.name, Some(unit));
                    render_path(pattern, &unit_vars, id, field)
                })
                .collect()
        } else {
            Ok(vec![render_path(pattern, vars, id, field)?])
        }
    }

    fn wire_edges(
        &self,
        graph: &mut DiGraph<TaskNode, ()>,
        producers: &HashMap<PathBuf, NodeIndex>,
    ) -> Result<()> {
        let mut edges = Vec::new();
        for consumer in graph.node_indices() {
            let node = &graph[consumer];
            for input in &node.inputs {
                match producers.get(input) {
                    Some(&producer) => edges.push((producer, consumer)),
                    None => return Err(self.unresolved(node, input).into()),
                }
            }
        }

        for (producer, consumer) in edges {
            // A consumer may read both the output and the marker of one producer.
            graph.update_edge(producer, consumer, ());
        }
        Ok(())
    }

    /// Classify an input nobody produces: blame a disabled rule if one would
    /// have written it, otherwise report it as dangling.
    fn unresolved(&self, node: &TaskNode, input: &PathBuf) -> GraphError {
        for rule in self.catalog.rules() {
            if rule.is_enabled(self.switches) {
                continue;
            }
            for unit in self.instances(rule) {
                let vars = instance_vars(self.vars, &rule.name, unit);
                let would_produce = rule
                    .produced_patterns()
                    .filter_map(|p| p.render_path(&vars).ok())
                    .any(|p| &p == input);
                if would_produce {
                    return GraphError::MissingProducer {
                        task: node.id.to_string(),
                        input: input.clone(),
                        rule: rule.name.clone(),
                    };
                }
            }
        }

        GraphError::DanglingInput {
            task: node.id.to_string(),
            input: input.clone(),
        }
    }
}

/// Build the graph under every legal switch combination and stop at the
/// first failure. Returns how many combinations were checked.
pub fn check_all_combinations(catalog: &Catalog, units: &UnitSet, vars: &Vars) -> Result<usize> {
    let combinations = catalog.legal_switch_combinations()?;
    for switches in &combinations {
        GraphBuilder::new(catalog, units, switches, vars)
            .build()
            .inspect_err(|e| {
                let on: Vec<&str> = switches.enabled().collect();
                error!(switches = ?on, error = %e, "switch combination does not build");
            })?;
    }
    info!(combinations = combinations.len(), "every legal switch combination builds");
    Ok(combinations.len())
}

fn collect_producers(graph: &DiGraph<TaskNode, ()>) -> Result<HashMap<PathBuf, NodeIndex>> {
    let mut producers: HashMap<PathBuf, NodeIndex> = HashMap::new();
    for idx in graph.node_indices() {
        for path in graph[idx].produced_paths() {
            if let Some(&first) = producers.get(path) {
                return Err(GraphError::ConflictingOutputs {
                    path: path.clone(),
                    first: graph[first].id.to_string(),
                    second: graph[idx].id.to_string(),
                }
                .into());
            }
            producers.insert(path.clone(), idx);
        }
    }
    Ok(producers)
}

fn instance_vars(base: &Vars, rule: &str, unit: Option<&Unit>) -> Vars {
    let mut vars = base.clone().with("rule", rule);
    if let Some(unit) = unit {
        vars.insert(UNIT_PLACEHOLDER, unit.id.clone());
        for (key, value) in &unit.meta {
            vars.insert(format!("{UNIT_PLACEHOLDER}.{key}"), value.clone());
        }
    }
    vars
}

fn render_path(pattern: &PathPattern, vars: &Vars, id: &TaskId, field: &str) -> Result<PathBuf> {
    pattern.render_path(vars).map_err(|e| {
        RulegraphError::config(format!("task '{id}': {field} {:?}: {e}", pattern.as_str()))
    })
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.to_string_lossy())
        .collect::<Vec<_>>()
        .join(" ")
}
