#![allow(dead_code)]

pub use rulegraph_test_utils::builders;
pub use rulegraph_test_utils::fake_executor::FakeExecutor;
pub use rulegraph_test_utils::{init_tracing, with_timeout};

use std::path::Path;

use rulegraph::catalog::Catalog;
use rulegraph::config::ConfigFile;
use rulegraph::dag::{GraphBuilder, TaskGraph};
use rulegraph::errors::Result;
use rulegraph::units::UnitSet;

use self::builders::ConfigBuilder;

/// Resolve switches and units from `cfg`, then build the graph.
pub fn build_graph(catalog: &Catalog, cfg: &ConfigFile) -> Result<TaskGraph> {
    let switches = catalog.resolve_switches(cfg.switch_overrides())?;
    let units = UnitSet::resolve(cfg, catalog.requires_units(&switches))?;
    GraphBuilder::new(catalog, &units, &switches, &cfg.base_vars()).build()
}

/// Display ids of the direct upstream tasks of `task`, sorted.
pub fn deps_of(graph: &TaskGraph, task: &str) -> Vec<String> {
    let idx = graph
        .find_by_name(task)
        .unwrap_or_else(|| panic!("no task {task} in graph"));
    let mut deps: Vec<String> = graph
        .dependencies_of(idx)
        .into_iter()
        .map(|d| graph.node(d).id.to_string())
        .collect();
    deps.sort();
    deps
}

/// Every task id in the graph, sorted.
pub fn task_names(graph: &TaskGraph) -> Vec<String> {
    let mut names: Vec<String> = graph.nodes().map(|n| n.id.to_string()).collect();
    names.sort();
    names
}

/// Config for the built-in catalog with its required params filled in.
pub fn builtin_config(dir: &Path) -> ConfigBuilder {
    ConfigBuilder::new(dir)
        .param("ms", "/data/obs.ms")
        .param("pointing_ref", "/data/pointing_ref.npy")
        .param("ms_outname", "canonical.ms")
}

/// Placeholder values for the built-in catalog, including `config_file`,
/// which is otherwise only bound for configs read from disk.
pub fn builtin_vars(dir: &Path) -> rulegraph::catalog::Vars {
    builtin_config(dir)
        .build()
        .base_vars()
        .with("config_file", dir.join("Rulegraph.toml").to_string_lossy())
}
