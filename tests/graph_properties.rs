// tests/graph_properties.rs

mod common;
use crate::common::build_graph;
use crate::common::builders::{fan_out_catalog, ConfigBuilder};

use std::collections::HashMap;
use std::path::Path;

use proptest::prelude::*;
use rulegraph::catalog::{Catalog, Switches};
use rulegraph::dag::{GraphBuilder, TaskGraph};
use rulegraph::units::UnitSet;

fn unit_ids(width: usize) -> Vec<String> {
    (0..width).map(|i| format!("p{i}")).collect()
}

/// Every edge goes from an earlier to a later topological position.
fn order_respects_edges(graph: &TaskGraph) -> bool {
    let pos: HashMap<_, _> = graph
        .topo_order()
        .iter()
        .enumerate()
        .map(|(i, &idx)| (idx, i))
        .collect();
    graph.topo_order().iter().all(|&idx| {
        graph
            .dependencies_of(idx)
            .iter()
            .all(|dep| pos[dep] < pos[&idx])
    })
}

proptest! {
    #[test]
    fn fan_out_graph_shape(width in 1usize..8, skip_merge in any::<bool>()) {
        let ids = unit_ids(width);
        let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        let cfg = ConfigBuilder::new("/work")
            .units(&id_refs)
            .switch("skip_merge", skip_merge)
            .build();
        let graph = build_graph(&fan_out_catalog(), &cfg).unwrap();

        let merges = graph.instances_of("merge").count();
        prop_assert_eq!(merges, if skip_merge { 0 } else { 1 });
        prop_assert_eq!(graph.instances_of("split").count(), width);
        prop_assert_eq!(graph.node_count(), width + merges + 1);
        prop_assert_eq!(graph.sink_node().id.rule.as_str(), "all");
        prop_assert!(order_respects_edges(&graph));

        let sink_fan_in = graph.dependencies_of(graph.sink()).len();
        prop_assert_eq!(sink_fan_in, if skip_merge { width } else { 1 });
        for idx in graph.instances_of("merge") {
            prop_assert_eq!(graph.dependencies_of(idx).len(), width);
        }
    }

    #[test]
    fn builtin_catalog_builds_under_every_legal_assignment(width in 1usize..6, bits in 0u32..16) {
        let catalog = Catalog::builtin().unwrap();
        let switches: Switches = catalog
            .switches()
            .iter()
            .enumerate()
            .map(|(i, s)| (s.name.clone(), bits & (1 << i) != 0))
            .collect();
        prop_assume!(catalog.check_switches(&switches).is_ok());

        let units = UnitSet::from_ids(unit_ids(width)).unwrap();
        let vars = common::builtin_vars(Path::new("/work"));
        let graph = GraphBuilder::new(&catalog, &units, &switches, &vars).build().unwrap();

        prop_assert_eq!(graph.sink_node().id.rule.as_str(), "all");
        prop_assert!(order_respects_edges(&graph));
        prop_assert_eq!(graph.instances_of("split").count(), width);
        prop_assert_eq!(graph.instances_of("phase_rotate").count(), width);
        prop_assert_eq!(graph.instances_of("rename").count(), width);

        let merges: Vec<_> = graph.instances_of("merge").collect();
        if switches.is_on("skip_merge") {
            prop_assert!(merges.is_empty());
        } else {
            prop_assert_eq!(merges.len(), 1);
            let calibrators = usize::from(switches.is_on("split_calibrators"));
            prop_assert_eq!(graph.dependencies_of(merges[0]).len(), width + calibrators);
        }

        let flagging = graph.instances_of("noise_diode_flagging").count();
        prop_assert_eq!(flagging, usize::from(switches.is_on("flag_noise_diode")));
    }
}
