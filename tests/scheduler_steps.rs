// tests/scheduler_steps.rs

mod common;
use crate::common::build_graph;
use crate::common::builders::{fan_out_catalog, ConfigBuilder};

use std::error::Error;

use petgraph::graph::NodeIndex;
use rulegraph::dag::{NodeState, Scheduler, TaskGraph};
use rulegraph::engine::TaskOutcome;

type TestResult = Result<(), Box<dyn Error>>;

fn fan_out_graph(units: &[&str]) -> Result<TaskGraph, Box<dyn Error>> {
    let cfg = ConfigBuilder::new("/work").units(units).build();
    Ok(build_graph(&fan_out_catalog(), &cfg)?)
}

fn idx(graph: &TaskGraph, name: &str) -> NodeIndex {
    graph
        .find_by_name(name)
        .unwrap_or_else(|| panic!("no task {name}"))
}

fn names(graph: &TaskGraph, nodes: &[NodeIndex]) -> Vec<String> {
    let mut names: Vec<String> = nodes.iter().map(|&n| graph.node(n).id.to_string()).collect();
    names.sort();
    names
}

/// Dispatch every ready node, in order.
fn dispatch_all(scheduler: &mut Scheduler) -> Vec<NodeIndex> {
    std::iter::from_fn(|| scheduler.dispatch_next()).collect()
}

#[test]
fn happy_path_walks_the_graph_in_layers() -> TestResult {
    common::init_tracing();
    let graph = fan_out_graph(&["0", "1", "2"])?;
    let mut scheduler = Scheduler::new(&graph);

    let step = scheduler.start();
    assert_eq!(names(&graph, &step.newly_ready), ["split[0]", "split[1]", "split[2]"]);
    assert!(!step.run_finished);

    let splits = dispatch_all(&mut scheduler);
    assert_eq!(splits.len(), 3);
    assert_eq!(scheduler.running_count(), 3);
    assert!(!scheduler.has_ready());

    let merge = idx(&graph, "merge");
    for (i, &split) in splits.iter().enumerate() {
        let step = scheduler.complete(split, TaskOutcome::Executed);
        if i < 2 {
            assert!(step.newly_ready.is_empty());
            assert_eq!(scheduler.state_of(merge), NodeState::Pending);
        } else {
            assert_eq!(step.newly_ready, [merge]);
        }
    }

    assert_eq!(scheduler.dispatch_next(), Some(merge));
    let step = scheduler.complete(merge, TaskOutcome::Executed);
    assert_eq!(names(&graph, &step.newly_ready), ["all"]);

    let all = idx(&graph, "all");
    assert_eq!(scheduler.dispatch_next(), Some(all));
    let step = scheduler.complete(all, TaskOutcome::Executed);
    assert!(step.run_finished);
    assert!(scheduler.is_finished());
    assert!(scheduler
        .states()
        .all(|(_, s)| s == NodeState::Done { skipped: false }));
    Ok(())
}

#[test]
fn failure_marks_only_descendants_unreached() -> TestResult {
    let graph = fan_out_graph(&["0", "1", "2"])?;
    let mut scheduler = Scheduler::new(&graph);
    scheduler.start();
    dispatch_all(&mut scheduler);

    let step = scheduler.complete(idx(&graph, "split[1]"), TaskOutcome::Failed);
    assert_eq!(names(&graph, &step.newly_unreached), ["all", "merge"]);
    assert!(!step.run_finished);

    // Siblings keep running and finish normally.
    let step = scheduler.complete(idx(&graph, "split[0]"), TaskOutcome::Executed);
    assert!(step.newly_ready.is_empty());
    let step = scheduler.complete(idx(&graph, "split[2]"), TaskOutcome::Executed);
    assert!(step.run_finished);

    assert_eq!(scheduler.state_of(idx(&graph, "split[0]")), NodeState::Done { skipped: false });
    assert_eq!(scheduler.state_of(idx(&graph, "split[1]")), NodeState::Failed);
    assert_eq!(scheduler.state_of(idx(&graph, "merge")), NodeState::Unreached);
    assert_eq!(scheduler.state_of(idx(&graph, "all")), NodeState::Unreached);
    Ok(())
}

#[test]
fn halt_leaves_running_tasks_to_finish() -> TestResult {
    let graph = fan_out_graph(&["0", "1", "2"])?;
    let mut scheduler = Scheduler::new(&graph);
    scheduler.start();

    let first = scheduler.dispatch_next().ok_or("nothing ready")?;
    let step = scheduler.halt();
    assert!(scheduler.is_halted());
    assert_eq!(step.newly_unreached.len(), 4);
    assert!(!step.run_finished);
    assert_eq!(scheduler.dispatch_next(), None);
    assert_eq!(scheduler.state_of(first), NodeState::Running);

    let step = scheduler.complete(first, TaskOutcome::Executed);
    assert!(step.newly_ready.is_empty());
    assert!(step.run_finished);
    assert_eq!(scheduler.state_of(first), NodeState::Done { skipped: false });
    Ok(())
}

#[test]
fn upstream_skip_tracking() -> TestResult {
    let graph = fan_out_graph(&["0", "1"])?;
    let merge = idx(&graph, "merge");

    let mut scheduler = Scheduler::new(&graph);
    scheduler.start();
    // Roots are vacuously "all upstream skipped".
    assert!(scheduler.all_upstream_skipped(idx(&graph, "split[0]")));
    for split in dispatch_all(&mut scheduler) {
        scheduler.complete(split, TaskOutcome::Skipped);
    }
    assert!(scheduler.all_upstream_skipped(merge));

    let mut scheduler = Scheduler::new(&graph);
    scheduler.start();
    dispatch_all(&mut scheduler);
    scheduler.complete(idx(&graph, "split[0]"), TaskOutcome::Skipped);
    scheduler.complete(idx(&graph, "split[1]"), TaskOutcome::Executed);
    assert_eq!(scheduler.state_of(merge), NodeState::Ready);
    assert!(!scheduler.all_upstream_skipped(merge));
    Ok(())
}

#[test]
fn completion_of_a_task_that_is_not_running_is_ignored() -> TestResult {
    let graph = fan_out_graph(&["0"])?;
    let mut scheduler = Scheduler::new(&graph);
    scheduler.start();

    let merge = idx(&graph, "merge");
    let step = scheduler.complete(merge, TaskOutcome::Executed);
    assert!(step.newly_ready.is_empty());
    assert_eq!(scheduler.state_of(merge), NodeState::Pending);
    assert_eq!(scheduler.running_count(), 0);
    Ok(())
}

#[test]
fn ready_tasks_come_out_in_topological_order() -> TestResult {
    let graph = fan_out_graph(&["a", "b", "c", "d"])?;
    let mut scheduler = Scheduler::new(&graph);
    scheduler.start();

    let dispatched = dispatch_all(&mut scheduler);
    let expected: Vec<NodeIndex> = graph
        .topo_order()
        .iter()
        .copied()
        .filter(|n| dispatched.contains(n))
        .collect();
    assert_eq!(dispatched, expected);
    Ok(())
}
