// src/dag/mod.rs

//! Task graph construction and scheduling.
//!
//! - [`graph`] holds the validated petgraph DAG of concrete tasks.
//! - [`builder`] instantiates it from the catalog, units and switches.
//! - [`scheduler`] contains the per-run state machine that decides
//!   which tasks are ready and propagates failure.
//! - [`task_info`] provides the per-node state types.
//! - [`scheduler_step`] defines the result type for scheduler steps.
//! - [`state_manager`] applies per-run state transitions.

pub mod builder;
pub mod graph;
pub mod scheduler;
pub mod scheduler_step;
pub mod state_manager;
pub mod task_info;

pub use builder::{check_all_combinations, GraphBuilder};
pub use graph::{TaskGraph, TaskId, TaskNode};
pub use scheduler::Scheduler;
pub use scheduler_step::SchedulerStep;
pub use task_info::NodeState;
