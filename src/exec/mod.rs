// src/exec/mod.rs

//! Task execution layer.
//!
//! - [`backend`] defines the `TaskExecutor` trait and its request/report
//!   types. Tests replace the executor with a fake implementation.
//! - [`command`] is the production executor.
//! - [`task_runner`] spawns and supervises a single shell process.

pub mod backend;
pub mod command;
pub mod task_runner;

pub use backend::{ExecReport, ExecRequest, TaskExecutor};
pub use command::CommandExecutor;
