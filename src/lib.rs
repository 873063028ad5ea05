// src/lib.rs

pub mod catalog;
pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod marker;
pub mod types;
pub mod units;
pub mod workdir;

use std::fs;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::{debug, info, warn};

use crate::catalog::Catalog;
use crate::cli::CliArgs;
use crate::config::loader::{load_and_validate, load_catalog_for};
use crate::config::render_template;
use crate::dag::{check_all_combinations, GraphBuilder, TaskGraph};
use crate::engine::{plan_run, PlannedAction, RunOptions, RunReport, Runtime, RuntimeEvent};
use crate::exec::CommandExecutor;
use crate::marker::{FileMarkerStore, MarkerStore};
use crate::types::FailurePolicy;
use crate::units::UnitSet;
use crate::workdir::WorkdirPolicy;

/// High-level entry point used by `main.rs`. Returns the process exit code.
///
/// This wires together:
/// - config and catalog loading
/// - unit resolution and graph building
/// - the runtime with the shell executor and on-disk markers
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<i32> {
    if let Some(path) = &args.init_config {
        write_config_template(&args, path)?;
        return Ok(0);
    }

    let cfg = load_and_validate(&args.config)
        .with_context(|| format!("loading config {}", args.config.display()))?;
    let catalog = load_catalog_for(&cfg).context("loading rule catalog")?;

    let overrides = cfg
        .switch_overrides()
        .chain(args.switches.iter().map(|(name, on)| (name.as_str(), *on)));
    let switches = catalog.resolve_switches(overrides)?;
    let enabled: Vec<&str> = switches.enabled().collect();
    info!(switches = ?enabled, "resolved switches");

    let units = UnitSet::resolve(&cfg, catalog.requires_units(&switches))?;
    let vars = cfg.base_vars();

    if args.check_all {
        let checked = check_all_combinations(&catalog, &units, &vars)?;
        println!("all {checked} legal switch combinations build a valid graph");
        return Ok(0);
    }

    let graph = GraphBuilder::new(&catalog, &units, &switches, &vars).build()?;
    let markers: Arc<dyn MarkerStore> = Arc::new(FileMarkerStore::new());

    if args.dry_run {
        print_dry_run(&graph, markers.as_ref(), args.force);
        return Ok(0);
    }

    workdir::prepare(
        cfg.working_dir(),
        WorkdirPolicy {
            clear_all: args.clear_all,
            overwrite_lock: args.overwrite_lock,
        },
    )?;
    if args.clear_all {
        workdir::clear_markers(&graph, markers.as_ref())?;
    }

    let options = RunOptions {
        max_concurrency: args
            .max_concurrency
            .map(|n| n as usize)
            .unwrap_or(cfg.env.max_concurrency),
        failure_policy: if args.stop_on_failure {
            FailurePolicy::StopDispatch
        } else {
            cfg.env.failure_policy
        },
        force: args.force,
    };

    let runtime = Runtime::new(graph, markers, Arc::new(CommandExecutor::new()), options);

    // Ctrl-C -> stop dispatching; running tasks finish.
    {
        let tx = runtime.event_sender();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for Ctrl+C");
                return;
            }
            let _ = tx.send(RuntimeEvent::ShutdownRequested).await;
        });
    }

    let report = runtime.run().await?;
    print_summary(&report);
    Ok(report.exit_code())
}

fn write_config_template(args: &CliArgs, path: &std::path::Path) -> Result<()> {
    if path.exists() {
        bail!("refusing to overwrite existing file {}", path.display());
    }

    // Use the catalog named by an existing config, if there is one.
    let catalog = if args.config.exists() {
        let cfg = load_and_validate(&args.config)?;
        load_catalog_for(&cfg)?
    } else {
        Catalog::builtin()?
    };

    fs::write(path, render_template(&catalog))
        .with_context(|| format!("writing config template to {}", path.display()))?;
    println!("wrote config template to {}", path.display());
    Ok(())
}

/// Print every task in topological order with what a run would do.
fn print_dry_run(graph: &TaskGraph, markers: &dyn MarkerStore, force: bool) {
    println!("rulegraph dry-run");
    println!("  tasks = {}, edges = {}", graph.node_count(), graph.edge_count());
    println!("  sink = {}", graph.sink_node().id);
    println!();

    for (idx, action) in plan_run(graph, markers, force) {
        let node = graph.node(idx);
        let label = match action {
            PlannedAction::Skip => "skip",
            PlannedAction::Run => "run",
            PlannedAction::Pass => "pass",
        };
        println!("  [{label:>4}] {}", node.id);
        if let Some(cmd) = &node.command {
            println!("      cmd: {cmd}");
        }
        let deps: Vec<String> = graph
            .dependencies_of(idx)
            .into_iter()
            .map(|d| graph.node(d).id.to_string())
            .collect();
        if !deps.is_empty() {
            println!("      after: {}", deps.join(", "));
        }
        if let Some(output) = &node.output {
            println!("      output: {}", output.display());
        }
    }

    debug!("dry-run complete (no execution)");
}

fn print_summary(report: &RunReport) {
    println!(
        "executed {}, skipped {}, failed {}, unreached {}",
        report.executed.len(),
        report.skipped.len(),
        report.failed.len(),
        report.unreached.len()
    );

    for failure in &report.failures {
        eprintln!("{}", failure.to_error());
    }
    if let Some(output) = &report.sink_output_missing {
        eprintln!("final output {} is missing", output.display());
    }
}
