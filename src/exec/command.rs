// src/exec/command.rs

//! Production executor: one shell process per task.

use std::future::Future;
use std::path::Path;
use std::pin::Pin;

use anyhow::{Context, Result};
use tracing::{error, warn};

use crate::exec::backend::{ExecReport, ExecRequest, TaskExecutor};
use crate::exec::task_runner::{run_logged, ProcessOutcome};

/// Runs the rendered command with `sh -c` (`cmd /C` on Windows).
///
/// Parent directories of the output and log are created first. The combined
/// process output lands in the request's log path.
#[derive(Debug, Clone, Default)]
pub struct CommandExecutor;

impl CommandExecutor {
    pub fn new() -> Self {
        Self
    }

    async fn run(request: &ExecRequest) -> Result<ExecReport> {
        for dir in request
            .output
            .iter()
            .chain(std::iter::once(&request.log))
            .filter_map(|p| p.parent())
        {
            create_dir(dir).await?;
        }

        let outcome = run_logged(&request.task, &request.command, &request.log).await?;
        Ok(report_for(request, outcome))
    }
}

async fn create_dir(dir: &Path) -> Result<()> {
    if dir.as_os_str().is_empty() {
        return Ok(());
    }
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("creating directory {}", dir.display()))
}

fn report_for(request: &ExecRequest, outcome: ProcessOutcome) -> ExecReport {
    if !outcome.success {
        let mut message = match outcome.exit_code {
            Some(code) => format!("command exited with status {code}"),
            None => "command terminated by a signal".to_string(),
        };
        if !outcome.stderr_tail.is_empty() {
            message.push_str(":\n");
            message.push_str(&outcome.stderr_tail.join("\n"));
        }
        message.push_str(&format!("\n(see {})", request.log.display()));
        return ExecReport::failure(outcome.exit_code, message);
    }

    match &request.output {
        Some(output) if !output.exists() => {
            warn!(
                task = %request.task,
                output = %output.display(),
                "command succeeded but did not produce its output"
            );
            ExecReport::failure(
                outcome.exit_code,
                format!("declared output {} was not produced", output.display()),
            )
        }
        Some(output) => ExecReport::success(vec![output.clone()]),
        None => ExecReport::success(Vec::new()),
    }
}

impl TaskExecutor for CommandExecutor {
    fn execute(
        &self,
        request: ExecRequest,
    ) -> Pin<Box<dyn Future<Output = ExecReport> + Send + '_>> {
        Box::pin(async move {
            match Self::run(&request).await {
                Ok(report) => report,
                Err(err) => {
                    error!(task = %request.task, error = %err, "task execution error");
                    ExecReport::failure(None, format!("{err:#}"))
                }
            }
        })
    }
}
