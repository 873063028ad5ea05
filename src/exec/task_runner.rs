// src/exec/task_runner.rs

//! Individual task process runner.

use std::collections::VecDeque;
use std::path::Path;
use std::process::Stdio;

use anyhow::{Context, Result};
use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

/// How many trailing stderr lines are kept for the failure message.
pub const STDERR_TAIL_LINES: usize = 20;

/// Exit status plus the last lines the process wrote to stderr.
#[derive(Debug, Clone)]
pub struct ProcessOutcome {
    pub exit_code: Option<i32>,
    pub success: bool,
    pub stderr_tail: Vec<String>,
}

/// Build a shell command appropriate for the platform.
pub fn shell_command(cmd: &str) -> Command {
    if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(cmd);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(cmd);
        c
    }
}

/// Run `cmd` through the shell, sending stdout and stderr to `log_path`.
///
/// The log file is truncated first. Stdout goes straight to the file;
/// stderr is copied there line by line as raw bytes, logged at debug and
/// its tail kept.
pub async fn run_logged(task: &str, cmd: &str, log_path: &Path) -> Result<ProcessOutcome> {
    info!(task = %task, cmd = %cmd, log = %log_path.display(), "starting task process");

    fs::File::create(log_path)
        .await
        .with_context(|| format!("creating log file {}", log_path.display()))?;
    // Both handles append so stdout and stderr never overwrite each other.
    let stdout_log = open_append(log_path).await?.into_std().await;

    let mut child = shell_command(cmd)
        .stdin(Stdio::null())
        .stdout(Stdio::from(stdout_log))
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("spawning process for task '{task}'"))?;

    let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL_LINES);
    if let Some(stderr) = child.stderr.take() {
        let mut stderr_log = open_append(log_path).await?;
        let mut reader = BufReader::new(stderr);
        let mut raw = Vec::new();

        // Tools may write arbitrary bytes: the log gets them verbatim, the
        // tail a lossy decoding.
        while reader.read_until(b'\n', &mut raw).await? > 0 {
            stderr_log.write_all(&raw).await?;
            let line = String::from_utf8_lossy(&raw)
                .trim_end_matches(['\r', '\n'])
                .to_string();
            raw.clear();

            debug!(task = %task, "stderr: {}", line);
            if tail.len() == STDERR_TAIL_LINES {
                tail.pop_front();
            }
            tail.push_back(line);
        }
        stderr_log.flush().await?;
    }

    let status = child
        .wait()
        .await
        .with_context(|| format!("waiting for process of task '{task}'"))?;

    info!(
        task = %task,
        exit_code = status.code(),
        success = status.success(),
        "task process exited"
    );

    Ok(ProcessOutcome {
        exit_code: status.code(),
        success: status.success(),
        stderr_tail: tail.into(),
    })
}

async fn open_append(path: &Path) -> Result<fs::File> {
    OpenOptions::new()
        .append(true)
        .open(path)
        .await
        .with_context(|| format!("opening log file {}", path.display()))
}
