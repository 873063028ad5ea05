use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use rulegraph::exec::{ExecReport, ExecRequest, TaskExecutor};

/// A fake executor that:
/// - records every request it receives
/// - fails the tasks it was told to fail
/// - otherwise succeeds, optionally writing each declared output
/// - tracks the highest number of calls in flight at once
#[derive(Default)]
pub struct FakeExecutor {
    requests: Mutex<Vec<ExecRequest>>,
    failing: HashSet<String>,
    delay: Option<Duration>,
    write_outputs: bool,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the task with this display id (`split[1]`).
    pub fn failing(mut self, task: &str) -> Self {
        self.failing.insert(task.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Create each declared output file on success.
    pub fn writing_outputs(mut self) -> Self {
        self.write_outputs = true;
        self
    }

    /// Task ids in invocation order.
    pub fn invoked(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.task.clone())
            .collect()
    }

    pub fn invocation_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ExecRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl TaskExecutor for FakeExecutor {
    fn execute(
        &self,
        request: ExecRequest,
    ) -> Pin<Box<dyn Future<Output = ExecReport> + Send + '_>> {
        Box::pin(async move {
            self.requests.lock().unwrap().push(request.clone());
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            let report = if self.failing.contains(&request.task) {
                ExecReport::failure(Some(1), format!("{} exploded", request.task))
            } else {
                let mut outputs = Vec::new();
                if let Some(output) = &request.output {
                    if self.write_outputs {
                        if let Some(parent) = output.parent() {
                            std::fs::create_dir_all(parent).unwrap();
                        }
                        std::fs::write(output, request.task.as_bytes()).unwrap();
                    }
                    outputs.push(output.clone());
                }
                ExecReport::success(outputs)
            };

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            report
        })
    }
}
