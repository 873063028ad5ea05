//! Shared helpers for the rulegraph integration tests.

pub mod builders;
pub mod fake_executor;

use std::future::Future;
use std::sync::Once;
use std::time::Duration;

use tracing_subscriber::{EnvFilter, fmt};

/// Upper bound for a single run driven by a test.
pub const RUN_TIMEOUT: Duration = Duration::from_secs(5);

static TRACING: Once = Once::new();

/// Install a test-captured subscriber once per test binary.
///
/// Runtime and scheduler events are shown at `info` for failing tests;
/// `RUST_LOG=rulegraph=debug` adds state transitions and stderr lines.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("warn,rulegraph=info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .init();
    });
}

/// Await `fut`, failing the test if it outlives [`RUN_TIMEOUT`].
pub async fn with_timeout<F, T>(fut: F) -> T
where
    F: Future<Output = T>,
{
    match tokio::time::timeout(RUN_TIMEOUT, fut).await {
        Ok(value) => value,
        Err(_) => panic!("run did not finish within {RUN_TIMEOUT:?}"),
    }
}
