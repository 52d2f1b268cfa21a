pub mod builders;
pub mod recording_tool;

use std::future::Future;
use std::sync::Once;
use std::time::Duration;

use tracing_subscriber::{EnvFilter, fmt};
use tyche::logging::LOG_ENV_VAR;

pub use builders::{ConfigFileBuilder, TaskDefinitionBuilder};
pub use recording_tool::{RecordedRun, RecordingTool, RunLog};

static INIT: Once = Once::new();

/// Longest a single build under test may take before it counts as hung.
pub const BUILD_TIMEOUT: Duration = Duration::from_secs(5);

/// Route tyche's tracing output into the test harness.
///
/// Honours the same `TYCHE_LOG` filter as the binary (default `warn`), so
/// `TYCHE_LOG=tyche=trace cargo test -- --nocapture` shows every skip vote.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new("warn"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .init();
    });
}

/// Await a build, failing the test if it outlives [`BUILD_TIMEOUT`].
///
/// Used around sessions that spawn real processes.
pub async fn with_timeout<F, T>(build: F) -> T
where
    F: Future<Output = T>,
{
    tokio::time::timeout(BUILD_TIMEOUT, build)
        .await
        .expect("build did not finish within BUILD_TIMEOUT")
}
