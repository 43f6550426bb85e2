//! Tracing initialisation for host shells.

use tracing_appender::non_blocking::WorkerGuard;

/// Initialise tracing with an env-filtered fmt subscriber. When
/// `FUNDFLOW_LOG_DIR` is set, logs are additionally written to a daily
/// rolling file in that directory; keep the returned guard alive for the
/// lifetime of the host or buffered lines are lost.
pub fn init() -> Option<WorkerGuard> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    match std::env::var("FUNDFLOW_LOG_DIR") {
        Ok(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "fundflow.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Some(guard)
        }
        Err(_) => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .init();
            None
        }
    }
}
