//! linkscrape
//!
//! Automated LinkedIn profile scraper. One stealth-configured Chrome
//! instance is authenticated once (persisted session or fresh login) and
//! then driven sequentially through a list of profile targets; results are
//! assembled into a structured JSON report and a flat CSV summary.

pub mod auth;
pub mod browser;
pub mod config;
pub mod extract;
pub mod humanize;
pub mod models;
pub mod output;
pub mod runner;

/// Name of the append-only log file written to the working directory.
pub const LOG_FILE: &str = "execution.log";

/// Initialize logging: INFO-level console output plus a non-blocking file
/// layer appending to [`LOG_FILE`]. The returned guard must live for the
/// duration of the process or buffered log lines are lost.
pub fn init_logging() -> tracing_appender::non_blocking::WorkerGuard {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::INFO.into());

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false);

    let file_appender = tracing_appender::rolling::never(".", LOG_FILE);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_target(true)
        .with_writer(non_blocking);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    guard
}
