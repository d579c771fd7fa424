//! Command-line entry point.
//!
//! Resolves configuration, launches the browser, authenticates once, walks
//! the target list, writes the reports, then tears the browser down on
//! every exit path.

use std::path::Path;

use clap::Parser;
use tracing::{error, info};

use linkscrape::auth::{AuthManager, OperatorChallengeResolver, SessionStore};
use linkscrape::browser::{BrowserSession, BrowserSessionConfig};
use linkscrape::config::{CliArgs, Mode, ScraperConfig};
use linkscrape::extract::ExtractionPipeline;
use linkscrape::humanize::Pacing;
use linkscrape::models::{ExtractionOutcome, RunMetadata, RunReport};
use linkscrape::{init_logging, output, runner};

/// Persisted session file in the working directory.
const SESSION_FILE: &str = "session.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    let _guard = init_logging();

    // Configuration failures terminate before any browser is launched.
    let config = ScraperConfig::resolve(args)?;

    let session_config = BrowserSessionConfig {
        headless: config.headless,
        stealth: matches!(config.mode, Mode::Stealth),
        proxy: config.proxy.clone(),
        ..Default::default()
    };
    let mut session = BrowserSession::launch(session_config).await?;

    // The browser must come down regardless of how the run ends.
    let result = run(&session, &config).await;
    session.close().await;

    if let Err(ref e) = result {
        error!("Run failed: {:#}", e);
    }
    result
}

async fn run(session: &BrowserSession, config: &ScraperConfig) -> anyhow::Result<()> {
    let pacing = Pacing::for_mode(config.mode);

    let auth = AuthManager::new(
        SessionStore::new(SESSION_FILE),
        config.credentials.clone(),
        pacing.clone(),
        Box::new(OperatorChallengeResolver),
    );
    auth.login(session).await?;

    let pipeline = ExtractionPipeline::new(session, pacing.clone());
    let outcomes = runner::run_targets(&config.targets, |target| {
        let pipeline = &pipeline;
        async move { pipeline.extract(&target).await }
    })
    .await;

    let mut profiles = Vec::new();
    let mut failed = 0usize;
    for outcome in outcomes {
        match outcome {
            ExtractionOutcome::Success(record) => profiles.push(*record),
            // Already logged by the runner when it happened.
            ExtractionOutcome::Failure { .. } => failed += 1,
        }
    }

    let report = RunReport {
        metadata: RunMetadata {
            scraped_at: chrono::Utc::now().to_rfc3339(),
            total_profiles: profiles.len(),
            status: "completed".to_string(),
        },
        profiles,
    };
    // A validation or write failure loses the reports, not the run.
    if let Err(e) = output::write_reports(&report, Path::new(".")) {
        error!("Reports not written: {}", e);
    }

    info!(
        "Run complete: {} scraped, {} failed",
        report.metadata.total_profiles, failed
    );
    Ok(())
}
