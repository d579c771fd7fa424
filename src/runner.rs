//! Sequential run driver.
//!
//! Walks the target list in order through a per-target extraction function
//! and guarantees exactly one outcome per identifier. A failed target is
//! recorded and the run moves on; nothing raises past this boundary.

use std::future::Future;

use tracing::{error, info};

use crate::extract::ExtractionError;
use crate::models::{ExtractionOutcome, ProfileRecord};

/// Process every target strictly in order. `extract` is invoked once per
/// identifier; its error becomes a recorded failure, never a run abort.
pub async fn run_targets<F, Fut>(targets: &[String], mut extract: F) -> Vec<ExtractionOutcome>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<ProfileRecord, ExtractionError>>,
{
    let mut outcomes = Vec::with_capacity(targets.len());

    for (index, target) in targets.iter().enumerate() {
        info!(
            "Processing target {}/{}: {}",
            index + 1,
            targets.len(),
            target
        );
        match extract(target.clone()).await {
            Ok(record) => outcomes.push(ExtractionOutcome::Success(Box::new(record))),
            Err(e) => {
                error!("Failed to scrape {}: {}", target, e);
                outcomes.push(ExtractionOutcome::Failure {
                    url: target.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    outcomes
}
