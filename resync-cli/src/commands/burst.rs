//! Fire a burst of invalidations.

use anyhow::{Context, Result};
use resync_client::{Invalidator, MockOperation, ResyncConfig};
use std::time::Duration;

use super::Report;

/// Run the burst command.
///
/// All invalidations are issued back-to-back, so everything after the
/// first lands while the first run is in flight.
pub async fn run(config: &ResyncConfig, invalidations: u32, run_ms: u64, wait: bool) -> Result<Report> {
    let operation = MockOperation::<()>::with_delay(Duration::from_millis(run_ms));
    let invalidator = Invalidator::with_config(config, operation)
        .context("Failed to create invalidator")?;

    if wait {
        let handles: Vec<_> = (0..invalidations)
            .map(|_| invalidator.invalidate_and_await())
            .collect();
        for (i, handle) in handles.into_iter().enumerate() {
            if let Err(e) = handle.await {
                tracing::warn!("Invalidation {} settled with error: {}", i + 1, e);
            }
        }
    } else {
        for _ in 0..invalidations {
            invalidator.invalidate();
        }
    }
    invalidator
        .await_queue()
        .await
        .context("Coordinator did not settle")?;

    Ok(Report {
        command: "burst",
        name: invalidator.name().to_string(),
        stats: invalidator.stats(),
        processed: None,
    })
}
