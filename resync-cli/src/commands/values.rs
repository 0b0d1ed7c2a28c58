//! Submit a sequence of values.

use anyhow::{Context, Result};
use resync_client::{MockOperation, ResyncConfig, ValueCoordinator};
use std::time::Duration;

use super::Report;

/// Run the values command.
pub async fn run(config: &ResyncConfig, count: u64, run_ms: u64) -> Result<Report> {
    let operation = MockOperation::<u64>::with_delay(Duration::from_millis(run_ms));
    let coordinator = ValueCoordinator::with_config(config, operation.clone())
        .context("Failed to create value coordinator")?;

    for value in 1..=count {
        coordinator.set_value(value);
    }
    coordinator
        .await_queue()
        .await
        .context("Coordinator did not settle")?;

    Ok(Report {
        command: "values",
        name: coordinator.name().to_string(),
        stats: coordinator.stats(),
        processed: Some(operation.payloads()),
    })
}
