//! CLI command implementations.

pub mod burst;
pub mod values;

use resync_core::Stats;
use serde::Serialize;

/// Outcome of one command, printed as text or JSON.
#[derive(Debug, Serialize)]
pub struct Report {
    pub command: &'static str,
    pub name: String,
    pub stats: Stats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed: Option<Vec<u64>>,
}
