//! Counters describing what a coordinator has done so far.

use serde::{Deserialize, Serialize};

/// Running totals kept by [`Coordination`](crate::Coordination).
///
/// Every field only ever grows. A snapshot is cheap to copy out of the
/// coordinator for reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    /// Requests accepted or ignored (every `Requested` event).
    pub requests: u64,
    /// Runs handed to the executor.
    pub runs_started: u64,
    /// Runs that settled, successfully or not.
    pub runs_completed: u64,
    /// Runs that settled with a failure.
    pub runs_failed: u64,
    /// Requests folded into a pending follow-up run.
    pub coalesced: u64,
    /// Requests ignored because the coordinator was stopped.
    pub ignored: u64,
    /// Pending follow-up runs discarded by a stop.
    pub dropped: u64,
}

impl Stats {
    /// Runs that settled without a failure.
    pub fn runs_succeeded(&self) -> u64 {
        self.runs_completed.saturating_sub(self.runs_failed)
    }

    /// Runs started but not yet settled (0 or 1).
    pub fn runs_in_flight(&self) -> u64 {
        self.runs_started.saturating_sub(self.runs_completed)
    }
}
