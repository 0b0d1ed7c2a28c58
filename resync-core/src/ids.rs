//! Ordering types for resync.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Sequence number of a run started by a coordinator.
///
/// Assigned by the state machine when a run is scheduled. Runs are strictly
/// sequential, so a higher id always means a later run. `RunId::zero()` means
/// "no run has started yet".
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct RunId(u64);

impl RunId {
    /// Create a RunId with the given value.
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the numeric value of this RunId.
    pub fn value(&self) -> u64 {
        self.0
    }

    /// RunId before the first run.
    pub fn zero() -> Self {
        Self(0)
    }

    /// The id of the run that follows this one.
    pub fn next(&self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RunId({})", self.0)
    }
}
