//! Error types for resync-client.

use resync_core::RunId;
use thiserror::Error;

/// Errors surfaced by coordinators and their awaiters.
///
/// Awaiters of one cycle may all receive the same failure, so run failures
/// are flattened to a message and the type is `Clone`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResyncError {
    /// Constructed outside a tokio runtime without an explicit handle.
    #[error("no tokio runtime available")]
    NoRuntime,

    /// The request was ignored or its pending run dropped by `stop()`.
    #[error("coordinator stopped")]
    Stopped,

    /// The run serving this request failed.
    #[error("run {run} failed: {message}")]
    RunFailed {
        /// The run that failed.
        run: RunId,
        /// Flattened error chain of the failure.
        message: String,
    },

    /// The coordinator went away before the awaiter was resolved.
    #[error("coordinator dropped before settling")]
    Abandoned,
}
