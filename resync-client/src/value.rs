//! Value coordinator: "here is the latest value, converge to it".
//!
//! [`ValueCoordinator`] runs the same single-flight state machine as
//! [`Invalidator`](crate::Invalidator), with a payload slot on top. Values
//! submitted while a run is in flight overwrite each other; only the latest
//! survives to the follow-up run. A run always receives exactly the value
//! that was current when it started.
//!
//! For `set_value(1)` followed by `set_value(2..=4)` while the first run is
//! in flight, the operation sees `[1, 4]`.

use crate::awaiter::Settled;
use crate::config::ResyncConfig;
use crate::error::ResyncError;
use crate::executor::Executor;
use crate::operation::Operation;
use resync_core::{Stats, SyncPhase};
use std::future::Future;
use std::sync::Arc;
use tokio::runtime::Handle;

const DEFAULT_NAME: &str = "value-coordinator";

/// Single-flight, last-writer-wins coordinator for a payload-carrying
/// resync operation.
///
/// Cloning is cheap and every clone drives the same coordinator.
pub struct ValueCoordinator<T> {
    executor: Arc<Executor<T>>,
}

impl<T: Send + 'static> ValueCoordinator<T> {
    /// Create a coordinator running `operation` on the current tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`ResyncError::NoRuntime`] when called outside a runtime.
    pub fn new<O: Operation<T>>(operation: O) -> Result<Self, ResyncError> {
        let handle = Handle::try_current().map_err(|_| ResyncError::NoRuntime)?;
        Ok(Self::with_handle(handle, operation))
    }

    /// Create a coordinator from an async closure taking the value.
    pub fn from_fn<F, Fut>(f: F) -> Result<Self, ResyncError>
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self::new(f)
    }

    /// Create a coordinator spawning its runs on `handle`.
    pub fn with_handle<O: Operation<T>>(handle: Handle, operation: O) -> Self {
        Self {
            executor: Executor::new(DEFAULT_NAME.to_string(), handle, Arc::new(operation)),
        }
    }

    /// Submit the latest value.
    ///
    /// Starts a run with `value` if idle. Otherwise `value` replaces any
    /// value already waiting for the follow-up run. Ignored after
    /// [`stop`](Self::stop).
    pub fn set_value(&self, value: T) {
        self.executor.request(value);
    }

    /// Submit the latest value and wait until the run serving it settles.
    ///
    /// If `value` is later superseded by another value before its run
    /// starts, this resolves with the outcome of the run that processed the
    /// newer value.
    pub fn set_value_and_await(&self, value: T) -> Settled {
        self.executor.request_and_await(value)
    }

    /// Wait until the coordinator is idle, without submitting a value.
    ///
    /// Ready immediately when nothing is running.
    pub fn await_queue(&self) -> Settled {
        self.executor.await_queue()
    }

    /// Stop scheduling runs. The in-flight run, if any, finishes normally;
    /// a buffered value that has not started is discarded. Idempotent.
    pub fn stop(&self) {
        self.executor.stop();
    }

    /// Current phase.
    pub fn phase(&self) -> SyncPhase {
        self.executor.phase()
    }

    /// Check if [`stop`](Self::stop) has been called.
    pub fn is_stopped(&self) -> bool {
        self.executor.is_stopped()
    }

    /// Snapshot of the counters.
    pub fn stats(&self) -> Stats {
        self.executor.stats()
    }

    /// Name used in log output.
    pub fn name(&self) -> &str {
        self.executor.name()
    }
}

impl<T: Clone + Send + 'static> ValueCoordinator<T> {
    /// Create a coordinator named and wrapped according to `config`.
    ///
    /// Retrying needs to hand the same value to every attempt, hence `Clone`.
    pub fn with_config<O: Operation<T>>(
        config: &ResyncConfig,
        operation: O,
    ) -> Result<Self, ResyncError> {
        let handle = Handle::try_current().map_err(|_| ResyncError::NoRuntime)?;
        Ok(Self {
            executor: Executor::new(config.name.clone(), handle, config.retry.wrap(operation)),
        })
    }
}

impl<T> Clone for ValueCoordinator<T> {
    fn clone(&self) -> Self {
        Self {
            executor: Arc::clone(&self.executor),
        }
    }
}

impl<T: Send + 'static> std::fmt::Debug for ValueCoordinator<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValueCoordinator")
            .field("name", &self.name())
            .field("phase", &self.phase())
            .field("stopped", &self.is_stopped())
            .finish()
    }
}
