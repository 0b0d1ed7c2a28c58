//! Invalidate coordinator: "something changed, re-derive state".
//!
//! [`Invalidator`] carries no payload. Any number of invalidations while a
//! run is in flight collapse into one follow-up run, which is enough to make
//! sure the latest change is reflected.
//!
//! # Example
//!
//! ```ignore
//! let outbox = Invalidator::from_fn(move || {
//!     let store = store.clone();
//!     async move { store.push_local_changes().await }
//! })?;
//!
//! outbox.invalidate();                  // fire and forget
//! outbox.invalidate_and_await().await?; // wait until pushed
//! ```

use crate::awaiter::Settled;
use crate::config::ResyncConfig;
use crate::error::ResyncError;
use crate::executor::Executor;
use crate::operation::Operation;
use resync_core::{Stats, SyncPhase};
use std::future::Future;
use std::sync::Arc;
use tokio::runtime::Handle;

const DEFAULT_NAME: &str = "invalidator";

/// Single-flight, coalescing trigger for a payload-less resync operation.
///
/// Cloning is cheap and every clone drives the same coordinator.
#[derive(Clone)]
pub struct Invalidator {
    executor: Arc<Executor<()>>,
}

impl Invalidator {
    /// Create an invalidator running `operation` on the current tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`ResyncError::NoRuntime`] when called outside a runtime.
    pub fn new<O: Operation<()>>(operation: O) -> Result<Self, ResyncError> {
        let handle = Handle::try_current().map_err(|_| ResyncError::NoRuntime)?;
        Ok(Self::with_handle(handle, operation))
    }

    /// Create an invalidator from an async closure.
    pub fn from_fn<F, Fut>(f: F) -> Result<Self, ResyncError>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self::new(move |_: ()| f())
    }

    /// Create an invalidator spawning its runs on `handle`.
    pub fn with_handle<O: Operation<()>>(handle: Handle, operation: O) -> Self {
        Self {
            executor: Executor::new(DEFAULT_NAME.to_string(), handle, Arc::new(operation)),
        }
    }

    /// Create an invalidator named and wrapped according to `config`.
    pub fn with_config<O: Operation<()>>(
        config: &ResyncConfig,
        operation: O,
    ) -> Result<Self, ResyncError> {
        let handle = Handle::try_current().map_err(|_| ResyncError::NoRuntime)?;
        Ok(Self {
            executor: Executor::new(config.name.clone(), handle, config.retry.wrap(operation)),
        })
    }

    /// Request a run. Starts one now if idle, otherwise coalesces.
    ///
    /// Ignored after [`stop`](Self::stop).
    pub fn invalidate(&self) {
        self.executor.request(());
    }

    /// Request a run and wait until the run serving this request settles.
    ///
    /// Resolves with the outcome of that run, or [`ResyncError::Stopped`] if
    /// the request was ignored or its pending run dropped by a stop.
    pub fn invalidate_and_await(&self) -> Settled {
        self.executor.request_and_await(())
    }

    /// Wait until the coordinator is idle, without requesting a run.
    ///
    /// Ready immediately when nothing is running.
    pub fn await_queue(&self) -> Settled {
        self.executor.await_queue()
    }

    /// Stop scheduling runs. The in-flight run, if any, finishes normally;
    /// a coalesced follow-up that has not started is dropped. Idempotent.
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

impl std::fmt::Debug for Invalidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Invalidator")
            .field("name", &self.name())
            .field("phase", &self.phase())
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryConfig;
    use crate::operation::MockOperation;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn new_outside_runtime_fails_fast() {
        let result = Invalidator::new(MockOperation::<()>::new());
        assert_eq!(result.unwrap_err(), ResyncError::NoRuntime);
    }

    #[test]
    fn with_handle_works_outside_runtime_context() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let mock = MockOperation::<()>::new();
        let invalidator = Invalidator::with_handle(runtime.handle().clone(), mock.clone());

        invalidator.invalidate();
        runtime.block_on(invalidator.await_queue()).unwrap();
        assert_eq!(mock.run_count(), 1);
    }

    #[tokio::test]
    async fn from_fn_runs_closure() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let invalidator = Invalidator::from_fn(move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                anyhow::Ok(())
            }
        })
        .unwrap();

        invalidator.invalidate_and_await().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalidate_after_stop_is_silent() {
        let mock = MockOperation::<()>::new();
        let invalidator = Invalidator::new(mock.clone()).unwrap();

        invalidator.stop();
        for _ in 0..5 {
            invalidator.invalidate();
        }
        invalidator.await_queue().await.unwrap();

        assert_eq!(mock.run_count(), 0);
        assert_eq!(invalidator.stats().ignored, 5);
    }

    #[tokio::test]
    async fn stop_while_pending_drops_follow_up_and_fails_its_awaiter() {
        let mock = MockOperation::<()>::held();
        let invalidator = Invalidator::new(mock.clone()).unwrap();

        let first = invalidator.invalidate_and_await();
        mock.wait_for_started(1).await;
        let second = invalidator.invalidate_and_await();
        assert_eq!(invalidator.phase(), SyncPhase::RunningWithPending);

        invalidator.stop();
        assert_eq!(invalidator.phase(), SyncPhase::Running);
        let late = invalidator.invalidate_and_await();

        mock.release_all();
        assert_eq!(first.await, Ok(()));
        assert_eq!(second.await, Err(ResyncError::Stopped));
        assert_eq!(late.await, Err(ResyncError::Stopped));
        assert_eq!(mock.run_count(), 1);
    }

    #[tokio::test]
    async fn config_names_and_wraps_with_retry() {
        let mock = MockOperation::<()>::new();
        mock.fail_next("flaky");
        let mut retry = RetryConfig::enabled(2);
        retry.base_delay_ms = 1;
        retry.max_jitter_ms = 0;
        let config = ResyncConfig::named("outbox").with_retry(retry);

        let invalidator = Invalidator::with_config(&config, mock.clone()).unwrap();
        assert_eq!(invalidator.name(), "outbox");

        // First attempt fails, retry succeeds, the run reports success
        invalidator.invalidate_and_await().await.unwrap();
        assert_eq!(mock.run_count(), 2);
        assert_eq!(invalidator.stats().runs_failed, 0);
    }

    #[tokio::test]
    async fn clones_share_one_coordinator() {
        let mock = MockOperation::<()>::with_delay(Duration::from_millis(20));
        let invalidator = Invalidator::new(mock.clone()).unwrap();
        let clone = invalidator.clone();

        invalidator.invalidate();
        clone.invalidate();
        clone.await_queue().await.unwrap();

        assert_eq!(mock.run_count(), 2);
        assert_eq!(mock.peak_concurrency(), 1);
    }

    #[tokio::test]
    async fn debug_shows_name_and_phase() {
        let invalidator = Invalidator::new(MockOperation::<()>::new()).unwrap();
        let debug = format!("{:?}", invalidator);
        assert!(debug.contains("invalidator"));
        assert!(debug.contains("Idle"));
    }
}
