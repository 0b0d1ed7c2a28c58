//! Mock operation for testing.
//!
//! Records every payload it is run with and lets tests decide when a run
//! finishes, so coalescing can be observed deterministically.

use super::Operation;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{watch, Semaphore};

/// Mock operation for testing.
///
/// Runs can be held at their start until released, delayed by a fixed
/// duration, or made to fail. Clones share state, so a test can keep one
/// clone while the coordinator owns another.
#[derive(Debug)]
pub struct MockOperation<T> {
    inner: Arc<Mutex<MockOperationInner<T>>>,
    gate: Arc<Semaphore>,
    started: Arc<watch::Sender<usize>>,
    completed: Arc<watch::Sender<usize>>,
}

#[derive(Debug)]
struct MockOperationInner<T> {
    payloads: Vec<T>,
    active: usize,
    peak_active: usize,
    held: bool,
    waiting: usize,
    delay: Option<Duration>,
    fail_next: Option<String>,
    panic_next: bool,
}

impl<T> Default for MockOperationInner<T> {
    fn default() -> Self {
        Self {
            payloads: Vec::new(),
            active: 0,
            peak_active: 0,
            held: false,
            waiting: 0,
            delay: None,
            fail_next: None,
            panic_next: false,
        }
    }
}

impl<T> MockOperation<T> {
    /// Create a mock whose runs complete immediately.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockOperationInner::default())),
            gate: Arc::new(Semaphore::new(0)),
            started: Arc::new(watch::channel(0).0),
            completed: Arc::new(watch::channel(0).0),
        }
    }

    /// Create a mock whose runs wait until released.
    pub fn held() -> Self {
        let mock = Self::new();
        mock.hold();
        mock
    }

    /// Create a mock whose runs take `delay` to complete.
    pub fn with_delay(delay: Duration) -> Self {
        let mock = Self::new();
        mock.lock().delay = Some(delay);
        mock
    }

    /// Make subsequent runs wait at their start until released.
    pub fn hold(&self) {
        self.lock().held = true;
    }

    /// Let `n` held runs proceed.
    pub fn release(&self, n: usize) {
        self.gate.add_permits(n);
    }

    /// Stop holding runs and let every waiting run proceed.
    pub fn release_all(&self) {
        let waiting = {
            let mut inner = self.lock();
            inner.held = false;
            inner.waiting
        };
        self.gate.add_permits(waiting);
    }

    /// Cause the next run to fail with the given error.
    pub fn fail_next(&self, error: &str) {
        self.lock().fail_next = Some(error.to_string());
    }

    /// Cause the next run to panic.
    pub fn panic_next(&self) {
        self.lock().panic_next = true;
    }

    /// Number of runs that have started.
    pub fn run_count(&self) -> usize {
        *self.started.borrow()
    }

    /// Number of runs that have finished.
    pub fn completed_count(&self) -> usize {
        *self.completed.borrow()
    }

    /// Highest number of runs ever executing at the same time.
    pub fn peak_concurrency(&self) -> usize {
        self.lock().peak_active
    }

    /// Wait until at least `n` runs have started.
    pub async fn wait_for_started(&self, n: usize) {
        let mut rx = self.started.subscribe();
        // The sender lives in self, so the channel cannot close here
        let _ = rx.wait_for(|count| *count >= n).await;
    }

    /// Wait until at least `n` runs have finished.
    pub async fn wait_for_completed(&self, n: usize) {
        let mut rx = self.completed.subscribe();
        let _ = rx.wait_for(|count| *count >= n).await;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockOperationInner<T>> {
        self.inner.lock().unwrap()
    }
}

impl<T: Clone> MockOperation<T> {
    /// Payloads of every run so far, in start order.
    pub fn payloads(&self) -> Vec<T> {
        self.lock().payloads.clone()
    }
}

impl<T> Default for MockOperation<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for MockOperation<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            gate: Arc::clone(&self.gate),
            started: Arc::clone(&self.started),
            completed: Arc::clone(&self.completed),
        }
    }
}

#[async_trait]
impl<T> Operation<T> for MockOperation<T>
where
    T: Send + 'static,
{
    async fn run(&self, value: T) -> anyhow::Result<()> {
        let (held, delay, fail, panic) = {
            let mut inner = self.lock();
            inner.payloads.push(value);
            inner.active += 1;
            inner.peak_active = inner.peak_active.max(inner.active);
            if inner.held {
                inner.waiting += 1;
            }
            (
                inner.held,
                inner.delay,
                inner.fail_next.take(),
                std::mem::take(&mut inner.panic_next),
            )
        };
        self.started.send_modify(|count| *count += 1);

        if held {
            if let Ok(permit) = self.gate.acquire().await {
                permit.forget();
            }
            self.lock().waiting -= 1;
        } else if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.lock().active -= 1;
        self.completed.send_modify(|count| *count += 1);

        if panic {
            panic!("mock operation panicked");
        }
        match fail {
            Some(error) => Err(anyhow::anyhow!(error)),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_payloads_in_order() {
        let mock = MockOperation::<u32>::new();
        mock.run(1u32).await.unwrap();
        mock.run(2).await.unwrap();

        assert_eq!(mock.payloads(), vec![1, 2]);
        assert_eq!(mock.run_count(), 2);
        assert_eq!(mock.completed_count(), 2);
    }

    #[tokio::test]
    async fn fail_next_fails_once() {
        let mock = MockOperation::<()>::new();
        mock.fail_next("server unreachable");

        let err = mock.run(()).await.unwrap_err();
        assert_eq!(err.to_string(), "server unreachable");
        assert!(mock.run(()).await.is_ok());
    }

    #[tokio::test]
    async fn held_run_waits_for_release() {
        let mock = MockOperation::<u32>::held();
        let runner = mock.clone();
        let task = tokio::spawn(async move { runner.run(5).await });

        mock.wait_for_started(1).await;
        assert_eq!(mock.completed_count(), 0);

        mock.release(1);
        task.await.unwrap().unwrap();
        assert_eq!(mock.completed_count(), 1);
    }

    #[tokio::test]
    async fn release_all_unblocks_future_runs() {
        let mock = MockOperation::<u32>::held();
        let runner = mock.clone();
        let task = tokio::spawn(async move { runner.run(1).await });
        mock.wait_for_started(1).await;

        mock.release_all();
        task.await.unwrap().unwrap();
        // No longer held
        mock.run(2).await.unwrap();
        assert_eq!(mock.completed_count(), 2);
    }

    #[tokio::test]
    async fn clones_share_state() {
        let mock = MockOperation::<&'static str>::new();
        let clone = mock.clone();
        clone.run("a").await.unwrap();
        assert_eq!(mock.payloads(), vec!["a"]);
    }
}
