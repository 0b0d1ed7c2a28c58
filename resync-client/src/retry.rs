//! Retry collaborator.
//!
//! Coordinators treat a failed run as finished and never retry it. Callers
//! that want transient failures absorbed wrap their operation in
//! [`Retrying`] before handing it to the coordinator.

use crate::operation::Operation;
use async_trait::async_trait;
use resync_core::Backoff;

/// How many times to try a run and how long to wait between tries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one (at least 1).
    pub max_attempts: u32,
    /// Delay between attempts.
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Backoff::default(),
        }
    }
}

/// An operation that retries its inner operation with backoff.
#[derive(Debug, Clone)]
pub struct Retrying<O> {
    inner: O,
    policy: RetryPolicy,
}

impl<O> Retrying<O> {
    /// Wrap `inner` with the given policy.
    pub fn new(inner: O, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    /// The wrapped operation.
    pub fn inner(&self) -> &O {
        &self.inner
    }
}

#[async_trait]
impl<T, O> Operation<T> for Retrying<O>
where
    T: Clone + Send + 'static,
    O: Operation<T>,
{
    async fn run(&self, value: T) -> anyhow::Result<()> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match self.inner.run(value.clone()).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt >= max_attempts => {
                    return Err(e.context(format!("gave up after {} attempts", attempt)));
                }
                Err(e) => {
                    let delay = self.policy.backoff.delay(attempt);
                    tracing::warn!(
                        "Attempt {}/{} failed: {:#}; retrying in {:?}",
                        attempt,
                        max_attempts,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
