//! The operation a coordinator runs.
//!
//! # Design
//!
//! A coordinator is bound to exactly one operation for its whole life. The
//! operation is opaque: it may talk to a server, rebuild a cache or wrap
//! itself in a retry policy. The coordinator only cares that it eventually
//! settles.
//!
//! Any `Fn(T) -> Future<Output = anyhow::Result<()>>` is an operation, so
//! closures work directly:
//!
//! ```ignore
//! let coordinator = ValueCoordinator::from_fn(|draft: String| async move {
//!     save_draft(&draft).await
//! })?;
//! ```

mod mock;

pub use mock::MockOperation;

use async_trait::async_trait;
use std::future::Future;

/// Asynchronous operation executed by a coordinator.
///
/// `T` is the payload of one run; the invalidate form uses `()`. Failures
/// are reported but never retried by the coordinator itself.
#[async_trait]
pub trait Operation<T>: Send + Sync + 'static {
    /// Execute one run with the payload that was current when it started.
    async fn run(&self, value: T) -> anyhow::Result<()>;
}

#[async_trait]
impl<T, F, Fut> Operation<T> for F
where
    T: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn run(&self, value: T) -> anyhow::Result<()> {
        (self)(value).await
    }
}
