//! # resync-client
//!
//! Single-flight invalidate-and-resync coordinators on tokio.
//!
//! A coordinator guarantees that an expensive asynchronous "resync"
//! operation runs at most once at a time, however often the resource behind
//! it is invalidated, and that bursts of invalidation collapse into at most
//! one follow-up run.
//!
//! ## Features
//!
//! - **Invalidate form**: [`Invalidator`] for "something changed, re-derive state"
//! - **Value form**: [`ValueCoordinator`] for "here is the latest value, converge to it"
//! - **Awaitable**: [`Settled`] futures resolve when the coordinator next goes idle
//! - **Pure State Machine**: Uses resync-core for side-effect-free logic
//! - **Retry collaborator**: [`Retrying`] wraps an operation in backoff
//!
//! ## Example
//!
//! ```ignore
//! use resync_client::Invalidator;
//!
//! let outbox = Invalidator::from_fn(|| async { push_local_changes().await })?;
//!
//! // Every local edit triggers a push; bursts share one follow-up run
//! outbox.invalidate();
//! outbox.invalidate();
//!
//! // Wait until everything so far has been pushed
//! outbox.await_queue().await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod awaiter;
pub mod config;
pub mod error;
mod executor;
pub mod invalidate;
pub mod operation;
pub mod retry;
pub mod value;

pub use awaiter::Settled;
pub use config::{ConfigError, ResyncConfig, RetryConfig};
pub use error::ResyncError;
pub use invalidate::Invalidator;
pub use operation::{MockOperation, Operation};
pub use retry::{RetryPolicy, Retrying};
pub use value::ValueCoordinator;

pub use resync_core::{Backoff, RunId, Stats, SyncPhase};
