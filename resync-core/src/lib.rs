//! # resync-core
//!
//! Pure coordination logic for resync (no I/O, instant tests).
//!
//! This crate implements the single-flight, coalescing state machine that
//! sits behind every resync coordinator, without any runtime, locking or
//! task spawning.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce output
//! without side effects. This enables:
//! - Instant unit tests (no mocks, no async)
//! - Deterministic behavior (same input → same output)
//! - Easy reasoning about state transitions
//!
//! The actual execution (spawning runs, resolving awaiters) is performed by
//! `resync-client`, which interprets the actions produced by these state
//! machines.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backoff;
pub mod ids;
pub mod state;
pub mod stats;

pub use backoff::Backoff;
pub use ids::RunId;
pub use state::{Action, Coordination, Event, SyncPhase, SyncState};
pub use stats::Stats;
