//! Coordination state machine for resync.
//!
//! This module provides a pure, side-effect-free state machine that decides
//! when an expensive resync run may start. It takes events as input and
//! produces a list of actions to execute.
//!
//! Two invariants hold for every sequence of events:
//! - **single-flight**: at most one run is started and not yet finished
//! - **bounded coalescing**: any number of requests arriving while a run is in
//!   flight produce at most one follow-up run
//!
//! Spawning runs and resolving awaiters is performed by resync-client, not by
//! this module.

use crate::ids::RunId;
use crate::stats::Stats;
use serde::{Deserialize, Serialize};

/// Where a coordinator is in its run cycle.
///
/// The payload of a coalesced request lives inside `RunningWithPending`, so a
/// buffered value exists exactly when a follow-up run is owed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncState<T> {
    /// No run in flight, nothing owed.
    Idle,
    /// A run is in flight.
    Running {
        /// The run currently executing.
        run: RunId,
    },
    /// A run is in flight and at least one request arrived after it started.
    RunningWithPending {
        /// The run currently executing.
        run: RunId,
        /// Latest payload submitted since `run` started.
        pending: T,
    },
}

impl<T> SyncState<T> {
    /// The payload-free phase of this state.
    pub fn phase(&self) -> SyncPhase {
        match self {
            Self::Idle => SyncPhase::Idle,
            Self::Running { .. } => SyncPhase::Running,
            Self::RunningWithPending { .. } => SyncPhase::RunningWithPending,
        }
    }

    /// The run in flight, if any.
    pub fn current_run(&self) -> Option<RunId> {
        match self {
            Self::Idle => None,
            Self::Running { run } | Self::RunningWithPending { run, .. } => Some(*run),
        }
    }
}

impl<T> Default for SyncState<T> {
    fn default() -> Self {
        Self::Idle
    }
}

/// Payload-free mirror of [`SyncState`], for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SyncPhase {
    /// No run in flight.
    Idle,
    /// One run in flight, nothing owed.
    Running,
    /// One run in flight, one follow-up owed.
    RunningWithPending,
}

/// Events that drive the coordination state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event<T> {
    /// A caller asked for a run with the given payload.
    Requested(T),
    /// The executor reports that a run settled.
    RunFinished {
        /// The run that settled.
        run: RunId,
        /// Whether the run's operation failed.
        failed: bool,
    },
    /// The owner stopped the coordinator.
    StopRequested,
}

/// Actions to be executed by resync-client.
///
/// These are instructions, not side effects. The client interprets these and
/// spawns runs or resolves awaiters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action<T> {
    /// Start a run now with this payload.
    StartRun {
        /// Id assigned to the new run.
        run: RunId,
        /// Payload the run must receive.
        payload: T,
    },
    /// The request was folded into the follow-up run `run`.
    Coalesced {
        /// The upcoming run that will serve the request.
        run: RunId,
    },
    /// The request was ignored because the coordinator is stopped.
    Ignored,
    /// A stop discarded the follow-up run `run` before it started.
    DropPending {
        /// The run that will never start.
        run: RunId,
    },
    /// The coordinator returned to Idle; resolve all awaiters.
    Settle,
}

impl<T> Action<T> {
    /// The run that serves a request, if the request was accepted.
    pub fn serving_run(&self) -> Option<RunId> {
        match self {
            Self::StartRun { run, .. } | Self::Coalesced { run } => Some(*run),
            _ => None,
        }
    }
}

/// Coordination state machine - NO I/O, just state transitions.
///
/// Owns the [`SyncState`], the stop latch and the run counter of one
/// coordinator. Once stopped, no further run is ever started.
#[derive(Debug, Clone)]
pub struct Coordination<T> {
    state: SyncState<T>,
    stopped: bool,
    last_run: RunId,
    stats: Stats,
}

impl<T> Coordination<T> {
    /// Create a new state machine in the Idle state.
    pub fn new() -> Self {
        Self {
            state: SyncState::Idle,
            stopped: false,
            last_run: RunId::zero(),
            stats: Stats::default(),
        }
    }

    /// Process an event and return the actions to execute.
    ///
    /// This is a pure function of the current state and the event - no side
    /// effects. The caller is responsible for executing the returned actions.
    pub fn on_event(&mut self, event: Event<T>) -> Vec<Action<T>> {
        let state = std::mem::take(&mut self.state);

        let (next, actions) = match (state, event) {
            // Requests
            (state, Event::Requested(_)) if self.stopped => {
                self.stats.requests += 1;
                self.stats.ignored += 1;
                (state, vec![Action::Ignored])
            }
            (SyncState::Idle, Event::Requested(payload)) => {
                self.stats.requests += 1;
                let run = self.begin_run();
                (
                    SyncState::Running { run },
                    vec![Action::StartRun { run, payload }],
                )
            }
            (SyncState::Running { run }, Event::Requested(payload))
            | (SyncState::RunningWithPending { run, .. }, Event::Requested(payload)) => {
                self.stats.requests += 1;
                self.stats.coalesced += 1;
                (
                    SyncState::RunningWithPending {
                        run,
                        pending: payload,
                    },
                    vec![Action::Coalesced { run: run.next() }],
                )
            }

            // Completions
            (SyncState::Running { run }, Event::RunFinished { run: finished, failed })
                if run == finished =>
            {
                self.finish_run(failed);
                (SyncState::Idle, vec![Action::Settle])
            }
            (
                SyncState::RunningWithPending { run, pending },
                Event::RunFinished { run: finished, failed },
            ) if run == finished => {
                self.finish_run(failed);
                let next = self.begin_run();
                (
                    SyncState::Running { run: next },
                    vec![Action::StartRun {
                        run: next,
                        payload: pending,
                    }],
                )
            }

            // Stop
            (SyncState::RunningWithPending { run, .. }, Event::StopRequested) => {
                self.stopped = true;
                self.stats.dropped += 1;
                (
                    SyncState::Running { run },
                    vec![Action::DropPending { run: run.next() }],
                )
            }
            (state, Event::StopRequested) => {
                self.stopped = true;
                (state, vec![])
            }

            // Stale completions - stay in current state
            (state, Event::RunFinished { .. }) => (state, vec![]),
        };

        self.state = next;
        actions
    }

    /// Current state.
    pub fn state(&self) -> &SyncState<T> {
        &self.state
    }

    /// Current phase.
    pub fn phase(&self) -> SyncPhase {
        self.state.phase()
    }

    /// Check if no run is in flight.
    pub fn is_idle(&self) -> bool {
        matches!(self.state, SyncState::Idle)
    }

    /// Check if the stop latch is set.
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Id of the most recently started run (`RunId::zero()` if none).
    pub fn last_run(&self) -> RunId {
        self.last_run
    }

    /// Snapshot of the counters.
    pub fn stats(&self) -> Stats {
        self.stats
    }

    fn begin_run(&mut self) -> RunId {
        self.last_run = self.last_run.next();
        self.stats.runs_started += 1;
        self.last_run
    }

    fn finish_run(&mut self, failed: bool) {
        self.stats.runs_completed += 1;
        if failed {
            self.stats.runs_failed += 1;
        }
    }
}

impl<T> Default for Coordination<T> {
    fn default() -> Self {
        Self::new()
    }
}
