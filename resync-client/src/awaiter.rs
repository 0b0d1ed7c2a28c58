//! Awaiter registry.
//!
//! Callers waiting for a coordinator to settle register here. Every waiter
//! registered before a return to Idle is resolved together, exactly once,
//! when that transition happens. Resolution is a broadcast: no order among
//! waiters is promised.

use crate::error::ResyncError;
use resync_core::RunId;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

/// What a waiter is waiting for, and therefore which outcome it receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Ticket {
    /// Only waiting for Idle (`await_queue`); always succeeds.
    Queue,
    /// Waiting for the run that serves its request.
    Run(RunId),
    /// Its request was ignored by a stopped coordinator.
    Rejected,
}

type Outcome = Result<(), ResyncError>;

/// Pending waiters plus what happened to the runs of the current cycle.
#[derive(Debug, Default)]
pub(crate) struct AwaiterRegistry {
    waiters: Vec<(Ticket, oneshot::Sender<Outcome>)>,
    failures: HashMap<RunId, String>,
    dropped: Option<RunId>,
}

impl AwaiterRegistry {
    /// Register a waiter to be resolved on the next return to Idle.
    pub(crate) fn register(&mut self, ticket: Ticket) -> Settled {
        let (tx, rx) = oneshot::channel();
        self.waiters.push((ticket, tx));
        Settled::waiting(rx)
    }

    /// Remember that `run` failed, for the waiters it serves.
    pub(crate) fn record_failure(&mut self, run: RunId, message: String) {
        self.failures.insert(run, message);
    }

    /// Remember that `run` was dropped by a stop before it started.
    pub(crate) fn record_dropped(&mut self, run: RunId) {
        self.dropped = Some(run);
    }

    /// Number of waiters not yet resolved.
    pub(crate) fn len(&self) -> usize {
        self.waiters.len()
    }

    /// Drain every waiter with its outcome and forget the finished cycle.
    ///
    /// Delivery happens outside the coordinator lock, via [`Settlement::deliver`].
    pub(crate) fn take_settlements(&mut self) -> Vec<Settlement> {
        let failures = std::mem::take(&mut self.failures);
        let dropped = self.dropped.take();

        self.waiters
            .drain(..)
            .map(|(ticket, tx)| {
                let outcome = match ticket {
                    Ticket::Queue => Ok(()),
                    Ticket::Rejected => Err(ResyncError::Stopped),
                    Ticket::Run(run) if dropped == Some(run) => Err(ResyncError::Stopped),
                    Ticket::Run(run) => match failures.get(&run) {
                        Some(message) => Err(ResyncError::RunFailed {
                            run,
                            message: message.clone(),
                        }),
                        None => Ok(()),
                    },
                };
                Settlement { tx, outcome }
            })
            .collect()
    }
}

/// A resolved waiter, ready to be told its outcome.
#[derive(Debug)]
pub(crate) struct Settlement {
    tx: oneshot::Sender<Outcome>,
    outcome: Outcome,
}

impl Settlement {
    pub(crate) fn deliver(self) {
        // The caller may have dropped its Settled; that is fine
        let _ = self.tx.send(self.outcome);
    }
}

/// Future returned by the awaiting operations of a coordinator.
///
/// The waiter is registered when this value is created, not when it is first
/// polled, so it cannot miss the transition it was created for. Dropping it
/// does not cancel the request that produced it.
#[derive(Debug)]
pub struct Settled {
    inner: SettledInner,
}

#[derive(Debug)]
enum SettledInner {
    Ready(Option<Outcome>),
    Waiting(oneshot::Receiver<Outcome>),
}

impl Settled {
    pub(crate) fn ready(outcome: Outcome) -> Self {
        Self {
            inner: SettledInner::Ready(Some(outcome)),
        }
    }

    pub(crate) fn waiting(rx: oneshot::Receiver<Outcome>) -> Self {
        Self {
            inner: SettledInner::Waiting(rx),
        }
    }

    /// Check if the outcome is already known without polling.
    pub fn is_ready(&self) -> bool {
        matches!(self.inner, SettledInner::Ready(_))
    }
}

impl Future for Settled {
    type Output = Result<(), ResyncError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.get_mut().inner {
            SettledInner::Ready(outcome) => Poll::Ready(outcome.take().unwrap_or(Ok(()))),
            SettledInner::Waiting(rx) => Pin::new(rx)
                .poll(cx)
                .map(|received| received.unwrap_or(Err(ResyncError::Abandoned))),
        }
    }
}
