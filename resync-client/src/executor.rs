//! Run executor shared by both coordinator forms.
//!
//! # Architecture
//!
//! The executor owns one [`Coordination`] state machine (from resync-core)
//! and interprets the actions it returns:
//!
//! ```text
//! caller → Executor::request → Coordination (pure) → StartRun → driver task
//!                                    ↑                               ↓
//!                                    └──────── RunFinished ──────────┘
//! ```
//!
//! All transitions happen under one mutex, which is never held across an
//! `.await`. A single driver task executes runs back-to-back while the state
//! machine keeps returning `StartRun`, then resolves the awaiters and exits.
//! Each run executes in its own task so a panicking operation is observed as
//! a failed run instead of wedging the coordinator.

use crate::awaiter::{AwaiterRegistry, Settled, Settlement, Ticket};
use crate::error::ResyncError;
use crate::operation::Operation;
use resync_core::{Action, Coordination, Event, RunId, Stats, SyncPhase};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::runtime::Handle;

/// State guarded by the executor lock.
struct Inner<T> {
    machine: Coordination<T>,
    awaiters: AwaiterRegistry,
}

/// What to do once the lock is released.
struct Step<T> {
    start: Option<(RunId, T)>,
    settlements: Vec<Settlement>,
}

pub(crate) struct Executor<T> {
    name: String,
    operation: Arc<dyn Operation<T>>,
    handle: Handle,
    inner: Mutex<Inner<T>>,
}

impl<T: Send + 'static> Executor<T> {
    pub(crate) fn new(name: String, handle: Handle, operation: Arc<dyn Operation<T>>) -> Arc<Self> {
        Arc::new(Self {
            name,
            operation,
            handle,
            inner: Mutex::new(Inner {
                machine: Coordination::new(),
                awaiters: AwaiterRegistry::default(),
            }),
        })
    }

    /// Submit a request; returns the run that will serve it, if accepted.
    pub(crate) fn request(self: &Arc<Self>, payload: T) -> Option<RunId> {
        let (serving, step) = {
            let mut inner = self.lock();
            let actions = inner.machine.on_event(Event::Requested(payload));
            let serving = actions.iter().find_map(Action::serving_run);
            (serving, self.interpret(&mut inner, actions))
        };
        self.apply(step);
        serving
    }

    /// Submit a request and wait for the cycle that serves it to settle.
    pub(crate) fn request_and_await(self: &Arc<Self>, payload: T) -> Settled {
        let (settled, step) = {
            let mut inner = self.lock();
            let actions = inner.machine.on_event(Event::Requested(payload));
            let settled = match actions.iter().find_map(Action::serving_run) {
                Some(run) => inner.awaiters.register(Ticket::Run(run)),
                // Stopped: nothing left to wait for once idle
                None if inner.machine.is_idle() => Settled::ready(Err(ResyncError::Stopped)),
                None => inner.awaiters.register(Ticket::Rejected),
            };
            (settled, self.interpret(&mut inner, actions))
        };
        self.apply(step);
        settled
    }

    /// Wait for the next return to Idle without requesting anything.
    pub(crate) fn await_queue(&self) -> Settled {
        let mut inner = self.lock();
        if inner.machine.is_idle() {
            Settled::ready(Ok(()))
        } else {
            inner.awaiters.register(Ticket::Queue)
        }
    }

    /// Latch the stop flag; the in-flight run, if any, finishes normally.
    pub(crate) fn stop(self: &Arc<Self>) {
        let step = {
            let mut inner = self.lock();
            if inner.machine.is_stopped() {
                return;
            }
            let actions = inner.machine.on_event(Event::StopRequested);
            tracing::info!(
                "{}: stopped ({:?}, {} awaiter(s) pending)",
                self.name,
                inner.machine.phase(),
                inner.awaiters.len()
            );
            self.interpret(&mut inner, actions)
        };
        self.apply(step);
    }

    pub(crate) fn phase(&self) -> SyncPhase {
        self.lock().machine.phase()
    }

    pub(crate) fn is_stopped(&self) -> bool {
        self.lock().machine.is_stopped()
    }

    pub(crate) fn stats(&self) -> Stats {
        self.lock().machine.stats()
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    /// Translate state machine actions into work for after the lock.
    fn interpret(&self, inner: &mut Inner<T>, actions: Vec<Action<T>>) -> Step<T> {
        let mut step = Step {
            start: None,
            settlements: Vec::new(),
        };

        for action in actions {
            match action {
                Action::StartRun { run, payload } => {
                    tracing::debug!("{}: starting run {}", self.name, run);
                    step.start = Some((run, payload));
                }
                Action::Coalesced { run } => {
                    tracing::trace!("{}: request coalesced into run {}", self.name, run);
                }
                Action::Ignored => {
                    tracing::debug!("{}: request ignored, coordinator stopped", self.name);
                }
                Action::DropPending { run } => {
                    tracing::info!("{}: dropped pending run {} on stop", self.name, run);
                    inner.awaiters.record_dropped(run);
                }
                Action::Settle => {
                    step.settlements = inner.awaiters.take_settlements();
                    tracing::debug!(
                        "{}: idle, resolving {} awaiter(s)",
                        self.name,
                        step.settlements.len()
                    );
                }
            }
        }

        step
    }

    /// Deliver settlements and hand a newly started run to a driver task.
    fn apply(self: &Arc<Self>, step: Step<T>) {
        for settlement in step.settlements {
            settlement.deliver();
        }
        if let Some((run, payload)) = step.start {
            let executor = Arc::clone(self);
            self.handle.spawn(executor.drive(run, payload));
        }
    }

    /// Execute runs until the state machine stops asking for more.
    async fn drive(self: Arc<Self>, mut run: RunId, mut payload: T) {
        loop {
            let outcome = self.execute(run, payload).await;

            let step = {
                let mut inner = self.lock();
                let failed = outcome.is_err();
                if let Err(message) = outcome {
                    inner.awaiters.record_failure(run, message);
                }
                let actions = inner.machine.on_event(Event::RunFinished { run, failed });
                self.interpret(&mut inner, actions)
            };

            for settlement in step.settlements {
                settlement.deliver();
            }
            match step.start {
                Some((next, next_payload)) => {
                    run = next;
                    payload = next_payload;
                }
                None => break,
            }
        }
    }

    /// Run the operation once, flattening any failure to a message.
    async fn execute(&self, run: RunId, payload: T) -> Result<(), String> {
        let operation = Arc::clone(&self.operation);
        let task = self
            .handle
            .spawn(async move { operation.run(payload).await });

        match task.await {
            Ok(Ok(())) => {
                tracing::debug!("{}: run {} finished", self.name, run);
                Ok(())
            }
            Ok(Err(e)) => {
                tracing::warn!("{}: run {} failed: {:#}", self.name, run, e);
                Err(format!("{:#}", e))
            }
            Err(e) => {
                let message = if e.is_panic() {
                    "operation panicked".to_string()
                } else {
                    e.to_string()
                };
                tracing::error!("{}: run {} aborted: {}", self.name, run, message);
                Err(message)
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::MockOperation;

    fn executor(mock: &MockOperation<u32>) -> Arc<Executor<u32>> {
        Executor::new("test".to_string(), Handle::current(), Arc::new(mock.clone()))
    }

    #[tokio::test]
    async fn request_on_idle_starts_one_run() {
        let mock = MockOperation::new();
        let executor = executor(&mock);

        assert_eq!(executor.request(1), Some(RunId::new(1)));
        executor.await_queue().await.unwrap();

        assert_eq!(mock.payloads(), vec![1]);
        assert_eq!(executor.phase(), SyncPhase::Idle);
    }

    #[tokio::test]
    async fn requests_during_run_share_one_follow_up() {
        let mock = MockOperation::held();
        let executor = executor(&mock);

        executor.request(1);
        mock.wait_for_started(1).await;
        assert_eq!(executor.request(2), Some(RunId::new(2)));
        assert_eq!(executor.request(3), Some(RunId::new(2)));
        assert_eq!(executor.phase(), SyncPhase::RunningWithPending);

        mock.release_all();
        executor.await_queue().await.unwrap();

        assert_eq!(mock.payloads(), vec![1, 3]);
        assert_eq!(executor.stats().coalesced, 2);
    }

    #[tokio::test]
    async fn await_queue_on_idle_is_ready() {
        let mock = MockOperation::new();
        let executor = executor(&mock);

        let settled = executor.await_queue();
        assert!(settled.is_ready());
        settled.await.unwrap();
        assert_eq!(mock.run_count(), 0);
    }

    #[tokio::test]
    async fn failed_run_reaches_its_awaiter() {
        let mock = MockOperation::new();
        mock.fail_next("disk full");
        let executor = executor(&mock);

        let err = executor.request_and_await(1).await.unwrap_err();
        assert_eq!(
            err,
            ResyncError::RunFailed {
                run: RunId::new(1),
                message: "disk full".to_string()
            }
        );

        // The coordinator is not wedged
        executor.request_and_await(2).await.unwrap();
        assert_eq!(mock.payloads(), vec![1, 2]);
    }

    #[tokio::test]
    async fn panicking_run_counts_as_failure() {
        let mock = MockOperation::new();
        mock.panic_next();
        let executor = executor(&mock);

        let err = executor.request_and_await(1).await.unwrap_err();
        assert!(matches!(err, ResyncError::RunFailed { .. }));
        assert!(err.to_string().contains("panicked"));
        assert_eq!(executor.phase(), SyncPhase::Idle);
        assert_eq!(executor.stats().runs_failed, 1);
    }

    #[tokio::test]
    async fn stop_twice_is_noop() {
        let mock = MockOperation::new();
        let executor = executor(&mock);

        executor.stop();
        executor.stop();
        assert!(executor.is_stopped());
        assert_eq!(executor.request(1), None);
        assert_eq!(
            executor.request_and_await(2).await,
            Err(ResyncError::Stopped)
        );
        assert_eq!(mock.run_count(), 0);
    }
}
