//! Shutdown orchestration.
//!
//! # Data Flow
//! ```text
//! serve(timeout):
//!     RUNNING            service task + signal watcher task spawned
//!     SHUTDOWN_REQUESTED first trigger wins the gate (service exit or signal)
//!     PRE_CLEANUP        pre stack drained, LIFO, on the calling task
//!     STOPPING           service.stop(deadline), bounded by timeout (0 = none)
//!     POST_CLEANUP       post stack drained, LIFO, from a drop guard
//!     DONE               gate marked closed, watcher aborted
//! ```
//!
//! # Design Decisions
//! - Sub-step failures are logged, never returned: shutdown always moves forward
//! - Post-cleanup lives in a drop guard so a failing or panicking stop cannot skip it
//! - Push/pop are rejected once the gate has fired

use std::fmt;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio_util::task::AbortOnDropHandle;

use crate::lifecycle::actions::{ActionStack, CleanupAction};
use crate::lifecycle::gate::{GateState, ShutdownGate};
use crate::lifecycle::service::{Deadline, Service};
use crate::lifecycle::signals::SignalWatcher;
use crate::observability::metrics;

/// Error returned by push/pop once shutdown has been triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CleanupError {
    #[error("shutdown already triggered")]
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Pre,
    Post,
}

impl Phase {
    fn as_str(self) -> &'static str {
        match self {
            Phase::Pre => "pre",
            Phase::Post => "post",
        }
    }
}

/// Runs a service and cleans up around its shutdown.
///
/// Actions pushed with `pre_cleanup_push` run before the service is stopped,
/// actions pushed with `post_cleanup_push` run after. Each set runs in reverse
/// push order.
pub struct LifecycleManager {
    service: Mutex<Option<Arc<dyn Service>>>,
    pre_routines: ActionStack,
    post_routines: ActionStack,
    gate: ShutdownGate,
    interrupted: Arc<AtomicBool>,
}

impl LifecycleManager {
    /// Create a manager with no service attached.
    pub fn new() -> Self {
        Self {
            service: Mutex::new(None),
            pre_routines: ActionStack::new(),
            post_routines: ActionStack::new(),
            gate: ShutdownGate::new(),
            interrupted: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_service(service: Arc<dyn Service>) -> Self {
        let manager = Self::new();
        manager.set_service(service);
        manager
    }

    /// Replace the service that `serve` will run.
    pub fn set_service(&self, service: Arc<dyn Service>) {
        *self.service.lock().unwrap_or_else(PoisonError::into_inner) = Some(service);
    }

    fn service(&self) -> Option<Arc<dyn Service>> {
        self.service
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Push `routine` to run with `arg` before the service is stopped.
    pub fn pre_cleanup_push<A, F>(&self, routine: F, arg: A) -> Result<(), CleanupError>
    where
        A: Send + 'static,
        F: FnOnce(A) + Send + 'static,
    {
        self.cleanup_push(Phase::Pre, CleanupAction::new(routine, arg))
    }

    /// Remove the most recently pushed pre-shutdown action without running it.
    pub fn pre_cleanup_pop(&self) -> Result<Option<CleanupAction>, CleanupError> {
        self.cleanup_pop(Phase::Pre)
    }

    /// Push `routine` to run with `arg` after the service is stopped.
    pub fn post_cleanup_push<A, F>(&self, routine: F, arg: A) -> Result<(), CleanupError>
    where
        A: Send + 'static,
        F: FnOnce(A) + Send + 'static,
    {
        self.cleanup_push(Phase::Post, CleanupAction::new(routine, arg))
    }

    /// Remove the most recently pushed post-shutdown action without running it.
    pub fn post_cleanup_pop(&self) -> Result<Option<CleanupAction>, CleanupError> {
        self.cleanup_pop(Phase::Post)
    }

    pub fn pre_cleanup_len(&self) -> usize {
        self.pre_routines.len()
    }

    pub fn post_cleanup_len(&self) -> usize {
        self.post_routines.len()
    }

    /// Request shutdown programmatically, as a signal would.
    ///
    /// Returns `true` if this call triggered the shutdown.
    pub fn request_shutdown(&self) -> bool {
        let won = self.gate.trigger();
        if won {
            metrics::record_trigger("manual");
            tracing::info!("Shutdown requested programmatically");
        }
        won
    }

    pub fn is_shutting_down(&self) -> bool {
        self.gate.is_triggered()
    }

    pub fn gate_state(&self) -> GateState {
        self.gate.state()
    }

    fn stack(&self, phase: Phase) -> &ActionStack {
        match phase {
            Phase::Pre => &self.pre_routines,
            Phase::Post => &self.post_routines,
        }
    }

    // The gate is checked under the stack lock: an accepted push always
    // precedes the end of that stack's drain.
    fn cleanup_push(&self, phase: Phase, action: CleanupAction) -> Result<(), CleanupError> {
        self.stack(phase)
            .push_unless(action, || self.gate.is_triggered())
            .map_err(|rejected| {
                tracing::warn!(
                    phase = phase.as_str(),
                    arg_type = rejected.argument_type(),
                    "Push rejected: shutdown already triggered"
                );
                CleanupError::Closed
            })
    }

    fn cleanup_pop(&self, phase: Phase) -> Result<Option<CleanupAction>, CleanupError> {
        self.stack(phase)
            .pop_unless(|| self.gate.is_triggered())
            .map_err(|()| {
                tracing::warn!(phase = phase.as_str(), "Pop rejected: shutdown already triggered");
                CleanupError::Closed
            })
    }

    fn cleanup(&self, phase: Phase) {
        tracing::debug!(phase = phase.as_str(), "Running cleanup actions");
        let ran = self.stack(phase).drain();
        metrics::record_cleanup(phase.as_str(), ran);
        tracing::info!(phase = phase.as_str(), actions = ran, "Cleanup finished");
    }

    /// Run the service until shutdown is requested, then clean up and stop it.
    ///
    /// A positive `timeout` bounds the stop; zero waits for it indefinitely.
    /// Failures along the way are logged and do not interrupt the sequence.
    pub async fn serve(&self, timeout: Duration) {
        let Some(service) = self.service() else {
            tracing::error!("Serve called without a service");
            return;
        };
        if self.gate.is_triggered() {
            tracing::warn!(state = ?self.gate.state(), "Already shut down, not serving again");
            return;
        }

        tracing::info!(shutdown_timeout = ?timeout, "Serving");

        // Aborted on drop, so the watcher never outlives this call.
        let watcher = match SignalWatcher::new(self.gate.clone(), self.interrupted.clone()).start() {
            Ok(handle) => Some(AbortOnDropHandle::new(handle)),
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handlers");
                None
            }
        };

        let serving = service.clone();
        let gate = self.gate.clone();
        tokio::spawn(async move {
            match serving.serve().await {
                Ok(()) => tracing::info!("Service exited"),
                Err(e) if e.is_closed() => tracing::debug!("Service closed"),
                Err(e) => tracing::error!(error = %e, "Service failed"),
            }
            if gate.trigger() {
                metrics::record_trigger("service");
                tracing::info!("Service exit requested shutdown");
            }
        });

        self.gate.wait().await;
        let started = Instant::now();
        tracing::info!("Shutdown requested");

        self.cleanup(Phase::Pre);
        let _finish = FinishGuard {
            manager: self,
            watcher,
            started,
        };

        let deadline = Deadline::from_timeout(timeout);
        tracing::debug!(bounded = deadline.is_bounded(), "Stopping service");
        match deadline.run(service.stop(deadline)).await {
            Ok(Ok(())) => tracing::info!("Service stopped"),
            Ok(Err(e)) => {
                metrics::record_stop_failure();
                tracing::error!(error = %e, "Shutdown failed");
            }
            Err(e) => {
                metrics::record_stop_failure();
                tracing::error!(error = %e, shutdown_timeout = ?timeout, "Shutdown failed");
            }
        }
    }
}

impl Default for LifecycleManager {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for LifecycleManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleManager")
            .field("has_service", &self.service().is_some())
            .field("pre_routines", &self.pre_routines.len())
            .field("post_routines", &self.post_routines.len())
            .field("gate", &self.gate.state())
            .finish()
    }
}

/// Post-cleanup and teardown for one `serve` call, run on scope exit.
struct FinishGuard<'a> {
    manager: &'a LifecycleManager,
    watcher: Option<AbortOnDropHandle<()>>,
    started: Instant,
}

impl Drop for FinishGuard<'_> {
    fn drop(&mut self) {
        self.manager.cleanup(Phase::Post);
        drop(self.watcher.take());
        self.manager.gate.mark_closed();
        metrics::record_shutdown_duration(self.started);
        tracing::info!(elapsed = ?self.started.elapsed(), "Shutdown complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::service::ServiceError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Service whose serve loop waits for `stop`.
    #[derive(Default)]
    struct IdleService {
        stopped: tokio_util::sync::CancellationToken,
        stops: AtomicUsize,
    }

    #[async_trait]
    impl Service for IdleService {
        async fn serve(&self) -> Result<(), ServiceError> {
            self.stopped.cancelled().await;
            Err(ServiceError::Closed)
        }

        async fn stop(&self, _deadline: Deadline) -> Result<(), ServiceError> {
            self.stops.fetch_add(1, Ordering::SeqCst);
            self.stopped.cancel();
            Ok(())
        }
    }

    #[test]
    fn push_and_pop_before_shutdown() {
        let manager = LifecycleManager::new();
        manager.pre_cleanup_push(|_: u8| {}, 1u8).unwrap();
        manager.pre_cleanup_push(|_: &str| {}, "two").unwrap();
        manager.post_cleanup_push(|_: u8| {}, 3u8).unwrap();
        assert_eq!(manager.pre_cleanup_len(), 2);
        assert_eq!(manager.post_cleanup_len(), 1);

        let top = manager.pre_cleanup_pop().unwrap().unwrap();
        assert_eq!(top.argument::<&str>(), Some(&"two"));
        assert_eq!(manager.pre_cleanup_len(), 1);
        assert_eq!(manager.post_cleanup_len(), 1);
    }

    #[test]
    fn pop_on_empty_is_ok_none() {
        let manager = LifecycleManager::new();
        assert!(matches!(manager.post_cleanup_pop(), Ok(None)));
    }

    #[test]
    fn push_and_pop_rejected_after_trigger() {
        let manager = LifecycleManager::new();
        manager.post_cleanup_push(|_: u8| {}, 1u8).unwrap();
        assert!(manager.request_shutdown());
        assert!(!manager.request_shutdown());

        assert_eq!(manager.pre_cleanup_push(|_: u8| {}, 2u8), Err(CleanupError::Closed));
        assert_eq!(manager.post_cleanup_pop().unwrap_err(), CleanupError::Closed);
        assert_eq!(manager.pre_cleanup_len(), 0);
        assert_eq!(manager.post_cleanup_len(), 1);
    }

    #[tokio::test]
    async fn serve_without_service_returns() {
        let manager = LifecycleManager::new();
        manager.serve(Duration::from_secs(1)).await;
        assert_eq!(manager.gate_state(), GateState::Open);
    }

    #[tokio::test]
    async fn serve_runs_full_sequence_once() {
        let service = Arc::new(IdleService::default());
        let manager = Arc::new(LifecycleManager::with_service(service.clone()));
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        manager
            .post_cleanup_push(
                move |n: usize| {
                    c.fetch_add(n, Ordering::SeqCst);
                },
                10,
            )
            .unwrap();

        let running = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.serve(Duration::from_secs(5)).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(manager.gate_state(), GateState::Open);

        manager.request_shutdown();
        running.await.unwrap();

        assert_eq!(service.stops.load(Ordering::SeqCst), 1);
        assert_eq!(count.load(Ordering::SeqCst), 10);
        assert_eq!(manager.gate_state(), GateState::Closed);

        // A finished instance does not serve again.
        manager.serve(Duration::from_secs(5)).await;
        assert_eq!(service.stops.load(Ordering::SeqCst), 1);
    }
}
