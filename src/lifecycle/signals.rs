//! OS signal handling.
//!
//! # Responsibilities
//! - Register SIGINT/SIGTERM handlers (Ctrl+C on non-unix)
//! - Turn the first delivery into a graceful shutdown request
//! - Log and ignore repeated deliveries
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - Never exits the process; only triggers the shutdown gate

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::lifecycle::gate::ShutdownGate;
use crate::observability::metrics;

/// Termination requests the watcher reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationSignal {
    /// SIGINT / Ctrl+C.
    Interrupt,
    /// SIGTERM.
    Terminate,
}

impl fmt::Display for TerminationSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminationSignal::Interrupt => write!(f, "SIGINT"),
            TerminationSignal::Terminate => write!(f, "SIGTERM"),
        }
    }
}

/// Watches for termination signals and triggers the shutdown gate once.
#[derive(Debug, Clone)]
pub struct SignalWatcher {
    gate: ShutdownGate,
    interrupted: Arc<AtomicBool>,
}

impl SignalWatcher {
    /// `interrupted` is shared with the owner so it survives across watchers.
    pub fn new(gate: ShutdownGate, interrupted: Arc<AtomicBool>) -> Self {
        Self { gate, interrupted }
    }

    /// Handle one signal delivery.
    ///
    /// Returns `true` if this delivery triggered the gate.
    pub fn on_signal(&self, signal: TerminationSignal) -> bool {
        tracing::info!(signal = %signal, "Termination signal received");

        if self.interrupted.swap(true, Ordering::AcqRel) {
            tracing::debug!(signal = %signal, "Already interrupted, ignoring");
            return false;
        }
        if self.gate.is_triggered() {
            tracing::debug!(signal = %signal, "Shutdown already in progress, ignoring");
            return false;
        }

        let won = self.gate.trigger();
        if won {
            metrics::record_trigger("signal");
        }
        won
    }

    /// Install OS handlers and spawn the watch loop.
    ///
    /// Handlers are installed before this returns, so no delivery between
    /// the call and the first poll of the task is lost.
    pub fn start(self) -> std::io::Result<JoinHandle<()>> {
        let mut signals = OsSignals::install()?;
        Ok(tokio::spawn(async move {
            while let Some(signal) = signals.recv().await {
                self.on_signal(signal);
            }
            tracing::debug!("Signal stream closed");
        }))
    }
}

#[cfg(unix)]
struct OsSignals {
    interrupt: tokio::signal::unix::Signal,
    terminate: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl OsSignals {
    fn install() -> std::io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};
        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    async fn recv(&mut self) -> Option<TerminationSignal> {
        tokio::select! {
            s = self.interrupt.recv() => s.map(|_| TerminationSignal::Interrupt),
            s = self.terminate.recv() => s.map(|_| TerminationSignal::Terminate),
        }
    }
}

#[cfg(not(unix))]
struct OsSignals;

#[cfg(not(unix))]
impl OsSignals {
    fn install() -> std::io::Result<Self> {
        Ok(Self)
    }

    async fn recv(&mut self) -> Option<TerminationSignal> {
        tokio::signal::ctrl_c()
            .await
            .ok()
            .map(|_| TerminationSignal::Interrupt)
    }
}
