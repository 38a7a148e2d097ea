//! One-shot shutdown latch.
//!
//! # States
//! ```text
//! Open → Closing: first successful trigger() (compare-and-swap)
//! Closing → Closed: mark_closed(), once the shutdown sequence has finished
//! ```
//!
//! # Design Decisions
//! - Only Open → Closing is contended, so only that edge is a CAS
//! - The wake signal is a cancellation token, cancelled by the CAS winner only

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const OPEN: u8 = 0;
const CLOSING: u8 = 1;
const CLOSED: u8 = 2;

/// Observable state of a [`ShutdownGate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    /// Running; no shutdown requested yet.
    Open,
    /// Shutdown requested and in progress.
    Closing,
    /// Shutdown sequence finished.
    Closed,
}

/// Fires exactly once, from whichever trigger gets there first.
///
/// Cloning yields another handle to the same latch.
#[derive(Debug, Clone, Default)]
pub struct ShutdownGate {
    state: Arc<AtomicU8>,
    wake: CancellationToken,
}

impl ShutdownGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown.
    ///
    /// Returns `true` for the single caller that moved the gate out of `Open`.
    /// Every other caller gets `false` and has no effect.
    pub fn trigger(&self) -> bool {
        let won = self
            .state
            .compare_exchange(OPEN, CLOSING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if won {
            self.wake.cancel();
        }
        won
    }

    /// Whether shutdown has been requested. Never blocks.
    pub fn is_triggered(&self) -> bool {
        self.state.load(Ordering::Acquire) != OPEN
    }

    /// Resolve once the gate has been triggered.
    pub async fn wait(&self) {
        self.wake.cancelled().await;
    }

    /// Record that the shutdown sequence has completed.
    pub fn mark_closed(&self) {
        self.state.store(CLOSED, Ordering::Release);
    }

    pub fn state(&self) -> GateState {
        match self.state.load(Ordering::Acquire) {
            OPEN => GateState::Open,
            CLOSING => GateState::Closing,
            _ => GateState::Closed,
        }
    }
}
