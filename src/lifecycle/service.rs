//! Contract for a service that can be run under a [`LifecycleManager`].
//!
//! # Responsibilities
//! - `serve`: block until the service stops, reporting why
//! - `stop`: finish in-flight work and release listeners before a deadline
//!
//! [`LifecycleManager`]: crate::lifecycle::LifecycleManager

use std::future::Future;
use std::time::Duration;
use async_trait::async_trait;
use thiserror::Error;
use tokio::time::Instant;

/// Errors reported by a managed service.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The service was stopped deliberately. Not a failure.
    #[error("service closed")]
    Closed,

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// In-flight work was still running when the stop deadline passed.
    #[error("stop did not finish before the deadline")]
    StopTimeout,

    #[error("{0}")]
    Other(String),
}

impl ServiceError {
    /// Whether this is the deliberate-stop outcome rather than a failure.
    pub fn is_closed(&self) -> bool {
        matches!(self, ServiceError::Closed)
    }
}

/// A long-running service with a blocking serve loop and a bounded stop.
#[async_trait]
pub trait Service: Send + Sync + 'static {
    /// Run until the service stops.
    ///
    /// Returns `Err(ServiceError::Closed)` after a deliberate [`Service::stop`].
    async fn serve(&self) -> Result<(), ServiceError>;

    /// Stop accepting work and wait for in-flight work, honouring `deadline`.
    async fn stop(&self, deadline: Deadline) -> Result<(), ServiceError>;
}

/// Returned when a future did not complete before its [`Deadline`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("deadline exceeded")]
pub struct DeadlineExceeded;

/// Optional point in time by which a stop must finish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    at: Option<Instant>,
}

impl Deadline {
    /// Deadline `timeout` from now.
    ///
    /// A timeout too large for the clock to represent is unbounded.
    pub fn after(timeout: Duration) -> Self {
        Self {
            at: Instant::now().checked_add(timeout),
        }
    }

    /// A deadline that never expires.
    pub fn unbounded() -> Self {
        Self { at: None }
    }

    /// `after(timeout)` for a positive timeout, unbounded for zero.
    pub fn from_timeout(timeout: Duration) -> Self {
        if timeout.is_zero() {
            Self::unbounded()
        } else {
            Self::after(timeout)
        }
    }

    pub fn is_bounded(&self) -> bool {
        self.at.is_some()
    }

    pub fn instant(&self) -> Option<Instant> {
        self.at
    }

    /// Time left before expiry. `None` when unbounded.
    pub fn remaining(&self) -> Option<Duration> {
        self.at.map(|at| at.saturating_duration_since(Instant::now()))
    }

    /// Drive `fut` to completion unless the deadline passes first.
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output, DeadlineExceeded> {
        match self.at {
            Some(at) => tokio::time::timeout_at(at, fut)
                .await
                .map_err(|_| DeadlineExceeded),
            None => Ok(fut.await),
        }
    }
}
