//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Registration (actions.rs, manager.rs):
//!     pre/post push → ActionStack (LIFO) → rejected once the gate has fired
//!
//! Serve (manager.rs):
//!     spawn service.serve() ─┐
//!     spawn signal watcher ──┴→ ShutdownGate (gate.rs, first trigger wins)
//!     → drain pre stack → service.stop(deadline) → drain post stack
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → trigger graceful shutdown (once)
//! ```
//!
//! # Design Decisions
//! - Exactly one shutdown sequence per manager, however many triggers race
//! - Shutdown has an optional timeout bounding the service stop only
//! - Post-cleanup always runs, even if the stop fails

pub mod actions;
pub mod gate;
pub mod global;
pub mod manager;
pub mod service;
pub mod signals;

pub use actions::{ActionStack, CleanupAction};
pub use gate::{GateState, ShutdownGate};
pub use global::default_manager;
pub use manager::{CleanupError, LifecycleManager};
pub use service::{Deadline, DeadlineExceeded, Service, ServiceError};
pub use signals::{SignalWatcher, TerminationSignal};
