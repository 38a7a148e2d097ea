//! Graceful lifecycle management for long-running network services.
//!
//! # Architecture Overview
//!
//! ```text
//!        pre_cleanup_push / post_cleanup_push          SIGINT / SIGTERM
//!                      │                                      │
//!                      ▼                                      ▼
//!   ┌────────────────────────────────┐            ┌──────────────────┐
//!   │       LifecycleManager         │            │  SignalWatcher   │
//!   │  ┌───────────┐ ┌────────────┐  │  trigger   │                  │
//!   │  │ pre stack │ │ post stack │  │◀───────────┤                  │
//!   │  └───────────┘ └────────────┘  │            └──────────────────┘
//!   │        ┌────────────────┐      │  trigger   ┌──────────────────┐
//!   │        │  ShutdownGate  │◀─────┼────────────┤ Service::serve() │
//!   │        └────────────────┘      │  (on exit) └──────────────────┘
//!   └────────────────────────────────┘
//!      serve(): wait gate → drain pre → Service::stop(deadline) → drain post
//! ```
//!
//! [`lifecycle::LifecycleManager`] is the primary API. A process-wide default
//! instance is reachable through the free functions in [`lifecycle::global`].

// Core
pub mod lifecycle;

// Managed HTTP service
pub mod http;

// Cross-cutting concerns
pub mod config;
pub mod observability;

pub use config::ServeConfig;
pub use http::HttpService;
pub use lifecycle::{
    CleanupAction, CleanupError, Deadline, LifecycleManager, Service, ServiceError,
    ShutdownGate,
};
