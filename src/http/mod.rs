//! HTTP service subsystem.
//!
//! # Data Flow
//! ```text
//! LifecycleManager
//!     → server.rs serve(): bind listener → axum::serve (graceful shutdown armed)
//!     → server.rs stop(deadline): cancel → wait for serve to finish
//! ```

pub mod server;

pub use server::{hello_router, HttpService};
