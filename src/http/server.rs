//! HTTP service run under the lifecycle manager.
//!
//! # Responsibilities
//! - Bind the listener when serving starts (bind errors surface from `serve`)
//! - Serve an Axum router until stopped
//! - On stop: stop accepting, let in-flight requests finish, bounded by a deadline
//!
//! # Design Decisions
//! - Draining is Axum's graceful shutdown; this type only signals and waits
//! - Serve progress is published on a watch channel so `stop` can wait for it

use std::net::SocketAddr;
use async_trait::async_trait;
use axum::{routing::get, Router};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::lifecycle::{Deadline, Service, ServiceError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ServeState {
    /// `serve` has not been called.
    Idle,
    /// `serve` entered, listener not bound yet.
    Starting,
    /// Accepting connections on this address.
    Serving(SocketAddr),
    /// `serve` has returned.
    Finished,
}

/// Axum server implementing [`Service`].
pub struct HttpService {
    bind_address: String,
    router: Router,
    shutdown: CancellationToken,
    state: watch::Sender<ServeState>,
}

impl HttpService {
    /// Create a service that will serve `router` on `bind_address`.
    pub fn new(bind_address: impl Into<String>, router: Router) -> Self {
        let (state, _) = watch::channel(ServeState::Idle);
        Self {
            bind_address: bind_address.into(),
            router,
            shutdown: CancellationToken::new(),
            state,
        }
    }

    /// Service answering `GET /` with `Hello world!`.
    pub fn hello(bind_address: impl Into<String>) -> Self {
        Self::new(bind_address, hello_router())
    }

    pub fn bind_address(&self) -> &str {
        &self.bind_address
    }

    /// Address the listener is bound to, while serving.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match *self.state.borrow() {
            ServeState::Serving(addr) => Some(addr),
            _ => None,
        }
    }

    /// Wait until the listener is bound.
    ///
    /// Returns `None` if serving ended without ever binding.
    pub async fn ready(&self) -> Option<SocketAddr> {
        let mut state = self.state.subscribe();
        let reached = state
            .wait_for(|s| matches!(s, ServeState::Serving(_) | ServeState::Finished))
            .await
            .ok()
            .map(|s| *s);
        match reached {
            Some(ServeState::Serving(addr)) => Some(addr),
            _ => None,
        }
    }
}

#[async_trait]
impl Service for HttpService {
    async fn serve(&self) -> Result<(), ServiceError> {
        self.state.send_replace(ServeState::Starting);
        let _finished = MarkFinished(&self.state);

        if self.shutdown.is_cancelled() {
            return Err(ServiceError::Closed);
        }

        let listener = TcpListener::bind(&self.bind_address)
            .await
            .map_err(|source| ServiceError::Bind {
                address: self.bind_address.clone(),
                source,
            })?;
        let addr = listener.local_addr()?;
        self.state.send_replace(ServeState::Serving(addr));
        tracing::info!(address = %addr, "HTTP server starting");

        let shutdown = self.shutdown.clone();
        axum::serve(listener, self.router.clone())
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;

        tracing::info!(address = %addr, "HTTP server stopped");
        if self.shutdown.is_cancelled() {
            Err(ServiceError::Closed)
        } else {
            Ok(())
        }
    }

    async fn stop(&self, deadline: Deadline) -> Result<(), ServiceError> {
        tracing::info!(bounded = deadline.is_bounded(), "HTTP server shutting down");
        self.shutdown.cancel();

        let mut state = self.state.subscribe();
        let drained = async move {
            let _ = state
                .wait_for(|s| matches!(s, ServeState::Idle | ServeState::Finished))
                .await;
        };
        deadline
            .run(drained)
            .await
            .map_err(|_| ServiceError::StopTimeout)
    }
}

/// Publishes `Finished` however `serve` returns.
struct MarkFinished<'a>(&'a watch::Sender<ServeState>);

impl Drop for MarkFinished<'_> {
    fn drop(&mut self) {
        self.0.send_replace(ServeState::Finished);
    }
}

/// Router answering `GET /` with `Hello world!`.
pub fn hello_router() -> Router {
    Router::new()
        .route("/", get(hello_handler))
        .layer(TraceLayer::new_for_http())
}

async fn hello_handler() -> &'static str {
    "Hello world!"
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn stop_before_serve_returns_immediately() {
        let service = HttpService::hello("127.0.0.1:0");
        service.stop(Deadline::after(Duration::from_secs(1))).await.unwrap();
        assert!(service.serve().await.unwrap_err().is_closed());
        assert_eq!(service.local_addr(), None);
    }

    #[tokio::test]
    async fn serve_reports_bind_failure() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = taken.local_addr().unwrap();

        let service = HttpService::hello(addr.to_string());
        let err = service.serve().await.unwrap_err();
        assert!(matches!(err, ServiceError::Bind { .. }), "got {err:?}");
        assert_eq!(service.ready().await, None);
    }

    #[tokio::test]
    async fn serve_returns_closed_after_stop() {
        let service = Arc::new(HttpService::hello("127.0.0.1:0"));
        let serving = {
            let service = service.clone();
            tokio::spawn(async move { service.serve().await })
        };

        let addr = service.ready().await.expect("listener bound");
        assert_eq!(service.local_addr(), Some(addr));

        service.stop(Deadline::unbounded()).await.unwrap();
        let result = serving.await.unwrap();
        assert!(result.unwrap_err().is_closed());
        assert_eq!(service.local_addr(), None);
    }
}
