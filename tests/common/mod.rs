//! Shared utilities for lifecycle integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use async_trait::async_trait;
use graceful_serve::lifecycle::{Deadline, Service, ServiceError};
use tokio_util::sync::CancellationToken;

/// Ordered log of everything that happened during a test.
#[derive(Debug, Clone, Default)]
pub struct Events(Arc<Mutex<Vec<String>>>);

impl Events {
    pub fn push(&self, event: impl Into<String>) {
        self.0.lock().unwrap().push(event.into());
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    /// Cleanup routine recording `"{label} {arg}"`.
    pub fn recorder(&self, label: &'static str) -> impl FnOnce(u32) + Send + 'static {
        let events = self.clone();
        move |n| events.push(format!("{label} {n}"))
    }
}

/// How the mock behaves when stopped.
#[derive(Debug, Clone, Copy)]
pub enum StopBehavior {
    Succeed,
    Fail,
    /// Take this long before succeeding.
    Slow(Duration),
    Panic,
}

/// Service with scripted serve/stop behaviour that logs into [`Events`].
pub struct MockService {
    events: Events,
    fail_on_start: bool,
    stop_behavior: StopBehavior,
    pub serving: CancellationToken,
    stopped: CancellationToken,
    pub serve_calls: AtomicUsize,
    pub stop_calls: AtomicUsize,
    pub last_deadline: Mutex<Option<Deadline>>,
}

impl MockService {
    pub fn new(events: Events, stop_behavior: StopBehavior) -> Arc<Self> {
        Arc::new(Self {
            events,
            fail_on_start: false,
            stop_behavior,
            serving: CancellationToken::new(),
            stopped: CancellationToken::new(),
            serve_calls: AtomicUsize::new(0),
            stop_calls: AtomicUsize::new(0),
            last_deadline: Mutex::new(None),
        })
    }

    /// A service whose serve loop fails as soon as it starts.
    pub fn failing(events: Events) -> Arc<Self> {
        let mut service = Self::new(events, StopBehavior::Succeed);
        Arc::get_mut(&mut service).unwrap().fail_on_start = true;
        service
    }

    pub async fn wait_serving(&self) {
        tokio::time::timeout(Duration::from_secs(5), self.serving.cancelled())
            .await
            .expect("service never started serving");
    }
}

#[async_trait]
impl Service for MockService {
    async fn serve(&self) -> Result<(), ServiceError> {
        self.serve_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_on_start {
            self.events.push("serve failed");
            return Err(ServiceError::Other("address already in use".into()));
        }
        self.serving.cancel();
        self.stopped.cancelled().await;
        Err(ServiceError::Closed)
    }

    async fn stop(&self, deadline: Deadline) -> Result<(), ServiceError> {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_deadline.lock().unwrap() = Some(deadline);
        self.events.push("stop");
        self.stopped.cancel();
        match self.stop_behavior {
            StopBehavior::Succeed => Ok(()),
            StopBehavior::Fail => Err(ServiceError::Other("in-flight work refused to finish".into())),
            StopBehavior::Slow(delay) => {
                tokio::time::sleep(delay).await;
                self.events.push("stop done");
                Ok(())
            }
            StopBehavior::Panic => panic!("stop exploded"),
        }
    }
}
