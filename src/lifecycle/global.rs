//! Process-wide default [`LifecycleManager`].
//!
//! The instance is created on first use and lives until the process exits.
//! It is never reset: once it has served and shut down, later calls to
//! [`serve`] return immediately and push/pop are rejected.

use std::sync::Arc;
use std::time::Duration;
use once_cell::sync::Lazy;

use crate::lifecycle::actions::CleanupAction;
use crate::lifecycle::manager::{CleanupError, LifecycleManager};
use crate::lifecycle::service::Service;

static DEFAULT_MANAGER: Lazy<LifecycleManager> = Lazy::new(LifecycleManager::new);

/// The process-wide default manager.
pub fn default_manager() -> &'static LifecycleManager {
    &DEFAULT_MANAGER
}

/// Run `service` under the default manager. See [`LifecycleManager::serve`].
pub async fn serve(service: Arc<dyn Service>, timeout: Duration) {
    DEFAULT_MANAGER.set_service(service);
    DEFAULT_MANAGER.serve(timeout).await;
}

/// [`LifecycleManager::pre_cleanup_push`] on the default manager.
pub fn pre_cleanup_push<A, F>(routine: F, arg: A) -> Result<(), CleanupError>
where
    A: Send + 'static,
    F: FnOnce(A) + Send + 'static,
{
    DEFAULT_MANAGER.pre_cleanup_push(routine, arg)
}

/// [`LifecycleManager::pre_cleanup_pop`] on the default manager.
pub fn pre_cleanup_pop() -> Result<Option<CleanupAction>, CleanupError> {
    DEFAULT_MANAGER.pre_cleanup_pop()
}

/// [`LifecycleManager::post_cleanup_push`] on the default manager.
pub fn post_cleanup_push<A, F>(routine: F, arg: A) -> Result<(), CleanupError>
where
    A: Send + 'static,
    F: FnOnce(A) + Send + 'static,
{
    DEFAULT_MANAGER.post_cleanup_push(routine, arg)
}

/// [`LifecycleManager::post_cleanup_pop`] on the default manager.
pub fn post_cleanup_pop() -> Result<Option<CleanupAction>, CleanupError> {
    DEFAULT_MANAGER.post_cleanup_pop()
}

/// [`LifecycleManager::request_shutdown`] on the default manager.
pub fn request_shutdown() -> bool {
    DEFAULT_MANAGER.request_shutdown()
}
