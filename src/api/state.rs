//! Shared state handed to every handler.

use std::sync::Arc;

use crate::download::ModelFetcher;
use crate::health::HealthChecker;
use crate::models::LifecycleManager;
use crate::shutdown::ShutdownCoordinator;

#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<LifecycleManager>,
    pub fetcher: Arc<dyn ModelFetcher>,
    pub shutdown: ShutdownCoordinator,
    pub health: Arc<HealthChecker>,
    /// Completion bound used when a request omits `max_tokens`.
    pub default_max_tokens: u32,
}
