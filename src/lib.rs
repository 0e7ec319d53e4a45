//! lm-runtime
//!
//! Serves one local LLM at a time over HTTP. Model files live in an
//! artifact store on disk (one directory per model name); the lifecycle
//! manager keeps at most one of them open as a live inference handle and
//! answers completions against it.
//!
//! # Layout
//!
//! - [`models`]: names, artifact store, inference handle, lifecycle manager
//! - [`engine`]: backend seam (`BackendLoader` / `ModelBackend`) and llama.cpp
//! - [`download`]: remote fetch from the Hugging Face Hub
//! - [`api`]: axum router and HTTP error mapping

pub mod api;
pub mod cli;
pub mod config;
pub mod download;
pub mod engine;
pub mod health;
pub mod models;
pub mod shutdown;
pub mod telemetry;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use api::AppState;
use download::ModelFetcher;
use engine::BackendLoader;
use health::{HealthChecker, HealthConfig};
use models::{ArtifactStore, LifecycleManager, ManagerConfig, ModelError, ModelName};
use shutdown::{DrainResult, ShutdownCoordinator};

/// Runtime configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub models_dir: PathBuf,
    pub manager: ManagerConfig,
    pub default_max_tokens: u32,
    pub health: HealthConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            models_dir: PathBuf::from("models"),
            manager: ManagerConfig::default(),
            default_max_tokens: 128,
            health: HealthConfig::default(),
        }
    }
}

impl From<&config::EnvConfig> for RuntimeConfig {
    fn from(env: &config::EnvConfig) -> Self {
        Self {
            models_dir: env.models_dir.clone(),
            manager: env.manager_config(),
            default_max_tokens: env.default_max_tokens,
            health: HealthConfig::default(),
        }
    }
}

/// The assembled service: store, manager and the HTTP-side collaborators.
pub struct Runtime {
    pub store: Arc<ArtifactStore>,
    pub manager: Arc<LifecycleManager>,
    pub fetcher: Arc<dyn ModelFetcher>,
    pub shutdown: ShutdownCoordinator,
    pub health: Arc<HealthChecker>,
    default_max_tokens: u32,
}

impl Runtime {
    /// Open (creating if needed) the store and wire up the manager.
    pub fn new(
        config: RuntimeConfig,
        loader: Arc<dyn BackendLoader>,
        fetcher: Arc<dyn ModelFetcher>,
    ) -> Result<Self, ModelError> {
        let store = Arc::new(ArtifactStore::open(&config.models_dir)?);
        let manager = Arc::new(LifecycleManager::new(store.clone(), loader, config.manager));

        Ok(Self {
            store,
            manager,
            fetcher,
            shutdown: ShutdownCoordinator::new(),
            health: Arc::new(HealthChecker::new(config.health)),
            default_max_tokens: config.default_max_tokens,
        })
    }

    pub fn app_state(&self) -> AppState {
        AppState {
            manager: self.manager.clone(),
            fetcher: self.fetcher.clone(),
            shutdown: self.shutdown.clone(),
            health: self.health.clone(),
            default_max_tokens: self.default_max_tokens,
        }
    }

    pub fn router(&self) -> axum::Router {
        api::create_router(self.app_state())
    }

    /// Load `name` before serving. A failure is logged and leaves the
    /// manager `Unloaded`; the service still starts.
    pub async fn preload(&self, name: &str) -> Option<ModelName> {
        match self.manager.request_load(name).await {
            Ok(report) => Some(report.model),
            Err(e) => {
                tracing::error!(model = name, error = %e, "preload failed; starting without a model");
                None
            }
        }
    }

    /// Drain in-flight requests, then close the loaded model.
    pub async fn shutdown(&self, timeout: Duration) -> DrainResult {
        let drained = self.shutdown.drain(timeout).await;
        if let Some(model) = self.manager.shutdown().await {
            tracing::info!(model = %model, "model closed at shutdown");
        }
        drained
    }
}
