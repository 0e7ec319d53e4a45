//! Model lifecycle manager.
//!
//! Owns the single process-wide `InferenceHandle` and serializes load and
//! unload against it. The slot (state + handle) sits behind a short
//! `parking_lot` critical section; `open` and `generate` run on the blocking
//! pool outside of it. A separate async transition lock keeps loads and
//! unloads from interleaving.
//!
//! State machine:
//!
//! ```text
//! Unloaded --load--> Loading --ok--> Loaded --unload--> Unloaded
//!                       |                |
//!                       +--err--> LoadFailed --> Unloaded
//!                                        Loaded --load--> Loading
//! ```

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use super::error::ModelError;
use super::handle::InferenceHandle;
use super::name::ModelName;
use super::store::ArtifactStore;
use crate::engine::{AccelerationConfig, BackendLoader, GenerationParams, InferenceError, LoadError};

/// Lifecycle of the single model slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Unloaded,
    Loading,
    Loaded,
    LoadFailed,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unloaded => "unloaded",
            Self::Loading => "loading",
            Self::Loaded => "loaded",
            Self::LoadFailed => "load_failed",
        };
        f.write_str(s)
    }
}

/// Manager tuning.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    pub acceleration: AccelerationConfig,
    /// Upper bound on a single `open`.
    pub load_timeout: Duration,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            acceleration: AccelerationConfig::default(),
            load_timeout: Duration::from_secs(600),
        }
    }
}

/// Outcome of a successful load.
#[derive(Debug, Clone, Serialize)]
pub struct LoadReport {
    pub model: ModelName,
    pub path: PathBuf,
    pub replaced: Option<ModelName>,
    pub memory_bytes: usize,
    pub elapsed_ms: u64,
}

/// Outcome of a successful completion.
#[derive(Debug, Clone, Serialize)]
pub struct Completion {
    pub model: ModelName,
    pub text: String,
}

/// Point-in-time view of the manager.
#[derive(Debug, Clone, Serialize)]
pub struct ManagerStatus {
    pub state: LifecycleState,
    pub model: Option<ModelName>,
    pub loading: Option<ModelName>,
    pub memory_bytes: usize,
    pub loaded_for_secs: Option<u64>,
    pub last_error: Option<String>,
}

struct Slot {
    state: LifecycleState,
    handle: Option<Arc<InferenceHandle>>,
    loading: Option<ModelName>,
    last_error: Option<String>,
}

/// State shared between the manager and the tasks that run transitions.
struct Shared {
    store: Arc<ArtifactStore>,
    loader: Arc<dyn BackendLoader>,
    config: ManagerConfig,
    slot: Mutex<Slot>,
    transition: Arc<AsyncMutex<()>>,
}

/// Serializes load/unload/completion against one live model.
///
/// Loads and unloads run on their own spawned task, so a caller that stops
/// waiting (a dropped HTTP request) never leaves a transition half done.
pub struct LifecycleManager {
    shared: Arc<Shared>,
}

impl LifecycleManager {
    pub fn new(store: Arc<ArtifactStore>, loader: Arc<dyn BackendLoader>, config: ManagerConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                store,
                loader,
                config,
                slot: Mutex::new(Slot {
                    state: LifecycleState::Unloaded,
                    handle: None,
                    loading: None,
                    last_error: None,
                }),
                transition: Arc::new(AsyncMutex::new(())),
            }),
        }
    }

    pub fn store(&self) -> &Arc<ArtifactStore> {
        &self.shared.store
    }

    pub fn state(&self) -> LifecycleState {
        self.shared.slot.lock().state
    }

    pub fn status(&self) -> ManagerStatus {
        let slot = self.shared.slot.lock();
        ManagerStatus {
            state: slot.state,
            model: slot.handle.as_ref().map(|h| h.model().clone()),
            loading: slot.loading.clone(),
            memory_bytes: slot.handle.as_ref().map(|h| h.memory_bytes()).unwrap_or(0),
            loaded_for_secs: slot.handle.as_ref().map(|h| h.opened_at().elapsed().as_secs()),
            last_error: slot.last_error.clone(),
        }
    }

    /// Names of all valid artifacts. Independent of lifecycle state.
    pub async fn request_list(&self) -> Result<BTreeSet<ModelName>, ModelError> {
        let store = self.shared.store.clone();
        blocking(move || store.list()).await
    }

    /// Place `source` into the store as `name`. Independent of lifecycle state.
    pub async fn request_download(&self, source: PathBuf, name: &str) -> Result<PathBuf, ModelError> {
        let name = ModelName::parse(name)?;
        let store = self.shared.store.clone();
        blocking(move || store.accept(&name, &source)).await
    }

    /// Load `name`, replacing whatever is loaded.
    ///
    /// A name that does not resolve leaves state and the current handle
    /// untouched. Once resolution succeeds the old handle is closed before
    /// the new one is opened; if `open` then fails the manager ends
    /// `Unloaded`. Dropping the returned future does not cancel the load.
    pub async fn request_load(&self, name: &str) -> Result<LoadReport, ModelError> {
        let name = ModelName::parse(name)?;
        let shared = self.shared.clone();
        tokio::spawn(shared.load(name))
            .await
            .map_err(|e| ModelError::Load(LoadError::Aborted(e.to_string())))?
    }

    /// Unload the current model. Returns the unloaded name, or `None` if
    /// nothing was loaded.
    pub async fn request_unload(&self) -> Result<Option<ModelName>, ModelError> {
        let guard = self
            .shared
            .transition
            .clone()
            .try_lock_owned()
            .map_err(|_| ModelError::TransitionInProgress)?;
        let shared = self.shared.clone();
        tokio::spawn(async move {
            let unloaded = shared.unload_locked().await;
            drop(guard);
            unloaded
        })
        .await
        .map_err(|e| ModelError::Io(std::io::Error::other(e.to_string())))
    }

    /// Wait for any transition in flight, then unload. Used at shutdown.
    pub async fn shutdown(&self) -> Option<ModelName> {
        let guard = self.shared.transition.clone().lock_owned().await;
        let shared = self.shared.clone();
        let task = tokio::spawn(async move {
            let unloaded = shared.unload_locked().await;
            drop(guard);
            unloaded
        });
        match task.await {
            Ok(unloaded) => unloaded,
            Err(e) => {
                tracing::error!(error = %e, "unload task failed at shutdown");
                None
            }
        }
    }

    /// Generate against the loaded model.
    pub async fn request_completion(&self, prompt: &str, max_tokens: u32) -> Result<Completion, ModelError> {
        let params = GenerationParams::with_max_tokens(max_tokens);
        params.validate()?;
        if prompt.is_empty() {
            return Err(InferenceError::InputValidation("prompt cannot be empty".into()).into());
        }

        let ready = {
            let slot = self.shared.slot.lock();
            match slot.handle.clone() {
                Some(handle) if slot.state == LifecycleState::Loaded => Ok(handle),
                _ => Err(slot.state),
            }
        };
        let handle = match ready {
            Ok(handle) => handle,
            Err(state) => {
                tracing::warn!(%state, "completion rejected: no model ready");
                return Err(ModelError::NotReady { state });
            }
        };

        let model = handle.model().clone();
        let prompt = prompt.to_string();
        let result = tokio::task::spawn_blocking(move || handle.generate(&prompt, &params))
            .await
            .map_err(|e| InferenceError::ModelError(format!("generation task failed: {e}")))?;

        match result {
            Ok(text) => {
                metrics::counter!("lm_completions_total").increment(1);
                Ok(Completion { model, text })
            }
            // The handle was swapped out between lookup and generation.
            Err(InferenceError::Stale(_)) => Err(ModelError::NotReady { state: self.state() }),
            Err(e) => {
                metrics::counter!("lm_completion_failures_total").increment(1);
                Err(e.into())
            }
        }
    }
}

impl Shared {
    async fn load(self: Arc<Self>, name: ModelName) -> Result<LoadReport, ModelError> {
        let mut guard = Some(
            self.transition
                .clone()
                .try_lock_owned()
                .map_err(|_| ModelError::TransitionInProgress)?,
        );

        let store = self.store.clone();
        let lookup = name.clone();
        let path = blocking(move || store.resolve(&lookup)).await?;

        let previous = {
            let mut slot = self.slot.lock();
            slot.state = LifecycleState::Loading;
            slot.loading = Some(name.clone());
            slot.handle.take()
        };
        let mut reset = LoadingReset::new(&self.slot, &name);

        let replaced = match previous {
            Some(old) => {
                let model = old.model().clone();
                close_handle(old).await;
                Some(model)
            }
            None => None,
        };

        tracing::info!(model = %name, path = %path.display(), backend = self.loader.kind(), "loading model");
        let started = Instant::now();
        let outcome = self.open(&mut guard, name.clone(), path.clone()).await;
        reset.disarm();

        match outcome {
            Ok(handle) => {
                let report = LoadReport {
                    model: name.clone(),
                    path,
                    replaced,
                    memory_bytes: handle.memory_bytes(),
                    elapsed_ms: elapsed_ms(started),
                };
                {
                    let mut slot = self.slot.lock();
                    slot.handle = Some(Arc::new(handle));
                    slot.state = LifecycleState::Loaded;
                    slot.loading = None;
                    slot.last_error = None;
                }
                metrics::counter!("lm_model_loads_total").increment(1);
                tracing::info!(model = %name, elapsed_ms = report.elapsed_ms, "model loaded");
                Ok(report)
            }
            Err(e) => {
                {
                    let mut slot = self.slot.lock();
                    slot.state = LifecycleState::LoadFailed;
                    slot.last_error = Some(format!("{name}: {e}"));
                }
                metrics::counter!("lm_model_load_failures_total").increment(1);
                tracing::error!(model = %name, error = %e, elapsed_ms = elapsed_ms(started), "model load failed");
                {
                    let mut slot = self.slot.lock();
                    slot.state = LifecycleState::Unloaded;
                    slot.loading = None;
                }
                Err(ModelError::Load(e))
            }
        }
    }

    async fn unload_locked(&self) -> Option<ModelName> {
        let previous = {
            let mut slot = self.slot.lock();
            slot.state = LifecycleState::Unloaded;
            slot.handle.take()
        };
        let old = previous?;
        let model = old.model().clone();
        close_handle(old).await;
        tracing::info!(model = %model, "model unloaded");
        Some(model)
    }

    /// Run `open` on the blocking pool under the load timeout.
    ///
    /// On timeout the transition guard moves into a reaper task that waits
    /// for the orphaned `open` and closes its result, so no second handle
    /// can exist alongside a later load. Otherwise the guard stays with the
    /// caller until the slot is updated.
    async fn open(
        &self,
        guard: &mut Option<OwnedMutexGuard<()>>,
        name: ModelName,
        path: PathBuf,
    ) -> Result<InferenceHandle, LoadError> {
        let loader = self.loader.clone();
        let config = self.config.acceleration.clone();
        let mut task = tokio::task::spawn_blocking(move || {
            InferenceHandle::open(loader.as_ref(), name, &path, &config)
        });

        match tokio::time::timeout(self.config.load_timeout, &mut task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(LoadError::Aborted(join_err.to_string())),
            Err(_) => {
                let held = guard.take();
                tokio::spawn(async move {
                    let _held = held;
                    if let Ok(Ok(late)) = task.await {
                        tracing::warn!(model = %late.model(), "closing handle from timed-out load");
                        close_handle(Arc::new(late)).await;
                    }
                });
                Err(LoadError::Timeout(self.config.load_timeout.as_secs()))
            }
        }
    }
}

/// Returns the slot to `Unloaded` if a load stops before reaching a
/// verdict (task cancelled at runtime shutdown, or a panic).
struct LoadingReset<'a> {
    slot: &'a Mutex<Slot>,
    name: &'a ModelName,
    armed: bool,
}

impl<'a> LoadingReset<'a> {
    fn new(slot: &'a Mutex<Slot>, name: &'a ModelName) -> Self {
        Self { slot, name, armed: true }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for LoadingReset<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut slot = self.slot.lock();
        if slot.state == LifecycleState::Loading {
            slot.state = LifecycleState::Unloaded;
            slot.loading = None;
            slot.last_error = Some(format!("{}: load interrupted", self.name));
            tracing::warn!(model = %self.name, "load interrupted; slot reset to unloaded");
        }
    }
}

/// Close `handle` on the blocking pool; failures are logged, not returned.
async fn close_handle(handle: Arc<InferenceHandle>) {
    let id = handle.id();
    let model = handle.model().clone();
    match tokio::task::spawn_blocking(move || handle.close()).await {
        Ok(Ok(())) => tracing::debug!(handle = id, model = %model, "handle closed"),
        Ok(Err(e)) => tracing::warn!(handle = id, model = %model, error = %e, "closing previous handle failed"),
        Err(e) => tracing::warn!(handle = id, model = %model, error = %e, "close task failed"),
    }
}

async fn blocking<T, F>(f: F) -> Result<T, ModelError>
where
    F: FnOnce() -> Result<T, ModelError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ModelError::Io(std::io::Error::other(e.to_string())))?
}

fn elapsed_ms(since: Instant) -> u64 {
    u64::try_from(since.elapsed().as_millis()).unwrap_or(u64::MAX)
}
