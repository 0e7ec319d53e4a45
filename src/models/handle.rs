//! Live handle to one loaded model.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use parking_lot::RwLock;

use super::name::ModelName;
use crate::engine::{
    AccelerationConfig, BackendLoader, GenerationParams, InferenceError, LoadError, ModelBackend,
};

static NEXT_HANDLE_ID: AtomicU64 = AtomicU64::new(1);

/// Exclusively owns a backend bound to one artifact.
///
/// Generations share the backend through a read lock; `close` takes the
/// write lock, so it waits for running generations and every later call
/// sees a closed handle.
pub struct InferenceHandle {
    id: u64,
    model: ModelName,
    path: PathBuf,
    memory_bytes: usize,
    opened_at: Instant,
    backend: RwLock<Option<Box<dyn ModelBackend>>>,
}

impl InferenceHandle {
    /// Open `path` through `loader`. Blocks for as long as the backend needs.
    pub fn open(
        loader: &dyn BackendLoader,
        model: ModelName,
        path: &Path,
        config: &AccelerationConfig,
    ) -> Result<Self, LoadError> {
        let backend = loader.open(path, config)?;
        Ok(Self {
            id: NEXT_HANDLE_ID.fetch_add(1, Ordering::SeqCst),
            model,
            path: path.to_path_buf(),
            memory_bytes: backend.memory_usage(),
            opened_at: Instant::now(),
            backend: RwLock::new(Some(backend)),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn model(&self) -> &ModelName {
        &self.model
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn memory_bytes(&self) -> usize {
        self.memory_bytes
    }

    pub fn opened_at(&self) -> Instant {
        self.opened_at
    }

    pub fn is_closed(&self) -> bool {
        self.backend.read().is_none()
    }

    /// Generate a continuation of `prompt`.
    pub fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String, InferenceError> {
        if prompt.is_empty() {
            return Err(InferenceError::InputValidation("prompt cannot be empty".into()));
        }
        params.validate()?;

        let guard = self.backend.read();
        match guard.as_ref() {
            Some(backend) => backend.generate(prompt, params),
            None => Err(InferenceError::Stale(format!(
                "handle {} for '{}' was closed",
                self.id, self.model
            ))),
        }
    }

    /// Release the backend. A second call is a logged no-op.
    pub fn close(&self) -> Result<(), InferenceError> {
        let backend = self.backend.write().take();
        match backend {
            Some(backend) => backend.close(),
            None => {
                tracing::warn!(handle = self.id, model = %self.model, "close on already-closed handle");
                Ok(())
            }
        }
    }
}

impl Drop for InferenceHandle {
    fn drop(&mut self) {
        if let Some(backend) = self.backend.get_mut().take() {
            if let Err(e) = backend.close() {
                tracing::warn!(handle = self.id, model = %self.model, error = %e, "close on drop failed");
            }
        }
    }
}

impl std::fmt::Debug for InferenceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferenceHandle")
            .field("id", &self.id)
            .field("model", &self.model)
            .field("path", &self.path)
            .field("closed", &self.is_closed())
            .finish()
    }
}
