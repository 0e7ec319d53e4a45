//! Backend seam between the lifecycle manager and a native inference library.
//!
//! `BackendLoader::open` turns a model file into a live `ModelBackend`.
//! Both traits are synchronous: callers run them on the blocking pool.

use std::path::Path;

use super::config::{AccelerationConfig, GenerationParams};
use super::error::{InferenceError, LoadError};

/// A model resident in memory, ready to generate.
///
/// `generate` takes `&self` and may run concurrently from several threads;
/// the implementation owns any per-call compute state.
pub trait ModelBackend: Send + Sync {
    /// Produce a continuation of `prompt`, bounded by `params.max_tokens`.
    fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String, InferenceError>;

    /// Approximate resident bytes (weights + buffers).
    fn memory_usage(&self) -> usize;

    /// Release native resources. Consumes the backend so it runs once.
    fn close(self: Box<Self>) -> Result<(), InferenceError>;
}

/// Constructs backends from model files.
pub trait BackendLoader: Send + Sync {
    /// Short identifier for logs (`"gguf"`, `"mock"`).
    fn kind(&self) -> &'static str;

    /// Open `path` with the given acceleration settings. May block for a long time.
    fn open(
        &self,
        path: &Path,
        config: &AccelerationConfig,
    ) -> Result<Box<dyn ModelBackend>, LoadError>;
}
