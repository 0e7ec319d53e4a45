//! GGUF text generation through llama.cpp.
//!
//! Only compiled with the `gguf` feature.

mod backend;

use std::path::Path;

pub use backend::LlamaBackendInner;

use super::{AccelerationConfig, BackendLoader, LoadError, ModelBackend};

/// Opens GGUF/GGML files with llama-cpp-2.
#[derive(Debug, Default, Clone, Copy)]
pub struct GgufLoader;

impl BackendLoader for GgufLoader {
    fn kind(&self) -> &'static str {
        "gguf"
    }

    fn open(
        &self,
        path: &Path,
        config: &AccelerationConfig,
    ) -> Result<Box<dyn ModelBackend>, LoadError> {
        let inner = LlamaBackendInner::load(path, config)?;
        tracing::debug!(
            path = %path.display(),
            bytes = inner.memory_usage(),
            gpu_layers = config.gpu_layers,
            "gguf model resident"
        );
        Ok(Box::new(inner))
    }
}
