//! Inference engine module.
//!
//! Wraps the native inference library behind the `BackendLoader` /
//! `ModelBackend` seam. Tokenization, GPU dispatch and weight parsing stay
//! inside the backend; this module only defines the narrow interface.

pub mod backend;
pub mod config;
pub mod error;
pub mod mock;

#[cfg(feature = "gguf")]
pub mod gguf;

use std::sync::Arc;

pub use backend::{BackendLoader, ModelBackend};
pub use config::{AccelerationConfig, GenerationParams, END_OF_SEQUENCE};
pub use error::{InferenceError, LoadError};
pub use mock::MockLoader;

#[cfg(feature = "gguf")]
pub use gguf::GgufLoader;

/// Loader used by the service binary: llama.cpp when compiled in, otherwise the mock.
pub fn default_loader() -> Arc<dyn BackendLoader> {
    #[cfg(feature = "gguf")]
    {
        Arc::new(GgufLoader)
    }
    #[cfg(not(feature = "gguf"))]
    {
        tracing::warn!("built without the `gguf` feature; serving the mock backend");
        Arc::new(MockLoader::new())
    }
}
