//! Error taxonomy for the model store and lifecycle manager.

use thiserror::Error;

use super::lifecycle::LifecycleState;
use crate::engine::{InferenceError, LoadError};

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Model not found: {0}")]
    NotFound(String),

    #[error("Invalid model name {0}")]
    InvalidName(String),

    #[error("Unrecognized model file: {0}")]
    UnrecognizedFile(String),

    #[error("Store I/O failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("Load failed: {0}")]
    Load(#[from] LoadError),

    #[error("Inference failed: {0}")]
    Inference(#[from] InferenceError),

    #[error("model not loaded (state: {state})")]
    NotReady { state: LifecycleState },

    #[error("Another load or unload is in progress")]
    TransitionInProgress,
}

impl ModelError {
    /// Short category name surfaced at the HTTP boundary.
    pub fn category(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::InvalidName(_) | Self::UnrecognizedFile(_) => "invalid_request",
            Self::Io(_) => "io_failure",
            Self::Load(_) => "load_error",
            Self::Inference(e) if e.is_client_error() => "invalid_request",
            Self::Inference(_) => "inference_error",
            Self::NotReady { .. } => "not_ready",
            Self::TransitionInProgress => "busy",
        }
    }
}
