//! Inference error types.
//!
//! All errors are fail-closed: invalid inputs are rejected, not truncated.

use thiserror::Error;

/// Errors raised while generating against a loaded model.
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("Model handle is closed: {0}")]
    Stale(String),

    #[error("Input validation failed: {0}")]
    InputValidation(String),

    #[error("Inference timeout after {0}ms")]
    Timeout(u64),

    #[error("Model error: {0}")]
    ModelError(String),
}

impl InferenceError {
    /// Returns true if the caller sent something we refused to run.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InputValidation(_))
    }
}

/// Errors raised while opening a model file into a live backend.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Model file not found: {0}")]
    FileMissing(std::path::PathBuf),

    #[error("Invalid acceleration config: {0}")]
    InvalidConfig(String),

    #[error("Backend failed to load model: {0}")]
    Backend(String),

    #[error("Model load timed out after {0}s")]
    Timeout(u64),

    #[error("Load task aborted: {0}")]
    Aborted(String),
}
