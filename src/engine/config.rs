//! Inference configuration types.
//!
//! All fields have safe defaults. Configuration is validated before use.

use super::error::{InferenceError, LoadError};

/// Literal end-of-sequence marker trimmed from completions.
pub const END_OF_SEQUENCE: &str = "</s>";

/// How computation is split between CPU threads and an optional accelerator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccelerationConfig {
    /// Model layers offloaded to the accelerator (0 = CPU only).
    pub gpu_layers: u32,
    /// CPU worker threads for layers that stay on the host.
    pub thread_count: u32,
    /// Context window in tokens.
    pub n_ctx: u32,
}

impl Default for AccelerationConfig {
    fn default() -> Self {
        Self { gpu_layers: 0, thread_count: 8, n_ctx: 2048 }
    }
}

impl AccelerationConfig {
    pub fn validate(&self) -> Result<(), LoadError> {
        if self.thread_count == 0 {
            return Err(LoadError::InvalidConfig("thread_count must be >= 1".into()));
        }
        if self.n_ctx < 128 {
            return Err(LoadError::InvalidConfig("n_ctx must be >= 128".into()));
        }
        Ok(())
    }
}

/// Per-call generation parameters.
#[derive(Debug, Clone)]
pub struct GenerationParams {
    /// Upper bound on generated tokens.
    pub max_tokens: u32,
    /// Text markers that end the completion early.
    pub stop: Vec<String>,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self::with_max_tokens(128)
    }
}

impl GenerationParams {
    pub fn with_max_tokens(max_tokens: u32) -> Self {
        Self { max_tokens, stop: vec![END_OF_SEQUENCE.to_string()] }
    }

    pub fn validate(&self) -> Result<(), InferenceError> {
        if self.max_tokens == 0 {
            return Err(InferenceError::InputValidation("max_tokens must be >= 1".into()));
        }
        Ok(())
    }

    /// Cut `text` at the earliest stop marker, if any.
    pub fn apply_stop(&self, text: &str) -> String {
        let cut = self
            .stop
            .iter()
            .filter(|s| !s.is_empty())
            .filter_map(|s| text.find(s.as_str()))
            .min()
            .unwrap_or(text.len());
        text[..cut].to_string()
    }
}
