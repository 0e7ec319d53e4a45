//! Logging configuration and initialization.
//!
//! Supports JSON and pretty-printed formats with an optional log file.

use std::path::PathBuf;
use thiserror::Error;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// JSON structured logging (default for services).
    #[default]
    Json,
    /// Human-readable output for terminals.
    Pretty,
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub format: LogFormat,
    /// Filter directive, e.g. `info` or `lm_runtime=debug,tower_http=info`.
    pub level: String,
    /// Log file. `None` writes to stderr.
    pub output_path: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Json,
            level: "info".to_string(),
            output_path: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum LogError {
    #[error("Invalid log filter: {0}")]
    InvalidFilter(String),
    #[error("Failed to open log file: {0}")]
    FileOpen(String),
    #[error("Subscriber already initialized")]
    AlreadyInitialized,
}

/// Install the global tracing subscriber. Call once at startup.
pub fn init_logging(config: &LogConfig) -> Result<(), LogError> {
    let filter = EnvFilter::try_new(&config.level)
        .map_err(|e| LogError::InvalidFilter(e.to_string()))?;
    let registry = tracing_subscriber::registry().with(filter);

    match (config.format, &config.output_path) {
        (LogFormat::Json, Some(path)) => {
            let file = std::fs::File::create(path).map_err(|e| LogError::FileOpen(e.to_string()))?;
            registry
                .with(fmt::layer().json().with_writer(std::sync::Mutex::new(file)))
                .try_init()
        }
        (LogFormat::Json, None) => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
        (LogFormat::Pretty, Some(path)) => {
            let file = std::fs::File::create(path).map_err(|e| LogError::FileOpen(e.to_string()))?;
            registry
                .with(fmt::layer().with_ansi(false).with_writer(std::sync::Mutex::new(file)))
                .try_init()
        }
        (LogFormat::Pretty, None) => registry
            .with(fmt::layer().pretty().with_writer(std::io::stderr))
            .try_init(),
    }
    .map_err(|_| LogError::AlreadyInitialized)
}
