//! Runtime configuration loading from environment variables.
//!
//! All configuration values are loaded from `LM_*` environment variables
//! with sensible defaults. Invalid values fall back to defaults without crashing.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |---|---|---|
//! | `LM_MODELS_DIR` | `models` | Artifact store root |
//! | `LM_HOST` | `0.0.0.0` | Bind address |
//! | `LM_PORT` | 8000 | Bind port |
//! | `LM_GPU_LAYERS` | 0 | Layers offloaded to the accelerator |
//! | `LM_THREADS` | 8 | CPU inference threads |
//! | `LM_N_CTX` | 2048 | Context window size |
//! | `LM_LOAD_TIMEOUT` | 600 | Model load timeout (secs) |
//! | `LM_DEFAULT_MAX_TOKENS` | 128 | Completion bound when the request omits one |
//! | `LM_SHUTDOWN_TIMEOUT` | 30 | Graceful shutdown timeout (secs) |
//! | `LM_PRELOAD_MODEL` | unset | Model loaded at startup |
//! | `LM_LOG_FORMAT` | `json` | `json` or `pretty` |
//! | `LM_LOG` | `info` | Log filter (falls back to `RUST_LOG`) |

use std::path::PathBuf;
use std::time::Duration;

use crate::engine::AccelerationConfig;
use crate::models::ManagerConfig;
use crate::telemetry::{LogConfig, LogFormat};

/// All runtime configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub models_dir: PathBuf,
    pub host: String,
    pub port: u16,
    pub acceleration: AccelerationConfig,
    pub load_timeout: Duration,
    pub default_max_tokens: u32,
    pub shutdown_timeout: Duration,
    pub preload_model: Option<String>,
    pub log: LogConfig,
}

impl EnvConfig {
    pub fn manager_config(&self) -> ManagerConfig {
        ManagerConfig {
            acceleration: self.acceleration.clone(),
            load_timeout: self.load_timeout,
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Parse a `u32` env var, returning `default` on missing or invalid.
fn parse_u32(key: &str, default: u32) -> u32 {
    match std::env::var(key) {
        Ok(val) => val.parse::<u32>().unwrap_or(default),
        Err(_) => default,
    }
}

/// Parse a `u64` env var, returning `default` on missing or invalid.
fn parse_u64(key: &str, default: u64) -> u64 {
    match std::env::var(key) {
        Ok(val) => val.parse::<u64>().unwrap_or(default),
        Err(_) => default,
    }
}

/// Read a string env var, treating blank values as unset.
fn non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Load acceleration settings from environment.
fn load_acceleration() -> AccelerationConfig {
    let gpu_layers = parse_u32("LM_GPU_LAYERS", 0);
    let thread_count = parse_u32("LM_THREADS", 8).max(1);
    let n_ctx = parse_u32("LM_N_CTX", 2048).max(128); // floor: 128 tokens
    AccelerationConfig { gpu_layers, thread_count, n_ctx }
}

/// Load logging settings from environment.
fn load_log_config() -> LogConfig {
    let format = match non_empty("LM_LOG_FORMAT").as_deref() {
        Some("pretty") => LogFormat::Pretty,
        _ => LogFormat::Json,
    };
    let level = non_empty("LM_LOG")
        .or_else(|| non_empty("RUST_LOG"))
        .unwrap_or_else(|| "info".to_string());
    LogConfig { format, level, output_path: non_empty("LM_LOG_FILE").map(PathBuf::from) }
}

/// Load all configuration from environment variables.
///
/// Missing or invalid values fall back to safe defaults without panicking.
pub fn load() -> EnvConfig {
    let port = match std::env::var("LM_PORT") {
        Ok(val) => val.parse::<u16>().unwrap_or(8000),
        Err(_) => 8000,
    };
    let load_secs = parse_u64("LM_LOAD_TIMEOUT", 600).max(1);
    let shutdown_secs = parse_u64("LM_SHUTDOWN_TIMEOUT", 30).max(1);

    EnvConfig {
        models_dir: non_empty("LM_MODELS_DIR").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("models")),
        host: non_empty("LM_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
        port,
        acceleration: load_acceleration(),
        load_timeout: Duration::from_secs(load_secs),
        default_max_tokens: parse_u32("LM_DEFAULT_MAX_TOKENS", 128).max(1),
        shutdown_timeout: Duration::from_secs(shutdown_secs),
        preload_model: non_empty("LM_PRELOAD_MODEL"),
        log: load_log_config(),
    }
}

/// Load `.env` (if present) and then the environment.
pub fn load_with_dotenv() -> EnvConfig {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Ignoring unreadable .env file: {}", e);
        }
    }
    load()
}
