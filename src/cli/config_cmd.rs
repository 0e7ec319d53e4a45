// Copyright 2024-2026 lm-runtime Contributors
// SPDX-License-Identifier: Apache-2.0

//! `config show`: print the effective configuration.
//!
//! Reads environment variables directly; no server connection needed.

use crate::config::{self, EnvConfig};
use crate::download::TOKEN_ENV_VAR;
use crate::telemetry::LogFormat;

pub fn run_show() {
    print!("{}", render(&config::load_with_dotenv()));
}

/// `KEY=value` lines. The hub token is reported as set/unset only.
pub fn render(cfg: &EnvConfig) -> String {
    let format = match cfg.log.format {
        LogFormat::Json => "json",
        LogFormat::Pretty => "pretty",
    };
    let token = match std::env::var(TOKEN_ENV_VAR) {
        Ok(v) if !v.trim().is_empty() => "<set>",
        _ => "<unset>",
    };
    let lines = [
        format!("LM_MODELS_DIR={}", cfg.models_dir.display()),
        format!("LM_HOST={}", cfg.host),
        format!("LM_PORT={}", cfg.port),
        format!("LM_GPU_LAYERS={}", cfg.acceleration.gpu_layers),
        format!("LM_THREADS={}", cfg.acceleration.thread_count),
        format!("LM_N_CTX={}", cfg.acceleration.n_ctx),
        format!("LM_LOAD_TIMEOUT={}", cfg.load_timeout.as_secs()),
        format!("LM_DEFAULT_MAX_TOKENS={}", cfg.default_max_tokens),
        format!("LM_SHUTDOWN_TIMEOUT={}", cfg.shutdown_timeout.as_secs()),
        format!("LM_PRELOAD_MODEL={}", cfg.preload_model.as_deref().unwrap_or("")),
        format!("LM_LOG_FORMAT={}", format),
        format!("LM_LOG={}", cfg.log.level),
        format!("{}={}", TOKEN_ENV_VAR, token),
    ];
    let mut out = lines.join("\n");
    out.push('\n');
    out
}
