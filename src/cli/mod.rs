// Copyright 2024-2026 lm-runtime Contributors
// SPDX-License-Identifier: Apache-2.0

//! Command-line interface.
//!
//! ## Usage
//!
//! ```bash
//! lm-runtime serve --port 8000 --model tiny
//! lm-runtime download --repo-id TheBloke/Llama-2-7B-GGUF --filename llama.Q4_K_M.gguf --model-name llama
//! lm-runtime models list
//! lm-runtime config show
//! ```
//!
//! Every command reads `LM_*` environment variables (and `.env`) first;
//! flags override them.

pub mod config_cmd;
pub mod download_cmd;
pub mod models_cmd;
pub mod serve;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::EnvConfig;

/// Single-model LLM inference service
#[derive(Debug, Parser)]
#[command(name = "lm-runtime")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP server (default)
    Serve(ServeArgs),

    /// Fetch a model file from the Hugging Face Hub into the store
    Download(DownloadArgs),

    /// Inspect the artifact store
    #[command(subcommand)]
    Models(ModelsCommand),

    /// Inspect effective configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Debug, Clone, Default, Args)]
pub struct ServeArgs {
    /// Artifact store root
    #[arg(long)]
    pub models_dir: Option<PathBuf>,

    #[arg(long)]
    pub host: Option<String>,

    #[arg(long)]
    pub port: Option<u16>,

    /// Layers offloaded to the accelerator
    #[arg(long)]
    pub gpu_layers: Option<u32>,

    /// CPU inference threads
    #[arg(long)]
    pub threads: Option<u32>,

    /// Model to load before accepting traffic
    #[arg(long)]
    pub model: Option<String>,
}

impl ServeArgs {
    /// Overlay the flags that were given onto `env`.
    pub fn apply(&self, env: &mut EnvConfig) {
        if let Some(dir) = &self.models_dir {
            env.models_dir = dir.clone();
        }
        if let Some(host) = &self.host {
            env.host = host.clone();
        }
        if let Some(port) = self.port {
            env.port = port;
        }
        if let Some(layers) = self.gpu_layers {
            env.acceleration.gpu_layers = layers;
        }
        if let Some(threads) = self.threads {
            env.acceleration.thread_count = threads.max(1);
        }
        if let Some(model) = &self.model {
            env.preload_model = Some(model.clone());
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct DownloadArgs {
    /// Repository id, e.g. `TheBloke/Llama-2-7B-GGUF`
    #[arg(long)]
    pub repo_id: String,

    /// File within the repository
    #[arg(long)]
    pub filename: String,

    /// Name to store the model under
    #[arg(long)]
    pub model_name: String,

    /// Branch, tag or commit
    #[arg(long)]
    pub revision: Option<String>,

    /// Artifact store root
    #[arg(long)]
    pub models_dir: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum ModelsCommand {
    /// List stored model names
    List {
        #[arg(long)]
        models_dir: Option<PathBuf>,
    },
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the effective configuration
    Show,
}
