// Copyright 2024-2026 lm-runtime Contributors
// SPDX-License-Identifier: Apache-2.0

//! `serve`: run the HTTP server until Ctrl+C / SIGTERM.

use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::info;

use super::ServeArgs;
use crate::config::{self, EnvConfig};
use crate::download::{DownloadError, HubFetcher};
use crate::engine;
use crate::models::ModelError;
use crate::shutdown::ShutdownCoordinator;
use crate::telemetry::{self, LogError};
use crate::{Runtime, RuntimeConfig};

#[derive(Debug, Error)]
pub enum ServeError {
    #[error(transparent)]
    Logging(#[from] LogError),

    #[error("Failed to open model store: {0}")]
    Store(#[from] ModelError),

    #[error("Failed to build hub client: {0}")]
    Fetcher(#[from] DownloadError),

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Server(#[source] std::io::Error),
}

/// Run the server. Returns once shutdown has completed and the model is closed.
pub async fn run(args: &ServeArgs) -> Result<(), ServeError> {
    let mut env = config::load_with_dotenv();
    args.apply(&mut env);
    telemetry::init_logging(&env.log)?;

    serve(env).await
}

async fn serve(env: EnvConfig) -> Result<(), ServeError> {
    let fetcher = Arc::new(HubFetcher::new()?);
    let runtime = Runtime::new(RuntimeConfig::from(&env), engine::default_loader(), fetcher)?;
    info!(
        models_dir = %runtime.store.root().display(),
        gpu_layers = env.acceleration.gpu_layers,
        threads = env.acceleration.thread_count,
        "runtime initialized"
    );

    if let Some(name) = &env.preload_model {
        runtime.preload(name).await;
    }

    let addr = env.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|source| ServeError::Bind { addr: addr.clone(), source })?;
    info!(addr = %addr, "listening");

    axum::serve(listener, runtime.router())
        .with_graceful_shutdown(drain_on_signal(runtime.shutdown.clone(), env.shutdown_timeout))
        .await
        .map_err(ServeError::Server)?;

    if let Some(model) = runtime.manager.shutdown().await {
        info!(model = %model, "model closed at shutdown");
    }
    info!("server shutdown complete");
    Ok(())
}

/// Resolve on the first shutdown signal after in-flight requests drain.
async fn drain_on_signal(shutdown: ShutdownCoordinator, timeout: std::time::Duration) {
    wait_for_signal().await;
    shutdown.drain(timeout).await;
}

async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, initiating graceful shutdown"),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown"),
    }
}
