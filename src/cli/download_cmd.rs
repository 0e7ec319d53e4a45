// Copyright 2024-2026 lm-runtime Contributors
// SPDX-License-Identifier: Apache-2.0

//! `download`: fetch a model into the store without a running server.
//!
//! Exit codes: 0 on success, 1 on failure, 2 when the hub credential is
//! not configured.

use std::sync::Arc;

use super::DownloadArgs;
use crate::config;
use crate::download::{download_into_store, DownloadError, DownloadRequest, HubFetcher, ModelFetcher};
use crate::engine::MockLoader;
use crate::models::{ArtifactStore, LifecycleManager, ManagerConfig};

pub const EXIT_MISSING_CREDENTIAL: i32 = 2;

pub async fn run(args: &DownloadArgs) -> i32 {
    let mut env = config::load_with_dotenv();
    if let Some(dir) = &args.models_dir {
        env.models_dir = dir.clone();
    }
    let fetcher = match HubFetcher::new() {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    match fetch(&fetcher, args, &env.models_dir).await {
        Ok(path) => {
            println!("Model '{}' stored at {}", args.model_name, path.display());
            0
        }
        Err(e) => report(&e),
    }
}

/// Fetch through a manager that never loads; only its store side is used.
pub async fn fetch(
    fetcher: &dyn ModelFetcher,
    args: &DownloadArgs,
    models_dir: &std::path::Path,
) -> Result<std::path::PathBuf, DownloadError> {
    let store = Arc::new(ArtifactStore::open(models_dir)?);
    let manager = LifecycleManager::new(store, Arc::new(MockLoader::new()), ManagerConfig::default());
    let request = DownloadRequest {
        repo_id: args.repo_id.clone(),
        filename: args.filename.clone(),
        revision: args.revision.clone(),
    };
    download_into_store(fetcher, &manager, &request, &args.model_name).await
}

fn report(err: &DownloadError) -> i32 {
    eprintln!("Error: {}", err);
    match err {
        DownloadError::MissingCredential(var) => {
            eprintln!("Set {} to a Hugging Face access token and retry.", var);
            EXIT_MISSING_CREDENTIAL
        }
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_credential_exit_code() {
        let err = DownloadError::MissingCredential("HUGGINGFACE_HUB_TOKEN".into());
        assert_eq!(report(&err), EXIT_MISSING_CREDENTIAL);
        assert_eq!(report(&DownloadError::InvalidRequest("x".into())), 1);
    }
}
