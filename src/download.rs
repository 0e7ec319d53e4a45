//! Hugging Face Hub model fetcher.
//!
//! Downloads a single file from a hub repository into a staging directory
//! inside the store root, then hands it to the lifecycle manager, which
//! moves it into the artifact for the requested model name.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::models::{LifecycleManager, ModelError};

/// Environment variable holding the hub access token.
pub const TOKEN_ENV_VAR: &str = "HUGGINGFACE_HUB_TOKEN";

/// Public hub endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://huggingface.co";

#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("Credential missing: {0} is not set")]
    MissingCredential(String),

    #[error("Invalid download request: {0}")]
    InvalidRequest(String),

    #[error("Transfer failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Hub returned status {status} for {url}")]
    Status { status: u16, url: String },

    #[error("Download incomplete: got {got} bytes, expected {expected}")]
    Incomplete { got: u64, expected: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Store(#[from] ModelError),
}

/// Which file to fetch from which repository.
#[derive(Debug, Clone, Deserialize)]
pub struct DownloadRequest {
    /// Repository id, e.g. `TheBloke/Llama-2-7B-Chat-GGUF`.
    pub repo_id: String,
    /// File within the repository, e.g. `llama-2-7b-chat.Q4_K_M.gguf`.
    pub filename: String,
    /// Branch, tag or commit. Defaults to `main`.
    #[serde(default)]
    pub revision: Option<String>,
}

impl DownloadRequest {
    pub fn validate(&self) -> Result<(), DownloadError> {
        let repo_ok = self
            .repo_id
            .split('/')
            .filter(|p| !p.is_empty())
            .count()
            == 2
            && !self.repo_id.contains("..");
        if !repo_ok {
            return Err(DownloadError::InvalidRequest(format!(
                "repo_id '{}' must look like 'owner/name'",
                self.repo_id
            )));
        }
        if self.filename.trim().is_empty() || self.filename.split('/').any(|p| p == "..") {
            return Err(DownloadError::InvalidRequest(format!(
                "filename '{}' is not a valid repository path",
                self.filename
            )));
        }
        Ok(())
    }

    pub fn revision(&self) -> &str {
        self.revision.as_deref().filter(|r| !r.is_empty()).unwrap_or("main")
    }

    /// File name the download is stored under (last path segment).
    pub fn local_file_name(&self) -> &str {
        self.filename.rsplit('/').next().unwrap_or(&self.filename)
    }
}

/// Retrieves model files from a remote repository.
#[async_trait]
pub trait ModelFetcher: Send + Sync {
    /// Download `request` into `dest_dir`, returning the written path.
    async fn fetch(&self, request: &DownloadRequest, dest_dir: &Path) -> Result<PathBuf, DownloadError>;
}

/// `ModelFetcher` backed by the Hugging Face Hub HTTP API.
#[derive(Debug, Clone)]
pub struct HubFetcher {
    client: reqwest::Client,
    endpoint: String,
    token_var: String,
}

impl HubFetcher {
    pub fn new() -> Result<Self, DownloadError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(3600)) // large models take a while
            .user_agent(concat!("lm-runtime/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            token_var: TOKEN_ENV_VAR.to_string(),
        })
    }

    /// Point at a different hub (mirrors, tests).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    /// Read the token from a different environment variable.
    pub fn with_token_var(mut self, var: impl Into<String>) -> Self {
        self.token_var = var.into();
        self
    }

    pub fn download_url(&self, request: &DownloadRequest) -> String {
        format!(
            "{}/{}/resolve/{}/{}",
            self.endpoint,
            request.repo_id,
            request.revision(),
            request.filename
        )
    }

    fn token(&self) -> Result<String, DownloadError> {
        std::env::var(&self.token_var)
            .ok()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| DownloadError::MissingCredential(self.token_var.clone()))
    }
}

#[async_trait]
impl ModelFetcher for HubFetcher {
    async fn fetch(&self, request: &DownloadRequest, dest_dir: &Path) -> Result<PathBuf, DownloadError> {
        request.validate()?;
        let token = self.token()?;
        let url = self.download_url(request);

        tracing::info!(url = %url, "downloading model file");
        let mut response = self.client.get(&url).bearer_auth(token).send().await?;
        if !response.status().is_success() {
            return Err(DownloadError::Status { status: response.status().as_u16(), url });
        }
        let expected = response.content_length();

        let output = dest_dir.join(request.local_file_name());
        let mut file = File::create(&output).await?;
        let mut written: u64 = 0;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        if let Some(expected) = expected {
            if written != expected {
                return Err(DownloadError::Incomplete { got: written, expected });
            }
        }
        tracing::info!(path = %output.display(), bytes = written, "download complete");
        Ok(output)
    }
}

/// Fetch `request` and store it under `model_name`.
///
/// The transfer lands in a hidden temp directory inside the store root so
/// the final move is a same-filesystem rename; the directory is removed on
/// every exit path.
pub async fn download_into_store(
    fetcher: &dyn ModelFetcher,
    manager: &LifecycleManager,
    request: &DownloadRequest,
    model_name: &str,
) -> Result<PathBuf, DownloadError> {
    request.validate()?;
    crate::models::ModelName::parse(model_name)?;

    let root = manager.store().root().to_path_buf();
    tokio::fs::create_dir_all(&root).await?;
    let staging = tempfile::Builder::new().prefix(".download-").tempdir_in(&root)?;

    let fetched = fetcher.fetch(request, staging.path()).await?;
    let stored = manager.request_download(fetched, model_name).await?;
    Ok(stored)
}
