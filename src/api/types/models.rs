//! Request and response bodies for the model endpoints.

use serde::{Deserialize, Serialize};

use crate::download::DownloadRequest;
use crate::models::ModelName;

/// `POST /download_model`
#[derive(Debug, Clone, Deserialize)]
pub struct DownloadModelRequest {
    pub repo_id: String,
    pub filename: String,
    pub model_name: String,
    #[serde(default)]
    pub revision: Option<String>,
}

impl DownloadModelRequest {
    pub fn to_download(&self) -> DownloadRequest {
        DownloadRequest {
            repo_id: self.repo_id.clone(),
            filename: self.filename.clone(),
            revision: self.revision.clone(),
        }
    }
}

/// `POST /load_model`
#[derive(Debug, Clone, Deserialize)]
pub struct LoadModelRequest {
    pub model_name: String,
}

/// `POST /completion`
#[derive(Debug, Clone, Deserialize)]
pub struct CompletionRequest {
    pub prompt: String,
    /// Falls back to the server default when omitted.
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

/// `GET /models`
#[derive(Debug, Clone, Serialize)]
pub struct ModelsResponse {
    pub models: Vec<ModelName>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub completion: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completion_request_max_tokens_optional() {
        let req: CompletionRequest = serde_json::from_str(r#"{"prompt": "Hello"}"#).unwrap();
        assert_eq!(req.prompt, "Hello");
        assert!(req.max_tokens.is_none());

        let req: CompletionRequest =
            serde_json::from_str(r#"{"prompt": "Hello", "max_tokens": 16}"#).unwrap();
        assert_eq!(req.max_tokens, Some(16));
    }

    #[test]
    fn test_download_request_carries_revision() {
        let req: DownloadModelRequest = serde_json::from_str(
            r#"{"repo_id": "a/b", "filename": "m.gguf", "model_name": "m", "revision": "v2"}"#,
        )
        .unwrap();
        let download = req.to_download();
        assert_eq!(download.revision(), "v2");
        assert_eq!(download.filename, "m.gguf");
    }

    #[test]
    fn test_models_response_shape() {
        let body = ModelsResponse {
            models: vec![ModelName::parse("small").unwrap(), ModelName::parse("tiny").unwrap()],
        };
        assert_eq!(
            serde_json::to_string(&body).unwrap(),
            r#"{"models":["small","tiny"]}"#
        );
    }
}
