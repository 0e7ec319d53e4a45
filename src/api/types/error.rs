//! HTTP error body and the mapping from domain errors to status codes.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::download::DownloadError;
use crate::engine::{InferenceError, LoadError};
use crate::models::ModelError;

/// Error categories surfaced in the `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiErrorType {
    InvalidRequestError,
    NotFoundError,
    ConflictError,
    ModelNotLoaded,
    ServerError,
    ServiceUnavailableError,
}

impl std::fmt::Display for ApiErrorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidRequestError => write!(f, "invalid_request_error"),
            Self::NotFoundError => write!(f, "not_found_error"),
            Self::ConflictError => write!(f, "conflict_error"),
            Self::ModelNotLoaded => write!(f, "model_not_loaded"),
            Self::ServerError => write!(f, "server_error"),
            Self::ServiceUnavailableError => write!(f, "service_unavailable_error"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub message: String,
    #[serde(rename = "type")]
    pub error_type: ApiErrorType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// API error with status code
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub response: ApiErrorResponse,
}

impl ApiError {
    pub fn new(status: StatusCode, error_type: ApiErrorType, message: impl Into<String>) -> Self {
        Self {
            status,
            response: ApiErrorResponse {
                error: ApiErrorDetail {
                    message: message.into(),
                    error_type,
                    code: None,
                },
            },
        }
    }

    /// Attach a machine-readable code.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.response.error.code = Some(code.into());
        self
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, ApiErrorType::InvalidRequestError, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, ApiErrorType::NotFoundError, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, ApiErrorType::ConflictError, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, ApiErrorType::ServerError, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            ApiErrorType::ServiceUnavailableError,
            message,
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.response)).into_response()
    }
}

impl From<ModelError> for ApiError {
    fn from(err: ModelError) -> Self {
        let code = err.category();
        let api = match &err {
            ModelError::NotFound(_) => Self::not_found(err.to_string()),
            ModelError::InvalidName(_) | ModelError::UnrecognizedFile(_) => {
                Self::bad_request(err.to_string())
            }
            ModelError::Inference(InferenceError::InputValidation(msg)) => Self::bad_request(msg.clone()),
            // A load that names a missing file is still a lookup failure.
            ModelError::Load(LoadError::FileMissing(_)) => Self::not_found(err.to_string()),
            ModelError::NotReady { .. } => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiErrorType::ModelNotLoaded,
                err.to_string(),
            ),
            ModelError::TransitionInProgress => Self::conflict(err.to_string()),
            ModelError::Io(_) | ModelError::Load(_) | ModelError::Inference(_) => {
                Self::internal(err.to_string())
            }
        };
        api.with_code(code)
    }
}

impl From<DownloadError> for ApiError {
    fn from(err: DownloadError) -> Self {
        match err {
            DownloadError::Store(inner) => inner.into(),
            DownloadError::InvalidRequest(msg) => Self::bad_request(msg).with_code("invalid_request"),
            DownloadError::MissingCredential(_) => {
                Self::internal(err.to_string()).with_code("missing_credential")
            }
            DownloadError::Status { status: 404, .. } => {
                Self::not_found(err.to_string()).with_code("remote_not_found")
            }
            other => Self::internal(other.to_string()).with_code("download_failed"),
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {}",
            self.response.error.error_type, self.response.error.message
        )
    }
}

impl std::error::Error for ApiError {}
