//! API request/response types

mod error;
mod json;
mod models;

pub use error::{ApiError, ApiErrorDetail, ApiErrorResponse, ApiErrorType};
pub use json::Json;
pub use models::{
    CompletionRequest, CompletionResponse, DownloadModelRequest, LoadModelRequest, MessageResponse,
    ModelsResponse,
};
