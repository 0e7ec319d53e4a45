//! Model endpoint handlers

use axum::extract::State;
use tracing::{debug, info};

use super::state::AppState;
use super::types::{
    ApiError, CompletionRequest, CompletionResponse, DownloadModelRequest, Json, LoadModelRequest,
    MessageResponse, ModelsResponse,
};
use crate::download::download_into_store;

/// POST /download_model
pub async fn download_model(
    State(state): State<AppState>,
    Json(req): Json<DownloadModelRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    info!(repo_id = %req.repo_id, filename = %req.filename, model = %req.model_name, "download requested");

    download_into_store(state.fetcher.as_ref(), &state.manager, &req.to_download(), &req.model_name).await?;

    Ok(Json(MessageResponse::new(format!(
        "Model '{}' downloaded successfully",
        req.model_name
    ))))
}

/// GET /models
pub async fn list_models(State(state): State<AppState>) -> Result<Json<ModelsResponse>, ApiError> {
    debug!("Listing stored models");
    let models = state.manager.request_list().await?;
    Ok(Json(ModelsResponse {
        models: models.into_iter().collect(),
    }))
}

/// POST /load_model
pub async fn load_model(
    State(state): State<AppState>,
    Json(req): Json<LoadModelRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let report = state.manager.request_load(&req.model_name).await?;
    Ok(Json(MessageResponse::new(format!(
        "Model '{}' loaded successfully",
        report.model
    ))))
}

/// POST /unload_model
pub async fn unload_model(State(state): State<AppState>) -> Result<Json<MessageResponse>, ApiError> {
    let message = match state.manager.request_unload().await? {
        Some(model) => format!("Model '{}' unloaded", model),
        None => "No model loaded".to_string(),
    };
    Ok(Json(MessageResponse::new(message)))
}

/// POST /completion
pub async fn completion(
    State(state): State<AppState>,
    Json(req): Json<CompletionRequest>,
) -> Result<Json<CompletionResponse>, ApiError> {
    let max_tokens = req.max_tokens.unwrap_or(state.default_max_tokens);
    debug!(prompt_len = req.prompt.len(), max_tokens, "completion requested");

    let completion = state.manager.request_completion(&req.prompt, max_tokens).await?;
    Ok(Json(CompletionResponse {
        completion: completion.text,
    }))
}
