use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use super::handlers;
use super::health;
use super::middleware::track_requests;
use super::state::AppState;

/// Build the service router.
pub fn create_router(state: AppState) -> Router {
    let models = Router::new()
        .route("/download_model", post(handlers::download_model))
        .route("/models", get(handlers::list_models))
        .route("/load_model", post(handlers::load_model))
        .route("/unload_model", post(handlers::unload_model))
        .route("/completion", post(handlers::completion))
        .route_layer(middleware::from_fn_with_state(
            state.shutdown.clone(),
            track_requests,
        ));

    Router::new()
        .route("/health", get(health::health_check))
        .route("/status", get(health::status))
        .merge(models)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
