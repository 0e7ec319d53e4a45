//! Request tracking for graceful shutdown.

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::types::ApiError;
use crate::shutdown::ShutdownCoordinator;

/// Hold a `RequestGuard` for the lifetime of the request; reject with 503
/// once the server is draining.
pub async fn track_requests(
    State(shutdown): State<ShutdownCoordinator>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let Some(_guard) = shutdown.track() else {
        return ApiError::unavailable("server is shutting down")
            .with_code("draining")
            .into_response();
    };
    next.run(request).await
}
