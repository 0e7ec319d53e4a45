//! Health and status endpoints

use axum::{extract::State, http::StatusCode, response::IntoResponse};

use super::state::AppState;
use super::types::Json;
use crate::health::HealthState;
use crate::models::ManagerStatus;

/// GET /health
///
/// 200 while the process is serving, 503 once it is draining.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let report = state.health.report(
        state.shutdown.state(),
        state.manager.status(),
        state.shutdown.in_flight_count(),
    );
    let status = match report.state {
        HealthState::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        HealthState::Healthy | HealthState::Degraded => StatusCode::OK,
    };
    (status, Json(report))
}

/// GET /status
pub async fn status(State(state): State<AppState>) -> Json<ManagerStatus> {
    Json(state.manager.status())
}
