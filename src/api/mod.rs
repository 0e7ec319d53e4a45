//! HTTP surface.
//!
//! Thin axum handlers over the lifecycle manager. Every error leaves
//! through [`ApiError`](types::ApiError) as `{"error": {"message", "type"}}`.

mod handlers;
mod health;
mod middleware;
pub mod router;
pub mod state;
pub mod types;

pub use router::create_router;
pub use state::AppState;
pub use types::ApiError;
