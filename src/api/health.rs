//! Health check endpoint (`/health`, for load balancers)

use axum::response::Json;
use axum::routing::get;
use axum::Router;
use chrono::Utc;
use serde::Serialize;

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
    pub service: &'static str,
    pub version: &'static str,
}

/// Create health routes
pub fn health_routes() -> Router {
    Router::new().route("/health", get(health_check))
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        timestamp: Utc::now().to_rfc3339(),
        service: "alembic",
        version: env!("CARGO_PKG_VERSION"),
    })
}
