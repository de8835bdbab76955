//! Pattern store endpoints
//!
//! - `GET /api/patterns`: per-kind statistics
//! - `POST /api/update-patterns`: merge an administrative pattern document

use super::error::ApiError;
use alembic_core::{ErrorKind, KindStatistics, UpdateReport, ValidationResolver};
use axum::extract::rejection::JsonRejection;
use axum::extract::Extension;
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

/// Update acknowledgement
#[derive(Debug, Serialize)]
pub struct UpdateResponse {
    pub status: &'static str,
    pub message: String,
    pub report: UpdateReport,
}

/// Create pattern routes
pub fn patterns_routes() -> Router {
    Router::new()
        .route("/api/patterns", get(pattern_statistics))
        .route("/api/update-patterns", post(update_patterns))
}

/// Statistics per error kind
pub async fn pattern_statistics(
    Extension(resolver): Extension<Arc<ValidationResolver>>,
) -> Json<BTreeMap<ErrorKind, KindStatistics>> {
    Json(resolver.statistics().await)
}

/// Merge new patterns; the whole document is rejected if any part is malformed
pub async fn update_patterns(
    Extension(resolver): Extension<Arc<ValidationResolver>>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<UpdateResponse>, ApiError> {
    let Json(document) = body?;
    let report = resolver.update_patterns(&document).await?;
    info!(
        inserted = report.inserted,
        replaced = report.replaced,
        "Patterns updated via API"
    );
    Ok(Json(UpdateResponse {
        status: "success",
        message: "Patterns updated successfully".to_string(),
        report,
    }))
}
