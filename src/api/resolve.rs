//! Error resolution endpoints
//!
//! - `POST /api/resolve-error`: analyze one error record
//! - `POST /api/resolve-batch`: analyze several, each in isolation

use super::error::ApiError;
use alembic_core::{BatchResolution, ErrorRecord, Resolution, ValidationResolver};
use axum::extract::rejection::JsonRejection;
use axum::extract::Extension;
use axum::response::Json;
use axum::routing::post;
use axum::Router;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::instrument;

/// Batch request body
#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    #[serde(default)]
    pub errors: Vec<Value>,
}

/// Create resolution routes
pub fn resolve_routes() -> Router {
    Router::new()
        .route("/api/resolve-error", post(resolve_error))
        .route("/api/resolve-batch", post(resolve_batch))
}

/// Resolve a single error record
#[instrument(skip_all)]
pub async fn resolve_error(
    Extension(resolver): Extension<Arc<ValidationResolver>>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Resolution>, ApiError> {
    let Json(body) = body?;
    let record = ErrorRecord::from_value(body)?;

    // A panic inside the engine becomes a 500 rather than a dropped connection.
    let resolution = tokio::spawn(async move { resolver.resolve(record).await })
        .await
        .map_err(|e| ApiError::Internal(format!("resolution task failed: {e}")))?;
    Ok(Json(resolution))
}

/// Resolve a batch of error records
#[instrument(skip_all)]
pub async fn resolve_batch(
    Extension(resolver): Extension<Arc<ValidationResolver>>,
    body: Result<Json<BatchRequest>, JsonRejection>,
) -> Result<Json<BatchResolution>, ApiError> {
    let Json(request) = body?;
    if request.errors.is_empty() {
        return Err(ApiError::BadRequest("No errors provided".to_string()));
    }
    Ok(Json(resolver.resolve_batch(request.errors).await))
}
