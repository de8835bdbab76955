//! Feedback endpoint

use super::error::ApiError;
use alembic_core::{FeedbackRecord, ValidationResolver};
use axum::extract::rejection::JsonRejection;
use axum::extract::Extension;
use axum::response::Json;
use axum::routing::post;
use axum::Router;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// Feedback acknowledgement
#[derive(Debug, Serialize)]
pub struct FeedbackResponse {
    pub status: &'static str,
    pub message: String,
    /// False when the same feedback was already recorded
    pub recorded: bool,
}

/// Create feedback routes
pub fn feedback_routes() -> Router {
    Router::new().route("/api/feedback", post(submit_feedback))
}

/// Record whether a suggestion helped
pub async fn submit_feedback(
    Extension(resolver): Extension<Arc<ValidationResolver>>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<FeedbackResponse>, ApiError> {
    let Json(body) = body?;
    let feedback = FeedbackRecord::from_value(&body)?;
    let outcome = resolver.submit_feedback(feedback).await?;

    let message = if outcome.recorded {
        "Feedback recorded successfully".to_string()
    } else {
        "Feedback already recorded".to_string()
    };
    Ok(Json(FeedbackResponse {
        status: "success",
        message,
        recorded: outcome.recorded,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::{body_json, resolver};
    use alembic_core::ErrorRecord;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use serde_json::json;

    #[tokio::test]
    async fn test_feedback_roundtrip_and_duplicate() {
        let resolver = resolver();
        let resolution = resolver
            .resolve(ErrorRecord::new(
                "out_of_range",
                vec!["PriorityLevel".into()],
                "9",
            ))
            .await;

        let body = json!({
            "error_id": resolution.error_id,
            "suggestion_used": "5",
            "was_helpful": true
        });
        let first = submit_feedback(Extension(resolver.clone()), Ok(Json(body.clone())))
            .await
            .unwrap();
        assert!(first.0.recorded);
        assert_eq!(first.0.status, "success");

        let second = submit_feedback(Extension(resolver), Ok(Json(body)))
            .await
            .unwrap();
        assert!(!second.0.recorded);
    }

    #[tokio::test]
    async fn test_feedback_missing_fields() {
        let err = submit_feedback(
            Extension(resolver()),
            Ok(Json(json!({"error_id": "err_1"}))),
        )
        .await
        .unwrap_err();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(
            body["required"],
            json!(["error_id", "suggestion_used", "was_helpful"])
        );
    }

    #[tokio::test]
    async fn test_feedback_unknown_error_id() {
        let err = submit_feedback(
            Extension(resolver()),
            Ok(Json(json!({
                "error_id": "err_20240101000000_000000000000",
                "suggestion_used": 0,
                "was_helpful": false
            }))),
        )
        .await
        .unwrap_err();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert!(body["message"].as_str().unwrap().contains("err_2024"));
    }
}
