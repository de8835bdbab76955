//! JSON error responses

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use tracing::error;

/// Error returned by API handlers
#[derive(Debug)]
pub enum ApiError {
    /// 400 with the list of required fields
    MissingFields {
        missing: Vec<String>,
        required: Vec<String>,
    },
    /// 400
    BadRequest(String),
    /// 404
    NotFound(String),
    /// 500
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingFields { .. } | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<alembic_core::Error> for ApiError {
    fn from(e: alembic_core::Error) -> Self {
        match e {
            alembic_core::Error::MissingFields { missing, required } => {
                Self::MissingFields { missing, required }
            }
            alembic_core::Error::NotFound(message) => Self::NotFound(message),
            e if e.is_client_error() => Self::BadRequest(e.to_string()),
            e => Self::Internal(e.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            Self::MissingFields { missing, required } => json!({
                "error": format!("Missing required fields: {}", missing.join(", ")),
                "required": required,
            }),
            Self::BadRequest(message) => json!({ "error": message }),
            Self::NotFound(message) => json!({
                "error": "Not found",
                "message": message,
            }),
            Self::Internal(message) => {
                error!(error = %message, "Request failed");
                json!({
                    "error": "Internal server error",
                    "message": message,
                })
            }
        };
        (status, Json(body)).into_response()
    }
}
