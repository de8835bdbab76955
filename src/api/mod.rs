//! Web API module for Alembic
//!
//! Provides REST API endpoints for:
//! - Error resolution (single and batch)
//! - Feedback on applied suggestions
//! - Pattern statistics and updates
//! - Health checks

pub mod error;
pub mod feedback;
pub mod health;
pub mod patterns;
pub mod resolve;

use axum::Router;

pub use error::ApiError;
pub use feedback::feedback_routes;
pub use health::health_routes;
pub use patterns::patterns_routes;
pub use resolve::resolve_routes;

/// Create the API router with all endpoints
pub fn api_router() -> Router {
    Router::new()
        .merge(health_routes())
        .merge(resolve_routes())
        .merge(feedback_routes())
        .merge(patterns_routes())
}
