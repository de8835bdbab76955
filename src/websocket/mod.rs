//! WebSocket module for Alembic
//!
//! Provides the live channel at `/ws`: error analysis and progressive
//! suggestion delivery.

pub mod protocol;
pub mod session;

pub use session::{ws_handler, StreamSettings};

use axum::{routing::get, Router};

/// Create the WebSocket router
pub fn websocket_router() -> Router {
    Router::new().route("/ws", get(ws_handler))
}
