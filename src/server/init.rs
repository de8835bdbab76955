//! Server initialization
//!
//! Contains the main `run()` function that starts the HTTP and WebSocket
//! server.

use super::config::AppConfig;
use super::shutdown::shutdown_signal;
use crate::api::api_router;
use crate::websocket::{websocket_router, StreamSettings};
use alembic_core::{EngineContext, ErrorClassifier, ValidationResolver};
use anyhow::{Context, Result};
use axum::http::{header, HeaderValue, Method};
use axum::{routing::get, Extension, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

/// Build the engine from configuration; missing model files fall back to
/// the built-in patterns and rule-based classification.
pub async fn build_resolver(config: &AppConfig) -> Arc<ValidationResolver> {
    let context = EngineContext::bootstrap(config.engine.clone(), &config.models).await;
    info!(
        classifier = ?context.classifier.strategy(),
        "Engine context ready"
    );
    Arc::new(ValidationResolver::new(Arc::new(context)))
}

/// CORS restricted to the configured front-end origins
pub fn cors_layer(origins: &[String]) -> Result<CorsLayer> {
    let origins = origins
        .iter()
        .map(|o| HeaderValue::from_str(o).with_context(|| format!("Invalid CORS origin: {o}")))
        .collect::<Result<Vec<_>>>()?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]))
}

/// Assemble the application router
pub fn build_router(
    resolver: Arc<ValidationResolver>,
    config: &AppConfig,
    shutdown: CancellationToken,
) -> Result<Router> {
    let settings = StreamSettings {
        progressive_delay: Duration::from_millis(config.realtime.progressive_delay_ms),
    };

    Ok(Router::new()
        .route("/", get(|| async { "Alembic validation error resolution service" }))
        .merge(api_router())
        .merge(websocket_router())
        .layer(Extension(resolver))
        .layer(Extension(settings))
        .layer(Extension(shutdown))
        .layer(cors_layer(&config.server.cors_origins)?)
        .layer(TraceLayer::new_for_http()))
}

/// Run the server
pub async fn run(config: AppConfig) -> Result<()> {
    info!("Starting Alembic v{}", env!("CARGO_PKG_VERSION"));

    let resolver = build_resolver(&config).await;
    let shutdown = CancellationToken::new();
    let app = build_router(resolver, &config, shutdown.clone())?;

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("HTTP server listening on http://{}", addr);
    info!("WebSocket endpoint: ws://{}/ws", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await
        .context("HTTP server error")?;

    info!("Alembic shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cors_layer_rejects_bad_origin() {
        assert!(cors_layer(&["http://localhost:3000".to_string()]).is_ok());
        assert!(cors_layer(&["bad\norigin".to_string()]).is_err());
    }

    #[tokio::test]
    async fn test_build_router_with_defaults() {
        let config = AppConfig::default();
        let resolver = build_resolver(&config).await;
        assert!(build_router(resolver, &config, CancellationToken::new()).is_ok());
    }

    #[tokio::test]
    async fn test_router_serves_resolution_and_malformed_bodies() {
        use axum::body::Body;
        use axum::http::{Request, StatusCode};
        use tower::ServiceExt;

        let config = AppConfig::default();
        let resolver = build_resolver(&config).await;
        let app = build_router(resolver, &config, CancellationToken::new()).unwrap();

        let ok = app
            .clone()
            .oneshot(
                Request::post("/api/resolve-error")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        r#"{"error_type":"out_of_range","affected_columns":["PriorityLevel"],"current_value":"9"}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(ok.status(), StatusCode::OK);

        let malformed = app
            .clone()
            .oneshot(
                Request::post("/api/feedback")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(malformed.status(), StatusCode::BAD_REQUEST);

        let health = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(health.status(), StatusCode::OK);
    }
}
