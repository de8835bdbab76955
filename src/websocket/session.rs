//! WebSocket session handler
//!
//! One task per connection multiplexes client frames and messages produced
//! by spawned work. Suggestion streams run as child tasks holding a child
//! of the session's cancellation token; closing the socket cancels them.

use super::protocol::{ClientMessage, ServerMessage};
use alembic_core::{ErrorRecord, ValidationResolver};
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::Extension;
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use uuid::Uuid;

/// Pacing for progressive delivery
#[derive(Debug, Clone, Copy)]
pub struct StreamSettings {
    pub progressive_delay: Duration,
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Extension(resolver): Extension<Arc<ValidationResolver>>,
    Extension(settings): Extension<StreamSettings>,
    Extension(shutdown): Extension<CancellationToken>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, resolver, settings, shutdown))
}

async fn handle_socket(
    socket: WebSocket,
    resolver: Arc<ValidationResolver>,
    settings: StreamSettings,
    shutdown: CancellationToken,
) {
    let session_id = Uuid::new_v4();
    let session_token = shutdown.child_token();
    info!(%session_id, "WebSocket connection established");

    let (mut sender, mut receiver) = socket.split();
    if let Ok(json) = serde_json::to_string(&ServerMessage::connected(session_id)) {
        let _ = sender.send(Message::Text(json)).await;
    }

    let (tx, mut internal_rx) = tokio::sync::mpsc::unbounded_channel::<ServerMessage>();

    loop {
        tokio::select! {
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        debug!(%session_id, "Received message");
                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(client_msg) => handle_client_message(
                                client_msg,
                                &resolver,
                                settings,
                                &session_token,
                                &tx,
                            ),
                            Err(e) => {
                                let _ = tx.send(ServerMessage::error(format!("Invalid message format: {e}")));
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(Message::Ping(data))) => {
                        let _ = sender.send(Message::Pong(data)).await;
                    }
                    Some(Err(e)) => {
                        error!(%session_id, "WebSocket error: {}", e);
                        break;
                    }
                    _ => {}
                }
            }
            server_msg = internal_rx.recv() => {
                let Some(msg) = server_msg else { break };
                if let Ok(json) = serde_json::to_string(&msg) {
                    if sender.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
            }
            _ = session_token.cancelled() => break,
        }
    }

    session_token.cancel();
    info!(%session_id, "WebSocket connection closed");
}

fn handle_client_message(
    msg: ClientMessage,
    resolver: &Arc<ValidationResolver>,
    settings: StreamSettings,
    session_token: &CancellationToken,
    tx: &UnboundedSender<ServerMessage>,
) {
    match msg {
        ClientMessage::AnalyzeError { error } => {
            let resolver = resolver.clone();
            let reply = tx.clone();
            spawn_reported(
                "analyze_error",
                async move {
                    let _ = reply.send(analyze(&resolver, error).await);
                },
                tx.clone(),
            );
        }
        ClientMessage::RequestSuggestions { error } => {
            let record = match ErrorRecord::from_value(error) {
                Ok(record) => record,
                Err(e) => {
                    let _ = tx.send(ServerMessage::error(e.to_string()));
                    return;
                }
            };
            spawn_reported(
                "request_suggestions",
                stream_suggestions(
                    resolver.clone(),
                    record,
                    settings.progressive_delay,
                    session_token.child_token(),
                    tx.clone(),
                ),
                tx.clone(),
            );
        }
        ClientMessage::Ping => {
            let _ = tx.send(ServerMessage::Pong);
        }
    }
}

/// Run `work` in its own task. A panic is sent to the client as an
/// `error` event instead of dropping the request silently.
pub(crate) fn spawn_reported<F>(
    request: &'static str,
    work: F,
    tx: UnboundedSender<ServerMessage>,
) -> JoinHandle<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = tokio::spawn(work).await {
            error!(request, "WebSocket task failed: {}", e);
            let _ = tx.send(ServerMessage::error(format!("{request} failed: internal error")));
        }
    })
}

/// `analyze_error`: the same resolution `/api/resolve-error` returns
pub(crate) async fn analyze(resolver: &ValidationResolver, error: Value) -> ServerMessage {
    match ErrorRecord::from_value(error) {
        Ok(record) => {
            let resolution = resolver.resolve(record).await;
            ServerMessage::ErrorAnalysis {
                error_id: resolution.error_id,
                analysis: resolution.analysis,
                suggestions: resolution.suggestions,
                confidence: resolution.confidence,
            }
        }
        Err(e) => ServerMessage::error(e.to_string()),
    }
}

/// Send one `suggestion_update` per ranked candidate, pausing `delay`
/// between them. Stops when `token` is cancelled or the receiver is gone.
pub(crate) async fn stream_suggestions(
    resolver: Arc<ValidationResolver>,
    record: ErrorRecord,
    delay: Duration,
    token: CancellationToken,
    tx: UnboundedSender<ServerMessage>,
) {
    let stream = resolver.progressive(&record).await;
    let total = stream.total();
    debug!(error_id = %stream.analysis().error_id, total, "Streaming suggestions");

    for update in stream {
        if update.index > 0 && !delay.is_zero() {
            tokio::select! {
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
        }
        if token.is_cancelled() {
            return;
        }
        let msg = ServerMessage::SuggestionUpdate {
            index: update.index,
            suggestion: update.suggestion,
            total: update.total,
        };
        if tx.send(msg).is_err() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alembic_core::{EngineConfig, EngineContext};
    use serde_json::json;

    fn resolver() -> Arc<ValidationResolver> {
        Arc::new(ValidationResolver::new(Arc::new(
            EngineContext::with_defaults(EngineConfig::default()),
        )))
    }

    async fn rating_resolver() -> Arc<ValidationResolver> {
        let resolver = resolver();
        resolver
            .update_patterns(&json!({"out_of_range": {"Rating": ["1", "2", "3"]}}))
            .await
            .unwrap();
        resolver
    }

    #[tokio::test]
    async fn test_stream_emits_ordered_updates() {
        let resolver = rating_resolver().await;
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let record = ErrorRecord::new("out_of_range", vec!["Rating".into()], "7");

        stream_suggestions(
            resolver,
            record,
            Duration::from_millis(1),
            CancellationToken::new(),
            tx,
        )
        .await;

        let mut indices = Vec::new();
        while let Some(msg) = rx.recv().await {
            match msg {
                ServerMessage::SuggestionUpdate { index, total, .. } => {
                    assert_eq!(total, 3);
                    indices.push(index);
                }
                other => panic!("unexpected message: {other:?}"),
            }
        }
        assert_eq!(indices, [0, 1, 2]);
    }

    #[tokio::test]
    async fn test_stream_stops_when_cancelled() {
        let resolver = rating_resolver().await;
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let token = CancellationToken::new();
        let record = ErrorRecord::new("out_of_range", vec!["Rating".into()], "7");

        let handle = tokio::spawn(stream_suggestions(
            resolver,
            record,
            Duration::from_secs(60),
            token.clone(),
            tx,
        ));

        // First update is sent immediately; the rest wait on the delay.
        assert!(matches!(
            rx.recv().await,
            Some(ServerMessage::SuggestionUpdate { index: 0, .. })
        ));
        token.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_panicking_request_sends_error_event() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let handle = spawn_reported(
            "analyze_error",
            async {
                panic!("engine failure");
            },
            tx,
        );
        handle.await.unwrap();

        match tokio::time::timeout(Duration::from_secs(1), rx.recv()).await {
            Ok(Some(ServerMessage::Error { message })) => {
                assert!(message.contains("analyze_error"));
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_analyze_message_at_identifier_limit_is_answered() {
        let resolver = resolver();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let token = CancellationToken::new();
        let settings = StreamSettings {
            progressive_delay: Duration::ZERO,
        };

        handle_client_message(
            ClientMessage::AnalyzeError {
                error: json!({
                    "error_type": "duplicate_ids",
                    "affected_columns": ["TaskID"],
                    "current_value": "T18446744073709551615",
                    "known_ids": ["T18446744073709551615"]
                }),
            },
            &resolver,
            settings,
            &token,
            &tx,
        );

        let msg = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap();
        assert!(matches!(msg, Some(ServerMessage::ErrorAnalysis { .. })));
    }

    #[tokio::test]
    async fn test_analyze_reports_bad_records() {
        let resolver = resolver();
        let msg = analyze(&resolver, json!({"error_type": "out_of_range"})).await;
        assert!(matches!(msg, ServerMessage::Error { .. }));

        let msg = analyze(
            &resolver,
            json!({"error_type": "broken_json", "affected_columns": ["Attributes"], "current_value": "{\"a\": 1"}),
        )
        .await;
        match msg {
            ServerMessage::ErrorAnalysis { analysis, suggestions, .. } => {
                assert_eq!(analysis.error_kind, alembic_core::ErrorKind::BrokenStructuredField);
                assert!(!suggestions.is_empty());
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }
}
