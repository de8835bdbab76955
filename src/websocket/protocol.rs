//! Live-channel message types
//!
//! Every frame is a JSON object tagged by `type`:
//!
//! ```text
//! -> {"type": "analyze_error", "error": {...}}
//! <- {"type": "error_analysis", "error_id": "...", "analysis": {...}, ...}
//! -> {"type": "request_suggestions", "error": {...}}
//! <- {"type": "suggestion_update", "index": 0, "suggestion": {...}, "total": 3}
//! ```

use alembic_core::{Analysis, Suggestion};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Message from client
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Analyze one error record
    AnalyzeError { error: Value },
    /// Stream suggestions for one error record
    RequestSuggestions { error: Value },
    /// Keepalive
    Ping,
}

/// Message to client
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Connection established
    Connected { status: &'static str, session_id: Uuid },
    /// Result of `analyze_error`
    ErrorAnalysis {
        error_id: String,
        analysis: Analysis,
        suggestions: Vec<Suggestion>,
        confidence: f64,
    },
    /// One element of a suggestion stream
    SuggestionUpdate {
        index: usize,
        suggestion: Suggestion,
        total: usize,
    },
    /// Request failed
    Error { message: String },
    /// Keepalive response
    Pong,
}

impl ServerMessage {
    pub fn connected(session_id: Uuid) -> Self {
        Self::Connected {
            status: "connected",
            session_id,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_client_message_parse() {
        let msg: ClientMessage = serde_json::from_value(json!({
            "type": "request_suggestions",
            "error": {"error_type": "out_of_range"}
        }))
        .unwrap();
        assert!(matches!(msg, ClientMessage::RequestSuggestions { .. }));

        assert!(serde_json::from_value::<ClientMessage>(json!({"type": "shout"})).is_err());
    }

    #[test]
    fn test_server_message_tags() {
        let json = serde_json::to_value(ServerMessage::connected(Uuid::nil())).unwrap();
        assert_eq!(json["type"], "connected");
        assert_eq!(json["status"], "connected");

        let json = serde_json::to_value(ServerMessage::error("bad")).unwrap();
        assert_eq!(json, json!({"type": "error", "message": "bad"}));
    }
}
