//! Wire messages exchanged over the `/ws` endpoint.
//!
//! Messages are JSON text frames tagged by `type`:
//! ```json
//! { "type": "joinCanvas", "canvasId": "<session-id>" }
//! { "type": "drawingUpdate", "canvasId": "<session-id>", "elements": [ ... ] }
//! ```

use inkshare_core::{Element, SessionId, Snapshot};
use serde::{Deserialize, Serialize};

pub const NO_TOKEN: &str = "Access Denied: No Token";
pub const INVALID_TOKEN: &str = "Invalid or expired token.";
pub const NOT_AUTHORIZED: &str = "You are not authorized to join this canvas.";
pub const JOIN_FAILED: &str = "An error occurred while joining the canvas.";

/// A message sent by a client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    /// Ask to join a session's room
    JoinCanvas { canvas_id: SessionId },
    /// Replace a session's elements
    DrawingUpdate {
        canvas_id: SessionId,
        elements: Vec<Element>,
    },
}

/// A message sent to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    /// Initial state, sent only to the joining connection
    LoadCanvas { elements: Snapshot },
    /// Another participant's update
    ReceiveDrawingUpdate { elements: Snapshot },
    /// Join rejected
    Unauthorized { message: String },
    /// Unexpected failure
    Error { message: String },
}

impl ServerMessage {
    pub fn unauthorized(message: &str) -> Self {
        ServerMessage::Unauthorized {
            message: message.to_string(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            tracing::error!("Failed to encode server message: {}", e);
            String::from(r#"{"type":"error"}"#)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn test_parse_join() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"joinCanvas","canvasId":"S1"}"#).unwrap();
        match msg {
            ClientMessage::JoinCanvas { canvas_id } => assert_eq!(canvas_id.as_str(), "S1"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_update_keeps_element_order() {
        let msg: ClientMessage = serde_json::from_str(
            r#"{"type":"drawingUpdate","canvasId":"S1","elements":[{"id":"b"},{"id":"a"}]}"#,
        )
        .unwrap();
        match msg {
            ClientMessage::DrawingUpdate { canvas_id, elements } => {
                assert_eq!(canvas_id.as_str(), "S1");
                assert_eq!(elements, vec![json!({"id": "b"}), json!({"id": "a"})]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"leave"}"#).is_err());
    }

    #[test]
    fn test_server_message_json() {
        let load = ServerMessage::LoadCanvas {
            elements: Arc::new(vec![json!({"id": "rect1"})]),
        };
        let value: serde_json::Value = serde_json::from_str(&load.to_json()).unwrap();
        assert_eq!(value, json!({"type": "loadCanvas", "elements": [{"id": "rect1"}]}));

        let denied = ServerMessage::unauthorized(NO_TOKEN);
        let value: serde_json::Value = serde_json::from_str(&denied.to_json()).unwrap();
        assert_eq!(value, json!({"type": "unauthorized", "message": NO_TOKEN}));
    }
}
