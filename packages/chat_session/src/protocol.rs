//! Wire protocol types for the chat WebSocket.
//!
//! One JSON object per text frame, tagged by `type`. Inbound frames carry a
//! peer-minted `id` and timestamp; outbound frames carry neither — the peer
//! is the only authority that assigns them and broadcasts them back to every
//! participant, including the sender.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SessionError;

/// Frames received from the peer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum InboundFrame {
    /// Room notice (join/leave). `username` is typically absent.
    System {
        id: String,
        message: String,
        timestamp: DateTime<Utc>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        username: Option<String>,
    },
    /// A participant's chat line.
    Message {
        id: String,
        message: String,
        timestamp: DateTime<Utc>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        username: Option<String>,
    },
}

/// Frames sent to the peer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutboundFrame {
    Message { message: String },
}

/// Kind of a decoded inbound record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    System,
    Chat,
}

/// A decoded inbound record, as consumers see it in the stream.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// Peer-assigned identifier, unique within a session. Never minted
    /// client-side.
    pub id: String,
    pub kind: MessageKind,
    pub body: String,
    /// Display name of the sender; `None` for system notices.
    pub sender: Option<String>,
    pub sent_at: DateTime<Utc>,
}

impl From<InboundFrame> for Message {
    fn from(frame: InboundFrame) -> Self {
        match frame {
            InboundFrame::System {
                id,
                message,
                timestamp,
                ..
            } => Message {
                id,
                kind: MessageKind::System,
                body: message,
                sender: None,
                sent_at: timestamp,
            },
            InboundFrame::Message {
                id,
                message,
                timestamp,
                username,
            } => Message {
                id,
                kind: MessageKind::Chat,
                body: message,
                sender: username,
                sent_at: timestamp,
            },
        }
    }
}

/// Decode one serialized text frame into a [`Message`].
pub fn decode_frame(text: &str) -> Result<Message, SessionError> {
    serde_json::from_str::<InboundFrame>(text)
        .map(Message::from)
        .map_err(|e| SessionError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_system_frame() {
        let msg = decode_frame(
            r#"{"id":"1","type":"system","message":"alice joined","timestamp":"2024-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(msg.id, "1");
        assert_eq!(msg.kind, MessageKind::System);
        assert_eq!(msg.body, "alice joined");
        assert_eq!(msg.sender, None);
        assert_eq!(msg.sent_at.to_rfc3339(), "2024-01-01T00:00:00+00:00");
    }

    #[test]
    fn decode_chat_frame_with_sender() {
        let msg = decode_frame(
            r#"{"id":"2","type":"message","message":"hi","username":"alice","timestamp":"2024-01-01T00:00:01Z"}"#,
        )
        .unwrap();
        assert_eq!(msg.kind, MessageKind::Chat);
        assert_eq!(msg.body, "hi");
        assert_eq!(msg.sender.as_deref(), Some("alice"));
    }

    #[test]
    fn system_frame_sender_is_always_absent() {
        // Even if the peer includes a username on a system notice.
        let msg = decode_frame(
            r#"{"id":"3","type":"system","message":"bob left","username":"bob","timestamp":"2024-01-01T00:00:02Z"}"#,
        )
        .unwrap();
        assert_eq!(msg.kind, MessageKind::System);
        assert_eq!(msg.sender, None);
    }

    #[test]
    fn outbound_frame_is_minimal() {
        let frame = OutboundFrame::Message {
            message: "hi".to_string(),
        };
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "type": "message", "message": "hi" })
        );
    }

    #[test]
    fn malformed_frames_are_rejected() {
        // Not JSON at all.
        assert!(matches!(
            decode_frame("not json"),
            Err(SessionError::Decode(_))
        ));
        // Unknown type tag.
        assert!(matches!(
            decode_frame(r#"{"id":"1","type":"presence","message":"?","timestamp":"2024-01-01T00:00:00Z"}"#),
            Err(SessionError::Decode(_))
        ));
        // Unparseable timestamp.
        assert!(matches!(
            decode_frame(r#"{"id":"1","type":"message","message":"hi","timestamp":"yesterday"}"#),
            Err(SessionError::Decode(_))
        ));
        // Missing required field.
        assert!(matches!(
            decode_frame(r#"{"type":"message","message":"hi","timestamp":"2024-01-01T00:00:00Z"}"#),
            Err(SessionError::Decode(_))
        ));
    }
}
