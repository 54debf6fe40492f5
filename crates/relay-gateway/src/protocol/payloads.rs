//! Typed payload structures
//!
//! The envelope carries an open JSON payload on the wire; the router
//! validates it into one of these schemas per event type. Events whose
//! type the router does not interpret keep their payload untouched
//! (the passthrough path).

use serde::{Deserialize, Serialize};

use super::Event;

/// Client payload for `message.send`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageSendPayload {
    /// Client-side correlation id, echoed back on `message.created`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temp_id: Option<String>,
    pub room_id: String,
    pub content: String,
    /// Parent message id for threaded replies
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

impl MessageSendPayload {
    /// Extract and validate from an event's payload.
    ///
    /// Returns `None` when the payload is absent, malformed, or missing
    /// a room id or content.
    #[must_use]
    pub fn from_event(event: &Event) -> Option<Self> {
        let payload: Self = serde_json::from_value(event.payload.clone()?).ok()?;
        if payload.room_id.is_empty() || payload.content.is_empty() {
            return None;
        }
        Some(payload)
    }
}

/// Message author as broadcast to subscribers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorInfo {
    pub id: String,
    /// Display name; empty when the identity lookup was unavailable
    pub username: String,
}

/// Server payload for `message.created`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageCreatedPayload {
    /// Durable id assigned by the persistence collaborator
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temp_id: Option<String>,
    pub room_id: String,
    pub author: AuthorInfo,
    pub content: String,
    /// RFC 3339 creation timestamp
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

/// Server payload for `conn.ack`, sent once at registration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnAckPayload {
    pub client_id: String,
    /// Unix timestamp (seconds)
    pub connected_at: i64,
}

/// Server payload for subscription acks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelAckPayload {
    pub channel: String,
}

/// Server payload for `error` events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::types;

    fn send_event(payload: serde_json::Value) -> Event {
        Event {
            kind: types::MESSAGE_SEND.to_string(),
            from: "A".to_string(),
            payload: Some(payload),
            ..Event::default()
        }
    }

    #[test]
    fn test_message_send_payload_parses() {
        let ev = send_event(serde_json::json!({
            "tempId": "t-1",
            "roomId": "r1",
            "content": "hi",
        }));
        let payload = MessageSendPayload::from_event(&ev).unwrap();
        assert_eq!(payload.temp_id.as_deref(), Some("t-1"));
        assert_eq!(payload.room_id, "r1");
        assert_eq!(payload.content, "hi");
        assert!(payload.parent_id.is_none());
    }

    #[test]
    fn test_message_send_payload_rejects_missing_fields() {
        assert!(MessageSendPayload::from_event(&send_event(serde_json::json!({
            "roomId": "r1", "content": ""
        })))
        .is_none());
        assert!(MessageSendPayload::from_event(&send_event(serde_json::json!({
            "content": "hi"
        })))
        .is_none());

        let no_payload = Event {
            kind: types::MESSAGE_SEND.to_string(),
            ..Event::default()
        };
        assert!(MessageSendPayload::from_event(&no_payload).is_none());
    }

    #[test]
    fn test_message_created_wire_names() {
        let payload = MessageCreatedPayload {
            id: "m-1".to_string(),
            temp_id: Some("t-1".to_string()),
            room_id: "r1".to_string(),
            author: AuthorInfo {
                id: "A".to_string(),
                username: "alice".to_string(),
            },
            content: "hi".to_string(),
            created_at: "2026-01-01T00:00:00+00:00".to_string(),
            parent_id: None,
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["tempId"], "t-1");
        assert_eq!(value["roomId"], "r1");
        assert_eq!(value["createdAt"], "2026-01-01T00:00:00+00:00");
        assert_eq!(value["author"]["username"], "alice");
        assert!(value.get("parentId").is_none());
    }

    #[test]
    fn test_conn_ack_wire_names() {
        let value = serde_json::to_value(ConnAckPayload {
            client_id: "c-1".to_string(),
            connected_at: 1_700_000_000,
        })
        .unwrap();
        assert_eq!(value["client_id"], "c-1");
        assert_eq!(value["connected_at"], 1_700_000_000);
    }
}
