//! The canonical event envelope
//!
//! Every piece of traffic — client frames, server acks, system-injected
//! notifications — travels in this envelope. Field names are fixed wire
//! contract; empty optional fields are omitted when serializing.

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Sender id used on server-originated events
pub const SERVER_SENDER: &str = "server";

/// Recognized event type strings
pub mod types {
    pub const TYPING_START: &str = "typing.start";
    pub const TYPING_STOP: &str = "typing.stop";
    pub const CHANNEL_SUBSCRIBE: &str = "channel.subscribe";
    pub const CHANNEL_UNSUBSCRIBE: &str = "channel.unsubscribe";
    pub const CHANNEL_SUBSCRIBED: &str = "channel.subscribed";
    pub const CHANNEL_UNSUBSCRIBED: &str = "channel.unsubscribed";
    pub const MESSAGE_SEND: &str = "message.send";
    pub const MESSAGE_CREATED: &str = "message.created";
    pub const CONN_ACK: &str = "conn.ack";
    pub const ERROR: &str = "error";
}

/// Reasons carried by server `error` events
pub mod reason {
    pub const INVALID_EVENT: &str = "invalid_event";
    pub const PERSIST_FAILED: &str = "persist_failed";
    pub const FORBIDDEN_CHANNEL: &str = "forbidden_channel";
}

/// The structured envelope routed between connections.
///
/// `to` is deliberately untyped: it may name a user, a room, or nothing
/// (global broadcast). The router resolves the ambiguity by trying the
/// user index first, then the room index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Type tag selecting routing behavior
    #[serde(rename = "type")]
    pub kind: String,

    /// Optional client-supplied correlation id, opaque to the hub
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Originating user id; the read pump fills this from the
    /// connection's authenticated identity when the client omits it
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub from: String,

    /// Destination: user id, room id, or empty for global broadcast
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub to: String,

    /// Event-specific fields, validated per type by the router
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,

    /// Server-assigned unix timestamp (seconds); zero means unstamped
    #[serde(default, skip_serializing_if = "is_zero")]
    pub server_ts: i64,
}

fn is_zero(ts: &i64) -> bool {
    *ts == 0
}

impl Event {
    /// Build a server-originated envelope, stamped with the server clock
    pub fn server(kind: &str, to: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            kind: kind.to_string(),
            id: None,
            from: SERVER_SENDER.to_string(),
            to: to.into(),
            payload: Some(payload),
            server_ts: Utc::now().timestamp(),
        }
    }

    /// Build a server `error` event addressed to a user
    pub fn error(to_user: impl Into<String>, why: &str) -> Self {
        Self::server(types::ERROR, to_user, serde_json::json!({ "reason": why }))
    }

    /// Assign `server_ts` if the event arrived unstamped.
    ///
    /// The hub is the single authoritative clock for ordering hints; a
    /// client-supplied timestamp of zero is always overwritten.
    pub fn stamp(&mut self) {
        if self.server_ts == 0 {
            self.server_ts = Utc::now().timestamp();
        }
    }

    /// Classify the type tag for dispatch
    #[must_use]
    pub fn dispatch_kind(&self) -> EventKind {
        EventKind::parse(&self.kind)
    }
}

/// Routing classification of an event type tag.
///
/// Anything the router does not interpret falls through to [`Self::Relay`],
/// the unmodified user-then-room-then-global passthrough.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    TypingStart,
    TypingStop,
    ChannelSubscribe,
    ChannelUnsubscribe,
    MessageSend,
    Relay,
}

impl EventKind {
    /// Parse a wire type tag
    #[must_use]
    pub fn parse(tag: &str) -> Self {
        match tag {
            types::TYPING_START => Self::TypingStart,
            types::TYPING_STOP => Self::TypingStop,
            types::CHANNEL_SUBSCRIBE => Self::ChannelSubscribe,
            types::CHANNEL_UNSUBSCRIBE => Self::ChannelUnsubscribe,
            types::MESSAGE_SEND => Self::MessageSend,
            _ => Self::Relay,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_minimal_frame() {
        let ev: Event = serde_json::from_str(r#"{"type":"typing.start","to":"r1"}"#).unwrap();
        assert_eq!(ev.kind, "typing.start");
        assert!(ev.from.is_empty());
        assert_eq!(ev.to, "r1");
        assert!(ev.payload.is_none());
        assert_eq!(ev.server_ts, 0);
    }

    #[test]
    fn test_serialize_omits_empty_fields() {
        let ev = Event {
            kind: "ping".to_string(),
            ..Event::default()
        };
        assert_eq!(serde_json::to_string(&ev).unwrap(), r#"{"type":"ping"}"#);
    }

    #[test]
    fn test_server_event_is_stamped() {
        let ev = Event::server(types::CONN_ACK, "u1", serde_json::json!({}));
        assert_eq!(ev.from, SERVER_SENDER);
        assert_eq!(ev.to, "u1");
        assert_ne!(ev.server_ts, 0);
    }

    #[test]
    fn test_error_event_reason() {
        let ev = Event::error("u1", reason::PERSIST_FAILED);
        assert_eq!(ev.kind, types::ERROR);
        assert_eq!(
            ev.payload.unwrap()["reason"].as_str(),
            Some("persist_failed")
        );
    }

    #[test]
    fn test_stamp_preserves_existing_timestamp() {
        let mut ev = Event {
            kind: "x".to_string(),
            server_ts: 42,
            ..Event::default()
        };
        ev.stamp();
        assert_eq!(ev.server_ts, 42);

        let mut unstamped = Event {
            kind: "x".to_string(),
            ..Event::default()
        };
        unstamped.stamp();
        assert_ne!(unstamped.server_ts, 0);
    }

    #[test]
    fn test_dispatch_kind_parsing() {
        assert_eq!(EventKind::parse("typing.start"), EventKind::TypingStart);
        assert_eq!(EventKind::parse("typing.stop"), EventKind::TypingStop);
        assert_eq!(
            EventKind::parse("channel.subscribe"),
            EventKind::ChannelSubscribe
        );
        assert_eq!(
            EventKind::parse("channel.unsubscribe"),
            EventKind::ChannelUnsubscribe
        );
        assert_eq!(EventKind::parse("message.send"), EventKind::MessageSend);
        assert_eq!(EventKind::parse("anything.else"), EventKind::Relay);
        assert_eq!(EventKind::parse("message.created"), EventKind::Relay);
    }
}
