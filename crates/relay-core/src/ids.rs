//! Identifier value objects
//!
//! User, room, and message identifiers are opaque strings assigned by
//! external services; the hub never inspects their shape. Connection
//! identifiers are generated locally, one per accepted session, and are
//! never reused.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque user identifier, bound to a connection at handshake time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

/// Opaque room (channel) identifier used as a fan-out group key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

/// Durable message identifier returned by the persistence collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

macro_rules! string_id {
    ($name:ident) => {
        impl $name {
            /// Create a new identifier from any string-like value
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the inner string
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Check whether the identifier is empty
            #[must_use]
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

string_id!(UserId);
string_id!(RoomId);
string_id!(MessageId);

/// Generated identifier for a single live connection.
///
/// A user may hold several connections at once (multiple devices); each
/// gets its own `ConnectionId`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Generate a fresh connection identifier
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::generate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_id_roundtrip() {
        let user = UserId::from("u-1");
        assert_eq!(user.as_str(), "u-1");
        assert_eq!(user.to_string(), "u-1");
        assert_eq!(UserId::new(String::from("u-1")), user);
        assert!(!user.is_empty());
        assert!(UserId::from("").is_empty());
    }

    #[test]
    fn test_ids_serialize_transparent() {
        let room = RoomId::from("r-1");
        assert_eq!(serde_json::to_string(&room).unwrap(), "\"r-1\"");

        let parsed: RoomId = serde_json::from_str("\"r-1\"").unwrap();
        assert_eq!(parsed, room);
    }

    #[test]
    fn test_connection_id_unique() {
        let a = ConnectionId::generate();
        let b = ConnectionId::generate();
        assert_ne!(a, b);
    }
}
