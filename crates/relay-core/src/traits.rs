//! Collaborator contracts (ports) consumed by the hub
//!
//! The hub only routes events; durability, identity resolution, presence
//! tracking, and join authorization belong to external services injected
//! behind these narrow contracts. The domain layer defines what the hub
//! needs, and the infrastructure layer provides the implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::error::DomainError;
use crate::ids::{MessageId, RoomId, UserId};

/// Result type for collaborator operations
pub type CollabResult<T> = Result<T, DomainError>;

/// A message to be made durable before it is fanned out.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub room: RoomId,
    pub author: UserId,
    pub content: String,
    pub created_at: DateTime<Utc>,
    /// Parent message id for threaded replies
    pub parent_id: Option<String>,
}

/// Persistence collaborator for chat messages.
///
/// Must be safe to call concurrently. A failure aborts the broadcast for
/// that one send; the hub never fans out unpersisted data.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Persist a message and return its durable id
    async fn persist(&self, message: NewMessage) -> CollabResult<MessageId>;
}

/// Identity collaborator resolving user ids to display names.
///
/// Best-effort: callers degrade to an empty display name on error rather
/// than failing the operation.
#[async_trait]
pub trait IdentityLookup: Send + Sync {
    /// Resolve the display name for a user
    async fn username(&self, user: &UserId) -> CollabResult<String>;
}

/// TTL-backed approximate membership tracking per `(room, user)`.
///
/// Entries expire on their own after a fixed time-to-live; there is no
/// explicit delete. "Online" means "touched within the last TTL window",
/// which is related to but not the same as "connection open". The hub only
/// calls `touch`; `list` is consumed by read-side collaborators such as a
/// presence-count endpoint.
#[async_trait]
pub trait Presence: Send + Sync {
    /// Refresh (or create) the expiring membership marker
    async fn touch(&self, room: &RoomId, user: &UserId) -> CollabResult<()>;

    /// Enumerate users with a fresh marker in `room`, at most `limit` entries
    async fn list(&self, room: &RoomId, limit: usize) -> CollabResult<Vec<UserId>>;
}

/// Authorization predicate consulted before a room subscription is applied.
///
/// When it denies, the hub answers the sender with an `error` event
/// (reason `forbidden_channel`) instead of subscribing.
pub type JoinPolicy = Arc<dyn Fn(&RoomId, &UserId) -> bool + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedStore;

    #[async_trait]
    impl MessageStore for FixedStore {
        async fn persist(&self, message: NewMessage) -> CollabResult<MessageId> {
            assert!(!message.content.is_empty());
            Ok(MessageId::from("m-1"))
        }
    }

    #[tokio::test]
    async fn test_message_store_object_safety() {
        let store: Arc<dyn MessageStore> = Arc::new(FixedStore);
        let id = store
            .persist(NewMessage {
                room: RoomId::from("r-1"),
                author: UserId::from("u-1"),
                content: "hi".to_string(),
                created_at: Utc::now(),
                parent_id: None,
            })
            .await
            .unwrap();
        assert_eq!(id, MessageId::from("m-1"));
    }

    #[test]
    fn test_join_policy_closure() {
        let policy: JoinPolicy = Arc::new(|room, _user| room.as_str() != "locked");
        assert!(policy(&RoomId::from("open"), &UserId::from("u")));
        assert!(!policy(&RoomId::from("locked"), &UserId::from("u")));
    }
}
