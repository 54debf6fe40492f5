//! In-process collaborator implementations
//!
//! Stand-ins for the external persistence and identity services,
//! suitable for local runs and tests. Production deployments inject
//! their own implementations of the `relay-core` traits.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

use relay_core::{CollabResult, IdentityLookup, MessageId, MessageStore, NewMessage, UserId};

use crate::server::{AuthValidator, InvalidToken};

/// Message store that assigns ids and keeps everything in memory
#[derive(Default)]
pub struct EphemeralMessageStore {
    messages: Mutex<Vec<(MessageId, NewMessage)>>,
}

impl EphemeralMessageStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of messages persisted so far
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.lock().is_empty()
    }
}

#[async_trait]
impl MessageStore for EphemeralMessageStore {
    async fn persist(&self, message: NewMessage) -> CollabResult<MessageId> {
        let id = MessageId::from(uuid::Uuid::new_v4().to_string());
        self.messages.lock().push((id.clone(), message));
        Ok(id)
    }
}

/// Identity lookup that echoes the user id as the display name
pub struct EchoIdentity;

#[async_trait]
impl IdentityLookup for EchoIdentity {
    async fn username(&self, user: &UserId) -> CollabResult<String> {
        Ok(user.as_str().to_string())
    }
}

/// Token validator for local runs: the token itself is the user id.
///
/// Anything empty is rejected; there is no cryptography here.
#[must_use]
pub fn plain_token_validator() -> AuthValidator {
    Arc::new(|token: &str| {
        if token.is_empty() {
            Err(InvalidToken)
        } else {
            Ok(UserId::from(token))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use relay_core::RoomId;

    #[tokio::test]
    async fn test_ephemeral_store_assigns_unique_ids() {
        let store = EphemeralMessageStore::new();
        let message = NewMessage {
            room: RoomId::from("r1"),
            author: UserId::from("u1"),
            content: "hi".to_string(),
            created_at: Utc::now(),
            parent_id: None,
        };

        let a = store.persist(message.clone()).await.unwrap();
        let b = store.persist(message).await.unwrap();

        assert_ne!(a, b);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_echo_identity() {
        let name = EchoIdentity.username(&UserId::from("alice")).await.unwrap();
        assert_eq!(name, "alice");
    }

    #[test]
    fn test_plain_token_validator() {
        let validator = plain_token_validator();
        assert_eq!(validator("alice").unwrap(), UserId::from("alice"));
        assert!(validator("").is_err());
    }
}
