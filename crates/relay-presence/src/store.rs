//! Redis-backed presence store.
//!
//! Each marker is a plain key `presence:{room}:{user}` with value `"1"`
//! and a TTL; a touch rewrites the key, a list is a SCAN over the room
//! prefix. Expiry is entirely Redis's job — the store never deletes.

use async_trait::async_trait;
use std::time::Duration;

use relay_core::{CollabResult, DomainError, Presence, RoomId, UserId};

use crate::pool::RedisPool;

/// Key prefix for presence markers
const PRESENCE_PREFIX: &str = "presence:";

/// TTL presence store over Redis
#[derive(Debug, Clone)]
pub struct RedisPresence {
    pool: RedisPool,
    ttl: Duration,
}

impl RedisPresence {
    /// Create a new presence store with the given marker TTL
    #[must_use]
    pub fn new(pool: RedisPool, ttl: Duration) -> Self {
        Self { pool, ttl }
    }

    /// Generate the Redis key for a `(room, user)` marker
    fn marker_key(room: &RoomId, user: &UserId) -> String {
        format!("{PRESENCE_PREFIX}{room}:{user}")
    }

    /// Generate the SCAN pattern covering every marker in a room
    fn room_pattern(room: &RoomId) -> String {
        format!("{PRESENCE_PREFIX}{room}:*")
    }

    /// Extract the user segment (after the last `:`) from a marker key
    fn user_from_key(key: &str) -> Option<&str> {
        key.rsplit(':').next().filter(|s| !s.is_empty())
    }
}

#[async_trait]
impl Presence for RedisPresence {
    async fn touch(&self, room: &RoomId, user: &UserId) -> CollabResult<()> {
        let key = Self::marker_key(room, user);
        self.pool
            .set_with_ttl(&key, "1", self.ttl.as_secs())
            .await
            .map_err(|e| DomainError::PresenceUnavailable(e.to_string()))?;

        tracing::trace!(room = %room, user = %user, "Presence marker touched");
        Ok(())
    }

    async fn list(&self, room: &RoomId, limit: usize) -> CollabResult<Vec<UserId>> {
        let pattern = Self::room_pattern(room);
        let keys = self
            .pool
            .scan_keys(&pattern, limit.max(1))
            .await
            .map_err(|e| DomainError::PresenceUnavailable(e.to_string()))?;

        let mut users: Vec<UserId> = keys
            .iter()
            .filter_map(|k| Self::user_from_key(k))
            .map(UserId::from)
            .collect();
        users.truncate(limit);

        tracing::trace!(room = %room, online = users.len(), "Presence listed");
        Ok(users)
    }
}
