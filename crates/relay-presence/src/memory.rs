//! In-process presence store.
//!
//! Mirrors the Redis store's TTL approximation without a backend: markers
//! expire on read, never via explicit delete. Used by tests and by
//! standalone runs of the gateway binary. Time comes from the tokio clock
//! so paused-clock tests can drive expiry.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

use relay_core::{CollabResult, Presence, RoomId, UserId};

/// TTL presence store kept in process memory
#[derive(Debug)]
pub struct MemoryPresence {
    ttl: Duration,
    markers: Mutex<HashMap<(RoomId, UserId), Instant>>,
}

impl MemoryPresence {
    /// Create a new in-memory presence store with the given marker TTL
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            markers: Mutex::new(HashMap::new()),
        }
    }

    /// Number of markers currently held, fresh or stale
    #[must_use]
    pub fn len(&self) -> usize {
        self.markers.lock().len()
    }

    /// Check whether the store holds no markers at all
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.markers.lock().is_empty()
    }
}

#[async_trait]
impl Presence for MemoryPresence {
    async fn touch(&self, room: &RoomId, user: &UserId) -> CollabResult<()> {
        self.markers
            .lock()
            .insert((room.clone(), user.clone()), Instant::now());
        Ok(())
    }

    async fn list(&self, room: &RoomId, limit: usize) -> CollabResult<Vec<UserId>> {
        let now = Instant::now();
        let mut markers = self.markers.lock();

        // Drop stale markers while scanning; expiry happens on read
        markers.retain(|_, touched| now.duration_since(*touched) < self.ttl);

        let users = markers
            .keys()
            .filter(|(r, _)| r == room)
            .map(|(_, u)| u.clone())
            .take(limit)
            .collect();
        Ok(users)
    }
}
