//! Connection registry
//!
//! Three indexes over the live connections: by connection id, by user,
//! and by room. All three sit behind one `RwLock` and every mutation
//! updates them together, so no reader can observe a connection that is
//! half registered or a room entry pointing at a removed connection.

use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use relay_core::{ConnectionId, RoomId, UserId};

use crate::connection::Connection;

#[derive(Default)]
struct Indexes {
    connections: HashMap<ConnectionId, Arc<Connection>>,
    by_user: HashMap<UserId, HashSet<ConnectionId>>,
    by_room: HashMap<RoomId, HashSet<ConnectionId>>,
}

/// Shared registry of live connections
#[derive(Default)]
pub struct Registry {
    inner: RwLock<Indexes>,
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a connection into the primary and user indexes
    pub fn insert(&self, connection: Arc<Connection>) {
        let mut inner = self.inner.write();
        inner
            .by_user
            .entry(connection.user_id().clone())
            .or_default()
            .insert(connection.id());
        inner.connections.insert(connection.id(), connection);
    }

    /// Remove a connection and every index entry referring to it.
    ///
    /// Returns the connection if it was registered. Empty user and room
    /// buckets are dropped so the maps do not accumulate tombstones.
    pub fn remove(&self, id: ConnectionId) -> Option<Arc<Connection>> {
        let mut inner = self.inner.write();
        let connection = inner.connections.remove(&id)?;

        if let Some(bucket) = inner.by_user.get_mut(connection.user_id()) {
            bucket.remove(&id);
            if bucket.is_empty() {
                inner.by_user.remove(connection.user_id());
            }
        }

        let rooms: Vec<RoomId> = connection.subscriptions().write().drain().collect();
        for room in rooms {
            if let Some(bucket) = inner.by_room.get_mut(&room) {
                bucket.remove(&id);
                if bucket.is_empty() {
                    inner.by_room.remove(&room);
                }
            }
        }

        Some(connection)
    }

    /// Add a connection to a room.
    ///
    /// The room index and the connection's own subscription set change
    /// under the same write lock. Returns false for unknown connections.
    pub fn subscribe(&self, id: ConnectionId, room: &RoomId) -> bool {
        let mut inner = self.inner.write();
        let Some(connection) = inner.connections.get(&id).cloned() else {
            return false;
        };
        connection.subscriptions().write().insert(room.clone());
        inner.by_room.entry(room.clone()).or_default().insert(id);
        true
    }

    /// Remove a connection from a room. Unknown pairs are a no-op.
    pub fn unsubscribe(&self, id: ConnectionId, room: &RoomId) -> bool {
        let mut inner = self.inner.write();
        let Some(connection) = inner.connections.get(&id).cloned() else {
            return false;
        };
        connection.subscriptions().write().remove(room);
        if let Some(bucket) = inner.by_room.get_mut(room) {
            bucket.remove(&id);
            if bucket.is_empty() {
                inner.by_room.remove(room);
            }
        }
        true
    }

    /// Look up one connection by id
    #[must_use]
    pub fn get(&self, id: ConnectionId) -> Option<Arc<Connection>> {
        self.inner.read().connections.get(&id).cloned()
    }

    /// All connections bound to a user
    #[must_use]
    pub fn user_connections(&self, user: &UserId) -> Vec<Arc<Connection>> {
        let inner = self.inner.read();
        inner
            .by_user
            .get(user)
            .map(|bucket| {
                bucket
                    .iter()
                    .filter_map(|id| inner.connections.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Whether the user has at least one live connection
    #[must_use]
    pub fn any_for_user(&self, user: &UserId) -> bool {
        self.inner.read().by_user.contains_key(user)
    }

    /// All connections subscribed to a room
    #[must_use]
    pub fn room_connections(&self, room: &RoomId) -> Vec<Arc<Connection>> {
        let inner = self.inner.read();
        inner
            .by_room
            .get(room)
            .map(|bucket| {
                bucket
                    .iter()
                    .filter_map(|id| inner.connections.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every live connection
    #[must_use]
    pub fn all_connections(&self) -> Vec<Arc<Connection>> {
        self.inner.read().connections.values().cloned().collect()
    }

    /// Total live connections
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.inner.read().connections.len()
    }

    /// Distinct users with at least one connection
    #[must_use]
    pub fn user_count(&self) -> usize {
        self.inner.read().by_user.len()
    }

    /// Rooms with at least one subscriber
    #[must_use]
    pub fn room_count(&self) -> usize {
        self.inner.read().by_room.len()
    }

    /// Remove and return every connection, clearing all indexes
    pub fn drain(&self) -> Vec<Arc<Connection>> {
        let mut inner = self.inner.write();
        inner.by_user.clear();
        inner.by_room.clear();
        let connections: Vec<_> = inner.connections.drain().map(|(_, c)| c).collect();
        for connection in &connections {
            connection.subscriptions().write().clear();
        }
        connections
    }
}
