//! Individual connection state
//!
//! A `Connection` binds exactly one authenticated user id for its whole
//! lifetime to one bounded outbound queue. The write pump holds the
//! receiving half; everything else enqueues through [`Connection::enqueue`],
//! which never blocks.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

use relay_core::{ConnectionId, RoomId, UserId};

/// Failure to place a frame on the outbound queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EnqueueError {
    /// The bounded queue is at capacity; the recipient is too slow
    #[error("outbound queue full")]
    QueueFull,
    /// The queue was closed by backpressure policy or shutdown
    #[error("outbound queue closed")]
    Closed,
}

/// Receiving half of a connection's outbound queue.
///
/// Owned by the write pump (or by tests standing in for one).
pub struct ConnectionReceiver {
    /// Serialized frames, FIFO
    pub frames: mpsc::Receiver<String>,
    /// Signals that the queue was force-closed and a close frame is due
    pub closed: watch::Receiver<bool>,
}

/// One live authenticated session
pub struct Connection {
    /// Generated opaque id, never reused
    id: ConnectionId,

    /// Authenticated user; immutable for the connection's lifetime
    user_id: UserId,

    /// Bounded outbound queue; overflow disconnects this recipient
    outbound: mpsc::Sender<String>,

    /// Rooms this connection is subscribed to. Mutated only under the
    /// registry's write lock so the room index and this set always agree.
    subscriptions: RwLock<HashSet<RoomId>>,

    closed: AtomicBool,
    close_tx: watch::Sender<bool>,

    connected_at: DateTime<Utc>,
}

impl Connection {
    /// Create a connection with a bounded outbound queue.
    ///
    /// Returns the connection plus the receiving half for the write pump.
    pub fn new(user_id: UserId, queue_capacity: usize) -> (Arc<Self>, ConnectionReceiver) {
        let (outbound, frames) = mpsc::channel(queue_capacity);
        let (close_tx, close_rx) = watch::channel(false);

        let connection = Arc::new(Self {
            id: ConnectionId::generate(),
            user_id,
            outbound,
            subscriptions: RwLock::new(HashSet::new()),
            closed: AtomicBool::new(false),
            close_tx,
            connected_at: Utc::now(),
        });

        (
            connection,
            ConnectionReceiver {
                frames,
                closed: close_rx,
            },
        )
    }

    /// Get the connection id
    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Get the bound user id
    #[must_use]
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// Get the registration time
    #[must_use]
    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    /// Attempt a non-blocking enqueue of a serialized frame
    pub fn enqueue(&self, frame: String) -> Result<(), EnqueueError> {
        if self.is_closed() {
            return Err(EnqueueError::Closed);
        }
        self.outbound.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => EnqueueError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => EnqueueError::Closed,
        })
    }

    /// Force-close the outbound queue. Idempotent.
    ///
    /// The write pump reacts by sending a close frame and exiting, which
    /// tears down the transport and with it the read pump.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            let _ = self.close_tx.send(true);
        }
    }

    /// Check whether the queue has been force-closed
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Snapshot of the current room subscriptions
    #[must_use]
    pub fn rooms(&self) -> Vec<RoomId> {
        self.subscriptions.read().iter().cloned().collect()
    }

    /// Check membership in one room
    #[must_use]
    pub fn is_subscribed(&self, room: &RoomId) -> bool {
        self.subscriptions.read().contains(room)
    }

    pub(crate) fn subscriptions(&self) -> &RwLock<HashSet<RoomId>> {
        &self.subscriptions
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connection_creation() {
        let (conn, _rx) = Connection::new(UserId::from("u1"), 8);
        assert_eq!(conn.user_id(), &UserId::from("u1"));
        assert!(!conn.is_closed());
        assert!(conn.rooms().is_empty());
    }

    #[tokio::test]
    async fn test_enqueue_preserves_fifo_order() {
        let (conn, mut rx) = Connection::new(UserId::from("u1"), 8);

        for i in 0..5 {
            conn.enqueue(format!("frame-{i}")).unwrap();
        }
        for i in 0..5 {
            assert_eq!(rx.frames.recv().await.unwrap(), format!("frame-{i}"));
        }
    }

    #[tokio::test]
    async fn test_enqueue_full_queue() {
        let (conn, _rx) = Connection::new(UserId::from("u1"), 2);

        conn.enqueue("a".to_string()).unwrap();
        conn.enqueue("b".to_string()).unwrap();
        assert_eq!(conn.enqueue("c".to_string()), Err(EnqueueError::QueueFull));
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_rejects_enqueue() {
        let (conn, mut rx) = Connection::new(UserId::from("u1"), 8);

        conn.close();
        conn.close();
        assert!(conn.is_closed());
        assert_eq!(conn.enqueue("x".to_string()), Err(EnqueueError::Closed));

        rx.closed.changed().await.unwrap();
        assert!(*rx.closed.borrow());
    }

    #[tokio::test]
    async fn test_connection_ids_are_unique() {
        let (a, _ra) = Connection::new(UserId::from("u1"), 1);
        let (b, _rb) = Connection::new(UserId::from("u1"), 1);
        assert_ne!(a.id(), b.id());
    }
}
