//! Hub event loop and routing
//!
//! The hub owns the registry and a single sequential loop that is the
//! only interpreter of event semantics. Producers hand it events over
//! two bounded queues: `inbound` for client traffic and `system` for
//! collaborator-injected notifications. Every delivery funnels through
//! [`Hub::safe_send`], which enforces the queue-overflow policy.

use chrono::Utc;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

use relay_core::{
    ConnectionId, IdentityLookup, JoinPolicy, MessageStore, NewMessage, Presence, RoomId, UserId,
};

use crate::connection::{Connection, EnqueueError};
use crate::hub::Registry;
use crate::protocol::{
    reason, types, AuthorInfo, ChannelAckPayload, ConnAckPayload, Event, EventKind,
    MessageCreatedPayload, MessageSendPayload,
};

/// Queue sizing for the hub and its connections
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Capacity of the client-traffic queue
    pub inbound_capacity: usize,
    /// Capacity of the collaborator-injection queue
    pub system_capacity: usize,
    /// Capacity of each connection's outbound queue
    pub send_queue_capacity: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            inbound_capacity: 1024,
            system_capacity: 256,
            send_queue_capacity: 256,
        }
    }
}

/// External capabilities injected at construction.
///
/// The hub calls these through their traits only; it owns no
/// persistence, identity, or authorization logic of its own.
#[derive(Clone)]
pub struct Collaborators {
    pub messages: Arc<dyn MessageStore>,
    pub identity: Option<Arc<dyn IdentityLookup>>,
    pub presence: Option<Arc<dyn Presence>>,
    pub join_policy: Option<JoinPolicy>,
}

impl Collaborators {
    pub fn new(messages: Arc<dyn MessageStore>) -> Self {
        Self {
            messages,
            identity: None,
            presence: None,
            join_policy: None,
        }
    }

    #[must_use]
    pub fn with_identity(mut self, identity: Arc<dyn IdentityLookup>) -> Self {
        self.identity = Some(identity);
        self
    }

    #[must_use]
    pub fn with_presence(mut self, presence: Arc<dyn Presence>) -> Self {
        self.presence = Some(presence);
        self
    }

    #[must_use]
    pub fn with_join_policy(mut self, policy: JoinPolicy) -> Self {
        self.join_policy = Some(policy);
        self
    }
}

/// Hub API errors
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// The hub no longer accepts registrations or events
    #[error("hub is shutting down")]
    ShuttingDown,
}

type EventReceivers = (mpsc::Receiver<Event>, mpsc::Receiver<Event>);

/// The central registry and router
pub struct Hub {
    registry: Registry,
    collaborators: Collaborators,
    config: HubConfig,

    inbound_tx: mpsc::Sender<Event>,
    system_tx: mpsc::Sender<Event>,
    // Taken exactly once by `run`
    receivers: Mutex<Option<EventReceivers>>,

    shutdown: watch::Sender<bool>,
    drained: watch::Sender<bool>,
}

impl Hub {
    #[must_use]
    pub fn new(config: HubConfig, collaborators: Collaborators) -> Arc<Self> {
        let (inbound_tx, inbound_rx) = mpsc::channel(config.inbound_capacity);
        let (system_tx, system_rx) = mpsc::channel(config.system_capacity);
        let (shutdown, _) = watch::channel(false);
        let (drained, _) = watch::channel(false);

        Arc::new(Self {
            registry: Registry::new(),
            collaborators,
            config,
            inbound_tx,
            system_tx,
            receivers: Mutex::new(Some((inbound_rx, system_rx))),
            shutdown,
            drained,
        })
    }

    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Capacity each connection's outbound queue should be created with
    #[must_use]
    pub fn send_queue_capacity(&self) -> usize {
        self.config.send_queue_capacity
    }

    fn is_shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Register a connection and acknowledge it with `conn.ack`
    pub fn register(&self, connection: &Arc<Connection>) -> Result<(), HubError> {
        if self.is_shutting_down() {
            return Err(HubError::ShuttingDown);
        }
        self.registry.insert(connection.clone());

        tracing::info!(
            connection_id = %connection.id(),
            user_id = %connection.user_id(),
            connections = self.registry.connection_count(),
            "connection registered"
        );

        let ack = ConnAckPayload {
            client_id: connection.id().to_string(),
            connected_at: connection.connected_at().timestamp(),
        };
        let event = Event::server(
            types::CONN_ACK,
            connection.user_id().as_str(),
            serde_json::to_value(ack).unwrap_or_default(),
        );
        self.safe_send(connection, &event);
        Ok(())
    }

    /// Remove a connection from every index and force-close its queue.
    ///
    /// Safe to call repeatedly and for unknown ids.
    pub fn unregister(&self, id: ConnectionId) {
        if let Some(connection) = self.registry.remove(id) {
            connection.close();
            tracing::info!(
                connection_id = %id,
                user_id = %connection.user_id(),
                connections = self.registry.connection_count(),
                "connection unregistered"
            );
        }
    }

    /// Add a connection to a room's fan-out set
    pub fn subscribe(&self, id: ConnectionId, room: &RoomId) -> bool {
        self.registry.subscribe(id, room)
    }

    /// Remove a connection from a room's fan-out set
    pub fn unsubscribe(&self, id: ConnectionId, room: &RoomId) -> bool {
        self.registry.unsubscribe(id, room)
    }

    /// Submit a client-originated event to the routing loop.
    ///
    /// Applies backpressure to the caller when the inbound queue is full.
    pub async fn submit(&self, event: Event) -> Result<(), HubError> {
        if self.is_shutting_down() {
            return Err(HubError::ShuttingDown);
        }
        self.inbound_tx
            .send(event)
            .await
            .map_err(|_| HubError::ShuttingDown)
    }

    /// Inject a collaborator-originated event into the routing pipeline.
    ///
    /// Best-effort: when the system queue is saturated the event is
    /// dropped, trading delivery of administrative notifications for
    /// router liveness.
    pub fn emit_system(&self, event: Event) {
        match self.system_tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                tracing::warn!(kind = %event.kind, "system queue full, event dropped");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!("system queue closed, event dropped");
            }
        }
    }

    /// Serialize and enqueue an event onto one connection.
    ///
    /// A full queue marks the recipient unhealthy: its queue is closed
    /// and the connection unregistered. The slow consumer is sacrificed
    /// rather than stalling the router.
    pub fn safe_send(&self, connection: &Arc<Connection>, event: &Event) {
        let json = match serde_json::to_string(event) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(kind = %event.kind, error = %e, "event serialization failed");
                return;
            }
        };
        match connection.enqueue(json) {
            Ok(()) => {}
            Err(EnqueueError::QueueFull) => {
                tracing::warn!(
                    connection_id = %connection.id(),
                    user_id = %connection.user_id(),
                    "outbound queue full, dropping connection"
                );
                connection.close();
                self.unregister(connection.id());
            }
            Err(EnqueueError::Closed) => {
                self.unregister(connection.id());
            }
        }
    }

    /// The single event-processing loop.
    ///
    /// Runs until shutdown is signalled or both queues close, then
    /// force-closes every remaining connection and reports the drain.
    pub async fn run(self: Arc<Self>) {
        let Some((mut inbound, mut system)) = self.receivers.lock().take() else {
            tracing::error!("hub loop started twice");
            return;
        };
        let mut shutdown = self.shutdown.subscribe();

        tracing::info!("hub loop started");
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
                event = inbound.recv() => {
                    let Some(event) = event else { break };
                    self.route(event).await;
                }
                event = system.recv() => {
                    let Some(event) = event else { break };
                    self.route(event).await;
                }
            }
        }

        let connections = self.registry.drain();
        for connection in &connections {
            connection.close();
        }
        tracing::info!(closed = connections.len(), "hub drained");
        let _ = self.drained.send(true);
    }

    /// Stop accepting work, close every connection, and wait for the
    /// loop to finish draining
    pub async fn shutdown(&self) {
        let mut drained = self.drained.subscribe();
        let _ = self.shutdown.send(true);
        if *drained.borrow() {
            return;
        }
        let _ = drained.changed().await;
    }

    async fn route(&self, mut event: Event) {
        event.stamp();
        match event.dispatch_kind() {
            EventKind::TypingStart | EventKind::TypingStop => self.route_typing(&event).await,
            EventKind::ChannelSubscribe => self.route_subscribe(&event).await,
            EventKind::ChannelUnsubscribe => self.route_unsubscribe(&event),
            EventKind::MessageSend => self.route_message_send(&event).await,
            EventKind::Relay => self.route_relay(&event),
        }
    }

    /// Re-broadcast to the room named by `to`, skipping at most one of
    /// the sender's connections to suppress local echo
    async fn route_typing(&self, event: &Event) {
        if event.from.is_empty() || event.to.is_empty() {
            tracing::debug!(kind = %event.kind, "typing event missing sender or room");
            return;
        }
        let room = RoomId::from(event.to.as_str());
        let sender = UserId::from(event.from.as_str());
        self.touch_presence(&room, &sender).await;

        let mut echo_skipped = false;
        for connection in self.registry.room_connections(&room) {
            if !echo_skipped && connection.user_id() == &sender {
                echo_skipped = true;
                continue;
            }
            self.safe_send(&connection, event);
        }
    }

    async fn route_subscribe(&self, event: &Event) {
        if event.from.is_empty() || event.to.is_empty() {
            tracing::debug!("subscribe event missing sender or room");
            return;
        }
        let room = RoomId::from(event.to.as_str());
        let sender = UserId::from(event.from.as_str());

        if let Some(policy) = &self.collaborators.join_policy {
            if !policy(&room, &sender) {
                tracing::debug!(room = %room, user_id = %sender, "room join denied");
                self.notify_sender(&sender, reason::FORBIDDEN_CHANNEL);
                return;
            }
        }

        let Some(connection) = self.any_connection(&sender) else {
            tracing::debug!(user_id = %sender, "subscribe from user with no connection");
            return;
        };
        self.registry.subscribe(connection.id(), &room);
        self.touch_presence(&room, &sender).await;

        let ack = Event::server(
            types::CHANNEL_SUBSCRIBED,
            sender.as_str(),
            serde_json::to_value(ChannelAckPayload {
                channel: room.as_str().to_string(),
            })
            .unwrap_or_default(),
        );
        self.safe_send(&connection, &ack);
    }

    fn route_unsubscribe(&self, event: &Event) {
        if event.from.is_empty() || event.to.is_empty() {
            tracing::debug!("unsubscribe event missing sender or room");
            return;
        }
        let room = RoomId::from(event.to.as_str());
        let sender = UserId::from(event.from.as_str());

        let Some(connection) = self.any_connection(&sender) else {
            return;
        };
        self.registry.unsubscribe(connection.id(), &room);

        let ack = Event::server(
            types::CHANNEL_UNSUBSCRIBED,
            sender.as_str(),
            serde_json::to_value(ChannelAckPayload {
                channel: room.as_str().to_string(),
            })
            .unwrap_or_default(),
        );
        self.safe_send(&connection, &ack);
    }

    /// Persist, then broadcast `message.created` to the room. A persist
    /// failure aborts the broadcast entirely; nothing unpersisted fans
    /// out.
    async fn route_message_send(&self, event: &Event) {
        if event.from.is_empty() {
            tracing::debug!("message.send without sender");
            return;
        }
        let sender = UserId::from(event.from.as_str());

        let Some(payload) = MessageSendPayload::from_event(event) else {
            tracing::debug!(user_id = %sender, "malformed message.send payload");
            self.notify_sender(&sender, reason::INVALID_EVENT);
            return;
        };
        let room = RoomId::from(payload.room_id.as_str());
        let created_at = Utc::now();

        let persisted = self
            .collaborators
            .messages
            .persist(NewMessage {
                room: room.clone(),
                author: sender.clone(),
                content: payload.content.clone(),
                created_at,
                parent_id: payload.parent_id.clone(),
            })
            .await;
        let message_id = match persisted {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!(
                    room = %room,
                    user_id = %sender,
                    error = %e,
                    "message persistence failed"
                );
                self.notify_sender(&sender, reason::PERSIST_FAILED);
                return;
            }
        };

        // Lookup failure degrades to an empty display name
        let username = match &self.collaborators.identity {
            Some(identity) => identity.username(&sender).await.unwrap_or_else(|e| {
                tracing::debug!(user_id = %sender, error = %e, "username lookup failed");
                String::new()
            }),
            None => String::new(),
        };

        self.touch_presence(&room, &sender).await;

        let created = Event::server(
            types::MESSAGE_CREATED,
            room.as_str(),
            serde_json::to_value(MessageCreatedPayload {
                id: message_id.as_str().to_string(),
                temp_id: payload.temp_id,
                room_id: payload.room_id,
                author: AuthorInfo {
                    id: sender.as_str().to_string(),
                    username,
                },
                content: payload.content,
                created_at: created_at.to_rfc3339(),
                parent_id: payload.parent_id,
            })
            .unwrap_or_default(),
        );
        for connection in self.registry.room_connections(&room) {
            self.safe_send(&connection, &created);
        }
    }

    /// Unrecognized types relay unmodified: user delivery first, then
    /// room, then global broadcast. First match wins; a `to` naming both
    /// a user and a room delivers to the user only.
    fn route_relay(&self, event: &Event) {
        if event.to.is_empty() {
            for connection in self.registry.all_connections() {
                self.safe_send(&connection, event);
            }
            return;
        }

        let as_user = UserId::from(event.to.as_str());
        let user_targets = self.registry.user_connections(&as_user);
        if !user_targets.is_empty() {
            for connection in user_targets {
                self.safe_send(&connection, event);
            }
            return;
        }

        let as_room = RoomId::from(event.to.as_str());
        for connection in self.registry.room_connections(&as_room) {
            self.safe_send(&connection, event);
        }
    }

    fn any_connection(&self, user: &UserId) -> Option<Arc<Connection>> {
        self.registry.user_connections(user).into_iter().next()
    }

    /// Deliver an `error` event to one of the sender's connections
    fn notify_sender(&self, user: &UserId, why: &str) {
        if let Some(connection) = self.any_connection(user) {
            self.safe_send(&connection, &Event::error(user.as_str(), why));
        }
    }

    async fn touch_presence(&self, room: &RoomId, user: &UserId) {
        if let Some(presence) = &self.collaborators.presence {
            if let Err(e) = presence.touch(room, user).await {
                tracing::warn!(room = %room, user_id = %user, error = %e, "presence touch failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectionReceiver;
    use async_trait::async_trait;
    use relay_core::{CollabResult, DomainError, MessageId};

    struct NullStore;

    #[async_trait]
    impl MessageStore for NullStore {
        async fn persist(&self, _message: NewMessage) -> CollabResult<MessageId> {
            Ok(MessageId::from("m-1"))
        }
    }

    struct FailingStore;

    #[async_trait]
    impl MessageStore for FailingStore {
        async fn persist(&self, _message: NewMessage) -> CollabResult<MessageId> {
            Err(DomainError::PersistFailed("store offline".to_string()))
        }
    }

    fn hub_with(store: Arc<dyn MessageStore>) -> Arc<Hub> {
        let hub = Hub::new(HubConfig::default(), Collaborators::new(store));
        tokio::spawn(hub.clone().run());
        hub
    }

    fn connect(hub: &Hub, user: &str) -> (Arc<Connection>, ConnectionReceiver) {
        let (connection, receiver) = Connection::new(UserId::from(user), 8);
        hub.register(&connection).unwrap();
        (connection, receiver)
    }

    async fn next_event(receiver: &mut ConnectionReceiver) -> Event {
        let json = receiver.frames.recv().await.unwrap();
        serde_json::from_str(&json).unwrap()
    }

    #[tokio::test]
    async fn test_register_sends_conn_ack() {
        let hub = hub_with(Arc::new(NullStore));
        let (connection, mut rx) = connect(&hub, "u1");

        let ack = next_event(&mut rx).await;
        assert_eq!(ack.kind, types::CONN_ACK);
        assert_eq!(ack.from, crate::protocol::SERVER_SENDER);
        let payload = ack.payload.unwrap();
        assert_eq!(
            payload["client_id"].as_str().unwrap(),
            connection.id().to_string()
        );
    }

    #[tokio::test]
    async fn test_unregister_is_idempotent_and_closes() {
        let hub = hub_with(Arc::new(NullStore));
        let (connection, _rx) = connect(&hub, "u1");

        hub.unregister(connection.id());
        hub.unregister(connection.id());

        assert!(connection.is_closed());
        assert_eq!(hub.registry().connection_count(), 0);
    }

    #[tokio::test]
    async fn test_relay_prefers_user_over_room() {
        let hub = hub_with(Arc::new(NullStore));
        // "shared" is both a user id and a room id another user joined
        let (_user_conn, mut user_rx) = connect(&hub, "shared");
        let (room_conn, mut room_rx) = connect(&hub, "other");
        let _ = next_event(&mut user_rx).await; // conn.ack
        let _ = next_event(&mut room_rx).await; // conn.ack
        hub.subscribe(room_conn.id(), &RoomId::from("shared"));

        hub.submit(Event {
            kind: "custom.note".to_string(),
            from: "other".to_string(),
            to: "shared".to_string(),
            ..Event::default()
        })
        .await
        .unwrap();

        let delivered = next_event(&mut user_rx).await;
        assert_eq!(delivered.kind, "custom.note");

        // Sequential loop: a later direct event arriving first would
        // mean the room copy was never sent
        hub.submit(Event {
            kind: "sentinel".to_string(),
            from: "x".to_string(),
            to: "other".to_string(),
            ..Event::default()
        })
        .await
        .unwrap();
        let sentinel = next_event(&mut room_rx).await;
        assert_eq!(sentinel.kind, "sentinel");
    }

    #[tokio::test]
    async fn test_relay_stamps_server_ts() {
        let hub = hub_with(Arc::new(NullStore));
        let (_conn, mut rx) = connect(&hub, "u1");
        let _ = next_event(&mut rx).await;

        hub.submit(Event {
            kind: "custom.note".to_string(),
            from: "u2".to_string(),
            to: "u1".to_string(),
            ..Event::default()
        })
        .await
        .unwrap();

        let delivered = next_event(&mut rx).await;
        assert_ne!(delivered.server_ts, 0);
    }

    #[tokio::test]
    async fn test_queue_overflow_unregisters_connection() {
        let hub = hub_with(Arc::new(NullStore));
        let (slow, _rx) = Connection::new(UserId::from("slow"), 1);
        hub.register(&slow).unwrap();
        // conn.ack already fills the single slot

        hub.submit(Event {
            kind: "custom.note".to_string(),
            from: "x".to_string(),
            to: "slow".to_string(),
            ..Event::default()
        })
        .await
        .unwrap();

        // Wait for the loop to process the overflowing event
        let hub2 = hub.clone();
        tokio::time::timeout(std::time::Duration::from_secs(1), async move {
            loop {
                if hub2.registry().connection_count() == 0 {
                    break;
                }
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        assert!(slow.is_closed());
        assert!(!hub.registry().any_for_user(&UserId::from("slow")));
    }

    #[tokio::test]
    async fn test_persist_failure_notifies_sender_only() {
        let hub = hub_with(Arc::new(FailingStore));
        let (a_conn, mut a_rx) = connect(&hub, "A");
        let (b_conn, mut b_rx) = connect(&hub, "B");
        let _ = next_event(&mut a_rx).await;
        let _ = next_event(&mut b_rx).await;
        hub.subscribe(a_conn.id(), &RoomId::from("r1"));
        hub.subscribe(b_conn.id(), &RoomId::from("r1"));

        hub.submit(Event {
            kind: types::MESSAGE_SEND.to_string(),
            from: "A".to_string(),
            payload: Some(serde_json::json!({"roomId": "r1", "content": "hi"})),
            ..Event::default()
        })
        .await
        .unwrap();

        let error = next_event(&mut a_rx).await;
        assert_eq!(error.kind, types::ERROR);
        assert_eq!(
            error.payload.unwrap()["reason"].as_str(),
            Some(reason::PERSIST_FAILED)
        );

        // B sees the sentinel and nothing before it
        hub.submit(Event {
            kind: "sentinel".to_string(),
            from: "x".to_string(),
            to: "B".to_string(),
            ..Event::default()
        })
        .await
        .unwrap();
        let sentinel = next_event(&mut b_rx).await;
        assert_eq!(sentinel.kind, "sentinel");
    }

    #[tokio::test]
    async fn test_shutdown_rejects_new_work_and_closes_all() {
        let hub = hub_with(Arc::new(NullStore));
        let (connection, _rx) = connect(&hub, "u1");

        hub.shutdown().await;

        assert!(connection.is_closed());
        assert_eq!(hub.registry().connection_count(), 0);

        let (late, _late_rx) = Connection::new(UserId::from("u2"), 8);
        assert!(matches!(hub.register(&late), Err(HubError::ShuttingDown)));
        assert!(matches!(
            hub.submit(Event::default()).await,
            Err(HubError::ShuttingDown)
        ));
    }

    #[tokio::test]
    async fn test_emit_system_routes_through_loop() {
        let hub = hub_with(Arc::new(NullStore));
        let (conn, mut rx) = connect(&hub, "u1");
        let _ = next_event(&mut rx).await;
        hub.subscribe(conn.id(), &RoomId::from("r1"));

        hub.emit_system(Event::server(
            "message.deleted",
            "r1",
            serde_json::json!({"id": "m-9"}),
        ));

        let delivered = next_event(&mut rx).await;
        assert_eq!(delivered.kind, "message.deleted");
    }
}
