//! # relay-gateway
//!
//! Real-time message fan-out engine: a hub that owns the set of live
//! connections, routes structured events between them (direct-to-user,
//! room broadcast, global), and calls injected collaborators for
//! durability, identity, presence, and join authorization.

pub mod collaborators;
pub mod connection;
pub mod hub;
pub mod protocol;
pub mod server;

pub use connection::{Connection, ConnectionReceiver, EnqueueError};
pub use hub::{Collaborators, Hub, HubConfig, HubError, Registry};
pub use protocol::{Event, EventKind};
pub use server::{run, AuthValidator, GatewayState, InvalidToken};
