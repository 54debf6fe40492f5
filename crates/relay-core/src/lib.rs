//! # relay-core
//!
//! Domain layer for the relay fan-out engine: identifier value objects,
//! the collaborator contracts the hub depends on, and domain errors.
//! This crate has zero dependencies on infrastructure (transport, Redis,
//! web framework, etc.).

pub mod error;
pub mod ids;
pub mod traits;

// Re-export commonly used types at crate root
pub use error::DomainError;
pub use ids::{ConnectionId, MessageId, RoomId, UserId};
pub use traits::{CollabResult, IdentityLookup, JoinPolicy, MessageStore, NewMessage, Presence};
