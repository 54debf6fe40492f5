//! # relay-presence
//!
//! TTL-backed presence tracking, the collaborator behind the hub's
//! `Presence` contract.
//!
//! A presence entry is an expiring marker keyed by `(room, user)`. The hub
//! refreshes markers opportunistically on room-scoped activity; entries
//! disappear on their own after the TTL with no explicit delete. Two
//! implementations are provided:
//!
//! - [`RedisPresence`] — production store over a managed Redis pool
//! - [`MemoryPresence`] — in-process store for tests and standalone runs

pub mod memory;
pub mod pool;
pub mod store;

pub use memory::MemoryPresence;
pub use pool::{RedisPool, RedisPoolConfig, RedisPoolError, RedisResult};
pub use store::RedisPresence;
