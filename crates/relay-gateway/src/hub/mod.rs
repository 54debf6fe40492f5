//! The hub
//!
//! A single sequential event loop that owns all routing decisions, plus
//! the registry of live connections it fans out to. Connection setup
//! and teardown mutate the registry concurrently with the loop; one
//! lock over all three indexes keeps them mutually consistent.

mod hub;
mod registry;

pub use hub::{Collaborators, Hub, HubConfig, HubError};
pub use registry::Registry;
