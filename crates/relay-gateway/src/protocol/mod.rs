//! Wire protocol
//!
//! The canonical event envelope plus the typed payload structures the
//! router validates per event type.

mod event;
mod payloads;

pub use event::{reason, types, Event, EventKind, SERVER_SENDER};
pub use payloads::{
    AuthorInfo, ChannelAckPayload, ConnAckPayload, ErrorPayload, MessageCreatedPayload,
    MessageSendPayload,
};
