//! Connections
//!
//! One authenticated duplex session: an immutable user binding, a bounded
//! outbound queue, a room-subscription set, and the pump pair that moves
//! frames between the queue and the transport.

mod connection;
mod pump;

pub use connection::{Connection, ConnectionReceiver, EnqueueError};
pub use pump::{read_pump, write_pump};
