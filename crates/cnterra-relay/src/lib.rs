//! cnterra Node Relay Library
//!
//! Bridges node data published on the message bus to raw TCP clients:
//! - Bus handle abstraction and its AMQP implementation
//! - Relay sessions: per-connection queue lifecycle and payload forwarding
//! - Sequential TCP listener

pub mod bus;
pub mod listener;
pub mod session;

#[cfg(test)]
mod test_helpers;

pub use bus::{AmqpBus, BusError, MessageBus};
pub use listener::Listener;
pub use session::{RelaySession, SessionEnd, SessionError, SessionReport};
