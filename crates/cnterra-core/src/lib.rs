//! cnterra Core Library
//!
//! Shared functionality for the node relay:
//! - Configuration resolution from the environment
//! - Node identifier and routing key derivation
//! - Node data envelope codec
//! - Common error types

pub mod config;
pub mod envelope;
pub mod error;
pub mod node;
pub mod tracing_init;

pub use config::RelayConfig;
pub use envelope::Envelope;
pub use error::{Error, Result};
pub use node::{NodeId, RoutingKey};
