//! Message bus handle used by relay sessions.

pub mod amqp;

use std::pin::Pin;

use async_trait::async_trait;
use tokio_stream::Stream;

pub use amqp::AmqpBus;

/// Message bodies delivered to a consumer, in arrival order.
///
/// The stream ends when the bus stops delivering (connection or channel
/// closed, queue deleted out from under the consumer).
pub type Deliveries = Pin<Box<dyn Stream<Item = Result<Vec<u8>, BusError>> + Send>>;

/// Errors reported by the message bus.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Declare error: {0}")]
    Declare(String),

    #[error("Bind error: {0}")]
    Bind(String),

    #[error("Consume error: {0}")]
    Consume(String),

    #[error("Delete error: {0}")]
    Delete(String),

    #[error("Delivery error: {0}")]
    Delivery(String),
}

/// Queue operations a relay session performs against the bus.
///
/// The relay drives one handle from a single session at a time, so
/// implementations only need to support sequential use. Serving connections
/// concurrently would require a queue per session (which `declare_queue`
/// already provides) and either a handle that tolerates concurrent calls or
/// one handle per session.
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Declare an anonymous, exclusive, auto-delete, non-durable queue and
    /// return its server-generated name.
    async fn declare_queue(&self) -> Result<String, BusError>;

    /// Bind `queue` to `exchange` with `routing_key` as the binding key.
    async fn bind_queue(
        &self,
        queue: &str,
        exchange: &str,
        routing_key: &str,
    ) -> Result<(), BusError>;

    /// Start an auto-acknowledged consumer on `queue`.
    async fn consume(&self, queue: &str) -> Result<Deliveries, BusError>;

    /// Delete `queue`. Callers treat this as fire-and-forget.
    async fn delete_queue(&self, queue: &str) -> Result<(), BusError>;
}
