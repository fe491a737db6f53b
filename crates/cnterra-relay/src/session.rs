//! Relay session: one client connection's subscription, from queue
//! declaration to teardown.
//!
//! A session declares its own queue, binds it to the node data exchange with
//! the node's routing key, and forwards every delivered payload to the client
//! until the delivery stream ends or something fails. Deliveries are
//! auto-acknowledged, so a message counts as delivered by the bus even when
//! the write to the client fails. Nothing is retried.

use std::io;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_stream::StreamExt;
use tracing::{debug, error, info, warn};

use cnterra_core::{Envelope, NodeId, RelayConfig, RoutingKey};

use crate::bus::{BusError, MessageBus};

/// Why a session stopped before its delivery stream ended.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("declaring queue: {0}")]
    Declare(#[source] BusError),

    #[error("binding queue: {0}")]
    Bind(#[source] BusError),

    #[error("registering consumer: {0}")]
    Consume(#[source] BusError),

    #[error("decoding message: {0}")]
    Decode(#[from] cnterra_core::Error),

    #[error("sending data: {0}")]
    Write(#[source] io::Error),
}

/// How a session ended.
#[derive(Debug, Default)]
pub enum SessionEnd {
    /// The bus stopped delivering; the normal way for a session to end.
    #[default]
    StreamClosed,
    /// The session gave up on the first failure.
    Aborted(SessionError),
}

/// Summary of a finished session, for logging.
#[derive(Debug, Default)]
pub struct SessionReport {
    /// Server-named queue, if one was declared.
    pub queue: Option<String>,
    /// Envelopes written to the client.
    pub forwarded: u64,
    /// Payload bytes the client accepted.
    pub bytes: u64,
    /// Envelopes the client accepted only part of.
    pub short_writes: u64,
    pub end: SessionEnd,
}

impl SessionReport {
    pub const fn is_aborted(&self) -> bool {
        matches!(self.end, SessionEnd::Aborted(_))
    }
}

/// Relays one node's outbound data to one client.
pub struct RelaySession<'a, B: ?Sized> {
    bus: &'a B,
    exchange: &'a str,
    node_id: NodeId,
    routing_key: RoutingKey,
}

impl<'a, B> RelaySession<'a, B>
where
    B: MessageBus + ?Sized,
{
    pub fn new(bus: &'a B, config: &'a RelayConfig) -> Self {
        Self {
            bus,
            exchange: &config.bus.exchange,
            node_id: config.node_id,
            routing_key: config.routing_key(),
        }
    }

    /// Run the session to completion, writing payloads to `conn`.
    ///
    /// Errors are logged and recorded in the report; the caller only needs
    /// to close the connection afterwards. The session queue is deleted on
    /// every path once it has been declared.
    pub async fn run<W>(&self, conn: &mut W) -> SessionReport
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let mut report = SessionReport::default();

        let queue = match self.bus.declare_queue().await {
            Ok(queue) => queue,
            Err(e) => {
                let err = SessionError::Declare(e);
                error!(error = %err, "Relay session aborted");
                report.end = SessionEnd::Aborted(err);
                return report;
            }
        };
        debug!(queue = %queue, "Queue declared");
        report.queue = Some(queue.clone());

        let outcome = self.forward(&queue, conn, &mut report).await;
        report.end = match outcome {
            Ok(()) => SessionEnd::StreamClosed,
            Err(err) => {
                error!(queue = %queue, error = %err, "Relay session aborted");
                SessionEnd::Aborted(err)
            }
        };

        if let Err(e) = self.bus.delete_queue(&queue).await {
            debug!(queue = %queue, error = %e, "Queue deletion failed, ignoring");
        }

        info!(
            queue = %queue,
            forwarded = report.forwarded,
            bytes = report.bytes,
            short_writes = report.short_writes,
            aborted = report.is_aborted(),
            "Relay session ended"
        );
        report
    }

    async fn forward<W>(
        &self,
        queue: &str,
        conn: &mut W,
        report: &mut SessionReport,
    ) -> Result<(), SessionError>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        self.bus
            .bind_queue(queue, self.exchange, self.routing_key.as_str())
            .await
            .map_err(SessionError::Bind)?;

        let mut deliveries = self.bus.consume(queue).await.map_err(SessionError::Consume)?;
        info!(
            queue = %queue,
            exchange = %self.exchange,
            routing_key = %self.routing_key,
            "Subscribed to node data"
        );

        while let Some(delivery) = deliveries.next().await {
            let body = match delivery {
                Ok(body) => body,
                Err(e) => {
                    warn!(queue = %queue, error = %e, "Delivery stream failed");
                    break;
                }
            };

            let envelope = Envelope::parse(&body)?;
            if i64::try_from(self.node_id.get()).ok() != Some(envelope.node_id) {
                debug!(
                    expected = %self.node_id,
                    received = envelope.node_id,
                    "Envelope node id differs from configured node"
                );
            }
            if envelope.payload.is_empty() {
                debug!(data = %envelope.data, "Envelope carries no payload");
            }
            let data = envelope.decode_payload()?;

            let sent = write_payload(conn, &data).await.map_err(SessionError::Write)?;
            report.forwarded += 1;
            report.bytes += sent as u64;
            if sent < data.len() {
                report.short_writes += 1;
                warn!(sent, expected = data.len(), "Short write to client");
            }
        }

        Ok(())
    }
}

/// Write `data` until the client stops accepting bytes. Returns how many
/// bytes went out.
async fn write_payload<W>(conn: &mut W, data: &[u8]) -> io::Result<usize>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut sent = 0;
    while sent < data.len() {
        match conn.write(&data[sent..]).await? {
            0 => break,
            n => sent += n,
        }
    }
    Ok(sent)
}
