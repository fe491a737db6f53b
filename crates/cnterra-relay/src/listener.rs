//! TCP listener that serves one client at a time.
//!
//! Each accepted connection gets a relay session, and the next connection is
//! not accepted until that session has finished and the socket is closed.
//! Sessions share the single bus handle, which is only safe because they
//! never overlap.

use std::io;
use std::net::SocketAddr;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tracing::{Instrument, debug, error, info, info_span};

use cnterra_core::RelayConfig;
use cnterra_core::config::ListenConfig;

use crate::bus::MessageBus;
use crate::session::{RelaySession, SessionReport};

/// Accept loop for relay clients.
pub struct Listener {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl Listener {
    /// Bind to the configured `address:port`.
    pub async fn bind(config: &ListenConfig) -> io::Result<Self> {
        let listener = TcpListener::bind((config.address.as_str(), config.port)).await?;
        let local_addr = listener.local_addr()?;
        info!(addr = %local_addr, "Relay listening");
        Ok(Self {
            listener,
            local_addr,
        })
    }

    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serve clients forever, one after another.
    pub async fn serve<B>(&self, bus: &B, config: &RelayConfig)
    where
        B: MessageBus + ?Sized,
    {
        loop {
            self.serve_next(bus, config).await;
        }
    }

    /// Accept one connection and relay to it until its session ends.
    ///
    /// Returns `None` when the accept itself failed.
    pub async fn serve_next<B>(&self, bus: &B, config: &RelayConfig) -> Option<SessionReport>
    where
        B: MessageBus + ?Sized,
    {
        info!(addr = %self.local_addr, "Waiting for connection");

        let (mut stream, peer) = match self.listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                error!(error = %e, "Failed to accept new connection");
                return None;
            }
        };

        let span = info_span!("connection", peer = %peer);
        let report = async move {
            info!("Serving new connection");
            let report = RelaySession::new(bus, config).run(&mut stream).await;

            if let Err(e) = stream.shutdown().await {
                debug!(error = %e, "Socket shutdown failed");
            }
            drop(stream);

            info!(forwarded = report.forwarded, "Connection closed");
            report
        }
        .instrument(span)
        .await;

        Some(report)
    }
}
