//! Shared test doubles for session and listener tests.
//!
//! [`MockBus`] hands out scripted delivery streams and records every queue
//! operation; [`ScriptedWriter`] stands in for a client socket that can
//! accept partial writes or fail.

use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::sync::Mutex;
use std::task::{Context, Poll};

use async_trait::async_trait;
use tokio::io::AsyncWrite;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use cnterra_core::Envelope;

use crate::bus::{BusError, Deliveries, MessageBus};

/// A queue operation recorded by [`MockBus`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusCall {
    Declare(String),
    Bind {
        queue: String,
        exchange: String,
        routing_key: String,
    },
    Consume(String),
    Delete(String),
}

/// Operation kinds that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusOp {
    Declare,
    Bind,
    Consume,
    Delete,
}

#[derive(Default)]
struct MockState {
    declared: u32,
    feeds: VecDeque<mpsc::UnboundedReceiver<Result<Vec<u8>, BusError>>>,
    failures: Vec<BusOp>,
    calls: Vec<BusCall>,
}

/// In-memory bus. Each `consume` takes the oldest unclaimed feed created by
/// [`MockBus::subscription`], or an already-closed stream if there is none.
#[derive(Default)]
pub struct MockBus {
    state: Mutex<MockState>,
}

impl MockBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the feed for the next consumer.
    pub fn subscription(&self) -> Feed {
        let (tx, rx) = mpsc::unbounded_channel();
        self.state.lock().unwrap().feeds.push_back(rx);
        Feed { tx }
    }

    /// Make the next `op` call fail.
    pub fn fail_next(&self, op: BusOp) {
        self.state.lock().unwrap().failures.push(op);
    }

    pub fn calls(&self) -> Vec<BusCall> {
        self.state.lock().unwrap().calls.clone()
    }

    fn take_failure(state: &mut MockState, op: BusOp) -> bool {
        match state.failures.iter().position(|f| *f == op) {
            Some(idx) => {
                state.failures.remove(idx);
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl MessageBus for MockBus {
    async fn declare_queue(&self) -> Result<String, BusError> {
        let mut state = self.state.lock().unwrap();
        if Self::take_failure(&mut state, BusOp::Declare) {
            return Err(BusError::Declare("channel closed".into()));
        }
        state.declared += 1;
        let queue = format!("amq.gen-{}", state.declared);
        state.calls.push(BusCall::Declare(queue.clone()));
        Ok(queue)
    }

    async fn bind_queue(
        &self,
        queue: &str,
        exchange: &str,
        routing_key: &str,
    ) -> Result<(), BusError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(BusCall::Bind {
            queue: queue.into(),
            exchange: exchange.into(),
            routing_key: routing_key.into(),
        });
        if Self::take_failure(&mut state, BusOp::Bind) {
            return Err(BusError::Bind("no exchange".into()));
        }
        Ok(())
    }

    async fn consume(&self, queue: &str) -> Result<Deliveries, BusError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(BusCall::Consume(queue.into()));
        if Self::take_failure(&mut state, BusOp::Consume) {
            return Err(BusError::Consume("access refused".into()));
        }
        let rx = state.feeds.pop_front().unwrap_or_else(|| {
            let (_, rx) = mpsc::unbounded_channel();
            rx
        });
        Ok(Box::pin(UnboundedReceiverStream::new(rx)))
    }

    async fn delete_queue(&self, queue: &str) -> Result<(), BusError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(BusCall::Delete(queue.into()));
        if Self::take_failure(&mut state, BusOp::Delete) {
            return Err(BusError::Delete("not found".into()));
        }
        Ok(())
    }
}

/// Publishing side of one consumer's delivery stream. Dropping it ends the
/// stream.
pub struct Feed {
    tx: mpsc::UnboundedSender<Result<Vec<u8>, BusError>>,
}

impl Feed {
    pub fn publish(&self, envelope: &Envelope) {
        self.publish_raw(envelope.to_json().unwrap());
    }

    pub fn publish_raw(&self, body: Vec<u8>) {
        // The session may already have hung up.
        let _ = self.tx.send(Ok(body));
    }

    pub fn fail(&self, reason: &str) {
        let _ = self.tx.send(Err(BusError::Delivery(reason.into())));
    }
}

/// One scripted outcome for a `poll_write` call.
#[derive(Debug, Clone, Copy)]
pub enum WriteStep {
    /// Accept at most this many bytes.
    Accept(usize),
    Fail(io::ErrorKind),
}

/// Client socket stand-in. Once the script runs out, every write is
/// accepted in full.
#[derive(Debug, Default)]
pub struct ScriptedWriter {
    script: VecDeque<WriteStep>,
    /// Everything the client received.
    pub received: Vec<u8>,
    /// Size of each non-empty accepted write.
    pub writes: Vec<usize>,
}

impl ScriptedWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_script(steps: impl IntoIterator<Item = WriteStep>) -> Self {
        Self {
            script: steps.into_iter().collect(),
            ..Self::default()
        }
    }
}

impl AsyncWrite for ScriptedWriter {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        let limit = match this.script.pop_front() {
            Some(WriteStep::Fail(kind)) => return Poll::Ready(Err(io::Error::from(kind))),
            Some(WriteStep::Accept(n)) => n,
            None => buf.len(),
        };
        let n = limit.min(buf.len());
        if n > 0 {
            this.received.extend_from_slice(&buf[..n]);
            this.writes.push(n);
        }
        Poll::Ready(Ok(n))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}
