//! In-memory transport for same-process peers.
//!
//! Connects two channel instances through unbounded tokio channels,
//! preserving send order. Used by the test suite and useful wherever both
//! "peers" live in one process (e.g. exercising an application's method
//! set without a real connection).
//!
//! # Example
//!
//! ```ignore
//! let (sink, rx) = mem::link();
//! let channel = RpcChannel::new(sink);
//! tokio::spawn(mem::pump(rx, peer_channel.clone()));
//! ```

use tokio::sync::mpsc;

use super::MessageSink;
use crate::channel::RpcChannel;
use crate::envelope::Envelope;

/// Sending half of an in-memory link.
#[derive(Clone)]
pub struct MemorySink {
    tx: mpsc::UnboundedSender<Envelope>,
}

impl MessageSink for MemorySink {
    fn send(&self, envelope: Envelope) {
        // Receiver gone means the peer went away; fire-and-forget
        // delivery tolerates the drop.
        let _ = self.tx.send(envelope);
    }
}

/// Create an in-memory link.
///
/// Envelopes sent into the sink come out of the receiver in send order.
pub fn link() -> (MemorySink, mpsc::UnboundedReceiver<Envelope>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (MemorySink { tx }, rx)
}

/// Drive every envelope from `rx` into `channel` until the link closes.
///
/// Awaits full dispatch of each envelope before taking the next, so
/// handling is serialized the way a single-connection embedder would
/// serialize it.
pub async fn pump(mut rx: mpsc::UnboundedReceiver<Envelope>, channel: RpcChannel) {
    while let Some(envelope) = rx.recv().await {
        channel.handle_message(envelope).await;
    }
}

/// Like [`pump`], but dispatches each envelope on its own task.
///
/// Dispatch still starts in receipt order; it just does not wait for one
/// request's handler to finish before taking the next envelope. Required
/// when a handler makes nested calls back through the same link, since a
/// serialized pump would wait on a reply it is itself supposed to deliver.
pub async fn pump_concurrent(mut rx: mpsc::UnboundedReceiver<Envelope>, channel: RpcChannel) {
    while let Some(envelope) = rx.recv().await {
        let channel = channel.clone();
        tokio::spawn(async move {
            channel.handle_message(envelope).await;
        });
    }
}
