//! Transport seam.
//!
//! The correlation layer does not own a socket. The embedder supplies a
//! [`MessageSink`] through which outbound envelopes leave the process, and
//! feeds every envelope received from the peer into
//! [`RpcChannel::handle_message`](crate::channel::RpcChannel::handle_message)
//! in receipt order, for the lifetime of the channel.

pub mod mem;

use crate::envelope::Envelope;

/// Fire-and-forget delivery of one envelope to the peer.
///
/// No acknowledgment and no delivery guarantee: a dropped envelope is
/// tolerated by the correlation layer (the affected call simply never
/// settles). Implemented for any `Fn(Envelope)` closure, so a channel can
/// be wired to an arbitrary transport with a one-liner.
pub trait MessageSink: Send + Sync + 'static {
    /// Hand one envelope to the transport.
    fn send(&self, envelope: Envelope);
}

impl<F> MessageSink for F
where
    F: Fn(Envelope) + Send + Sync + 'static,
{
    fn send(&self, envelope: Envelope) {
        self(envelope)
    }
}
