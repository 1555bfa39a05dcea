//! # rpclink
//!
//! Bidirectional RPC correlation layer over an arbitrary, already-connected
//! message transport.
//!
//! Two peers exchange tagged envelopes (`request` / `response` / `error`);
//! each may expose callable methods to the other and call the other's
//! methods, receiving results or errors asynchronously. The crate solves
//! correlation: matching every outgoing call to its eventual reply, with
//! calls issued concurrently and replies arriving out of order or not at
//! all. The transport itself is a collaborator supplied by the embedder:
//! anything that can deliver an [`Envelope`] fits behind the
//! [`MessageSink`] trait.
//!
//! ## Architecture
//!
//! - **Outbound**: [`RpcChannel::call`] registers a pending entry, sends a
//!   `request` envelope and returns a future that settles exactly once,
//!   driven solely by a later matching reply.
//! - **Inbound**: the embedder feeds every received envelope into
//!   [`RpcChannel::handle_message`], which either dispatches to a locally
//!   registered handler (answering with exactly one `response` or `error`)
//!   or settles the matching pending call.
//!
//! ## Example
//!
//! ```ignore
//! use rpclink::RpcChannel;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() {
//!     let channel = RpcChannel::builder(send_to_peer)
//!         .handler("add", |(a, b): (i64, i64)| async move { Ok(json!(a + b)) })
//!         .build();
//!
//!     // feed inbound envelopes: channel.handle_message(envelope).await
//!     let product = channel.call("multiply", vec![json!(6), json!(7)]).await;
//! }
//! ```

pub mod channel;
pub mod codec;
pub mod envelope;
pub mod error;
pub mod handler;
pub mod transport;

mod pending;

pub use channel::{CallFuture, Caller, ChannelBuilder, RpcChannel, METHOD_NOT_FOUND};
pub use codec::JsonCodec;
pub use envelope::{Envelope, CALL_ID_BOUND};
pub use error::{Result, RpcError};
pub use handler::{HandlerError, HandlerRegistry, HandlerResult, UNKNOWN_ERROR};
pub use transport::MessageSink;
