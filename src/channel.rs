//! Channel runtime: outbound call invoker and inbound dispatcher.
//!
//! [`RpcChannel`] binds the three shared pieces of one correlation layer
//! instance together: the pending-call registry, the handler registry and
//! the outbound [`MessageSink`]. The embedder feeds every envelope
//! received from the peer into [`RpcChannel::handle_message`]; outbound
//! calls are issued through [`RpcChannel::call`] or a cloned [`Caller`].
//!
//! # Example
//!
//! ```ignore
//! use rpclink::RpcChannel;
//! use serde_json::json;
//!
//! let channel = RpcChannel::builder(sink)
//!     .handler("add", |(a, b): (i64, i64)| async move { Ok(json!(a + b)) })
//!     .build();
//!
//! // Feed inbound traffic:
//! channel.handle_message(envelope).await;
//!
//! // Call the peer:
//! let result = channel.call("multiply", vec![json!(6), json!(7)]).await?;
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::oneshot;

use crate::envelope::Envelope;
use crate::error::{Result, RpcError};
use crate::handler::{HandlerRegistry, HandlerResult};
use crate::pending::{PendingCalls, Settlement};
use crate::transport::MessageSink;

/// Reply message for a request naming no registered method.
pub const METHOD_NOT_FOUND: &str = "Method not found";

/// Builder for configuring and creating a channel.
///
/// Registers the initial handler mapping; further changes go through
/// [`RpcChannel::update_handlers`].
pub struct ChannelBuilder {
    registry: HandlerRegistry,
    sink: Arc<dyn MessageSink>,
}

impl ChannelBuilder {
    /// Create a builder over the given outbound sink.
    pub fn new(sink: impl MessageSink) -> Self {
        Self {
            registry: HandlerRegistry::new(),
            sink: Arc::new(sink),
        }
    }

    /// Register a typed handler for `name`.
    pub fn handler<F, T, Fut>(mut self, name: &str, handler: F) -> Self
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        T: DeserializeOwned + Send + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.registry.handle(name, handler);
        self
    }

    /// Register a raw-argument handler for `name`.
    pub fn handler_raw<F, Fut>(mut self, name: &str, handler: F) -> Self
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.registry.handle_raw(name, handler);
        self
    }

    /// Build the channel.
    pub fn build(self) -> RpcChannel {
        RpcChannel {
            pending: Arc::new(PendingCalls::new()),
            handlers: Arc::new(Mutex::new(Arc::new(self.registry))),
            sink: self.sink,
        }
    }
}

/// One instance of the correlation layer, bound to one transport
/// connection between two peers.
///
/// Cloning is cheap and yields a handle to the same channel. The pending
/// and handler registries are exclusively owned by the channel; nothing
/// outside it mutates them directly.
#[derive(Clone)]
pub struct RpcChannel {
    pending: Arc<PendingCalls>,
    handlers: Arc<Mutex<Arc<HandlerRegistry>>>,
    sink: Arc<dyn MessageSink>,
}

impl RpcChannel {
    /// Create a channel builder over the given outbound sink.
    pub fn builder(sink: impl MessageSink) -> ChannelBuilder {
        ChannelBuilder::new(sink)
    }

    /// Create a channel with an empty handler mapping.
    ///
    /// Every inbound request resolves to [`METHOD_NOT_FOUND`] until
    /// [`update_handlers`](Self::update_handlers) installs a mapping.
    pub fn new(sink: impl MessageSink) -> Self {
        ChannelBuilder::new(sink).build()
    }

    /// Hand out a clonable outbound invoker.
    ///
    /// Applications build strongly-typed stub sets by wrapping a `Caller`
    /// in methods with concrete signatures.
    pub fn caller(&self) -> Caller {
        Caller {
            pending: Arc::clone(&self.pending),
            sink: Arc::clone(&self.sink),
        }
    }

    /// Issue an outbound call to the peer.
    ///
    /// See [`Caller::call`] for the settlement contract.
    pub fn call(&self, method: &str, args: Vec<Value>) -> CallFuture {
        self.caller().call(method, args)
    }

    /// Atomically replace the entire handler mapping.
    ///
    /// The new mapping fully supersedes the old one; there is no merge.
    /// Requests already being dispatched keep the snapshot they looked
    /// their method up in.
    pub fn update_handlers(&self, registry: HandlerRegistry) {
        *self.handlers.lock() = Arc::new(registry);
    }

    /// Number of outbound calls currently awaiting a reply.
    pub fn pending_calls(&self) -> usize {
        self.pending.len()
    }

    /// Dispatch one envelope received from the peer.
    ///
    /// Must be invoked for every received envelope, in receipt order.
    /// A `request` is answered with exactly one `response` or `error`
    /// envelope; a `response`/`error` settles the matching pending call,
    /// or is silently dropped when none matches (stale or unknown
    /// correlation). Handler failures never escape this method.
    pub async fn handle_message(&self, envelope: Envelope) {
        match envelope {
            Envelope::Request { id, method, args } => {
                self.dispatch_request(id, &method, args).await;
            }
            Envelope::Response { id, result } => {
                if !self.pending.settle(id, Ok(result)) {
                    tracing::debug!(id, "dropping response with no pending call");
                }
            }
            Envelope::Error { id, error } => {
                if !self.pending.settle(id, Err(error)) {
                    tracing::debug!(id, "dropping error with no pending call");
                }
            }
        }
    }

    async fn dispatch_request(&self, id: u64, method: &str, args: Vec<Value>) {
        // Snapshot the mapping; a wholesale replacement mid-dispatch must
        // not tear this request's lookup.
        let registry = self.handlers.lock().clone();

        let Some(handler) = registry.get(method) else {
            self.sink.send(Envelope::Error {
                id,
                error: METHOD_NOT_FOUND.to_string(),
            });
            return;
        };

        match handler.call(args).await {
            Ok(result) => {
                self.sink.send(Envelope::Response { id, result });
            }
            Err(failure) => {
                tracing::warn!(method, id, "handler failed");
                self.sink.send(Envelope::Error {
                    id,
                    error: failure.into_wire_message(),
                });
            }
        }
    }
}

/// Clonable outbound invoker detached from the dispatch surface.
///
/// Stub sets hold one of these; it shares the pending registry and sink
/// with the channel that created it.
#[derive(Clone)]
pub struct Caller {
    pending: Arc<PendingCalls>,
    sink: Arc<dyn MessageSink>,
}

impl Caller {
    /// Issue an outbound call to the peer.
    ///
    /// Registers a pending entry and sends exactly one `request` envelope
    /// before returning; the returned future is not yet settled. It
    /// settles exactly once, driven solely by a later
    /// [`RpcChannel::handle_message`] with a matching identifier:
    /// fulfilled with the reply's `result`, or rejected with
    /// [`RpcError::Rejected`] carrying the peer's error message. If no
    /// reply ever arrives the future never settles; the core imposes no
    /// timeout. Dropping the future abandons the call and frees its
    /// registry slot.
    ///
    /// An empty method name settles immediately with
    /// [`RpcError::InvalidMethod`], without sending anything.
    pub fn call(&self, method: &str, args: Vec<Value>) -> CallFuture {
        if method.is_empty() {
            return CallFuture::settled(Err(RpcError::InvalidMethod));
        }

        let (id, rx) = self.pending.register();
        self.sink.send(Envelope::Request {
            id,
            method: method.to_string(),
            args,
        });

        CallFuture {
            state: CallState::InFlight {
                id,
                rx,
                pending: Arc::downgrade(&self.pending),
                done: false,
            },
        }
    }
}

/// Future for one outbound call.
///
/// Resolves `Ok(result)` on a matching `response`, `Err(RpcError)` on a
/// matching `error` reply (or a local failure). Resolves
/// [`RpcError::ChannelClosed`] when every handle to the channel is gone
/// while the call is still pending.
pub struct CallFuture {
    state: CallState,
}

enum CallState {
    /// Settled before anything was sent (e.g. empty method name).
    Settled(Option<Result<Value>>),
    InFlight {
        id: u64,
        rx: oneshot::Receiver<Settlement>,
        // Weak so an abandoned channel drops its registry (and with it the
        // settlement senders), resolving this future as ChannelClosed.
        pending: Weak<PendingCalls>,
        done: bool,
    },
}

impl CallFuture {
    fn settled(outcome: Result<Value>) -> Self {
        Self {
            state: CallState::Settled(Some(outcome)),
        }
    }

    /// The call identifier, when a request actually went out.
    pub fn id(&self) -> Option<u64> {
        match &self.state {
            CallState::Settled(_) => None,
            CallState::InFlight { id, .. } => Some(*id),
        }
    }
}

impl Future for CallFuture {
    type Output = Result<Value>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.get_mut().state {
            CallState::Settled(outcome) => match outcome.take() {
                Some(outcome) => Poll::Ready(outcome),
                None => panic!("CallFuture polled after completion"),
            },
            CallState::InFlight { rx, done, .. } => match Pin::new(rx).poll(cx) {
                Poll::Ready(Ok(Ok(result))) => {
                    *done = true;
                    Poll::Ready(Ok(result))
                }
                Poll::Ready(Ok(Err(message))) => {
                    *done = true;
                    Poll::Ready(Err(RpcError::Rejected(message)))
                }
                Poll::Ready(Err(_closed)) => {
                    *done = true;
                    Poll::Ready(Err(RpcError::ChannelClosed))
                }
                Poll::Pending => Poll::Pending,
            },
        }
    }
}

impl Drop for CallFuture {
    fn drop(&mut self) {
        if let CallState::InFlight {
            id,
            pending,
            done: false,
            ..
        } = &self.state
        {
            if let Some(pending) = pending.upgrade() {
                pending.evict(*id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mem;
    use serde_json::json;
    use std::time::Duration;

    fn respond_to(envelope: &Envelope, result: Value) -> Envelope {
        Envelope::Response {
            id: envelope.id(),
            result,
        }
    }

    #[tokio::test]
    async fn test_call_sends_one_request_envelope() {
        let (sink, mut rx) = mem::link();
        let channel = RpcChannel::new(sink);

        let _future = channel.call("add", vec![json!(2), json!(3)]);

        let sent = rx.try_recv().unwrap();
        match sent {
            Envelope::Request { method, args, .. } => {
                assert_eq!(method, "add");
                assert_eq!(args, vec![json!(2), json!(3)]);
            }
            other => panic!("expected request, got {other:?}"),
        }
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_call_settles_with_matching_response() {
        let (sink, mut rx) = mem::link();
        let channel = RpcChannel::new(sink);

        let future = channel.call("add", vec![json!(2), json!(3)]);
        let request = rx.recv().await.unwrap();

        channel.handle_message(respond_to(&request, json!(5))).await;

        assert_eq!(future.await.unwrap(), json!(5));
        assert_eq!(channel.pending_calls(), 0);
    }

    #[tokio::test]
    async fn test_call_rejected_by_error_envelope() {
        let (sink, mut rx) = mem::link();
        let channel = RpcChannel::new(sink);

        let future = channel.call("explode", vec![]);
        let request = rx.recv().await.unwrap();

        channel
            .handle_message(Envelope::Error {
                id: request.id(),
                error: "boom".to_string(),
            })
            .await;

        match future.await {
            Err(RpcError::Rejected(message)) => assert_eq!(message, "boom"),
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_method_name_rejected_locally() {
        let (sink, mut rx) = mem::link();
        let channel = RpcChannel::new(sink);

        let future = channel.call("", vec![]);
        assert!(matches!(future.await, Err(RpcError::InvalidMethod)));
        // Nothing went out.
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_out_of_order_settlement() {
        let (sink, mut rx) = mem::link();
        let channel = RpcChannel::new(sink);

        let mut future_a = channel.call("a", vec![]);
        let future_b = channel.call("b", vec![]);
        let request_a = rx.recv().await.unwrap();
        let request_b = rx.recv().await.unwrap();

        // Reply to the second call first.
        channel
            .handle_message(respond_to(&request_b, json!("b")))
            .await;

        assert_eq!(future_b.await.unwrap(), json!("b"));

        // The first call is still pending, untouched by b's reply.
        let still_pending = tokio::time::timeout(Duration::from_millis(20), &mut future_a).await;
        assert!(still_pending.is_err());
        assert_eq!(channel.pending_calls(), 1);

        channel
            .handle_message(respond_to(&request_a, json!("a")))
            .await;
        assert_eq!(future_a.await.unwrap(), json!("a"));
    }

    #[tokio::test]
    async fn test_stale_reply_is_ignored() {
        let (sink, _rx) = mem::link();
        let channel = RpcChannel::new(sink);

        // No pending call with this id; both replies are no-ops.
        channel
            .handle_message(Envelope::Response {
                id: 12345,
                result: json!(1),
            })
            .await;
        channel
            .handle_message(Envelope::Error {
                id: 12345,
                error: "late".to_string(),
            })
            .await;

        assert_eq!(channel.pending_calls(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_reply_settles_once() {
        let (sink, mut rx) = mem::link();
        let channel = RpcChannel::new(sink);

        let future = channel.call("m", vec![]);
        let request = rx.recv().await.unwrap();

        channel
            .handle_message(respond_to(&request, json!("first")))
            .await;
        // Duplicate delivery: entry already consumed, silently dropped.
        channel
            .handle_message(respond_to(&request, json!("second")))
            .await;

        assert_eq!(future.await.unwrap(), json!("first"));
    }

    #[tokio::test]
    async fn test_dropping_future_evicts_pending_entry() {
        let (sink, _rx) = mem::link();
        let channel = RpcChannel::new(sink);

        let future = channel.call("m", vec![]);
        assert_eq!(channel.pending_calls(), 1);

        drop(future);
        assert_eq!(channel.pending_calls(), 0);
    }

    #[tokio::test]
    async fn test_channel_drop_resolves_pending_call() {
        let (sink, _rx) = mem::link();
        let channel = RpcChannel::new(sink);

        let future = channel.call("m", vec![]);
        drop(channel);

        assert!(matches!(future.await, Err(RpcError::ChannelClosed)));
    }

    #[tokio::test]
    async fn test_request_for_unknown_method() {
        let (sink, mut rx) = mem::link();
        let channel = RpcChannel::new(sink);

        channel
            .handle_message(Envelope::Request {
                id: 9,
                method: "nope".to_string(),
                args: vec![],
            })
            .await;

        assert_eq!(
            rx.try_recv().unwrap(),
            Envelope::Error {
                id: 9,
                error: METHOD_NOT_FOUND.to_string(),
            }
        );
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_request_dispatches_to_handler() {
        let (sink, mut rx) = mem::link();
        let channel = RpcChannel::builder(sink)
            .handler("add", |(a, b): (i64, i64)| async move { Ok(json!(a + b)) })
            .build();

        channel
            .handle_message(Envelope::Request {
                id: 7,
                method: "add".to_string(),
                args: vec![json!(2), json!(3)],
            })
            .await;

        assert_eq!(
            rx.try_recv().unwrap(),
            Envelope::Response {
                id: 7,
                result: json!(5),
            }
        );
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_handler_failure_message_crosses() {
        let (sink, mut rx) = mem::link();
        let channel = RpcChannel::builder(sink)
            .handler_raw("explode", |_args| async move {
                Err(crate::handler::HandlerError::new("boom"))
            })
            .build();

        channel
            .handle_message(Envelope::Request {
                id: 3,
                method: "explode".to_string(),
                args: vec![],
            })
            .await;

        assert_eq!(
            rx.try_recv().unwrap(),
            Envelope::Error {
                id: 3,
                error: "boom".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_messageless_handler_failure_becomes_unknown_error() {
        let (sink, mut rx) = mem::link();
        let channel = RpcChannel::builder(sink)
            .handler_raw("explode", |_args| async move {
                Err(crate::handler::HandlerError::unspecified())
            })
            .build();

        channel
            .handle_message(Envelope::Request {
                id: 4,
                method: "explode".to_string(),
                args: vec![],
            })
            .await;

        assert_eq!(
            rx.try_recv().unwrap(),
            Envelope::Error {
                id: 4,
                error: crate::handler::UNKNOWN_ERROR.to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_update_handlers_replaces_wholesale() {
        let (sink, mut rx) = mem::link();
        let channel = RpcChannel::builder(sink)
            .handler_raw("old", |_args| async move { Ok(json!("old")) })
            .build();

        let mut registry = HandlerRegistry::new();
        registry.handle_raw("new", |_args| async move { Ok(json!("new")) });
        channel.update_handlers(registry);

        // The old mapping is gone entirely, not merged.
        channel
            .handle_message(Envelope::Request {
                id: 1,
                method: "old".to_string(),
                args: vec![],
            })
            .await;
        assert_eq!(
            rx.try_recv().unwrap(),
            Envelope::Error {
                id: 1,
                error: METHOD_NOT_FOUND.to_string(),
            }
        );

        channel
            .handle_message(Envelope::Request {
                id: 2,
                method: "new".to_string(),
                args: vec![],
            })
            .await;
        assert_eq!(
            rx.try_recv().unwrap(),
            Envelope::Response {
                id: 2,
                result: json!("new"),
            }
        );
    }

    #[tokio::test]
    async fn test_caller_is_clonable() {
        let (sink, mut rx) = mem::link();
        let channel = RpcChannel::new(sink);

        let caller = channel.caller();
        let clone = caller.clone();

        let _a = caller.call("a", vec![]);
        let _b = clone.call("b", vec![]);

        assert_eq!(channel.pending_calls(), 2);
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_argument_shape_mismatch_surfaces_remotely() {
        let (sink, mut rx) = mem::link();
        let channel = RpcChannel::builder(sink)
            .handler("add", |(a, b): (i64, i64)| async move { Ok(json!(a + b)) })
            .build();

        channel
            .handle_message(Envelope::Request {
                id: 8,
                method: "add".to_string(),
                args: vec![json!("two"), json!(3)],
            })
            .await;

        match rx.try_recv().unwrap() {
            Envelope::Error { id, error } => {
                assert_eq!(id, 8);
                assert!(error.starts_with("invalid arguments"));
            }
            other => panic!("expected error envelope, got {other:?}"),
        }
    }
}
