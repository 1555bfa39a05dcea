//! Local method handlers.
//!
//! A handler is an async function invoked when the peer issues a `request`
//! for its method name. Handlers are type-erased behind the [`Handler`]
//! trait so the registry can hold an arbitrary mix of signatures; the
//! [`TypedHandler`] adapter deserializes the positional argument array into
//! a concrete tuple before invocation, so arity and argument shape are
//! validated at the call boundary rather than inside application code.
//!
//! # Example
//!
//! ```
//! use rpclink::handler::HandlerRegistry;
//! use serde_json::json;
//!
//! let mut registry = HandlerRegistry::new();
//! registry.handle("add", |(a, b): (i64, i64)| async move {
//!     Ok(json!(a + b))
//! });
//! assert!(registry.contains("add"));
//! ```

mod registry;

pub use registry::HandlerRegistry;

use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;

use serde::de::DeserializeOwned;
use serde_json::Value;

/// Fallback message for handler failures that carry no message.
pub const UNKNOWN_ERROR: &str = "Unknown error";

/// Boxed future for handler results.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Outcome of one handler invocation.
pub type HandlerResult = std::result::Result<Value, HandlerError>;

/// Failure raised by a handler.
///
/// Only the message crosses the transport; a failure constructed without
/// one is surfaced to the remote caller as [`UNKNOWN_ERROR`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandlerError {
    message: Option<String>,
}

impl HandlerError {
    /// Create a failure with a message for the remote caller.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
        }
    }

    /// Create a failure with no message.
    pub fn unspecified() -> Self {
        Self::default()
    }

    /// The message, if one was attached.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Flatten to the string that crosses the transport.
    pub(crate) fn into_wire_message(self) -> String {
        self.message.unwrap_or_else(|| UNKNOWN_ERROR.to_string())
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message.as_deref().unwrap_or(UNKNOWN_ERROR))
    }
}

impl std::error::Error for HandlerError {}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// Trait for type-erased handler functions.
pub trait Handler: Send + Sync + 'static {
    /// Handle a request with its positional argument array.
    fn call(&self, args: Vec<Value>) -> BoxFuture<'static, HandlerResult>;
}

/// Adapter that deserializes the argument array before calling the typed
/// handler function.
///
/// The argument tuple is decoded from the JSON array of positional
/// arguments; a length or type mismatch is reported back to the remote
/// caller as a handler failure, the handler itself is never invoked.
pub struct TypedHandler<F, T, Fut>
where
    F: Fn(T) -> Fut + Send + Sync + 'static,
    T: DeserializeOwned + Send + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    handler: F,
    _phantom: PhantomData<fn(T) -> Fut>,
}

impl<F, T, Fut> TypedHandler<F, T, Fut>
where
    F: Fn(T) -> Fut + Send + Sync + 'static,
    T: DeserializeOwned + Send + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    /// Create a new typed handler.
    pub fn new(handler: F) -> Self {
        Self {
            handler,
            _phantom: PhantomData,
        }
    }
}

impl<F, T, Fut> Handler for TypedHandler<F, T, Fut>
where
    F: Fn(T) -> Fut + Send + Sync + 'static,
    T: DeserializeOwned + Send + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn call(&self, args: Vec<Value>) -> BoxFuture<'static, HandlerResult> {
        let parsed: T = match serde_json::from_value(Value::Array(args)) {
            Ok(v) => v,
            Err(e) => {
                let err = HandlerError::new(format!("invalid arguments: {e}"));
                return Box::pin(async move { Err(err) });
            }
        };

        Box::pin((self.handler)(parsed))
    }
}

/// Adapter for handlers that take the raw argument array.
pub struct RawHandler<F, Fut>
where
    F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    handler: F,
}

impl<F, Fut> RawHandler<F, Fut>
where
    F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    /// Create a new raw handler.
    pub fn new(handler: F) -> Self {
        Self { handler }
    }
}

impl<F, Fut> Handler for RawHandler<F, Fut>
where
    F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn call(&self, args: Vec<Value>) -> BoxFuture<'static, HandlerResult> {
        Box::pin((self.handler)(args))
    }
}
