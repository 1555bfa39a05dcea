//! Handler registry mapping method names to handlers.
//!
//! The registry is a plain value: it is built up (or merged) locally and
//! then installed on a channel wholesale via
//! [`RpcChannel::update_handlers`](crate::channel::RpcChannel::update_handlers).
//! There is no partial update on a live channel; callers wanting
//! incremental change build the full resulting mapping and install that.

use std::collections::HashMap;
use std::future::Future;

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::{Handler, HandlerResult, RawHandler, TypedHandler};

/// Registry mapping method names to handlers.
#[derive(Default)]
pub struct HandlerRegistry {
    methods: HashMap<String, Box<dyn Handler>>,
}

impl HandlerRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a typed handler.
    ///
    /// The handler receives its argument tuple deserialized from the
    /// request's positional argument array; arity or type mismatches are
    /// surfaced to the remote caller without invoking the handler.
    /// Registering a name twice keeps the later handler.
    pub fn handle<F, T, Fut>(&mut self, name: &str, handler: F)
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        T: DeserializeOwned + Send + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.methods
            .insert(name.to_string(), Box::new(TypedHandler::new(handler)));
    }

    /// Register a handler over the raw argument array.
    pub fn handle_raw<F, Fut>(&mut self, name: &str, handler: F)
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.methods
            .insert(name.to_string(), Box::new(RawHandler::new(handler)));
    }

    /// Get a handler by method name.
    pub fn get(&self, name: &str) -> Option<&dyn Handler> {
        self.methods.get(name).map(|h| h.as_ref())
    }

    /// Whether a handler is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    /// Number of registered methods.
    pub fn len(&self) -> usize {
        self.methods.len()
    }

    /// Whether the registry has no methods.
    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}
