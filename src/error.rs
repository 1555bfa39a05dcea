//! Error types for rpclink.

use thiserror::Error;

/// Main error type for all rpclink operations.
///
/// Failures crossing the transport boundary are flattened to string
/// messages; `Rejected` carries whatever message the peer sent, with no
/// further structure.
#[derive(Debug, Error)]
pub enum RpcError {
    /// JSON serialization/deserialization error at the codec boundary.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Outbound call issued with an empty method name.
    #[error("method name must not be empty")]
    InvalidMethod,

    /// The peer answered the call with an error envelope.
    #[error("call rejected by peer: {0}")]
    Rejected(String),

    /// The channel was dropped while the call was still pending.
    #[error("channel closed before the call settled")]
    ChannelClosed,
}

/// Result type alias using RpcError.
pub type Result<T> = std::result::Result<T, RpcError>;
