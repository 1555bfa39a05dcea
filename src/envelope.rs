//! Message envelope types and call-identifier generation.
//!
//! The envelope is the unit of exchange between two peers: a closed tagged
//! union over `request`, `response` and `error`. On the wire each envelope
//! is a JSON object of the shape `{ "topic": ..., "data": ... }`; serde
//! enforces that shape at the deserialization boundary, so malformed
//! envelopes are rejected instead of passed through.
//!
//! # Example
//!
//! ```
//! use rpclink::envelope::Envelope;
//! use serde_json::json;
//!
//! let envelope = Envelope::Request {
//!     id: 7,
//!     method: "add".to_string(),
//!     args: vec![json!(2), json!(3)],
//! };
//! let wire = serde_json::to_string(&envelope).unwrap();
//! assert!(wire.contains("\"topic\":\"request\""));
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Exclusive upper bound of the call-identifier range.
///
/// Identifiers live in `[0, 2^53)` so they survive a round trip through
/// peers that represent integers as IEEE-754 doubles.
pub const CALL_ID_BOUND: u64 = 1 << 53;

/// One unit of exchange between two peers.
///
/// A `Request` is answered by exactly one `Response` or `Error` carrying
/// the same `id`. Identifiers are allocated by the request's originator;
/// the responder only echoes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "topic", content = "data", rename_all = "lowercase")]
pub enum Envelope {
    /// Invoke `method` on the peer with a positional argument list.
    Request {
        /// Correlation identifier chosen by the sender.
        id: u64,
        /// Name of the method to invoke.
        method: String,
        /// Positional arguments, opaque to the correlation layer.
        args: Vec<Value>,
    },
    /// Successful reply to the request with the same `id`.
    Response {
        /// Identifier echoed from the request.
        id: u64,
        /// Result value produced by the handler.
        result: Value,
    },
    /// Failure reply to the request with the same `id`.
    Error {
        /// Identifier echoed from the request.
        id: u64,
        /// Human-readable failure message; the only error shape that
        /// crosses the transport.
        error: String,
    },
}

impl Envelope {
    /// Correlation identifier carried by any variant.
    pub fn id(&self) -> u64 {
        match self {
            Envelope::Request { id, .. } => *id,
            Envelope::Response { id, .. } => *id,
            Envelope::Error { id, .. } => *id,
        }
    }
}

static CALL_ID_STATE: AtomicU64 = AtomicU64::new(0);

/// Draw one call identifier, uniform over `[0, CALL_ID_BOUND)`.
///
/// Uniqueness is probabilistic given the range size versus the number of
/// simultaneously pending calls; the pending registry retries on the rare
/// collision with a still-pending identifier.
pub fn next_call_id() -> u64 {
    // Weyl-sequence state mixed with clock and pid, then a splitmix64
    // finalizer. Successive draws differ even within one clock tick.
    let state = CALL_ID_STATE.fetch_add(0x9e37_79b9_7f4a_7c15, Ordering::Relaxed);
    splitmix64(state.wrapping_add(entropy())) & (CALL_ID_BOUND - 1)
}

fn entropy() -> u64 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0);
    nanos ^ ((std::process::id() as u64) << 32)
}

fn splitmix64(mut z: u64) -> u64 {
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}
