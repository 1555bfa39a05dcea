//! JSON codec for the envelope boundary.
//!
//! The wire contract is JSON-shaped, so the codec is a thin layer over
//! `serde_json`. It exists as an explicit boundary: every byte sequence
//! coming off the transport passes through [`JsonCodec::decode`], which
//! rejects anything that does not parse as a well-formed [`Envelope`]
//! rather than letting malformed payloads reach the dispatcher.
//!
//! The codec is a marker struct with static methods rather than a trait
//! object, keeping codec selection a compile-time concern.
//!
//! # Example
//!
//! ```
//! use rpclink::codec::JsonCodec;
//! use rpclink::envelope::Envelope;
//! use serde_json::json;
//!
//! let envelope = Envelope::Response { id: 7, result: json!(5) };
//! let bytes = JsonCodec::encode(&envelope).unwrap();
//! let decoded = JsonCodec::decode(&bytes).unwrap();
//! assert_eq!(decoded, envelope);
//! ```

use crate::envelope::Envelope;
use crate::error::Result;

/// JSON codec for envelopes.
pub struct JsonCodec;

impl JsonCodec {
    /// Encode an envelope to JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns error if the envelope cannot be serialized.
    #[inline]
    pub fn encode(envelope: &Envelope) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(envelope)?)
    }

    /// Decode JSON bytes to an envelope.
    ///
    /// # Errors
    ///
    /// Returns error if the bytes are not valid JSON or do not match any
    /// of the three envelope variants.
    #[inline]
    pub fn decode(bytes: &[u8]) -> Result<Envelope> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
