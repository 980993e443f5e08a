//! Error types for the protocol layer.
//!
//! Each crate in authn defines its own error enum. A `ProtocolError`
//! always means the problem is in turning bytes into wire types (or back),
//! never in the store or in signature checks.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning bytes into a Rust type).
    ///
    /// Common causes: malformed JSON, wrong data types (a string where
    /// `ts` expects an integer), or a truncated request body.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),
}
