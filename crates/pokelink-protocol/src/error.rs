//! Error types for the protocol layer.
//!
//! Each crate in Pokelink defines its own error enum. A `ProtocolError`
//! always means a problem turning bytes into messages or back, never a
//! socket or game-rule problem.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// The bytes were not a well-formed JSON envelope.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The envelope named a known message type but its `data` did not
    /// match that type's schema.
    #[error("malformed {kind} payload: {source}")]
    MalformedPayload {
        kind: String,
        #[source]
        source: serde_json::Error,
    },

    /// The message is invalid at the protocol level, e.g. an envelope
    /// whose `data` is a bare string.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
