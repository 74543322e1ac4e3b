//! Error types for the session layer.

use pokelink_protocol::{ProtocolError, ServerErrorCode};
use pokelink_transport::TransportError;

/// Errors that can occur while establishing a session.
///
/// Once a session is up, faults are not returned as errors at all: they
/// become an [`Inbound::Closed`](crate::Inbound::Closed) entry in the queue.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// `connect` was called while a session is already live.
    #[error("already connected")]
    AlreadyConnected,

    /// TCP connect, send, or receive failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The auth message could not be encoded, or the reply could not be
    /// decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Connect + authentication did not finish within the bound.
    #[error("no response from server within {after_ms} ms")]
    Timeout { after_ms: u64 },

    /// The server closed the socket before answering the auth message.
    #[error("server closed the connection during authentication")]
    ClosedDuringHandshake,

    /// The server rejected us with a typed error.
    #[error("server rejected login ({code:?}): {message}")]
    Rejected {
        code: ServerErrorCode,
        message: String,
    },
}
