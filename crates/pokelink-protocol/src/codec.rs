//! Codec trait, JSON implementation, and newline framing.
//!
//! A [`Codec`] turns values into bytes and back. The line helpers on top of
//! it add the framing the server expects: exactly one JSON envelope per
//! `\n`-terminated line.

use serde::{de::DeserializeOwned, Serialize};

use crate::{ProtocolError, RawMessage, ServerMessage};

/// A codec that can encode Rust types to bytes and decode bytes back.
///
/// `Send + Sync + 'static` because the codec is shared by the writer task
/// and the receive task of a connection.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed or don't
    /// match the expected type.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] backed by `serde_json`.
///
/// ```rust
/// use pokelink_protocol::{ClientMessage, Codec, JsonCodec};
///
/// let codec = JsonCodec;
/// let msg = ClientMessage::Heartbeat { client_time: 5000 };
/// let bytes = codec.encode(&msg).unwrap();
/// let decoded: ClientMessage = codec.decode(&bytes).unwrap();
/// assert_eq!(msg, decoded);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

// ---------------------------------------------------------------------------
// Line framing
// ---------------------------------------------------------------------------

/// Encodes a value as a single newline-terminated line.
///
/// `serde_json` never emits raw newlines inside a compact document, so the
/// terminator is unambiguous.
pub fn encode_line<C: Codec, T: Serialize>(
    codec: &C,
    value: &T,
) -> Result<Vec<u8>, ProtocolError> {
    let mut bytes = codec.encode(value)?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Decodes one received line into a [`ServerMessage`].
///
/// Returns `Ok(None)` for blank lines. Trailing `\r`/`\n` are ignored.
///
/// # Errors
/// - [`ProtocolError::Decode`] if the line is not a JSON envelope.
/// - [`ProtocolError::InvalidMessage`] if `data` is neither an object nor
///   absent.
/// - [`ProtocolError::MalformedPayload`] if `data` fails the type's schema.
pub fn decode_line<C: Codec>(
    codec: &C,
    line: &[u8],
) -> Result<Option<ServerMessage>, ProtocolError> {
    let trimmed = trim_ascii_whitespace(line);
    if trimmed.is_empty() {
        return Ok(None);
    }
    let raw: RawMessage = codec.decode(trimmed)?;
    if !(raw.data.is_object() || raw.data.is_null()) {
        return Err(ProtocolError::InvalidMessage(format!(
            "{} data must be an object",
            raw.kind
        )));
    }
    ServerMessage::from_raw(raw).map(Some)
}

fn trim_ascii_whitespace(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    let end = bytes
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |i| i + 1);
    &bytes[start..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ClientMessage, PlayerId};

    #[test]
    fn test_encode_line_ends_with_single_newline() {
        let bytes = encode_line(&JsonCodec, &ClientMessage::Heartbeat { client_time: 1 })
            .unwrap();
        assert_eq!(bytes.last(), Some(&b'\n'));
        assert_eq!(bytes.iter().filter(|b| **b == b'\n').count(), 1);
    }

    #[test]
    fn test_decode_line_blank_returns_none() {
        assert!(decode_line(&JsonCodec, b"").unwrap().is_none());
        assert!(decode_line(&JsonCodec, b"   \r\n").unwrap().is_none());
    }

    #[test]
    fn test_decode_line_strips_crlf() {
        let msg = decode_line(&JsonCodec, b"{\"type\":\"player_left\",\"data\":{\"id\":3}}\r\n")
            .unwrap()
            .unwrap();
        assert_eq!(msg, ServerMessage::PlayerLeft { id: PlayerId(3) });
    }

    #[test]
    fn test_decode_line_garbage_returns_decode_error() {
        let result = decode_line(&JsonCodec, b"not json at all");
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_decode_line_missing_type_returns_decode_error() {
        let result = decode_line(&JsonCodec, br#"{"data":{}}"#);
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_decode_line_scalar_data_is_invalid() {
        let result = decode_line(&JsonCodec, br#"{"type":"ping","data":"hello"}"#);
        assert!(matches!(result, Err(ProtocolError::InvalidMessage(_))));
    }

    #[test]
    fn test_decode_line_unknown_type_survives() {
        let msg = decode_line(&JsonCodec, br#"{"type":"fireworks"}"#)
            .unwrap()
            .unwrap();
        assert_eq!(msg, ServerMessage::Unknown { kind: "fireworks".into() });
    }
}
