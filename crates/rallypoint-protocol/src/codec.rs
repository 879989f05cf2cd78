//! Byte encoding for protocol messages.
//!
//! The handler never calls `serde_json` directly; it goes through a
//! [`Codec`] so a binary format can be slotted in later without touching
//! the connection loop.

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{ClientMessage, ProtocolError, ServerMessage};

/// Converts protocol values to and from raw message bytes.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Encode`] if the value cannot be represented.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Decode`] if the bytes are malformed or do not
    /// match the expected shape.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;

    /// Encodes an outbound server message.
    fn encode_server(&self, msg: &ServerMessage) -> Result<Vec<u8>, ProtocolError> {
        self.encode(msg)
    }

    /// Decodes an inbound client message.
    fn decode_client(&self, data: &[u8]) -> Result<ClientMessage, ProtocolError> {
        self.decode(data)
    }

    /// Reads only the `"type"` tag of an inbound message, so a frame that
    /// fails [`decode_client`](Self::decode_client) can still be
    /// attributed to a request kind.
    fn client_message_type(&self, data: &[u8]) -> Option<String> {
        self.decode::<MessageType>(data).ok().map(|tag| tag.kind)
    }
}

#[derive(Deserialize)]
struct MessageType {
    #[serde(rename = "type")]
    kind: String,
}

/// A [`Codec`] backed by `serde_json`.
///
/// JSON is what browser clients speak natively, so this is the default.
///
/// ```rust
/// use rallypoint_protocol::{ClientMessage, Codec, JsonCodec};
///
/// let codec = JsonCodec;
/// let msg = codec
///     .decode_client(br#"{"type":"JoinRoom","room_code":"AB3XQ9","player_name":"ada"}"#)
///     .unwrap();
/// assert!(matches!(msg, ClientMessage::JoinRoom { .. }));
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;
    use crate::{ErrorCode, RoomId};

    #[test]
    fn test_decode_client_leave_room() {
        let msg = JsonCodec.decode_client(br#"{"type":"LeaveRoom"}"#).unwrap();
        assert_eq!(msg, ClientMessage::LeaveRoom);
    }

    #[test]
    fn test_decode_client_rejects_garbage() {
        let err = JsonCodec.decode_client(b"not json").unwrap_err();
        assert!(matches!(err, ProtocolError::Decode(_)));
    }

    #[test]
    fn test_client_message_type_survives_bad_fields() {
        let frame = br#"{"type":"ScoreEvent","kind":"click","value":1.5}"#;
        assert!(JsonCodec.decode_client(frame).is_err());
        assert_eq!(
            JsonCodec.client_message_type(frame).as_deref(),
            Some("ScoreEvent")
        );
        assert_eq!(JsonCodec.client_message_type(b"not json"), None);
        assert_eq!(JsonCodec.client_message_type(br#"{"kind":"click"}"#), None);
    }

    #[test]
    fn test_encode_server_error_shape() {
        let bytes = JsonCodec
            .encode_server(&ServerMessage::Error {
                code: ErrorCode::RoomFull,
                message: "room is full".into(),
            })
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["type"], "Error");
        assert_eq!(json["code"], "RoomFull");
    }

    #[test]
    fn test_encode_server_room_created() {
        let bytes = JsonCodec
            .encode_server(&ServerMessage::RoomCreated {
                room_id: RoomId::new("r-1"),
                room_code: "AB3XQ9".into(),
            })
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["room_id"], "r-1");
        assert_eq!(json["room_code"], "AB3XQ9");
    }
}
