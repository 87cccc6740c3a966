//! Wire format: UTF-8 JSON frames with a `cmd` discriminator.

use capsync_types::envelope::AuthReply;
use capsync_types::Envelope;

use crate::error::ProtocolError;

/// Maximum frame size. These frames are a few hundred bytes at most;
/// anything larger is not ours.
pub const MAX_FRAME_SIZE: usize = 64 * 1024;

/// Encode an envelope to a JSON frame.
pub fn encode(msg: &Envelope) -> Result<String, ProtocolError> {
    let text =
        serde_json::to_string(msg).map_err(|e| ProtocolError::Serialization(e.to_string()))?;
    if text.len() > MAX_FRAME_SIZE {
        return Err(ProtocolError::Serialization(format!(
            "frame size {} exceeds maximum {MAX_FRAME_SIZE}",
            text.len()
        )));
    }
    Ok(text)
}

/// Decode a JSON frame into an envelope. Anything that does not parse
/// into a known `cmd` variant is a malformed message.
pub fn decode(text: &str) -> Result<Envelope, ProtocolError> {
    if text.len() > MAX_FRAME_SIZE {
        return Err(ProtocolError::Deserialization(format!(
            "frame size {} exceeds maximum {MAX_FRAME_SIZE}",
            text.len()
        )));
    }
    serde_json::from_str(text).map_err(|e| ProtocolError::Deserialization(e.to_string()))
}

/// Decode the bare `{password}` handshake reply.
pub fn decode_auth_reply(text: &str) -> Result<AuthReply, ProtocolError> {
    serde_json::from_str(text).map_err(|e| ProtocolError::Deserialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use capsync_types::{CapperSlot, SenderId};

    #[test]
    fn encode_decode_roundtrip() {
        let msg = Envelope::Start {
            seconds: 35.0,
            sender: SenderId::new(),
            capper: CapperSlot::One,
        };
        let text = encode(&msg).unwrap();
        let decoded = decode(&text).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(decode("not json").is_err());
        assert!(decode(r#"{"cmd":"no_such_thing"}"#).is_err());
        assert!(decode("{}").is_err());
    }

    #[test]
    fn oversized_frame_is_rejected() {
        let huge = format!(r#"{{"cmd":"start","pad":"{}"}}"#, "x".repeat(MAX_FRAME_SIZE));
        assert!(decode(&huge).is_err());
    }

    #[test]
    fn auth_reply_parses() {
        let reply = decode_auth_reply(r#"{"password":"team-secret"}"#).unwrap();
        assert_eq!(reply.password, "team-secret");
        assert!(decode_auth_reply(r#"{"pass":"x"}"#).is_err());
    }
}
