//! Wire format for the `/api/auth/websocket` connection: `{ "type": ..., "payload": ... }`.
//!
//! Any change to a tag or payload shape here is a wire break for every connected client.

use serde::{Deserialize, Serialize};
use tokens::CallTokens;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload")]
pub enum SignalingMessage {
    #[serde(rename = "success")]
    Success { message: String },

    #[serde(rename = "error")]
    Error { error: String },

    #[serde(rename = "ping")]
    Ping { message: String },

    #[serde(rename = "pong")]
    Pong { message: String },

    #[serde(rename = "call_request")]
    CallRequest {
        #[serde(rename = "callee_id")]
        callee_id: String,
    },

    #[serde(rename = "incoming_call")]
    IncomingCall {
        #[serde(rename = "caller_id")]
        caller_id: String,
    },

    #[serde(rename = "callee_offline")]
    CalleeOffline {
        #[serde(rename = "callee_id")]
        callee_id: String,
    },

    #[serde(rename = "call_accept")]
    CallAccept {
        #[serde(rename = "caller_id")]
        caller_id: String,
    },

    #[serde(rename = "call_reject")]
    CallReject {
        #[serde(rename = "caller_id")]
        caller_id: String,
    },

    #[serde(rename = "call_tokens")]
    CallTokens {
        #[serde(rename = "audioToken")]
        audio_token: String,
        #[serde(rename = "videoToken")]
        video_token: String,
        participant: String,
    },

    #[serde(rename = "call_end")]
    CallEnd {
        #[serde(rename = "participant_id")]
        participant_id: String,
    },

    #[serde(rename = "teammate_online")]
    TeammateOnline {
        #[serde(rename = "teammate_id")]
        teammate_id: String,
    },
}

impl SignalingMessage {
    pub fn success(message: impl Into<String>) -> Self {
        Self::Success {
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            error: message.into(),
        }
    }

    pub fn pong() -> Self {
        Self::Pong {
            message: "pong".to_string(),
        }
    }

    pub fn call_tokens(tokens: CallTokens, participant: impl Into<String>) -> Self {
        Self::CallTokens {
            audio_token: tokens.audio_token,
            video_token: tokens.video_token,
            participant: participant.into(),
        }
    }

    pub fn encode(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Result of decoding a single inbound text frame.
pub enum Decoded {
    Message(SignalingMessage),
    /// A well-formed JSON object whose `type` tag this server doesn't recognize.
    /// Per the wire contract this is logged and dropped, not treated as an error.
    UnknownType,
}

/// Decode a single text frame. Malformed JSON or a structurally wrong payload is an
/// error; an unrecognized `type` tag is reported as `Decoded::UnknownType` instead.
pub fn decode(text: &str) -> anyhow::Result<Decoded> {
    let value: serde_json::Value = serde_json::from_str(text)?;
    let Some(type_tag) = value.get("type").and_then(|t| t.as_str()) else {
        anyhow::bail!("message missing string \"type\" field");
    };

    match serde_json::from_value::<SignalingMessage>(value.clone()) {
        Ok(msg) => Ok(Decoded::Message(msg)),
        Err(err) => {
            if KNOWN_TAGS.contains(&type_tag) {
                Err(err.into())
            } else {
                Ok(Decoded::UnknownType)
            }
        }
    }
}

const KNOWN_TAGS: &[&str] = &[
    "success",
    "error",
    "ping",
    "pong",
    "call_request",
    "incoming_call",
    "callee_offline",
    "call_accept",
    "call_reject",
    "call_tokens",
    "call_end",
    "teammate_online",
];

/// Subset of tags the bus loop forwards onto the WebSocket; everything else
/// received on the user's channel is ignored.
pub fn is_bus_forwardable(msg: &SignalingMessage) -> bool {
    matches!(
        msg,
        SignalingMessage::IncomingCall { .. }
            | SignalingMessage::CallReject { .. }
            | SignalingMessage::CallAccept { .. }
            | SignalingMessage::CallTokens { .. }
            | SignalingMessage::CallEnd { .. }
            | SignalingMessage::TeammateOnline { .. }
            | SignalingMessage::Error { .. }
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_request_round_trips_with_snake_case_field() {
        let msg = SignalingMessage::CallRequest {
            callee_id: "u2".into(),
        };
        let encoded = msg.encode().unwrap();
        assert_eq!(
            encoded,
            r#"{"type":"call_request","payload":{"callee_id":"u2"}}"#
        );
        match decode(&encoded).unwrap() {
            Decoded::Message(SignalingMessage::CallRequest { callee_id }) => {
                assert_eq!(callee_id, "u2")
            }
            _ => panic!("expected CallRequest"),
        }
    }

    #[test]
    fn call_tokens_use_camel_case_wire_fields() {
        let msg = SignalingMessage::call_tokens(
            CallTokens {
                audio_token: "a".into(),
                video_token: "v".into(),
            },
            "peer-1",
        );
        let encoded = msg.encode().unwrap();
        assert!(encoded.contains("\"audioToken\":\"a\""));
        assert!(encoded.contains("\"videoToken\":\"v\""));
        assert!(encoded.contains("\"participant\":\"peer-1\""));
    }

    #[test]
    fn unknown_type_is_reported_not_errored() {
        let raw = r#"{"type":"some_future_tag","payload":{}}"#;
        match decode(raw).unwrap() {
            Decoded::UnknownType => {}
            _ => panic!("expected UnknownType"),
        }
    }

    #[test]
    fn malformed_known_type_is_an_error() {
        let raw = r#"{"type":"call_request","payload":{"wrong_field":"x"}}"#;
        assert!(decode(raw).is_err());
    }

    #[test]
    fn non_object_text_frame_is_an_error() {
        assert!(decode("not json").is_err());
    }

    #[test]
    fn bus_forwardable_filters_control_plane_only() {
        assert!(is_bus_forwardable(&SignalingMessage::IncomingCall {
            caller_id: "x".into()
        }));
        assert!(is_bus_forwardable(&SignalingMessage::Error {
            error: "Failed to generate tokens".into()
        }));
        assert!(!is_bus_forwardable(&SignalingMessage::Success {
            message: "hi".into()
        }));
        assert!(!is_bus_forwardable(&SignalingMessage::Ping {
            message: "hi".into()
        }));
    }
}
