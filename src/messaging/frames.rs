//! Wire frames exchanged over the messaging socket.

use serde::{Deserialize, Serialize};

pub const SOCKET_URL_EXPIRED: &str = "Socket URL has expired";

/// Inbound frame, discriminated by its `type` field. Types this client does
/// not know decode as [`InboundFrame::Unknown`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundFrame {
    Hello,
    ReconnectUrl {
        url: String,
    },
    PresenceChange {
        #[serde(default)]
        user: String,
        #[serde(default)]
        presence: String,
    },
    Message(ChatMessage),
    Error {
        #[serde(default)]
        error: FrameError,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ChatMessage {
    #[serde(default)]
    pub channel: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub text: String,
    /// Set on acknowledgements of our own outbound messages.
    #[serde(default)]
    pub reply_to: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FrameError {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub msg: String,
}

impl FrameError {
    pub fn is_socket_expired(&self) -> bool {
        self.msg == SOCKET_URL_EXPIRED
    }
}

#[derive(Debug, Serialize)]
pub struct OutboundMessage<'a> {
    pub id: u64,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub channel: &'a str,
    pub text: &'a str,
}

impl<'a> OutboundMessage<'a> {
    pub fn new(id: u64, channel: &'a str, text: &'a str) -> Self {
        Self { id, kind: "message", channel, text }
    }
}

pub fn decode(raw: &str) -> Result<InboundFrame, serde_json::Error> {
    serde_json::from_str(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_known_types() {
        assert_eq!(decode(r#"{"type":"hello"}"#).unwrap(), InboundFrame::Hello);
        assert_eq!(
            decode(r#"{"type":"reconnect_url","url":"wss://fresh"}"#).unwrap(),
            InboundFrame::ReconnectUrl { url: "wss://fresh".into() }
        );
        let InboundFrame::Error { error } =
            decode(r#"{"type":"error","error":{"code":1,"msg":"Socket URL has expired"}}"#).unwrap()
        else {
            panic!("expected error frame");
        };
        assert!(error.is_socket_expired());
    }

    #[test]
    fn message_carries_reply_correlation() {
        let frame = decode(r#"{"type":"message","channel":"C1","user":"U1","text":"!status"}"#).unwrap();
        assert_eq!(
            frame,
            InboundFrame::Message(ChatMessage {
                channel: "C1".into(),
                user: "U1".into(),
                text: "!status".into(),
                reply_to: None,
            })
        );
        let ack = decode(r#"{"type":"message","reply_to":7,"text":"done"}"#).unwrap();
        assert!(matches!(ack, InboundFrame::Message(ChatMessage { reply_to: Some(7), .. })));
    }

    #[test]
    fn unknown_types_are_tolerated() {
        assert_eq!(decode(r#"{"type":"user_typing","channel":"C1"}"#).unwrap(), InboundFrame::Unknown);
    }

    #[test]
    fn frames_without_type_fail_to_decode() {
        assert!(decode(r#"{"ok":true,"reply_to":3}"#).is_err());
        assert!(decode("not json").is_err());
    }

    #[test]
    fn outbound_frame_shape() {
        let json = serde_json::to_value(OutboundMessage::new(3, "C1", "hi")).unwrap();
        assert_eq!(json, serde_json::json!({"id": 3, "type": "message", "channel": "C1", "text": "hi"}));
    }
}
