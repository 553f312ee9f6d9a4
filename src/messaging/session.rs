use serde::Deserialize;
use tracing::{debug, info, warn};

use super::frames::{ChatMessage, InboundFrame};

/// Metadata returned by the session-start call.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionDetails {
    #[serde(default)]
    pub ok: bool,
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub url: String,
    #[serde(default, rename = "self")]
    pub identity: Identity,
    #[serde(default)]
    pub team: Team,
    #[serde(default)]
    pub channels: Vec<Channel>,
    #[serde(default)]
    pub groups: Vec<Group>,
    #[serde(default)]
    pub users: Vec<User>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Identity {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Team {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub domain: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Channel {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Group {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub members: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
}

impl SessionDetails {
    /// Channel id for `name`, falling back to private groups.
    pub fn resolve_target(&self, name: &str) -> Option<String> {
        self.channels
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.id.clone())
            .or_else(|| self.groups.iter().find(|g| g.name == name).map(|g| g.id.clone()))
    }

    pub fn user_name(&self, id: &str) -> &str {
        self.users.iter().find(|u| u.id == id).map(|u| u.name.as_str()).unwrap_or("")
    }

    pub fn channel_names(&self) -> Vec<&str> {
        self.channels.iter().map(|c| c.name.as_str()).collect()
    }
}

/// What the read loop should do after a frame has been applied.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    Nothing,
    Connected,
    Command(ChatMessage),
    Reconnect,
}

/// Connection identity and reconnect bookkeeping for one messaging session.
#[derive(Debug)]
pub struct Session {
    details: SessionDetails,
    target: String,
    channel_id: String,
    reconnect_url: Option<String>,
    connected: bool,
}

impl Session {
    pub fn new(details: SessionDetails, target: String, channel_id: String) -> Self {
        Self { details, target, channel_id, reconnect_url: None, connected: false }
    }

    pub fn details(&self) -> &SessionDetails {
        &self.details
    }

    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// URL for the next dial: the latest reconnect URL if one was issued,
    /// otherwise the session URL.
    pub fn next_url(&self) -> &str {
        self.reconnect_url.as_deref().unwrap_or(&self.details.url)
    }

    pub fn disconnected(&mut self) {
        self.connected = false;
    }

    pub fn discard_reconnect_url(&mut self) {
        self.reconnect_url = None;
    }

    /// Installs details from a fresh handshake.
    pub fn refresh(&mut self, details: SessionDetails) {
        match details.resolve_target(&self.target) {
            Some(id) => self.channel_id = id,
            None => warn!(channel = %self.target, "target channel missing after re-handshake, keeping previous id"),
        }
        self.details = details;
        self.reconnect_url = None;
        self.connected = false;
    }

    pub fn apply(&mut self, frame: InboundFrame) -> Dispatch {
        match frame {
            InboundFrame::Hello => {
                self.connected = true;
                Dispatch::Connected
            }
            InboundFrame::ReconnectUrl { url } => {
                debug!(%url, "reconnect url updated");
                self.reconnect_url = Some(url);
                Dispatch::Nothing
            }
            InboundFrame::PresenceChange { user, presence } => {
                info!(user = %self.details.user_name(&user), id = %user, %presence, "presence change");
                Dispatch::Nothing
            }
            InboundFrame::Message(msg) if msg.reply_to.is_none() => {
                info!(user = %self.details.user_name(&msg.user), id = %msg.user, text = %msg.text, "message received");
                Dispatch::Command(msg)
            }
            InboundFrame::Message(_) => Dispatch::Nothing,
            InboundFrame::Error { error } if error.is_socket_expired() => {
                info!("socket url has expired, reconnecting");
                Dispatch::Reconnect
            }
            InboundFrame::Error { error } => {
                warn!(code = error.code, msg = %error.msg, "messaging error frame");
                Dispatch::Nothing
            }
            InboundFrame::Unknown => Dispatch::Nothing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::frames::decode;

    fn details() -> SessionDetails {
        serde_json::from_str(
            r#"{"ok": true, "url": "wss://session",
                "self": {"id": "B1", "name": "monitor"},
                "team": {"id": "T1", "domain": "example"},
                "channels": [{"id": "C1", "name": "general"}],
                "groups": [{"id": "G1", "name": "ops", "members": ["U1"]}],
                "users": [{"id": "U1", "name": "alice"}]}"#,
        )
        .unwrap()
    }

    fn session() -> Session {
        Session::new(details(), "ops".into(), "G1".into())
    }

    fn feed(session: &mut Session, raw: &str) -> Dispatch {
        session.apply(decode(raw).unwrap())
    }

    #[test]
    fn resolves_channels_then_groups() {
        let d = details();
        assert_eq!(d.resolve_target("general").as_deref(), Some("C1"));
        assert_eq!(d.resolve_target("ops").as_deref(), Some("G1"));
        assert_eq!(d.resolve_target("missing"), None);
        assert_eq!(d.user_name("U1"), "alice");
        assert_eq!(d.user_name("U9"), "");
    }

    #[test]
    fn hello_marks_connected() {
        let mut s = session();
        assert!(!s.is_connected());
        assert_eq!(feed(&mut s, r#"{"type":"hello"}"#), Dispatch::Connected);
        assert!(s.is_connected());
    }

    #[test]
    fn expired_socket_reconnects_via_reconnect_url() {
        let mut s = session();
        feed(&mut s, r#"{"type":"hello"}"#);
        assert_eq!(s.next_url(), "wss://session");

        assert_eq!(feed(&mut s, r#"{"type":"reconnect_url","url":"wss://fresh"}"#), Dispatch::Nothing);
        assert!(s.is_connected());

        let d = feed(&mut s, r#"{"type":"error","error":{"code":1,"msg":"Socket URL has expired"}}"#);
        assert_eq!(d, Dispatch::Reconnect);
        assert_eq!(s.next_url(), "wss://fresh");
    }

    #[test]
    fn other_errors_do_not_reconnect() {
        let mut s = session();
        let d = feed(&mut s, r#"{"type":"error","error":{"code":2,"msg":"message text is missing"}}"#);
        assert_eq!(d, Dispatch::Nothing);
    }

    #[test]
    fn only_uncorrelated_messages_are_commands() {
        let mut s = session();
        let d = feed(&mut s, r#"{"type":"message","channel":"G1","user":"U1","text":"!status"}"#);
        assert!(matches!(d, Dispatch::Command(ChatMessage { ref text, .. }) if text == "!status"));
        assert_eq!(feed(&mut s, r#"{"type":"message","reply_to":1,"text":"!status"}"#), Dispatch::Nothing);
        assert_eq!(feed(&mut s, r#"{"type":"presence_change","user":"U1","presence":"away"}"#), Dispatch::Nothing);
        assert_eq!(feed(&mut s, r#"{"type":"channel_marked"}"#), Dispatch::Nothing);
    }

    #[test]
    fn refresh_clears_reconnect_url() {
        let mut s = session();
        feed(&mut s, r#"{"type":"reconnect_url","url":"wss://fresh"}"#);
        s.discard_reconnect_url();
        assert_eq!(s.next_url(), "wss://session");

        feed(&mut s, r#"{"type":"reconnect_url","url":"wss://fresh"}"#);
        let mut renewed = details();
        renewed.url = "wss://renewed".into();
        s.refresh(renewed);
        assert_eq!(s.next_url(), "wss://renewed");
        assert_eq!(s.channel_id(), "G1");
    }
}
