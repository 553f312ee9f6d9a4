//! Persistent real-time messaging client.
//!
//! The client starts a session over HTTP, opens the websocket it was handed
//! and then stays in a read loop. When the socket breaks, or the platform
//! reports that the socket URL expired, it dials again using the most recent
//! reconnect URL (or the session URL when none was issued), backing off
//! between attempts. Outbound messages go through [`MessagingHandle`] and are
//! dropped while no connection is established.

pub mod frames;
pub mod session;

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{watch, Mutex};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use crate::commands::CommandResponder;
use crate::config::SlackConfig;
use crate::error::MessagingError;
use frames::{ChatMessage, OutboundMessage};
use session::{Dispatch, Session, SessionDetails};

const MIN_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// Receiver of human-readable alert text.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, text: &str) -> Result<(), MessagingError>;
}

struct Connection {
    session: Session,
    writer: Option<WsSink>,
    next_id: u64,
}

/// Cloneable handle for sending on the active socket.
#[derive(Clone)]
pub struct MessagingHandle {
    inner: Arc<Mutex<Connection>>,
    send_timeout: Duration,
}

impl MessagingHandle {
    fn new(session: Session, send_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Connection { session, writer: None, next_id: 0 })),
            send_timeout,
        }
    }

    /// Writes a text message to `channel`. A no-op while disconnected.
    ///
    /// A write that stalls past the send timeout drops the socket's write
    /// half; later messages are discarded until the client reconnects.
    pub async fn send_message(&self, channel: &str, text: &str) -> Result<(), MessagingError> {
        let mut guard = self.inner.lock().await;
        let conn = &mut *guard;
        if !conn.session.is_connected() {
            debug!(%channel, "not connected, dropping outbound message");
            return Ok(());
        }
        let Some(writer) = conn.writer.as_mut() else {
            debug!(%channel, "no socket, dropping outbound message");
            return Ok(());
        };

        conn.next_id += 1;
        let frame = serde_json::to_string(&OutboundMessage::new(conn.next_id, channel, text))?;
        let sent = tokio::time::timeout(self.send_timeout, writer.send(Message::text(frame))).await;
        match sent {
            Ok(result) => Ok(result?),
            Err(_) => {
                warn!(%channel, timeout = ?self.send_timeout, "websocket write stalled, dropping writer");
                conn.writer = None;
                Err(MessagingError::SendTimeout(self.send_timeout))
            }
        }
    }

    pub async fn channel_id(&self) -> String {
        self.inner.lock().await.session.channel_id().to_string()
    }

    pub async fn is_connected(&self) -> bool {
        self.inner.lock().await.session.is_connected()
    }

    async fn user_name(&self, id: &str) -> String {
        self.inner.lock().await.session.details().user_name(id).to_string()
    }
}

#[async_trait]
impl Notifier for MessagingHandle {
    async fn notify(&self, text: &str) -> Result<(), MessagingError> {
        let channel = self.channel_id().await;
        self.send_message(&channel, text).await
    }
}

enum ReadOutcome {
    Expired,
    Closed(String),
}

pub struct SlackClient {
    http: reqwest::Client,
    config: SlackConfig,
    handle: MessagingHandle,
    responder: CommandResponder,
}

impl SlackClient {
    /// Starts the session and resolves the target channel. Errors here are
    /// fatal: the token or channel name has to be fixed by the operator.
    pub async fn connect(config: SlackConfig, responder: CommandResponder) -> Result<Self, MessagingError> {
        let http = reqwest::Client::builder().timeout(Duration::from_secs(30)).build()?;
        let details = start_session(&http, &config).await?;

        info!(channels = ?details.channel_names(), "available channels");
        let channel_id = details
            .resolve_target(&config.channel)
            .ok_or_else(|| MessagingError::UnknownChannel(config.channel.clone()))?;
        info!(target_channel = %config.channel, id = %channel_id, "alert channel resolved");

        let session = Session::new(details, config.channel.clone(), channel_id);
        let handle = MessagingHandle::new(session, Duration::from_secs(config.send_timeout));
        Ok(Self { http, config, handle, responder })
    }

    pub fn handle(&self) -> MessagingHandle {
        self.handle.clone()
    }

    /// Connect/read loop. Runs until `shutdown` fires.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut backoff = MIN_BACKOFF;
        let mut needs_handshake = false;

        loop {
            if needs_handshake {
                match start_session(&self.http, &self.config).await {
                    Ok(details) => {
                        self.handle.inner.lock().await.session.refresh(details);
                        needs_handshake = false;
                    }
                    Err(e) => {
                        warn!(error = %e, "session restart failed");
                        if wait_or_shutdown(backoff, &mut shutdown).await {
                            break;
                        }
                        backoff = (backoff * 2).min(MAX_BACKOFF);
                        continue;
                    }
                }
            }

            let url = self.handle.inner.lock().await.session.next_url().to_string();
            debug!(%url, "dialing websocket");
            let stream = match connect_async(url.as_str()).await {
                Ok((stream, _)) => stream,
                Err(e) => {
                    warn!(error = %e, "unable to connect to websocket");
                    self.handle.inner.lock().await.session.discard_reconnect_url();
                    needs_handshake = true;
                    if wait_or_shutdown(backoff, &mut shutdown).await {
                        break;
                    }
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                    continue;
                }
            };

            let (writer, reader) = stream.split();
            self.handle.inner.lock().await.writer = Some(writer);

            let outcome = tokio::select! {
                outcome = self.read_loop(reader, &mut backoff) => Some(outcome),
                _ = shutdown.changed() => None,
            };

            {
                let mut conn = self.handle.inner.lock().await;
                conn.session.disconnected();
                if let Some(mut writer) = conn.writer.take() {
                    let _ = tokio::time::timeout(self.handle.send_timeout, writer.close()).await;
                }
                if matches!(outcome, Some(ReadOutcome::Expired)) && conn.session.next_url() == url {
                    // No fresh URL since this dial; start over with a new session.
                    conn.session.discard_reconnect_url();
                    needs_handshake = true;
                }
            }

            match outcome {
                None => break,
                Some(ReadOutcome::Expired) => info!("socket url expired, reconnecting"),
                Some(ReadOutcome::Closed(reason)) => warn!(%reason, "websocket read failed, reconnecting"),
            }

            if wait_or_shutdown(backoff, &mut shutdown).await {
                break;
            }
            backoff = (backoff * 2).min(MAX_BACKOFF);
        }

        info!("messaging client stopped");
    }

    async fn read_loop(&self, mut reader: WsSource, backoff: &mut Duration) -> ReadOutcome {
        while let Some(frame) = reader.next().await {
            let text = match frame {
                Ok(Message::Text(text)) => text,
                Ok(Message::Close(reason)) => return ReadOutcome::Closed(format!("closed by peer: {reason:?}")),
                Ok(_) => continue,
                Err(e) => return ReadOutcome::Closed(e.to_string()),
            };

            let frame = match frames::decode(text.as_str()) {
                Ok(frame) => frame,
                Err(e) => {
                    debug!(error = %e, raw = %text.as_str(), "skipping undecodable frame");
                    continue;
                }
            };

            let dispatch = self.handle.inner.lock().await.session.apply(frame);
            match dispatch {
                Dispatch::Connected => {
                    info!("websocket connected");
                    *backoff = MIN_BACKOFF;
                }
                Dispatch::Command(msg) => self.answer(msg).await,
                Dispatch::Reconnect => return ReadOutcome::Expired,
                Dispatch::Nothing => {}
            }
        }
        ReadOutcome::Closed("stream ended".into())
    }

    async fn answer(&self, msg: ChatMessage) {
        let user = self.handle.user_name(&msg.user).await;
        let Some(reply) = self.responder.respond(&msg.text, &user).await else {
            return;
        };
        if let Err(e) = self.handle.send_message(&msg.channel, &reply).await {
            error!(error = %e, channel = %msg.channel, "failed to send reply");
        }
    }
}

async fn start_session(http: &reqwest::Client, config: &SlackConfig) -> Result<SessionDetails, MessagingError> {
    let url = format!("{}/rtm.start", config.api_base.trim_end_matches('/'));
    let details: SessionDetails = http
        .get(&url)
        .query(&[("token", config.token.as_str())])
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    if !details.ok {
        return Err(MessagingError::Rejected(details.error));
    }

    info!(
        user = %details.identity.name,
        user_id = %details.identity.id,
        team = %details.team.domain,
        team_id = %details.team.id,
        url = %details.url,
        "messaging session started"
    );
    Ok(details)
}

/// Sleeps for `delay`; returns true if shutdown was signalled instead.
async fn wait_or_shutdown(delay: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(delay) => false,
        _ = shutdown.changed() => true,
    }
}
