//! Push hub connection.
//!
//! The server pushes conversation events over a WebSocket speaking the JSON
//! hub protocol: a `{"protocol":"json","version":1}` handshake, then JSON
//! records each terminated by the 0x1E record separator. The client joins one
//! conversation group and receives invocations targeted at it.
//!
//! A subscription reconnects on its own after a lost connection, following the
//! configured delay schedule, and joins the group again every time.

use std::time::Duration;

use eduthread_core::ThreadId;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::HubError;

/// Terminator of every hub protocol record.
pub const RECORD_SEPARATOR: char = '\u{1e}';

/// Hub method that subscribes the connection to a conversation.
pub const JOIN_METHOD: &str = "JoinThread";

/// Hub method that unsubscribes the connection from a conversation.
pub const LEAVE_METHOD: &str = "LeaveThread";

const JOIN_INVOCATION_ID: &str = "join";
const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWriter = SplitSink<WsStream, WsMessage>;
type WsReader = SplitStream<WsStream>;

// =============================================================================
// Protocol
// =============================================================================

/// One record of the hub protocol.
#[derive(Debug, Clone, PartialEq)]
pub enum HubFrame {
    /// Call of a method on the other side.
    Invocation {
        /// Method name.
        target: String,
        /// Positional arguments.
        arguments: Vec<Value>,
        /// Set when the caller expects a completion.
        invocation_id: Option<String>,
    },
    /// Result of an invocation that carried an ID.
    Completion {
        /// ID of the completed invocation.
        invocation_id: String,
        /// Error raised by the invoked method.
        error: Option<String>,
    },
    /// Keep-alive.
    Ping,
    /// The server is closing the connection.
    Close {
        /// Reason for closing.
        error: Option<String>,
        /// Whether the client may reconnect.
        allow_reconnect: bool,
    },
    /// A record type this client does not handle (streaming, acks).
    Other(u8),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFrame {
    #[serde(rename = "type")]
    kind: u8,
    #[serde(default)]
    target: Option<String>,
    #[serde(default)]
    arguments: Vec<Value>,
    #[serde(default)]
    invocation_id: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    allow_reconnect: bool,
}

impl HubFrame {
    /// Parse one record, without its separator.
    ///
    /// # Errors
    ///
    /// Returns an error if the record is not valid JSON or lacks fields its
    /// type requires.
    pub fn decode(record: &str) -> Result<Self, HubError> {
        let raw: RawFrame = serde_json::from_str(record)?;
        match raw.kind {
            1 => {
                let target = raw
                    .target
                    .ok_or_else(|| HubError::Protocol("invocation without target".to_string()))?;
                Ok(Self::Invocation {
                    target,
                    arguments: raw.arguments,
                    invocation_id: raw.invocation_id,
                })
            }
            3 => {
                let invocation_id = raw.invocation_id.ok_or_else(|| {
                    HubError::Protocol("completion without invocation id".to_string())
                })?;
                Ok(Self::Completion {
                    invocation_id,
                    error: raw.error,
                })
            }
            6 => Ok(Self::Ping),
            7 => Ok(Self::Close {
                error: raw.error,
                allow_reconnect: raw.allow_reconnect,
            }),
            other => Ok(Self::Other(other)),
        }
    }

    /// Serialize the frame as a terminated record.
    ///
    /// # Errors
    ///
    /// Returns `HubError::Protocol` for frame types the client never sends.
    pub fn encode(&self) -> Result<String, HubError> {
        let value = match self {
            Self::Invocation {
                target,
                arguments,
                invocation_id,
            } => {
                let mut value = json!({ "type": 1, "target": target, "arguments": arguments });
                if let Some(id) = invocation_id {
                    value["invocationId"] = json!(id);
                }
                value
            }
            Self::Ping => json!({ "type": 6 }),
            Self::Close { error, .. } => match error {
                Some(error) => json!({ "type": 7, "error": error }),
                None => json!({ "type": 7 }),
            },
            Self::Completion { .. } | Self::Other(_) => {
                return Err(HubError::Protocol(format!("cannot send {self:?}")));
            }
        };
        let mut record = serde_json::to_string(&value)?;
        record.push(RECORD_SEPARATOR);
        Ok(record)
    }
}

/// Non-empty records of a text message.
pub fn split_records(text: &str) -> impl Iterator<Item = &str> {
    text.split(RECORD_SEPARATOR)
        .filter(|record| !record.trim().is_empty())
}

/// Record that opens the protocol.
#[must_use]
pub fn handshake_request() -> String {
    format!(r#"{{"protocol":"json","version":1}}{RECORD_SEPARATOR}"#)
}

#[derive(Debug, Deserialize)]
struct HandshakeResponse {
    #[serde(default)]
    error: Option<String>,
}

fn check_handshake(record: &str) -> Result<(), HubError> {
    let response: HandshakeResponse =
        serde_json::from_str(record).map_err(|e| HubError::Handshake(e.to_string()))?;
    match response.error {
        Some(error) => Err(HubError::Handshake(error)),
        None => Ok(()),
    }
}

fn invocation(target: &str, thread_id: ThreadId, invocation_id: Option<&str>) -> HubFrame {
    HubFrame::Invocation {
        target: target.to_string(),
        arguments: vec![json!(thread_id.get())],
        invocation_id: invocation_id.map(String::from),
    }
}

// =============================================================================
// Events
// =============================================================================

/// Events of a conversation subscription.
#[derive(Debug, Clone, PartialEq)]
pub enum HubEvent {
    /// Handshake completed.
    Connected,
    /// The server confirmed the conversation join.
    Joined,
    /// The server invoked a client method.
    Invocation {
        /// Method name.
        target: String,
        /// Positional arguments.
        arguments: Vec<Value>,
    },
    /// The connection was lost and a reconnect is scheduled.
    Reconnecting {
        /// Reconnect attempt, starting at 1.
        attempt: usize,
        /// Why the previous connection ended.
        error: String,
    },
    /// The subscription ended and will not reconnect.
    Closed {
        /// Why, if not a normal close.
        error: Option<String>,
    },
}

// =============================================================================
// Connection
// =============================================================================

/// Connects to the push hub.
#[derive(Debug, Clone)]
pub struct HubClient {
    url: String,
    token: String,
    connect_timeout: Duration,
    reconnect_delays: Vec<Duration>,
}

impl HubClient {
    /// Create a hub client for the server in `config`.
    #[must_use]
    pub fn new(config: &ClientConfig, token: impl Into<String>) -> Self {
        Self {
            url: config.hub_url(),
            token: token.into(),
            connect_timeout: config.connect_timeout(),
            reconnect_delays: config.reconnect_delays(),
        }
    }

    /// Hub WebSocket URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Subscribe to a conversation until `shutdown` turns true or its sender
    /// is dropped.
    ///
    /// Events go to `events`; the task also stops when that receiver is gone.
    #[must_use]
    pub fn subscribe(
        self,
        thread_id: ThreadId,
        events: mpsc::Sender<HubEvent>,
        shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(run_subscription(self, thread_id, events, shutdown))
    }

    /// Open the WebSocket with the bearer token in the header and the query.
    async fn open(&self) -> Result<WsStream, HubError> {
        let url = reqwest::Url::parse_with_params(&self.url, &[("access_token", &self.token)])
            .map_err(|e| HubError::Connection(e.to_string()))?;
        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| HubError::Connection(e.to_string()))?;
        let auth = HeaderValue::from_str(&format!("Bearer {}", self.token))
            .map_err(|e| HubError::Connection(e.to_string()))?;
        request.headers_mut().insert(AUTHORIZATION, auth);

        let (stream, _) = tokio::time::timeout(self.connect_timeout, connect_async(request))
            .await
            .map_err(|_| HubError::Timeout)?
            .map_err(|e| HubError::Connection(e.to_string()))?;
        Ok(stream)
    }
}

/// How far one connection got.
#[derive(Debug, Default, Clone, Copy)]
struct SessionProgress {
    /// Handshake accepted.
    handshaken: bool,
    /// Join confirmed by the server.
    joined: bool,
}

/// How a single connection ended.
#[derive(Debug)]
enum SessionEnd {
    /// Shutdown requested or nobody listens any more.
    Shutdown,
    /// The server ended the subscription for good.
    Closed(Option<String>),
    /// Connection lost; a reconnect may follow.
    Lost(String),
}

async fn emit(events: &mpsc::Sender<HubEvent>, event: HubEvent) -> bool {
    events.send(event).await.is_ok()
}

async fn send_frame(write: &mut WsWriter, frame: &HubFrame) -> Result<(), HubError> {
    let record = frame.encode()?;
    write
        .send(WsMessage::Text(record))
        .await
        .map_err(|e| HubError::Send(e.to_string()))
}

async fn run_subscription(
    client: HubClient,
    thread_id: ThreadId,
    events: mpsc::Sender<HubEvent>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut attempt = 0;
    let mut ever_connected = false;

    loop {
        if *shutdown.borrow() {
            return;
        }

        let opened = tokio::select! {
            opened = client.open() => opened,
            _ = shutdown.changed() => return,
        };

        let end = match opened {
            Ok(stream) => {
                let mut progress = SessionProgress::default();
                let end = run_session(stream, thread_id, &events, &mut shutdown, &mut progress).await;
                ever_connected |= progress.handshaken;
                // Only a confirmed join earns a fresh set of retries.
                if progress.joined {
                    attempt = 0;
                }
                end
            }
            Err(e) => SessionEnd::Lost(e.to_string()),
        };

        let error = match end {
            SessionEnd::Shutdown => return,
            SessionEnd::Closed(error) => {
                info!(thread_id = %thread_id, error = ?error, "Hub subscription closed");
                let _ = events.send(HubEvent::Closed { error }).await;
                return;
            }
            SessionEnd::Lost(error) => error,
        };

        // The first connection must succeed; only established ones are retried.
        let delay = if ever_connected {
            client.reconnect_delays.get(attempt).copied()
        } else {
            None
        };
        let Some(delay) = delay else {
            warn!(thread_id = %thread_id, error = %error, "Hub connection failed, giving up");
            let _ = events.send(HubEvent::Closed { error: Some(error) }).await;
            return;
        };

        attempt += 1;
        warn!(thread_id = %thread_id, attempt, delay_ms = delay.as_millis(), error = %error, "Hub connection lost, reconnecting");
        if !emit(&events, HubEvent::Reconnecting { attempt, error }).await {
            return;
        }

        tokio::select! {
            () = tokio::time::sleep(delay) => {}
            _ = shutdown.changed() => return,
        }
    }
}

async fn run_session(
    stream: WsStream,
    thread_id: ThreadId,
    events: &mpsc::Sender<HubEvent>,
    shutdown: &mut watch::Receiver<bool>,
    progress: &mut SessionProgress,
) -> SessionEnd {
    let (mut write, mut read) = stream.split();

    if let Err(e) = write.send(WsMessage::Text(handshake_request())).await {
        return SessionEnd::Lost(e.to_string());
    }

    let mut keep_alive = tokio::time::interval(KEEP_ALIVE_INTERVAL);
    keep_alive.tick().await;

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    leave(&mut write, thread_id, progress.handshaken).await;
                    return SessionEnd::Shutdown;
                }
            }
            _ = keep_alive.tick() => {
                if let Err(e) = send_frame(&mut write, &HubFrame::Ping).await {
                    return SessionEnd::Lost(e.to_string());
                }
            }
            incoming = read.next() => {
                let text = match incoming {
                    Some(Ok(WsMessage::Text(text))) => text,
                    Some(Ok(WsMessage::Close(_))) | None => {
                        return SessionEnd::Lost("connection closed".to_string());
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => return SessionEnd::Lost(e.to_string()),
                };
                if let Some(end) = handle_text(&text, thread_id, events, &mut write, progress).await {
                    return end;
                }
            }
        }
    }
}

/// Process the records of one text message. Returns how the session ends, if
/// it does.
async fn handle_text(
    text: &str,
    thread_id: ThreadId,
    events: &mpsc::Sender<HubEvent>,
    write: &mut WsWriter,
    progress: &mut SessionProgress,
) -> Option<SessionEnd> {
    for record in split_records(text) {
        if !progress.handshaken {
            if let Err(e) = check_handshake(record) {
                return Some(SessionEnd::Lost(e.to_string()));
            }
            progress.handshaken = true;
            debug!(thread_id = %thread_id, "Hub handshake complete");
            if !emit(events, HubEvent::Connected).await {
                return Some(SessionEnd::Shutdown);
            }
            let join = invocation(JOIN_METHOD, thread_id, Some(JOIN_INVOCATION_ID));
            if let Err(e) = send_frame(write, &join).await {
                return Some(SessionEnd::Lost(e.to_string()));
            }
            continue;
        }

        let frame = match HubFrame::decode(record) {
            Ok(frame) => frame,
            Err(e) => {
                debug!(error = %e, "Ignoring malformed hub record");
                continue;
            }
        };

        match frame {
            HubFrame::Invocation {
                target, arguments, ..
            } => {
                if !emit(events, HubEvent::Invocation { target, arguments }).await {
                    return Some(SessionEnd::Shutdown);
                }
            }
            HubFrame::Completion {
                invocation_id,
                error,
            } if invocation_id == JOIN_INVOCATION_ID => {
                if let Some(error) = error {
                    return Some(SessionEnd::Closed(Some(format!("join rejected: {error}"))));
                }
                progress.joined = true;
                info!(thread_id = %thread_id, "Joined conversation");
                if !emit(events, HubEvent::Joined).await {
                    return Some(SessionEnd::Shutdown);
                }
            }
            HubFrame::Close {
                error,
                allow_reconnect,
            } => {
                return Some(if allow_reconnect {
                    SessionEnd::Lost(error.unwrap_or_else(|| "closed by server".to_string()))
                } else {
                    SessionEnd::Closed(error)
                });
            }
            HubFrame::Completion { .. } | HubFrame::Ping | HubFrame::Other(_) => {}
        }
    }
    None
}

/// Best-effort leave and close on shutdown.
async fn leave(write: &mut WsWriter, thread_id: ThreadId, joined: bool) {
    if joined {
        let _ = send_frame(write, &invocation(LEAVE_METHOD, thread_id, None)).await;
    }
    let _ = write.close().await;
    debug!(thread_id = %thread_id, "Left conversation");
}
