//! WebSocket connection manager for one collaborative session.
//!
//! Owns the channel lifecycle:
//!
//! - `connect` / `disconnect`, with exactly one channel at a time
//! - bounded automatic reconnect: fixed interval, fixed attempt budget,
//!   counter reset on every successful open, terminal failure after
//!   exhaustion
//! - per-message JSON decode (a malformed frame is dropped and logged,
//!   never torn down)
//! - non-queuing `send`: when the channel is not open the send fails
//!   immediately and the caller owns any retry policy
//!
//! Inbound traffic and lifecycle transitions are surfaced to the owner as
//! [`ConnectionEvent`]s over an mpsc channel taken once with
//! [`ConnectionManager::take_event_rx`].

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;

use verso_core::User;

use crate::protocol::{ClientMessage, Envelope};
use crate::session::MessageSink;

/// Observable channel state, readable synchronously at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    /// Reconnect budget exhausted; no further automatic retries.
    Failed,
}

/// Events emitted to the owning session.
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    /// Channel opened (initial connect or successful reconnect).
    Open,
    /// Channel closed. Followed by `Reconnecting` unless the close was
    /// requested via `disconnect` or the retry budget is exhausted.
    Closed,
    /// A decoded inbound frame.
    Message(Envelope),
    /// Transport-level failure. Reported, never a teardown by itself.
    TransportError(String),
    /// A reconnect attempt is scheduled (1-based attempt counter).
    Reconnecting { attempt: u32 },
    /// Retry budget exhausted; the manager is in `Failed` state.
    GaveUp,
}

/// Reconnect policy knobs.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Fixed delay between reconnect attempts.
    pub reconnect_interval: Duration,
    /// Attempts per outage before giving up. Resets on a successful open.
    pub max_reconnect_attempts: u32,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            reconnect_interval: Duration::from_secs(3),
            max_reconnect_attempts: 5,
        }
    }
}

/// Build the channel URL for a session join.
///
/// The server identifies the participant from query parameters; values are
/// percent-encoded so display names survive spaces and non-ASCII.
pub fn session_url(base: &str, session_id: &str, user: &User) -> String {
    format!(
        "{}/{}?user_id={}&user_name={}&user_role={}",
        base.trim_end_matches('/'),
        session_id,
        encode_component(&user.id),
        encode_component(&user.name),
        user.role.as_str(),
    )
}

fn encode_component(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

/// Slot holding the sender side of the currently open socket, if any.
/// Set by the supervisor task on open, cleared on close.
type OutgoingSlot = Arc<Mutex<Option<mpsc::Sender<String>>>>;

/// The connection manager. One per session.
pub struct ConnectionManager {
    config: ConnectionConfig,
    state_tx: watch::Sender<ConnectionState>,
    state_rx: watch::Receiver<ConnectionState>,
    event_tx: mpsc::Sender<ConnectionEvent>,
    event_rx: Option<mpsc::Receiver<ConnectionEvent>>,
    outgoing: OutgoingSlot,
    shutdown_tx: Option<watch::Sender<bool>>,
    supervisor: Option<tokio::task::JoinHandle<()>>,
}

impl ConnectionManager {
    pub fn new(config: ConnectionConfig) -> Self {
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let (event_tx, event_rx) = mpsc::channel(256);
        Self {
            config,
            state_tx,
            state_rx,
            event_tx,
            event_rx: Some(event_rx),
            outgoing: Arc::new(Mutex::new(None)),
            shutdown_tx: None,
            supervisor: None,
        }
    }

    /// Take the event receiver (can only be called once).
    pub fn take_event_rx(&mut self) -> Option<mpsc::Receiver<ConnectionEvent>> {
        self.event_rx.take()
    }

    /// Current channel state.
    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Open the channel. Any existing channel is torn down first; a call
    /// while a connect attempt is already pending is a no-op.
    ///
    /// Non-blocking: the connection lifecycle runs on a spawned supervisor
    /// task that keeps reconnecting within the configured budget.
    pub fn connect(&mut self, url: impl Into<String>) {
        match self.state() {
            ConnectionState::Connecting | ConnectionState::Reconnecting => {
                log::debug!("connect ignored: attempt already pending");
                return;
            }
            ConnectionState::Connected => self.disconnect(),
            ConnectionState::Disconnected | ConnectionState::Failed => {}
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        self.shutdown_tx = Some(shutdown_tx);
        let _ = self.state_tx.send(ConnectionState::Connecting);

        let handle = tokio::spawn(run_supervisor(
            url.into(),
            self.config.clone(),
            self.state_tx.clone(),
            self.event_tx.clone(),
            self.outgoing.clone(),
            shutdown_rx,
        ));
        self.supervisor = Some(handle);
    }

    /// Send a message now, or fail now.
    ///
    /// Returns `false` (with a logged warning) when the channel is not open
    /// or the frame cannot be serialized. Nothing is ever queued.
    pub fn send(&self, msg: &ClientMessage) -> bool {
        if self.state() != ConnectionState::Connected {
            log::warn!("dropping `{}`: channel is not open", msg.msg_type());
            return false;
        }
        let frame = match msg.encode() {
            Ok(frame) => frame,
            Err(e) => {
                log::warn!("dropping `{}`: {e}", msg.msg_type());
                return false;
            }
        };
        let Ok(slot) = self.outgoing.lock() else {
            return false;
        };
        match slot.as_ref() {
            Some(tx) => tx.try_send(frame).is_ok(),
            None => {
                log::warn!("dropping `{}`: socket writer is gone", msg.msg_type());
                false
            }
        }
    }

    /// Close the channel and cancel any pending reconnect. Idempotent.
    pub fn disconnect(&mut self) {
        if let Some(shutdown) = self.shutdown_tx.take() {
            let _ = shutdown.send(true);
        }
        if let Some(handle) = self.supervisor.take() {
            handle.abort();
        }
        if let Ok(mut slot) = self.outgoing.lock() {
            slot.take();
        }
        let was_connected = self.state() == ConnectionState::Connected;
        let _ = self.state_tx.send(ConnectionState::Disconnected);
        if was_connected {
            let _ = self.event_tx.try_send(ConnectionEvent::Closed);
        }
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new(ConnectionConfig::default())
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl MessageSink for ConnectionManager {
    fn send(&self, msg: &ClientMessage) -> bool {
        ConnectionManager::send(self, msg)
    }

    fn close(&mut self) {
        self.disconnect();
    }
}

/// Connection supervisor: dial, pump, and reconnect within budget.
///
/// Runs until an explicit shutdown or the retry budget is exhausted.
async fn run_supervisor(
    url: String,
    config: ConnectionConfig,
    state: watch::Sender<ConnectionState>,
    events: mpsc::Sender<ConnectionEvent>,
    outgoing: OutgoingSlot,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut attempts: u32 = 0;

    loop {
        match tokio_tungstenite::connect_async(&url).await {
            Ok((stream, _)) => {
                attempts = 0;
                pump_socket(stream, &state, &events, &outgoing, &mut shutdown).await;

                if let Ok(mut slot) = outgoing.lock() {
                    slot.take();
                }
                let _ = events.send(ConnectionEvent::Closed).await;
                if *shutdown.borrow() {
                    let _ = state.send(ConnectionState::Disconnected);
                    return;
                }
                // Unexpected close: fall through to the retry path.
            }
            Err(e) => {
                let _ = events
                    .send(ConnectionEvent::TransportError(e.to_string()))
                    .await;
            }
        }

        if attempts >= config.max_reconnect_attempts {
            log::warn!(
                "giving up after {} reconnect attempts",
                config.max_reconnect_attempts
            );
            let _ = state.send(ConnectionState::Failed);
            let _ = events.send(ConnectionEvent::GaveUp).await;
            return;
        }

        attempts += 1;
        let _ = state.send(ConnectionState::Reconnecting);
        let _ = events
            .send(ConnectionEvent::Reconnecting { attempt: attempts })
            .await;

        tokio::select! {
            _ = tokio::time::sleep(config.reconnect_interval) => {}
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    let _ = state.send(ConnectionState::Disconnected);
                    return;
                }
            }
        }
    }
}

/// Pump one open socket until it closes or shutdown is requested.
/// Returns once the socket is finished; the caller handles retry policy.
async fn pump_socket(
    stream: tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >,
    state: &watch::Sender<ConnectionState>,
    events: &mpsc::Sender<ConnectionEvent>,
    outgoing: &OutgoingSlot,
    shutdown: &mut watch::Receiver<bool>,
) {
    let (mut writer, mut reader) = stream.split();

    let (out_tx, mut out_rx) = mpsc::channel::<String>(256);
    if let Ok(mut slot) = outgoing.lock() {
        *slot = Some(out_tx);
    }
    let _ = state.send(ConnectionState::Connected);
    let _ = events.send(ConnectionEvent::Open).await;

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    let _ = writer.send(Message::Close(None)).await;
                    return;
                }
            }
            frame = out_rx.recv() => {
                match frame {
                    Some(text) => {
                        if writer.send(Message::Text(text.into())).await.is_err() {
                            return;
                        }
                    }
                    None => return,
                }
            }
            inbound = reader.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        match Envelope::decode(text.as_str()) {
                            Ok(envelope) => {
                                let _ = events.send(ConnectionEvent::Message(envelope)).await;
                            }
                            // A bad frame is dropped; the connection lives on.
                            Err(e) => log::warn!("dropping malformed frame: {e}"),
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => return,
                    Some(Ok(_)) => {} // binary/ping/pong: not part of this protocol
                    Some(Err(e)) => {
                        let _ = events
                            .send(ConnectionEvent::TransportError(e.to_string()))
                            .await;
                        return;
                    }
                }
            }
        }
    }
}
