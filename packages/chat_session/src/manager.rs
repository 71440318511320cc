//! Connection manager: single owner of the transport lifecycle, the message
//! stream, and the state surface consumers read.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{RwLock, broadcast, mpsc};
use tracing::{debug, warn};

use crate::error::SessionError;
use crate::machine::{self, ConnectionState, Effect, SessionEvent};
use crate::protocol::{self, Message, OutboundFrame};
use crate::stream::MessageStream;
use crate::transport::{Transport, TransportEvent, TransportHandle, WsTransport};

/// Configuration for a connection manager.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// WebSocket endpoint; the display name is appended as a `username`
    /// query parameter on connect.
    pub endpoint: String,
    /// Capacity of the `subscribe()` broadcast channel.
    pub event_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            endpoint: "ws://127.0.0.1:8080/chat".to_string(),
            event_capacity: 256,
        }
    }
}

/// Notifications pushed to subscribed consumers.
#[derive(Clone, Debug)]
pub enum ChatEvent {
    StateChanged(ConnectionState),
    /// A decoded inbound record was appended to the stream.
    Message(Message),
    /// A failure was recorded as the session's last error.
    Error(SessionError),
}

struct Inner {
    state: ConnectionState,
    stream: MessageStream,
    error: Option<SessionError>,
    outbound: Option<mpsc::Sender<String>>,
    username: Option<String>,
}

/// Single authority over whether a chat session exists.
///
/// Owns one transport connection at a time, decodes inbound frames into the
/// session's [`MessageStream`] in arrival order, and gates sending on the
/// Connected state. All mutation funnels through the pure state machine in
/// [`crate::machine`] under one write lock, so consumers always observe a
/// consistent snapshot.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<RwLock<Inner>>,
    /// Session generation counter. Bumped on every connect and disconnect;
    /// events from a superseded session compare stale and are discarded.
    epoch: Arc<AtomicU64>,
    events: broadcast::Sender<ChatEvent>,
    transport: Arc<dyn Transport>,
    config: SessionConfig,
}

impl ConnectionManager {
    /// Create a manager that dials real WebSocket connections.
    pub fn new(config: SessionConfig) -> Self {
        Self::with_transport(config, Arc::new(WsTransport))
    }

    /// Create a manager over a caller-supplied transport.
    pub fn with_transport(config: SessionConfig, transport: Arc<dyn Transport>) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity);
        Self {
            inner: Arc::new(RwLock::new(Inner {
                state: ConnectionState::Disconnected,
                stream: MessageStream::default(),
                error: None,
                outbound: None,
                username: None,
            })),
            epoch: Arc::new(AtomicU64::new(0)),
            events,
            transport,
            config,
        }
    }

    /// Join the room under `name`.
    ///
    /// No-op (returning `false`) when `name` is blank or a session is
    /// already in flight or live. Otherwise clears any previous error,
    /// moves to Connecting, and starts the session task.
    pub async fn connect(&self, name: &str) -> bool {
        let (session_epoch, name) = {
            let mut inner = self.inner.write().await;
            let transition = machine::step(
                inner.state,
                SessionEvent::ConnectRequested {
                    name: name.to_string(),
                },
            );
            let Some(name) = apply(&mut inner, &self.events, transition) else {
                return false;
            };
            inner.username = Some(name.clone());
            (self.epoch.fetch_add(1, Ordering::SeqCst) + 1, name)
        };

        let url = format!("{}?username={}", self.config.endpoint, name);
        debug!("connecting as {} (epoch {})", name, session_epoch);
        let manager = self.clone();
        tokio::spawn(async move { manager.run_session(session_epoch, url).await });
        true
    }

    /// Tear down the current session, if any.
    ///
    /// Closes the transport, empties the message stream, and clears the
    /// error flag. Idempotent and safe from any state.
    pub async fn disconnect(&self) {
        let mut inner = self.inner.write().await;
        // Invalidate the session task first so nothing it has queued can
        // land after the teardown.
        self.epoch.fetch_add(1, Ordering::SeqCst);
        let transition = machine::step(inner.state, SessionEvent::DisconnectRequested);
        apply(&mut inner, &self.events, transition);
        inner.username = None;
        debug!("disconnected");
    }

    /// Send a chat line to the room.
    ///
    /// Returns whether an outbound frame was produced: only while Connected
    /// and only for non-blank text. The frame carries just the kind and
    /// body; id and timestamp are minted by the peer.
    pub async fn send(&self, text: &str) -> bool {
        let outbound = {
            let inner = self.inner.read().await;
            if inner.state != ConnectionState::Connected || text.trim().is_empty() {
                return false;
            }
            match &inner.outbound {
                Some(tx) => tx.clone(),
                None => return false,
            }
        };
        let frame = OutboundFrame::Message {
            message: text.to_string(),
        };
        let json = match serde_json::to_string(&frame) {
            Ok(json) => json,
            Err(e) => {
                warn!("failed to serialize outbound frame: {}", e);
                return false;
            }
        };
        outbound.send(json).await.is_ok()
    }

    /// Clear the last error without touching the connection. The manager
    /// stays Disconnected; reconnecting is an explicit `connect`.
    pub async fn dismiss_error(&self) {
        let mut inner = self.inner.write().await;
        let transition = machine::step(inner.state, SessionEvent::ErrorDismissed);
        apply(&mut inner, &self.events, transition);
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> ConnectionState {
        self.inner.read().await.state
    }

    /// True only while Connected.
    pub async fn is_connected(&self) -> bool {
        self.inner.read().await.state == ConnectionState::Connected
    }

    /// Snapshot of the session's message stream, in arrival order.
    pub async fn messages(&self) -> Vec<Message> {
        self.inner.read().await.stream.snapshot()
    }

    /// The last transport failure, if it has not been cleared.
    pub async fn error(&self) -> Option<SessionError> {
        self.inner.read().await.error.clone()
    }

    /// Display name of the current session, if one is active.
    pub async fn username(&self) -> Option<String> {
        self.inner.read().await.username.clone()
    }

    /// Subscribe to push notifications (state changes, new messages,
    /// recorded errors).
    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.events.subscribe()
    }

    async fn run_session(self, session_epoch: u64, url: String) {
        let handle = match self.transport.connect(url).await {
            Ok(handle) => handle,
            Err(e) => {
                debug!("handshake failed (epoch {}): {}", session_epoch, e);
                self.apply_if_current(session_epoch, SessionEvent::TransportFailed(e))
                    .await;
                return;
            }
        };
        let TransportHandle {
            outbound,
            mut events,
        } = handle;

        {
            let mut inner = self.inner.write().await;
            if self.epoch.load(Ordering::SeqCst) != session_epoch {
                // Superseded while the handshake was in flight; dropping the
                // outbound sender closes the socket.
                return;
            }
            inner.outbound = Some(outbound);
            let transition = machine::step(inner.state, SessionEvent::TransportOpened);
            apply(&mut inner, &self.events, transition);
        }

        while let Some(event) = events.recv().await {
            let session_event = match event {
                TransportEvent::Frame(text) => match protocol::decode_frame(&text) {
                    Ok(record) => SessionEvent::FrameReceived(record),
                    Err(e) => {
                        // Malformed frames are dropped; the session carries on.
                        warn!("{}", e);
                        continue;
                    }
                },
                TransportEvent::Closed => SessionEvent::TransportClosed,
                TransportEvent::Failed(e) => SessionEvent::TransportFailed(e),
            };
            let terminal = matches!(
                session_event,
                SessionEvent::TransportClosed | SessionEvent::TransportFailed(_)
            );
            if !self.apply_if_current(session_epoch, session_event).await {
                break;
            }
            if terminal {
                break;
            }
        }
    }

    /// Run one event through the machine if this session is still current.
    /// Returns `false` once the session has been superseded; the epoch check
    /// happens under the write lock, so a stale event can never interleave
    /// with a newer session's teardown or setup.
    async fn apply_if_current(&self, session_epoch: u64, event: SessionEvent) -> bool {
        let mut inner = self.inner.write().await;
        if self.epoch.load(Ordering::SeqCst) != session_epoch {
            debug!("discarding event from superseded session {}", session_epoch);
            return false;
        }
        let transition = machine::step(inner.state, event);
        apply(&mut inner, &self.events, transition);
        true
    }
}

/// Apply a transition's effects and state change to the shared session
/// state, broadcasting the observable ones. Returns the display name when
/// the transition asks for a new transport, which the caller must act on.
fn apply(
    inner: &mut Inner,
    events: &broadcast::Sender<ChatEvent>,
    transition: machine::Transition,
) -> Option<String> {
    let mut open_request = None;
    for effect in transition.effects {
        match effect {
            Effect::OpenTransport { name } => open_request = Some(name),
            Effect::CloseTransport => inner.outbound = None,
            Effect::ResetStream => inner.stream.reset(),
            Effect::Append(record) => {
                inner.stream.append(record.clone());
                let _ = events.send(ChatEvent::Message(record));
            }
            Effect::ClearError => inner.error = None,
            Effect::RecordError(err) => {
                inner.error = Some(err.clone());
                let _ = events.send(ChatEvent::Error(err));
            }
        }
    }
    if transition.next != inner.state {
        inner.state = transition.next;
        let _ = events.send(ChatEvent::StateChanged(inner.state));
    }
    open_request
}
