//! Pure connection state machine.
//!
//! Transitions are a function of (state, event); side effects come back as
//! an effect list for the manager to apply. This keeps the lifecycle rules
//! testable without a socket.

use crate::error::SessionError;
use crate::protocol::Message;

/// Lifecycle state of the one managed connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No active transport. Initial state.
    Disconnected,
    /// Handshake in flight.
    Connecting,
    /// Session usable; sending is permitted.
    Connected,
    /// A failure ended the last attempt or session. Not connected; a fresh
    /// `connect` clears it.
    Errored,
}

/// Inputs to the machine: the user-facing calls plus transport lifecycle
/// signals.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    ConnectRequested { name: String },
    TransportOpened,
    FrameReceived(Message),
    TransportClosed,
    TransportFailed(SessionError),
    DisconnectRequested,
    ErrorDismissed,
}

/// Side effects the manager must carry out for a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Open a new transport session for this display name.
    OpenTransport { name: String },
    /// Drop the live transport handle, closing the connection.
    CloseTransport,
    /// Empty the message stream.
    ResetStream,
    /// Append one decoded record to the stream.
    Append(Message),
    /// Clear the last-error flag.
    ClearError,
    /// Record a failure as the last error.
    RecordError(SessionError),
}

/// Result of feeding one event to the machine.
#[derive(Debug, Clone)]
pub struct Transition {
    pub next: ConnectionState,
    pub effects: Vec<Effect>,
}

fn stay(state: ConnectionState) -> Transition {
    Transition {
        next: state,
        effects: Vec::new(),
    }
}

/// Feed one event to the machine.
pub fn step(state: ConnectionState, event: SessionEvent) -> Transition {
    use ConnectionState::*;

    match event {
        SessionEvent::ConnectRequested { name } => {
            let name = name.trim();
            // Blank names never dial; an in-flight or live session is never
            // superseded implicitly.
            if name.is_empty() {
                return stay(state);
            }
            match state {
                Disconnected | Errored => Transition {
                    next: Connecting,
                    effects: vec![
                        Effect::ClearError,
                        Effect::OpenTransport {
                            name: name.to_string(),
                        },
                    ],
                },
                Connecting | Connected => stay(state),
            }
        }

        SessionEvent::TransportOpened => match state {
            // The stream resets on successful open, so a new session always
            // starts empty while an unexpectedly closed one keeps its
            // contents readable.
            Connecting => Transition {
                next: Connected,
                effects: vec![Effect::ResetStream],
            },
            _ => stay(state),
        },

        SessionEvent::FrameReceived(record) => match state {
            // A frame racing ahead of the reported open is still recorded.
            Connecting | Connected => Transition {
                next: state,
                effects: vec![Effect::Append(record)],
            },
            Disconnected | Errored => stay(state),
        },

        SessionEvent::TransportClosed => match state {
            // Peer-initiated close of a live session: not flagged as an
            // error, and the stream is retained until the next connect or
            // disconnect.
            Connected => Transition {
                next: Disconnected,
                effects: vec![Effect::CloseTransport],
            },
            // Abrupt close before the session became usable is a failed
            // handshake.
            Connecting => Transition {
                next: Errored,
                effects: vec![
                    Effect::CloseTransport,
                    Effect::RecordError(SessionError::Handshake(
                        "connection closed during handshake".to_string(),
                    )),
                ],
            },
            Disconnected | Errored => stay(state),
        },

        SessionEvent::TransportFailed(err) => match state {
            Connecting | Connected => Transition {
                next: Errored,
                effects: vec![Effect::CloseTransport, Effect::RecordError(err)],
            },
            Disconnected | Errored => stay(state),
        },

        SessionEvent::DisconnectRequested => Transition {
            next: Disconnected,
            effects: vec![
                Effect::CloseTransport,
                Effect::ResetStream,
                Effect::ClearError,
            ],
        },

        SessionEvent::ErrorDismissed => match state {
            // Dismissing settles in Disconnected; it never implies a retry.
            Errored => Transition {
                next: Disconnected,
                effects: vec![Effect::ClearError],
            },
            _ => stay(state),
        },
    }
}
