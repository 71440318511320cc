//! Session error types.

/// Failures surfaced by the session manager.
///
/// Cloneable so the most recent failure can be held as session state and
/// re-observed by consumers. Calling `send` while disconnected is not an
/// error; it is a defined no-op.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// The WebSocket connection could not be established.
    #[error("websocket handshake failed: {0}")]
    Handshake(String),

    /// An established session failed with a protocol or I/O error.
    #[error("transport failure: {0}")]
    Transport(String),

    /// An inbound frame did not match the wire schema.
    #[error("malformed inbound frame: {0}")]
    Decode(String),
}
