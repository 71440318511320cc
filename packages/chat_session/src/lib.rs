//! Chat Session - connection/session management for a real-time chat client
//!
//! This crate owns the lifecycle of one WebSocket chat connection: a small
//! state machine over the transport (Disconnected, Connecting, Connected,
//! Errored), an append-only log of decoded messages in arrival order, and a
//! race-free surface (`connect` / `disconnect` / `send` plus snapshots and a
//! broadcast of [`ChatEvent`]s) for a UI layer to consume. It has no
//! rendering logic and no knowledge of any particular UI.
//!
//! # Example
//!
//! ```no_run
//! use chat_session::{ChatEvent, ConnectionManager, SessionConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let manager = ConnectionManager::new(SessionConfig {
//!         endpoint: "ws://localhost:8080/chat".to_string(),
//!         ..Default::default()
//!     });
//!     let mut events = manager.subscribe();
//!
//!     manager.connect("alice").await;
//!     manager.send("hello, room").await;
//!
//!     while let Ok(event) = events.recv().await {
//!         match event {
//!             ChatEvent::Message(record) => println!("{}: {}", record.sender.as_deref().unwrap_or("*"), record.body),
//!             ChatEvent::StateChanged(state) => println!("[{:?}]", state),
//!             ChatEvent::Error(e) => eprintln!("error: {}", e),
//!         }
//!     }
//! }
//! ```

mod error;
pub mod machine;
mod manager;
mod protocol;
mod stream;
mod transport;

pub use error::SessionError;
pub use machine::ConnectionState;
pub use manager::{ChatEvent, ConnectionManager, SessionConfig};
pub use protocol::{InboundFrame, Message, MessageKind, OutboundFrame, decode_frame};
pub use stream::MessageStream;
pub use transport::{Transport, TransportEvent, TransportHandle, WsTransport};
