//! WebSocket transport behind a narrow seam.
//!
//! The manager only ever sees a [`TransportHandle`]: an outbound channel of
//! serialized frames and an inbound channel of lifecycle events. The real
//! implementation pumps a tokio-tungstenite socket; tests script a
//! channel-backed substitute.

use futures::future::BoxFuture;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;
use tracing::{debug, error};

use crate::error::SessionError;

/// Notifications from an open transport, delivered in arrival order.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// One text frame from the peer, still serialized.
    Frame(String),
    /// The peer closed the connection or the stream ended.
    Closed,
    /// The stream failed with a protocol or I/O error.
    Failed(SessionError),
}

/// Channel pair for one open transport session.
pub struct TransportHandle {
    /// Serialized frames to send to the peer. Dropping the sender closes
    /// the connection.
    pub outbound: mpsc::Sender<String>,
    /// Lifecycle events and inbound frames.
    pub events: mpsc::Receiver<TransportEvent>,
}

/// Seam between the session manager and the wire.
pub trait Transport: Send + Sync {
    /// Establish a connection; resolving `Ok` means the handshake completed
    /// and the session is open.
    fn connect(&self, url: String) -> BoxFuture<'static, Result<TransportHandle, SessionError>>;
}

const CHANNEL_CAPACITY: usize = 64;

/// The tokio-tungstenite transport used outside of tests.
pub struct WsTransport;

impl Transport for WsTransport {
    fn connect(&self, url: String) -> BoxFuture<'static, Result<TransportHandle, SessionError>> {
        Box::pin(async move {
            let (ws_stream, _) = tokio_tungstenite::connect_async(&url)
                .await
                .map_err(|e| SessionError::Handshake(e.to_string()))?;
            debug!("websocket open: {}", url);

            let (outbound_tx, mut outbound_rx) = mpsc::channel::<String>(CHANNEL_CAPACITY);
            let (event_tx, event_rx) = mpsc::channel::<TransportEvent>(CHANNEL_CAPACITY);

            tokio::spawn(async move {
                let (mut ws_write, mut ws_read) = ws_stream.split();
                loop {
                    tokio::select! {
                        frame = outbound_rx.recv() => match frame {
                            Some(json) => {
                                if ws_write.send(tungstenite::Message::Text(json.into())).await.is_err() {
                                    let _ = event_tx.send(TransportEvent::Closed).await;
                                    break;
                                }
                            }
                            // Sender dropped: the session was torn down on
                            // our side; say goodbye and stop pumping.
                            None => {
                                let _ = ws_write.send(tungstenite::Message::Close(None)).await;
                                break;
                            }
                        },
                        msg = ws_read.next() => match msg {
                            Some(Ok(tungstenite::Message::Text(text))) => {
                                if event_tx.send(TransportEvent::Frame(text.to_string())).await.is_err() {
                                    break;
                                }
                            }
                            Some(Ok(tungstenite::Message::Close(_))) | None => {
                                let _ = event_tx.send(TransportEvent::Closed).await;
                                break;
                            }
                            Some(Err(e)) => {
                                error!("websocket stream error: {}", e);
                                let _ = event_tx
                                    .send(TransportEvent::Failed(SessionError::Transport(e.to_string())))
                                    .await;
                                break;
                            }
                            // Ping/pong/binary frames are not part of the
                            // chat protocol.
                            Some(Ok(_)) => {}
                        },
                    }
                }
                debug!("websocket pump finished");
            });

            Ok(TransportHandle {
                outbound: outbound_tx,
                events: event_rx,
            })
        })
    }
}
