//! Control connection transport
//!
//! A [`Connection`] is the client half of a message-oriented text channel.
//! Transports produce connections; the WebSocket transport runs a pump task
//! that moves messages between the connection and the socket.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use reqwest::Url;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::error::SessionError;

/// Client side of an established control connection
pub struct Connection {
    outbound: mpsc::UnboundedSender<String>,
    closed: watch::Receiver<bool>,
}

/// Transport side of a [`Connection`]
pub struct RemoteEnd {
    outbound: mpsc::UnboundedReceiver<String>,
    closed: watch::Sender<bool>,
}

impl Connection {
    /// Create a connected pair
    pub fn pair() -> (Connection, RemoteEnd) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (closed_tx, closed_rx) = watch::channel(false);
        (
            Connection {
                outbound: outbound_tx,
                closed: closed_rx,
            },
            RemoteEnd {
                outbound: outbound_rx,
                closed: closed_tx,
            },
        )
    }

    /// Queue one text message. Never waits for the peer.
    pub fn send(&self, text: String) -> Result<(), SessionError> {
        if !self.is_open() {
            return Err(SessionError::Disconnected);
        }
        self.outbound
            .send(text)
            .map_err(|_| SessionError::Disconnected)
    }

    pub fn is_open(&self) -> bool {
        !*self.closed.borrow() && !self.outbound.is_closed()
    }

    /// Future that resolves once the transport side has closed.
    ///
    /// Holds only the close signal, not the connection.
    pub fn on_close(&self) -> impl std::future::Future<Output = ()> + Send + 'static {
        let mut closed = self.closed.clone();
        async move {
            loop {
                if *closed.borrow_and_update() {
                    break;
                }
                if closed.changed().await.is_err() {
                    break;
                }
            }
        }
    }
}

impl RemoteEnd {
    /// Next message queued by the client; `None` once the client is gone
    pub async fn recv(&mut self) -> Option<String> {
        self.outbound.recv().await
    }

    /// Signal that the connection has ended
    pub fn close(&self) {
        let _ = self.closed.send(true);
    }
}

/// Opens control connections
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn connect(&self, url: &Url) -> Result<Connection, SessionError>;
}

/// Transport over WebSocket text frames
#[derive(Debug, Clone, Default)]
pub struct WebSocketTransport;

#[async_trait]
impl Transport for WebSocketTransport {
    async fn connect(&self, url: &Url) -> Result<Connection, SessionError> {
        debug!("WS connect to {}", url);
        let (stream, _response) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| SessionError::ConnectionFailed(e.to_string()))?;
        info!("WS connection established");

        let (connection, remote) = Connection::pair();
        tokio::spawn(pump(stream, remote));
        Ok(connection)
    }
}

async fn pump<S>(stream: tokio_tungstenite::WebSocketStream<S>, mut remote: RemoteEnd)
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let (mut sink, mut source) = stream.split();

    loop {
        tokio::select! {
            outgoing = remote.recv() => match outgoing {
                Some(text) => {
                    if let Err(e) = sink.send(Message::text(text)).await {
                        warn!("WS send failed: {}", e);
                        break;
                    }
                }
                None => {
                    // Client dropped the connection
                    let _ = sink.close().await;
                    break;
                }
            },
            incoming = source.next() => match incoming {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(other)) => debug!("Ignoring server message: {:?}", other),
                Some(Err(e)) => {
                    warn!("WS error: {}", e);
                    break;
                }
            },
        }
    }

    info!("WS connection closed");
    remote.close();
}
