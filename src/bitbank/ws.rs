use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use super::socketio::{self, Packet};
use crate::error::FeedError;
use crate::stream::{Connection, Inbound, Transport};

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Socket.IO-over-WebSocket transport for the bitbank public stream.
#[derive(Debug, Clone)]
pub struct BitbankSocketTransport {
    url: String,
}

impl BitbankSocketTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

impl Transport for BitbankSocketTransport {
    type Conn = BitbankSocketConnection;

    async fn connect(&mut self) -> Result<BitbankSocketConnection, FeedError> {
        tracing::info!(url = %self.url, "Connecting to stream");
        let (ws, _resp) = tokio_tungstenite::connect_async(self.url.as_str())
            .await
            .map_err(|e| FeedError::Transport(format!("connect {}: {}", self.url, e)))?;
        let mut conn = BitbankSocketConnection { ws };
        tokio::time::timeout(HANDSHAKE_TIMEOUT, conn.handshake())
            .await
            .map_err(|_| FeedError::Transport("socket.io handshake timed out".to_string()))??;
        tracing::info!("Socket.IO namespace connected");
        Ok(conn)
    }
}

pub struct BitbankSocketConnection {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl BitbankSocketConnection {
    /// Wait for the engine open packet, join the default namespace, and wait
    /// for the server to confirm it.
    async fn handshake(&mut self) -> Result<(), FeedError> {
        let mut opened = false;
        loop {
            let Some(text) = self.next_text().await? else {
                return Err(FeedError::Disconnect(
                    "closed during handshake".to_string(),
                ));
            };
            match socketio::decode(&text) {
                Packet::Open if !opened => {
                    opened = true;
                    self.send(socketio::CONNECT).await?;
                }
                Packet::Connected => return Ok(()),
                Packet::Ping => self.send(socketio::PONG).await?,
                Packet::ConnectError(reason) => {
                    return Err(FeedError::Transport(format!(
                        "namespace refused: {reason}"
                    )))
                }
                Packet::Close | Packet::Disconnect => {
                    return Err(FeedError::Disconnect(
                        "closed during handshake".to_string(),
                    ))
                }
                _ => {}
            }
        }
    }

    async fn next_text(&mut self) -> Result<Option<String>, FeedError> {
        while let Some(msg) = self.ws.next().await {
            match msg.map_err(|e| FeedError::Transport(format!("read: {e}")))? {
                Message::Text(text) => return Ok(Some(text)),
                Message::Close(frame) => {
                    tracing::debug!(?frame, "WebSocket close frame");
                    return Ok(None);
                }
                // tungstenite answers WebSocket-level pings itself
                _ => {}
            }
        }
        Ok(None)
    }

    async fn send(&mut self, frame: &str) -> Result<(), FeedError> {
        self.ws
            .send(Message::Text(frame.to_string()))
            .await
            .map_err(|e| FeedError::Transport(format!("write: {e}")))
    }
}

impl Connection for BitbankSocketConnection {
    async fn subscribe(&mut self, channel: &str) -> Result<(), FeedError> {
        self.send(&socketio::join_room(channel)).await
    }

    async fn recv(&mut self) -> Option<Result<Inbound, FeedError>> {
        loop {
            let text = match self.next_text().await {
                Ok(Some(text)) => text,
                Ok(None) => return None,
                Err(e) => return Some(Err(e)),
            };
            match socketio::decode(&text) {
                Packet::Event(payload) => return Some(Ok(Inbound::Message(payload))),
                Packet::Ping => {
                    if let Err(e) = self.send(socketio::PONG).await {
                        return Some(Err(e));
                    }
                }
                Packet::Close | Packet::Disconnect => return None,
                Packet::ConnectError(reason) => {
                    return Some(Err(FeedError::Disconnect(reason)));
                }
                Packet::Unknown => {
                    tracing::debug!(frame = %text, "Unrecognized socket.io frame");
                    return Some(Ok(Inbound::Unrecognized));
                }
                Packet::Open | Packet::Connected | Packet::Pong | Packet::Noop => {}
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.ws.close(None).await {
            tracing::debug!(error = %e, "WebSocket close failed");
        }
    }
}
