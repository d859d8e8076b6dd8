//! Transport layer for the session protocol.
//!
//! The lifecycle code never talks to a socket directly: it goes through
//! the [`Transport`] and [`Connector`] traits so the whole session can be
//! exercised against in-memory fakes. [`WsConnector`] is the production
//! implementation, speaking JSON text frames over a WebSocket.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async_with_config, MaybeTlsStream, WebSocketStream,
    tungstenite::{
        client::IntoClientRequest,
        protocol::{Message as WsMessage, WebSocketConfig},
    },
};
use tracing::{debug, trace, warn};

use crate::protocol::{ClientMessage, ServerMessage};
use crate::{Error, Result};

/// A live, message-oriented connection to the service.
///
/// `Send + Sync` because the pump task owning the transport is spawned
/// onto the runtime and borrows it across await points.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Receive the next message. `Ok(None)` means the peer closed cleanly.
    async fn recv(&mut self) -> Result<Option<ServerMessage>>;

    /// Send a message to the service.
    async fn send(&mut self, msg: &ClientMessage) -> Result<()>;

    /// Close the connection gracefully.
    async fn close(&mut self) -> Result<()>;
}

/// Dials an endpoint and produces a [`Transport`].
#[async_trait]
pub trait Connector: Send + Sync {
    async fn dial(&self, endpoint: &str) -> Result<Box<dyn Transport>>;
}

// ============================================================================
// WebSocket implementation
// ============================================================================

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket transport carrying JSON-framed session messages.
pub struct WsTransport {
    ws: WsStream,
}

impl WsTransport {
    /// Connect to the service WebSocket at the given endpoint.
    pub async fn connect(endpoint: &str) -> Result<Self> {
        debug!(endpoint, "Connecting to WebSocket");

        let request = endpoint
            .into_client_request()
            .map_err(|e| Error::Protocol(format!("invalid endpoint URL: {e}")))?;

        let config = WebSocketConfig::default();
        let (ws, response) = connect_async_with_config(request, Some(config), false)
            .await
            .map_err(Box::new)?;

        debug!(status = ?response.status(), "WebSocket connected");
        trace!(headers = ?response.headers(), "Response headers");

        Ok(Self { ws })
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn recv(&mut self) -> Result<Option<ServerMessage>> {
        while let Some(msg) = self.ws.next().await {
            match msg.map_err(Box::new)? {
                WsMessage::Text(text) => match serde_json::from_str(&text) {
                    Ok(m) => {
                        debug!("RX: {m:?}");
                        return Ok(Some(m));
                    }
                    Err(e) => {
                        // Unknown message types are skipped, not fatal.
                        warn!(error = %e, "RX: Undecodable text frame");
                    }
                },
                WsMessage::Close(_) => {
                    debug!("RX: Close");
                    return Ok(None);
                }
                WsMessage::Ping(_) => {
                    // tungstenite auto-responds to pings
                    trace!("RX: Ping (auto-pong)");
                }
                WsMessage::Pong(_) => {
                    trace!("RX: Pong");
                }
                WsMessage::Binary(data) => {
                    warn!(len = data.len(), "RX: Unexpected binary frame");
                }
                WsMessage::Frame(frame) => {
                    trace!(?frame, "RX: Raw frame");
                }
            }
        }
        Ok(None)
    }

    async fn send(&mut self, msg: &ClientMessage) -> Result<()> {
        debug!("TX: {msg:?}");
        let text = serde_json::to_string(msg)?;
        self.ws
            .send(WsMessage::Text(text))
            .await
            .map_err(Box::new)?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        debug!("Closing WebSocket connection");
        self.ws.close(None).await.map_err(Box::new)?;
        Ok(())
    }
}

/// Production [`Connector`] dialing real WebSocket endpoints.
#[derive(Debug, Default, Clone, Copy)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn dial(&self, endpoint: &str) -> Result<Box<dyn Transport>> {
        Ok(Box::new(WsTransport::connect(endpoint).await?))
    }
}
