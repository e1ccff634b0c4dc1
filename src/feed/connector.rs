/// WebSocket transport for the feed
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

use crate::error::{EngineError, Result};

/// One open feed connection
#[async_trait]
pub trait FeedSession: Send {
    async fn send_text(&mut self, text: String) -> Result<()>;

    /// Next text frame. `None` once the peer has closed the stream.
    async fn next_text(&mut self) -> Option<Result<String>>;

    async fn close(&mut self);
}

/// Seam that lets the connection manager be driven by scripted sessions
#[async_trait]
pub trait FeedConnector: Send + Sync {
    async fn connect(&self, url: &str) -> Result<Box<dyn FeedSession>>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct WsConnector;

#[async_trait]
impl FeedConnector for WsConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn FeedSession>> {
        let (stream, _) = connect_async(url).await?;
        Ok(Box::new(WsSession { stream }))
    }
}

struct WsSession {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl FeedSession for WsSession {
    async fn send_text(&mut self, text: String) -> Result<()> {
        self.stream.send(Message::Text(text)).await?;
        Ok(())
    }

    async fn next_text(&mut self) -> Option<Result<String>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text)),
                Ok(Message::Binary(data)) => {
                    return Some(String::from_utf8(data).map_err(|e| {
                        EngineError::InvalidMessage(format!("binary frame is not UTF-8: {}", e))
                    }))
                }
                Ok(Message::Close(frame)) => {
                    warn!("WebSocket closed by server: {:?}", frame);
                    return None;
                }
                // Pongs are queued by tungstenite itself
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) | Ok(Message::Frame(_)) => {
                    debug!("Control frame");
                }
                Err(e) => return Some(Err(e.into())),
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            debug!("WebSocket close: {}", e);
        }
    }
}
