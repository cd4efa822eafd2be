//! Presentation surfaces the relay talks through.
//!
//! A surface is opened per request at a path on the wallet's origin. Once
//! `open` resolves the surface is ready to receive the request envelope; every
//! message it emits is forwarded into the relay's inbox.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use url::Url;

use crate::relay::protocol::{InboundMessage, RelayEnvelope};
use crate::relay::RelayError;

/// Sender side of the relay inbox.
pub type Inbox = mpsc::UnboundedSender<InboundMessage>;

/// Factory for per-request surfaces.
#[async_trait]
pub trait WalletSurface: Send + Sync {
    /// Load `url` and resolve once the surface can accept a message.
    async fn open(&self, url: Url, inbox: Inbox) -> Result<Box<dyn SurfaceHandle>, RelayError>;
}

/// A live surface.
pub trait SurfaceHandle: Send + Sync {
    fn post(&self, envelope: &RelayEnvelope) -> Result<(), RelayError>;

    /// Tear the surface down. Idempotent.
    fn close(&self);
}

/// Surface reached over a WebSocket at the wallet URL.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketSurface;

impl WebSocketSurface {
    pub fn new() -> Self {
        Self
    }
}

/// Map an `http(s)` wallet URL onto its `ws(s)` equivalent.
pub fn websocket_url(url: &Url) -> Result<Url, RelayError> {
    let scheme = match url.scheme() {
        "https" | "wss" => "wss",
        "http" | "ws" => "ws",
        other => return Err(RelayError::InvalidUrl(format!("unsupported scheme '{other}'"))),
    };
    let mut ws = url.clone();
    ws.set_scheme(scheme)
        .map_err(|_| RelayError::InvalidUrl(url.to_string()))?;
    Ok(ws)
}

#[async_trait]
impl WalletSurface for WebSocketSurface {
    async fn open(&self, url: Url, inbox: Inbox) -> Result<Box<dyn SurfaceHandle>, RelayError> {
        let origin = url.origin().ascii_serialization();
        let ws_url = websocket_url(&url)?;

        let (stream, _) = connect_async(ws_url.as_str())
            .await
            .map_err(|e| RelayError::Surface(e.to_string()))?;
        let (mut write, mut read) = stream.split();
        tracing::debug!(url = %url, "Wallet surface connected");

        let (outgoing, mut outgoing_rx) = mpsc::unbounded_channel::<Message>();

        let writer = tokio::spawn(async move {
            while let Some(message) = outgoing_rx.recv().await {
                let closing = matches!(message, Message::Close(_));
                if let Err(e) = write.send(message).await {
                    tracing::warn!(error = %e, "Wallet surface write failed");
                    break;
                }
                if closing {
                    break;
                }
            }
        });

        let reader = tokio::spawn(async move {
            while let Some(frame) = read.next().await {
                match frame {
                    Ok(Message::Text(text)) => match serde_json::from_str(text.as_str()) {
                        Ok(data) => {
                            let message = InboundMessage {
                                origin: origin.clone(),
                                data,
                            };
                            if inbox.send(message).is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            tracing::debug!(error = %e, "Ignoring non-JSON frame from wallet surface");
                        }
                    },
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!(error = %e, "Wallet surface read failed");
                        break;
                    }
                }
            }
        });

        Ok(Box::new(WebSocketHandle {
            outgoing,
            reader,
            writer,
        }))
    }
}

struct WebSocketHandle {
    outgoing: mpsc::UnboundedSender<Message>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl SurfaceHandle for WebSocketHandle {
    fn post(&self, envelope: &RelayEnvelope) -> Result<(), RelayError> {
        let text = serde_json::to_string(envelope)
            .map_err(|e| RelayError::Surface(e.to_string()))?;
        self.outgoing
            .send(Message::text(text))
            .map_err(|_| RelayError::Surface("surface connection closed".to_string()))
    }

    fn close(&self) {
        // Writer exits after flushing the close frame.
        if self.outgoing.send(Message::Close(None)).is_err() {
            self.writer.abort();
        }
        self.reader.abort();
    }
}

impl Drop for WebSocketHandle {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_websocket_url_mapping() {
        let url = Url::parse("https://wallet.example/public/send.html").unwrap();
        assert_eq!(
            websocket_url(&url).unwrap().as_str(),
            "wss://wallet.example/public/send.html"
        );

        let local = Url::parse("http://127.0.0.1:3000/public/login.html").unwrap();
        assert_eq!(websocket_url(&local).unwrap().scheme(), "ws");

        let bad = Url::parse("ftp://wallet.example/").unwrap();
        assert!(matches!(websocket_url(&bad), Err(RelayError::InvalidUrl(_))));
    }
}
