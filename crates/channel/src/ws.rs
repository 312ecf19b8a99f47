//! WebSocket transport over tokio-tungstenite.
//!
//! Production implementation of [`Transport`] speaking to the job
//! channel endpoint (`{base}/generate/{job_id}`).

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::transport::{Transport, TransportConnection, TransportError, TransportEvent};

/// Close code for a close frame that carried no status code.
const NO_STATUS: u16 = 1005;

/// [`Transport`] implementation backed by tokio-tungstenite.
pub struct WsTransport;

impl WsTransport {
    pub fn new() -> Self {
        Self
    }
}

impl Default for WsTransport {
    fn default() -> Self {
        Self::new()
    }
}

/// A live WebSocket connection to a job channel endpoint.
pub struct WsConnection {
    ws_stream: WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>,
}

#[async_trait]
impl Transport for WsTransport {
    type Conn = WsConnection;

    async fn open(&self, endpoint: &str) -> Result<WsConnection, TransportError> {
        let (ws_stream, _response) = connect_async(endpoint).await.map_err(|e| {
            TransportError::Connect(format!("Failed to connect to {endpoint}: {e}"))
        })?;

        tracing::info!(endpoint, "WebSocket connected");

        Ok(WsConnection { ws_stream })
    }
}

#[async_trait]
impl TransportConnection for WsConnection {
    async fn next_event(&mut self) -> Option<TransportEvent> {
        while let Some(msg_result) = self.ws_stream.next().await {
            match msg_result {
                Ok(Message::Text(text)) => return Some(TransportEvent::Text(text)),
                Ok(Message::Binary(_)) => {
                    tracing::trace!("Ignoring binary frame");
                }
                Ok(Message::Ping(_) | Message::Pong(_)) => {
                    // Handled automatically by tungstenite.
                }
                Ok(Message::Close(frame)) => {
                    let (code, reason) = match frame {
                        Some(f) => (u16::from(f.code), f.reason.into_owned()),
                        None => (NO_STATUS, String::new()),
                    };
                    return Some(TransportEvent::Closed { code, reason });
                }
                Ok(Message::Frame(_)) => {}
                Err(e) => return Some(TransportEvent::Error(e.to_string())),
            }
        }
        None
    }

    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.ws_stream
            .send(Message::Text(text))
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn close(&mut self, code: u16, reason: &str) -> Result<(), TransportError> {
        let frame = CloseFrame {
            code: CloseCode::from(code),
            reason: reason.to_string().into(),
        };
        self.ws_stream
            .close(Some(frame))
            .await
            .map_err(|e| TransportError::Close(e.to_string()))
    }
}
