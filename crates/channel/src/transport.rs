//! Transport abstraction behind the channel client.
//!
//! The state machine in [`crate::client`] is written against these
//! traits rather than a concrete socket so any transport that preserves
//! per-connection event ordering satisfies the same contract. The
//! production implementation lives in [`crate::ws`]; tests drive the
//! client with a scripted mock.

use async_trait::async_trait;

/// WebSocket normal-closure code. A close carrying this code is clean
/// and must not trigger a reconnect.
pub const NORMAL_CLOSURE: u16 = 1000;

/// Abnormal-closure code used when a connection is lost without a close
/// frame.
pub const ABNORMAL_CLOSURE: u16 = 1006;

/// One event observed on a live transport connection.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// A UTF-8 text frame from the peer.
    Text(String),
    /// A transport-level error. Does not by itself end the connection;
    /// a dead connection is signaled by `Closed` or stream end.
    Error(String),
    /// The peer closed the connection.
    Closed { code: u16, reason: String },
}

/// Errors surfaced by transport implementations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to establish the connection.
    #[error("Connection error: {0}")]
    Connect(String),

    /// Failed to send a frame on an established connection.
    #[error("Send error: {0}")]
    Send(String),

    /// Failed to close the connection cleanly.
    #[error("Close error: {0}")]
    Close(String),
}

/// A factory for per-job channel connections.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    type Conn: TransportConnection;

    /// Open a connection to the given per-job endpoint.
    async fn open(&self, endpoint: &str) -> Result<Self::Conn, TransportError>;
}

/// A live, ordered stream of transport events plus a send half.
#[async_trait]
pub trait TransportConnection: Send {
    /// Next event from the peer. `None` means the stream ended without
    /// a close frame, which callers treat as an unclean close.
    async fn next_event(&mut self) -> Option<TransportEvent>;

    /// Send a text frame to the peer.
    async fn send_text(&mut self, text: String) -> Result<(), TransportError>;

    /// Close the connection with the given code and reason.
    async fn close(&mut self, code: u16, reason: &str) -> Result<(), TransportError>;
}
