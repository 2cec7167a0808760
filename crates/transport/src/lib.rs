//! WebSocket link, wire protocol and reconnection backoff

pub mod backoff;
pub mod connection;
pub mod protocol;

use std::time::Duration;

use thiserror::Error;

pub use backoff::ReconnectPolicy;
pub use connection::{ConnectionManager, ConnectionState, LinkEvent};
pub use protocol::{ClientMessage, ServerEvent, ToolCallArgs, ERROR_TYPE_QUOTA};

/// Transport-level failures
#[derive(Debug, Error)]
pub enum TransportError {
    /// Handshake did not complete inside the configured timeout
    #[error("connection attempt timed out after {0:?}")]
    ConnectTimeout(Duration),

    /// Underlying websocket failure
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Send attempted with no open link
    #[error("not connected")]
    NotConnected,

    /// Outbound message could not be encoded
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
