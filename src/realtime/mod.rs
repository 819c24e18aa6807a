pub mod backoff;
pub mod events;
pub mod manager;
pub mod transport;
pub mod websocket;

use std::fmt;

pub use backoff::ReconnectPolicy;
pub use events::TransportEvent;
pub use manager::{ActiveConnection, ConnectionManager, ConnectionStatus, RealtimeHandle};
pub use transport::{ConnectParams, Connection, Connector, Emitter, EventSink, TransportMode};
pub use websocket::WsConnector;

#[derive(Debug)]
pub enum RealtimeError {
    InvalidEndpoint(String),
    UnsupportedTransport(String),
    Decode(serde_json::Error),
    /// The connection (or the manager) is gone.
    Closed,
}

impl fmt::Display for RealtimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RealtimeError::InvalidEndpoint(e) => write!(f, "invalid realtime endpoint: {e}"),
            RealtimeError::UnsupportedTransport(t) => {
                write!(f, "unsupported transport {t:?}, only \"websocket\" is available")
            }
            RealtimeError::Decode(e) => write!(f, "malformed realtime frame: {e}"),
            RealtimeError::Closed => write!(f, "realtime connection closed"),
        }
    }
}

impl std::error::Error for RealtimeError {}

impl From<serde_json::Error> for RealtimeError {
    fn from(e: serde_json::Error) -> Self {
        RealtimeError::Decode(e)
    }
}

/// Endpoint and transport settings for opening session connections.
#[derive(Debug, Clone)]
pub struct RealtimeSettings {
    pub endpoint: String,
    pub transport: TransportMode,
    /// Read by the transport, see [`WsConnector::from_settings`].
    pub reconnect: ReconnectPolicy,
}
