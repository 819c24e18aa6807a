use reqwest::Url;
use std::str::FromStr;
use tokio::sync::mpsc;

use super::events::{encode, TransportEvent};
use super::RealtimeError;
use crate::models::identity::{Identity, Role};

/// The only transport the realtime endpoint is reached over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportMode {
    WebSocket,
}

impl TransportMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportMode::WebSocket => "websocket",
        }
    }
}

impl FromStr for TransportMode {
    type Err = RealtimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "websocket" => Ok(TransportMode::WebSocket),
            other => Err(RealtimeError::UnsupportedTransport(other.to_string())),
        }
    }
}

/// Connection-establishment parameters for one identity.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectParams {
    pub endpoint: String,
    pub transport: TransportMode,
    pub user_id: String,
    pub role: Role,
}

impl ConnectParams {
    pub fn for_identity(endpoint: &str, transport: TransportMode, identity: &Identity) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            transport,
            user_id: identity.id.clone(),
            role: identity.role,
        }
    }

    /// Endpoint with the identity carried as query metadata.
    pub fn url(&self) -> Result<Url, RealtimeError> {
        let mut url = Url::parse(&self.endpoint)
            .map_err(|e| RealtimeError::InvalidEndpoint(format!("{}: {e}", self.endpoint)))?;
        match url.scheme() {
            "ws" | "wss" => {}
            other => {
                return Err(RealtimeError::InvalidEndpoint(format!(
                    "{}: scheme {other} is not ws or wss",
                    self.endpoint
                )))
            }
        }
        url.query_pairs_mut()
            .append_pair("userId", &self.user_id)
            .append_pair("role", self.role.as_str())
            .append_pair("transport", self.transport.as_str());
        Ok(url)
    }
}

/// Event tagged with the generation of the connection that produced it.
#[derive(Debug)]
pub struct TaggedEvent {
    pub generation: u64,
    pub event: TransportEvent,
}

/// Where a connection reports what it observes. Bound to one generation.
#[derive(Debug, Clone)]
pub struct EventSink {
    generation: u64,
    tx: mpsc::UnboundedSender<TaggedEvent>,
}

impl EventSink {
    pub(crate) fn new(generation: u64, tx: mpsc::UnboundedSender<TaggedEvent>) -> Self {
        Self { generation, tx }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns false once the manager has gone away.
    pub fn send(&self, event: TransportEvent) -> bool {
        self.tx
            .send(TaggedEvent {
                generation: self.generation,
                event,
            })
            .is_ok()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutboundEvent {
    pub event: String,
    pub data: serde_json::Value,
}

/// Cloneable sending half of a connection.
#[derive(Debug, Clone)]
pub struct Emitter {
    tx: mpsc::UnboundedSender<OutboundEvent>,
}

impl Emitter {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<OutboundEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn emit(&self, event: &str, data: serde_json::Value) -> Result<(), RealtimeError> {
        self.tx
            .send(OutboundEvent {
                event: event.to_string(),
                data,
            })
            .map_err(|_| RealtimeError::Closed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl OutboundEvent {
    pub fn to_frame(&self) -> Result<String, RealtimeError> {
        encode(&self.event, self.data.clone())
    }
}

/// A live connection owned by the manager. Dropping it must close it.
pub trait Connection: Send {
    fn emitter(&self) -> Emitter;
    fn close(&mut self);
}

/// Opens connections. The manager is built around this seam so the transport
/// can be swapped out.
pub trait Connector: Send + Sync + 'static {
    fn open(&self, params: ConnectParams, sink: EventSink) -> Box<dyn Connection>;
}
