use serde::{Deserialize, Serialize};

use super::RealtimeError;

/// Inbound and outbound event names.
pub mod event_name {
    pub const ONLINE_USERS: &str = "getOnlineUsers";
    pub const DISCONNECT: &str = "disconnect";
    pub const ERROR: &str = "error";
}

/// Wire envelope. Every realtime frame is a JSON text frame of this shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub event: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// Something the transport observed on a connection.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// Full replacement of the online-peer set.
    OnlinePeers(Vec<String>),
    Disconnected { reason: String },
    Error { message: String },
}

#[derive(Debug, Deserialize)]
struct ReasonData {
    reason: Option<String>,
    message: Option<String>,
}

fn reason_of(data: serde_json::Value) -> Option<String> {
    match data {
        serde_json::Value::String(s) => Some(s),
        serde_json::Value::Object(_) => serde_json::from_value::<ReasonData>(data)
            .ok()
            .and_then(|d| d.reason.or(d.message)),
        _ => None,
    }
}

/// Decode one text frame. Returns `Ok(None)` for events this client does not
/// subscribe to.
pub fn decode(text: &str) -> Result<Option<TransportEvent>, RealtimeError> {
    let envelope: Envelope = serde_json::from_str(text)?;
    let event = match envelope.event.as_str() {
        event_name::ONLINE_USERS => {
            let peers: Vec<String> = serde_json::from_value(envelope.data)?;
            TransportEvent::OnlinePeers(peers)
        }
        event_name::DISCONNECT => TransportEvent::Disconnected {
            reason: reason_of(envelope.data).unwrap_or_else(|| "server disconnect".to_string()),
        },
        event_name::ERROR => TransportEvent::Error {
            message: reason_of(envelope.data).unwrap_or_else(|| "server error".to_string()),
        },
        _ => return Ok(None),
    };
    Ok(Some(event))
}

pub fn encode(event: &str, data: serde_json::Value) -> Result<String, RealtimeError> {
    let envelope = Envelope {
        event: event.to_string(),
        data,
    };
    Ok(serde_json::to_string(&envelope)?)
}
