use futures_util::{SinkExt, StreamExt};
use reqwest::Url;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use super::backoff::ReconnectPolicy;
use super::events::{self, TransportEvent};
use super::transport::{ConnectParams, Connection, Connector, Emitter, EventSink, OutboundEvent};
use super::RealtimeSettings;

/// Last error a connection reports before its transport stops retrying.
pub const GAVE_UP_MESSAGE: &str = "gave up reconnecting";

/// Opens realtime connections over WebSocket and keeps each one alive with the
/// configured reconnect policy until it is closed.
#[derive(Debug, Clone, Default)]
pub struct WsConnector {
    policy: ReconnectPolicy,
}

impl WsConnector {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self { policy }
    }

    pub fn from_settings(settings: &RealtimeSettings) -> Self {
        Self::new(settings.reconnect.clone())
    }
}

impl Connector for WsConnector {
    fn open(&self, params: ConnectParams, sink: EventSink) -> Box<dyn Connection> {
        let (emitter, outbound) = Emitter::channel();
        let (close_tx, close_rx) = oneshot::channel();

        let task = match params.url() {
            Ok(url) => {
                tracing::debug!(
                    generation = sink.generation(),
                    user_id = %params.user_id,
                    "opening realtime connection to {}",
                    params.endpoint
                );
                Some(tokio::spawn(drive(
                    url,
                    self.policy.clone(),
                    sink,
                    outbound,
                    close_rx,
                )))
            }
            Err(e) => {
                sink.send(TransportEvent::Error {
                    message: e.to_string(),
                });
                None
            }
        };

        Box::new(WsConnection {
            emitter,
            close_tx: Some(close_tx),
            task,
        })
    }
}

pub struct WsConnection {
    emitter: Emitter,
    close_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl Connection for WsConnection {
    fn emitter(&self) -> Emitter {
        self.emitter.clone()
    }

    fn close(&mut self) {
        // The task sends a close frame on its own when it sees this.
        if let Some(tx) = self.close_tx.take() {
            let _ = tx.send(());
        }
        self.task.take();
    }
}

impl Drop for WsConnection {
    fn drop(&mut self) {
        self.close();
    }
}

enum PumpExit {
    Closed,
    Dropped(String),
}

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn drive(
    url: Url,
    policy: ReconnectPolicy,
    sink: EventSink,
    mut outbound: mpsc::UnboundedReceiver<OutboundEvent>,
    mut close_rx: oneshot::Receiver<()>,
) {
    let generation = sink.generation();
    let mut attempt: u32 = 0;

    loop {
        let connected = tokio::select! {
            _ = &mut close_rx => return,
            res = connect_async(url.as_str()) => res,
        };

        match connected {
            Ok((socket, _)) => {
                attempt = 0;
                tracing::info!(generation, "realtime connection established");
                match pump(socket, &sink, &mut outbound, &mut close_rx).await {
                    PumpExit::Closed => {
                        tracing::debug!(generation, "realtime connection closed locally");
                        return;
                    }
                    PumpExit::Dropped(reason) => {
                        if !sink.send(TransportEvent::Disconnected { reason }) {
                            return;
                        }
                    }
                }
            }
            Err(e) => {
                if !sink.send(TransportEvent::Error {
                    message: e.to_string(),
                }) {
                    return;
                }
            }
        }

        let Some(delay) = policy.delay(attempt) else {
            tracing::warn!(generation, attempt, "giving up on realtime reconnect");
            sink.send(TransportEvent::Error {
                message: GAVE_UP_MESSAGE.to_string(),
            });
            return;
        };
        attempt += 1;
        tracing::debug!(
            generation,
            attempt,
            delay_ms = delay.as_millis() as u64,
            "realtime reconnect scheduled"
        );

        tokio::select! {
            _ = &mut close_rx => return,
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

async fn pump(
    socket: Socket,
    sink: &EventSink,
    outbound: &mut mpsc::UnboundedReceiver<OutboundEvent>,
    close_rx: &mut oneshot::Receiver<()>,
) -> PumpExit {
    let (mut ws_sink, mut ws_stream) = socket.split();

    loop {
        tokio::select! {
            _ = &mut *close_rx => {
                let _ = ws_sink.send(Message::Close(None)).await;
                return PumpExit::Closed;
            }
            Some(out) = outbound.recv() => {
                let frame = match out.to_frame() {
                    Ok(frame) => frame,
                    Err(e) => {
                        tracing::warn!("dropping outbound {} event: {e}", out.event);
                        continue;
                    }
                };
                if let Err(e) = ws_sink.send(Message::Text(frame.into())).await {
                    return PumpExit::Dropped(e.to_string());
                }
            }
            msg = ws_stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => match events::decode(text.as_str()) {
                        Ok(Some(event)) => {
                            if !sink.send(event) {
                                return PumpExit::Closed;
                            }
                        }
                        Ok(None) => {
                            tracing::debug!("ignoring unsubscribed realtime event");
                        }
                        Err(e) => {
                            sink.send(TransportEvent::Error { message: e.to_string() });
                        }
                    },
                    Some(Ok(Message::Close(frame))) => {
                        let reason = frame
                            .map(|f| f.reason.to_string())
                            .filter(|r| !r.is_empty())
                            .unwrap_or_else(|| "closed by server".to_string());
                        return PumpExit::Dropped(reason);
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return PumpExit::Dropped(e.to_string()),
                    None => return PumpExit::Dropped("connection reset".to_string()),
                }
            }
        }
    }
}
