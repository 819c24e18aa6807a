use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

use super::events::TransportEvent;
use super::transport::{
    ConnectParams, Connection, Connector, Emitter, EventSink, TaggedEvent, TransportMode,
};
use super::{RealtimeError, RealtimeSettings};
use crate::models::identity::Identity;

/// Published lifecycle state of the session connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Disconnected,
    Connected,
    TornDown,
}

/// What consumers see of the current connection.
#[derive(Debug, Clone)]
pub struct ActiveConnection {
    pub identity: Identity,
    pub generation: u64,
    emitter: Emitter,
}

impl ActiveConnection {
    pub fn emit(&self, event: &str, data: serde_json::Value) -> Result<(), RealtimeError> {
        self.emitter.emit(event, data)
    }
}

struct Live {
    identity: Identity,
    generation: u64,
    connection: Box<dyn Connection>,
}

enum State {
    Disconnected,
    Connected(Live),
    TornDown,
}

/// Owns the one realtime connection of a session and keeps it in step with the
/// session identity. Only the manager writes the published state; everyone
/// else reads through a [`RealtimeHandle`].
pub struct ConnectionManager {
    connector: Arc<dyn Connector>,
    endpoint: String,
    transport: TransportMode,
    state: State,
    next_generation: u64,
    events_tx: mpsc::UnboundedSender<TaggedEvent>,
    events_rx: mpsc::UnboundedReceiver<TaggedEvent>,
    connection_tx: watch::Sender<Option<ActiveConnection>>,
    peers_tx: watch::Sender<Vec<String>>,
    status_tx: watch::Sender<ConnectionStatus>,
}

impl ConnectionManager {
    pub fn new(settings: &RealtimeSettings, connector: Arc<dyn Connector>) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (connection_tx, _) = watch::channel(None);
        let (peers_tx, _) = watch::channel(Vec::new());
        let (status_tx, _) = watch::channel(ConnectionStatus::Disconnected);
        Self {
            connector,
            endpoint: settings.endpoint.clone(),
            transport: settings.transport,
            state: State::Disconnected,
            next_generation: 1,
            events_tx,
            events_rx,
            connection_tx,
            peers_tx,
            status_tx,
        }
    }

    pub fn handle(&self) -> RealtimeHandle {
        RealtimeHandle {
            connection: self.connection_tx.subscribe(),
            peers: self.peers_tx.subscribe(),
            status: self.status_tx.subscribe(),
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        match self.state {
            State::Disconnected => ConnectionStatus::Disconnected,
            State::Connected(_) => ConnectionStatus::Connected,
            State::TornDown => ConnectionStatus::TornDown,
        }
    }

    fn current_identity(&self) -> Option<&Identity> {
        match &self.state {
            State::Connected(live) => Some(&live.identity),
            _ => None,
        }
    }

    /// Bring the connection in line with `next` by comparing it with the
    /// identity the current connection was opened for.
    pub fn apply_identity(&mut self, next: Option<Identity>) {
        if matches!(self.state, State::TornDown) {
            tracing::debug!("ignoring identity change after shutdown");
            return;
        }

        let current = self.current_identity().cloned();
        match (current, next) {
            (None, None) => {}
            (None, Some(identity)) => self.on_identity_available(identity),
            (Some(current), Some(identity)) if current == identity => {}
            (Some(current), Some(identity)) => {
                tracing::info!("session identity changed from {current} to {identity}");
                self.teardown();
                self.on_identity_available(identity);
            }
            (Some(current), None) => {
                tracing::info!("session identity {current} cleared");
                self.teardown();
            }
        }
    }

    /// Open a connection for `identity` unless one is already open.
    pub fn on_identity_available(&mut self, identity: Identity) {
        if !matches!(self.state, State::Disconnected) {
            return;
        }

        let generation = self.next_generation;
        self.next_generation += 1;

        let params = ConnectParams::for_identity(&self.endpoint, self.transport, &identity);
        let sink = EventSink::new(generation, self.events_tx.clone());
        let connection = self.connector.open(params, sink);

        tracing::info!(generation, "realtime connection opened for {identity}");

        self.connection_tx.send_replace(Some(ActiveConnection {
            identity: identity.clone(),
            generation,
            emitter: connection.emitter(),
        }));
        self.status_tx.send_replace(ConnectionStatus::Connected);
        self.state = State::Connected(Live {
            identity,
            generation,
            connection,
        });
    }

    /// Close the connection and clear everything published about it.
    pub fn teardown(&mut self) {
        if let State::Connected(mut live) = std::mem::replace(&mut self.state, State::Disconnected)
        {
            live.connection.close();
            tracing::info!(
                generation = live.generation,
                "realtime connection for {} torn down",
                live.identity
            );
        }
        self.connection_tx.send_replace(None);
        self.peers_tx.send_replace(Vec::new());
        self.status_tx.send_replace(ConnectionStatus::Disconnected);
    }

    /// Teardown and stop reacting to identity changes for good.
    pub fn shutdown(&mut self) {
        self.teardown();
        self.state = State::TornDown;
        self.status_tx.send_replace(ConnectionStatus::TornDown);
    }

    fn is_current(&self, generation: u64) -> bool {
        matches!(&self.state, State::Connected(live) if live.generation == generation)
    }

    pub fn on_peer_list_pushed(&mut self, peer_ids: Vec<String>) {
        tracing::debug!(count = peer_ids.len(), "online peers updated");
        self.peers_tx.send_replace(peer_ids);
    }

    pub fn on_connection_error(&mut self, message: &str) {
        tracing::warn!("realtime connection error: {message}");
    }

    /// The transport is reconnecting on its own; until the server pushes again
    /// the old peer list is stale.
    pub fn on_disconnected(&mut self, reason: &str) {
        tracing::warn!("realtime connection lost: {reason}");
        self.peers_tx.send_replace(Vec::new());
    }

    /// Apply one transport event. Events from a connection that has already
    /// been torn down are dropped.
    pub fn dispatch(&mut self, tagged: TaggedEvent) {
        if !self.is_current(tagged.generation) {
            tracing::debug!(
                generation = tagged.generation,
                "dropping event from stale connection"
            );
            return;
        }
        match tagged.event {
            TransportEvent::OnlinePeers(peers) => self.on_peer_list_pushed(peers),
            TransportEvent::Disconnected { reason } => self.on_disconnected(&reason),
            TransportEvent::Error { message } => self.on_connection_error(&message),
        }
    }

    /// Apply every transport event that is already queued.
    pub fn process_pending(&mut self) {
        while let Ok(tagged) = self.events_rx.try_recv() {
            self.dispatch(tagged);
        }
    }

    /// React to identity changes and transport events in arrival order until
    /// the identity provider goes away, then shut down.
    pub async fn run(mut self, mut identity: watch::Receiver<Option<Identity>>) {
        let initial = identity.borrow_and_update().clone();
        self.apply_identity(initial);

        loop {
            tokio::select! {
                changed = identity.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let next = identity.borrow_and_update().clone();
                    self.apply_identity(next);
                }
                Some(tagged) = self.events_rx.recv() => self.dispatch(tagged),
            }
        }

        self.shutdown();
        tracing::debug!("realtime manager stopped");
    }
}

/// Read-only view of the session connection, cheap to clone and hand out.
#[derive(Clone)]
pub struct RealtimeHandle {
    connection: watch::Receiver<Option<ActiveConnection>>,
    peers: watch::Receiver<Vec<String>>,
    status: watch::Receiver<ConnectionStatus>,
}

impl RealtimeHandle {
    pub fn connection(&self) -> Option<ActiveConnection> {
        self.connection.borrow().clone()
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    /// The last pushed peer set, or empty when there is no connection.
    pub fn online_peers(&self) -> Vec<String> {
        if self.connection.borrow().is_none() {
            return Vec::new();
        }
        self.peers.borrow().clone()
    }

    pub fn is_online(&self, id: &str) -> bool {
        self.connection.borrow().is_some() && self.peers.borrow().iter().any(|p| p == id)
    }

    /// Wait for the next peer-set publication.
    pub async fn peers_changed(&mut self) -> Result<Vec<String>, RealtimeError> {
        self.peers.changed().await.map_err(|_| RealtimeError::Closed)?;
        let peers = self.peers.borrow_and_update().clone();
        Ok(peers)
    }

    /// Wait for the connection to be opened, replaced or cleared.
    pub async fn connection_changed(&mut self) -> Result<Option<ActiveConnection>, RealtimeError> {
        self.connection
            .changed()
            .await
            .map_err(|_| RealtimeError::Closed)?;
        let connection = self.connection.borrow_and_update().clone();
        Ok(connection)
    }
}
