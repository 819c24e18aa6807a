use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::models::identity::Identity;
use crate::notifications::NotificationCounter;
use crate::realtime::{ConnectionManager, Connector, RealtimeHandle, RealtimeSettings};

/// Source of the session identity. The realtime manager follows whatever is
/// published here.
pub struct IdentityProvider {
    tx: watch::Sender<Option<Identity>>,
}

impl Default for IdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityProvider {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx }
    }

    /// Publish `identity`. Re-publishing an equal identity is a no-op.
    pub fn sign_in(&self, identity: Identity) {
        self.tx.send_if_modified(|current| {
            if current.as_ref() == Some(&identity) {
                return false;
            }
            *current = Some(identity);
            true
        });
    }

    pub fn sign_out(&self) {
        self.tx.send_if_modified(|current| current.take().is_some());
    }

    pub fn current(&self) -> Option<Identity> {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Identity>> {
        self.tx.subscribe()
    }
}

/// Everything a client session hands to its consumers: the identity source,
/// the realtime view and the notification count. Built once per session.
pub struct Session {
    identity: IdentityProvider,
    realtime: RealtimeHandle,
    notifications: NotificationCounter,
    manager: JoinHandle<()>,
}

impl Session {
    /// Spawn the realtime manager for a new session. Must be called inside a
    /// tokio runtime.
    pub fn start(settings: &RealtimeSettings, connector: impl Connector) -> Self {
        let identity = IdentityProvider::new();
        let manager = ConnectionManager::new(settings, Arc::new(connector));
        let realtime = manager.handle();
        let manager = tokio::spawn(manager.run(identity.subscribe()));

        Self {
            identity,
            realtime,
            notifications: NotificationCounter::new(),
            manager,
        }
    }

    pub fn identity(&self) -> &IdentityProvider {
        &self.identity
    }

    pub fn realtime(&self) -> RealtimeHandle {
        self.realtime.clone()
    }

    pub fn notifications(&self) -> &NotificationCounter {
        &self.notifications
    }

    pub fn sign_in(&self, identity: Identity) {
        self.identity.sign_in(identity);
    }

    pub fn sign_out(&self) {
        self.identity.sign_out();
        self.notifications.clear();
    }

    /// End the session: the manager tears the connection down and stops.
    pub async fn close(self) {
        let Session {
            identity, manager, ..
        } = self;
        drop(identity);
        if let Err(e) = manager.await {
            tracing::error!("realtime manager task failed: {e}");
        }
    }
}
