use tokio::sync::watch;

/// Unread notification count for the signed-in account.
#[derive(Clone)]
pub struct NotificationCounter {
    tx: watch::Sender<u32>,
}

impl Default for NotificationCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationCounter {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(0);
        Self { tx }
    }

    pub fn count(&self) -> u32 {
        *self.tx.borrow()
    }

    pub fn set(&self, count: u32) {
        self.tx.send_if_modified(|current| {
            let changed = *current != count;
            *current = count;
            changed
        });
    }

    pub fn increment(&self) -> u32 {
        let mut next = 0;
        self.tx.send_modify(|current| {
            *current = current.saturating_add(1);
            next = *current;
        });
        next
    }

    pub fn clear(&self) {
        self.set(0);
    }

    pub fn subscribe(&self) -> watch::Receiver<u32> {
        self.tx.subscribe()
    }
}
