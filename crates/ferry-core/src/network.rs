//! Online/offline gate.
//!
//! Wraps the platform's connectivity signal as a single boolean plus change
//! notification. The host feeds platform events in through
//! [`NetworkGate::set_online`]; the engine only reads.

use std::sync::Arc;

use tokio::sync::watch;

#[derive(Debug, Clone)]
pub struct NetworkGate {
    tx: Arc<watch::Sender<bool>>,
}

impl NetworkGate {
    pub fn new(online: bool) -> Self {
        let (tx, _rx) = watch::channel(online);
        Self { tx: Arc::new(tx) }
    }

    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    /// Report a platform online/offline event. Repeated identical reports are
    /// not treated as transitions.
    pub fn set_online(&self, online: bool) {
        let changed = self.tx.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
        if changed {
            tracing::info!("Network is now {}", if online { "online" } else { "offline" });
        }
    }

    /// Receiver that wakes on every transition
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    /// Invoke `callback` on every transition until the gate is dropped.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn on_change<F>(&self, mut callback: F) -> tokio::task::JoinHandle<()>
    where
        F: FnMut(bool) + Send + 'static,
    {
        let mut rx = self.subscribe();
        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let online = *rx.borrow_and_update();
                callback(online);
            }
        })
    }
}

impl Default for NetworkGate {
    fn default() -> Self {
        Self::new(true)
    }
}
