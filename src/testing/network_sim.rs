//! Network platform whose connectivity tests control

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tokio::sync::watch;

use crate::error::Result;
use crate::net::{NetworkPlatform, NetworkState};

/// Platform with switchable connectivity
#[derive(Debug)]
pub struct StaticPlatform {
    tx: watch::Sender<NetworkState>,
    acquired: AtomicUsize,
    released: AtomicUsize,
    notify: AtomicBool,
}

impl StaticPlatform {
    /// Platform that is online and publishes changes
    #[must_use]
    pub fn online() -> Self {
        Self::with_state(NetworkState::Connected)
    }

    /// Platform that is offline and publishes changes
    #[must_use]
    pub fn offline() -> Self {
        Self::with_state(NetworkState::Disconnected)
    }

    fn with_state(state: NetworkState) -> Self {
        let (tx, _) = watch::channel(state);
        Self {
            tx,
            acquired: AtomicUsize::new(0),
            released: AtomicUsize::new(0),
            notify: AtomicBool::new(true),
        }
    }

    /// Stop handing out watch receivers
    #[must_use]
    pub fn without_watch(self) -> Self {
        self.notify.store(false, Ordering::SeqCst);
        self
    }

    /// Change connectivity and notify watchers
    pub fn set_state(&self, state: NetworkState) {
        self.tx.send_replace(state);
    }

    /// Times the multicast resource was acquired
    #[must_use]
    pub fn multicast_acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    /// Times the multicast resource was released
    #[must_use]
    pub fn multicast_released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

impl NetworkPlatform for StaticPlatform {
    fn is_connected(&self) -> bool {
        *self.tx.borrow() == NetworkState::Connected
    }

    fn acquire_multicast(&self) -> Result<()> {
        self.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn release_multicast(&self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }

    fn watch(&self) -> Option<watch::Receiver<NetworkState>> {
        self.notify
            .load(Ordering::SeqCst)
            .then(|| self.tx.subscribe())
    }
}
