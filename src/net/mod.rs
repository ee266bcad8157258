//! Network platform abstraction
//!
//! Connectivity probing, the shared multicast resource, and connectivity
//! change notifications.

#[cfg(test)]
mod tests;

use std::fmt;
use std::net::{Ipv4Addr, SocketAddr, UdpSocket};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;

use crate::error::Result;

/// mDNS multicast group, used as the connectivity probe target
const MDNS_GROUP: SocketAddr = SocketAddr::new(
    std::net::IpAddr::V4(Ipv4Addr::new(224, 0, 0, 251)),
    5353,
);

/// Link connectivity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NetworkState {
    /// A usable interface is up
    Connected,
    /// No usable interface
    Disconnected,
}

impl NetworkState {
    /// State for a connectivity flag
    #[must_use]
    pub fn from_connected(connected: bool) -> Self {
        if connected {
            Self::Connected
        } else {
            Self::Disconnected
        }
    }
}

/// Host facilities discovery depends on
pub trait NetworkPlatform: Send + Sync {
    /// Whether a usable network is up right now
    fn is_connected(&self) -> bool;

    /// Take the multicast resource (a Wi-Fi multicast lock on some hosts)
    ///
    /// # Errors
    ///
    /// Returns an error if the host refuses the resource
    fn acquire_multicast(&self) -> Result<()>;

    /// Give the multicast resource back
    fn release_multicast(&self);

    /// Connectivity change notifications, if the host provides them
    fn watch(&self) -> Option<watch::Receiver<NetworkState>> {
        None
    }
}

/// Reference counts a platform's multicast resource
///
/// The platform is asked for the resource on the first acquire and gives it
/// back when the last holder releases.
pub struct MulticastLock {
    platform: Arc<dyn NetworkPlatform>,
    holders: Mutex<usize>,
}

impl MulticastLock {
    /// Wrap a platform
    #[must_use]
    pub fn new(platform: Arc<dyn NetworkPlatform>) -> Self {
        Self {
            platform,
            holders: Mutex::new(0),
        }
    }

    /// Add a holder
    ///
    /// # Errors
    ///
    /// Returns the platform error if the first acquire fails; the count is
    /// left unchanged
    pub fn acquire(&self) -> Result<()> {
        let mut holders = self.holders.lock();
        if *holders == 0 {
            self.platform.acquire_multicast()?;
            tracing::debug!("Multicast acquired");
        }
        *holders += 1;
        Ok(())
    }

    /// Drop a holder; extra releases are ignored
    pub fn release(&self) {
        let mut holders = self.holders.lock();
        match *holders {
            0 => {}
            1 => {
                *holders = 0;
                self.platform.release_multicast();
                tracing::debug!("Multicast released");
            }
            _ => *holders -= 1,
        }
    }

    /// Current holder count
    #[must_use]
    pub fn holders(&self) -> usize {
        *self.holders.lock()
    }
}

impl fmt::Debug for MulticastLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MulticastLock")
            .field("holders", &self.holders())
            .finish_non_exhaustive()
    }
}

/// The machine this process runs on
///
/// Connectivity is probed by asking the OS for a route to the mDNS group.
/// Multicast needs no host permission, so acquire and release do nothing.
#[derive(Debug, Default)]
pub struct HostPlatform {
    watch: Option<watch::Receiver<NetworkState>>,
}

impl HostPlatform {
    /// Platform without change notifications
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Platform that re-probes connectivity every `interval` and publishes
    /// changes
    ///
    /// Must be called inside a tokio runtime. The polling task ends once
    /// every receiver is dropped.
    #[must_use]
    pub fn polling(interval: Duration) -> Self {
        let (tx, rx) = watch::channel(NetworkState::from_connected(probe_route()));

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    () = tx.closed() => break,
                    _ = ticker.tick() => {
                        let state = NetworkState::from_connected(probe_route());
                        tx.send_if_modified(|current| {
                            if *current == state {
                                return false;
                            }
                            tracing::info!(?state, "Network state changed");
                            *current = state;
                            true
                        });
                    }
                }
            }
        });

        Self { watch: Some(rx) }
    }
}

fn probe_route() -> bool {
    UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))
        .and_then(|socket| socket.connect(MDNS_GROUP))
        .is_ok()
}

impl NetworkPlatform for HostPlatform {
    fn is_connected(&self) -> bool {
        match &self.watch {
            Some(rx) => *rx.borrow() == NetworkState::Connected,
            None => probe_route(),
        }
    }

    fn acquire_multicast(&self) -> Result<()> {
        Ok(())
    }

    fn release_multicast(&self) {}

    fn watch(&self) -> Option<watch::Receiver<NetworkState>> {
        self.watch.clone()
    }
}
