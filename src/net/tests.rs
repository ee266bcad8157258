use std::sync::atomic::{AtomicUsize, Ordering};

use super::*;
use crate::error::ConnectError;

#[derive(Default)]
struct CountingPlatform {
    acquired: AtomicUsize,
    released: AtomicUsize,
    refuse: bool,
}

impl NetworkPlatform for CountingPlatform {
    fn is_connected(&self) -> bool {
        true
    }

    fn acquire_multicast(&self) -> Result<()> {
        if self.refuse {
            return Err(ConnectError::DiscoveryFailed {
                message: "multicast refused".to_string(),
            });
        }
        self.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn release_multicast(&self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn test_multicast_lock_counts_holders() {
    let platform = Arc::new(CountingPlatform::default());
    let lock = MulticastLock::new(platform.clone());

    lock.acquire().unwrap();
    lock.acquire().unwrap();
    assert_eq!(lock.holders(), 2);
    assert_eq!(platform.acquired.load(Ordering::SeqCst), 1);

    lock.release();
    assert_eq!(platform.released.load(Ordering::SeqCst), 0);
    lock.release();
    assert_eq!(platform.released.load(Ordering::SeqCst), 1);

    // Extra release is ignored
    lock.release();
    assert_eq!(platform.released.load(Ordering::SeqCst), 1);
    assert_eq!(lock.holders(), 0);
}

#[test]
fn test_multicast_lock_refused() {
    let platform = Arc::new(CountingPlatform {
        refuse: true,
        ..CountingPlatform::default()
    });
    let lock = MulticastLock::new(platform);

    assert!(lock.acquire().is_err());
    assert_eq!(lock.holders(), 0);
}

#[test]
fn test_network_state_from_flag() {
    assert_eq!(NetworkState::from_connected(true), NetworkState::Connected);
    assert_eq!(
        NetworkState::from_connected(false),
        NetworkState::Disconnected
    );
}

#[tokio::test]
async fn test_host_platform_polling_publishes_current_state() {
    let platform = HostPlatform::polling(Duration::from_millis(20));
    let rx = platform.watch().unwrap();
    assert_eq!(
        *rx.borrow() == NetworkState::Connected,
        platform.is_connected()
    );
    assert!(HostPlatform::new().watch().is_none());
}
