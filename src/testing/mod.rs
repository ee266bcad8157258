//! Test doubles for discovery and pairing
//!
//! Everything here works without a network: a provider driven by the test,
//! a transport answering from scripts, and a platform whose connectivity can
//! be flipped.

pub mod mock_provider;
pub mod mock_transport;
pub mod network_sim;

use std::net::IpAddr;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

pub use mock_provider::{MockProvider, MockProviderHandle, ProviderCall};
pub use mock_transport::{MOCK_FINGERPRINT, MockTransport, item_body, status_body};
pub use network_sim::StaticPlatform;

use crate::error::ConnectError;
use crate::events::{DiscoveryEvent, DiscoveryListener, Dispatcher};
use crate::protocol::PairingTransport;
use crate::service::{ServiceContext, ServiceNotice};
use crate::types::{ConnectConfig, Device, ServiceAdvertisement};

/// Parse an address literal
///
/// # Panics
///
/// Panics if `ip` is not an IP address
#[must_use]
pub fn ip(ip: &str) -> IpAddr {
    ip.parse().unwrap_or_else(|_| panic!("bad test address {ip}"))
}

/// Advertisement with the mandatory fields
#[must_use]
pub fn advertisement(service_id: &str, uuid: &str, address: &str, name: &str) -> ServiceAdvertisement {
    ServiceAdvertisement::new(service_id, uuid, ip(address), name)
}

/// Advertisement of the PIN pairing service
#[must_use]
pub fn vizio_ad(uuid: &str, address: &str, name: &str) -> ServiceAdvertisement {
    advertisement(crate::service::PIN_PAIRING_ID, uuid, address, name)
        .with_port(crate::types::DEFAULT_PAIRING_PORT)
}

/// Advertisement of the Android TV remote service
#[must_use]
pub fn android_tv_ad(uuid: &str, address: &str, name: &str) -> ServiceAdvertisement {
    advertisement(crate::service::ANDROID_TV_ID, uuid, address, name)
}

/// Listener that keeps every event it receives
#[derive(Debug, Default)]
pub struct RecordingListener {
    events: Mutex<Vec<DiscoveryEvent>>,
}

impl RecordingListener {
    /// Empty recorder
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Events received so far
    #[must_use]
    pub fn events(&self) -> Vec<DiscoveryEvent> {
        self.events.lock().clone()
    }

    /// Events as `("added" | "updated" | "removed" | "failed", device name)`
    #[must_use]
    pub fn summary(&self) -> Vec<(&'static str, String)> {
        self.events
            .lock()
            .iter()
            .map(|event| match event {
                DiscoveryEvent::Added(d) => ("added", d.friendly_name.clone()),
                DiscoveryEvent::Updated(d) => ("updated", d.friendly_name.clone()),
                DiscoveryEvent::Removed(d) => ("removed", d.friendly_name.clone()),
                DiscoveryEvent::Failed(e) => ("failed", e.to_string()),
            })
            .collect()
    }

    /// Forget recorded events
    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl DiscoveryListener for RecordingListener {
    fn on_device_added(&self, device: &Device) {
        self.events.lock().push(DiscoveryEvent::Added(device.clone()));
    }

    fn on_device_updated(&self, device: &Device) {
        self.events
            .lock()
            .push(DiscoveryEvent::Updated(device.clone()));
    }

    fn on_device_removed(&self, device: &Device) {
        self.events
            .lock()
            .push(DiscoveryEvent::Removed(device.clone()));
    }

    fn on_discovery_failed(&self, error: &ConnectError) {
        self.events.lock().push(DiscoveryEvent::Failed(error.clone()));
    }
}

/// Service context over `transport`, with the notice receiver
///
/// Must be called inside a tokio runtime.
#[must_use]
pub fn test_context(
    transport: Arc<dyn PairingTransport>,
) -> (ServiceContext, mpsc::UnboundedReceiver<ServiceNotice>) {
    let (notices, rx) = mpsc::unbounded_channel();
    let config = ConnectConfig::builder()
        .client_device_id("test-client")
        .client_device_name("Test Remote")
        .build();
    let ctx = ServiceContext {
        dispatcher: Dispatcher::spawn(),
        notices,
        config: Arc::new(config),
        transport,
    };
    (ctx, rx)
}
