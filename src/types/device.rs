use std::collections::BTreeSet;
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;

use rand::Rng;

use super::advertisement::ServiceAdvertisement;
use crate::service::DeviceService;
use crate::store::StoredDevice;

/// How advertisements map onto devices
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IdentityMode {
    /// `name + ip + protocol id`: every protocol is its own device
    #[default]
    PerService,
    /// `name + ip`: protocols answering on one host merge into one device
    Integrated,
}

impl IdentityMode {
    /// Mode for the `service_integration` flag
    #[must_use]
    pub fn from_integration(enabled: bool) -> Self {
        if enabled {
            Self::Integrated
        } else {
            Self::PerService
        }
    }
}

/// Identity key of a device in the registry
///
/// Parts are kept apart, so no two distinct (name, address, protocol)
/// combinations share a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceKey {
    friendly_name: String,
    ip: IpAddr,
    service_id: Option<String>,
}

impl DeviceKey {
    /// Key from its parts
    #[must_use]
    pub fn new(friendly_name: &str, ip: IpAddr, service_id: &str, mode: IdentityMode) -> Self {
        Self {
            friendly_name: friendly_name.to_string(),
            ip,
            service_id: match mode {
                IdentityMode::Integrated => None,
                IdentityMode::PerService => Some(service_id.to_string()),
            },
        }
    }

    /// Key an advertisement maps to
    #[must_use]
    pub fn for_advertisement(ad: &ServiceAdvertisement, mode: IdentityMode) -> Self {
        Self::new(&ad.friendly_name, ad.ip_address, &ad.service_id, mode)
    }

    /// Friendly name part
    #[must_use]
    pub fn friendly_name(&self) -> &str {
        &self.friendly_name
    }

    /// Address part
    #[must_use]
    pub fn ip(&self) -> IpAddr {
        self.ip
    }

    /// Protocol id part; `None` for integrated keys
    #[must_use]
    pub fn service_id(&self) -> Option<&str> {
        self.service_id.as_deref()
    }
}

impl fmt::Display for DeviceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}@{}", self.friendly_name, self.ip)?;
        if let Some(service_id) = &self.service_id {
            write!(f, "/{service_id}")?;
        }
        Ok(())
    }
}

/// A physical device aggregated from one or more service advertisements
///
/// Cloning is cheap. Endpoints are shared, so a clone handed to a listener
/// drives the same connection state as the registry's copy.
#[derive(Clone)]
pub struct Device {
    /// Random identifier, stable for the lifetime of the aggregate (or restored from the store)
    pub id: String,

    /// Human-readable device name
    pub friendly_name: String,

    /// Current address
    pub ip_address: IpAddr,

    /// Model name of the most recent advertisement
    pub model_name: Option<String>,

    /// Manufacturer of the most recent advertisement
    pub manufacturer: Option<String>,

    /// Unix seconds of the most recent advertisement
    pub last_seen: u64,

    key: DeviceKey,
    services: Vec<Arc<dyn DeviceService>>,
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("id", &self.id)
            .field("key", &self.key)
            .field("friendly_name", &self.friendly_name)
            .field("ip_address", &self.ip_address)
            .field(
                "services",
                &self.services.iter().map(|s| s.service_id()).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

impl Device {
    /// Create an endpoint-less device for an advertisement
    #[must_use]
    pub fn new(key: DeviceKey, ad: &ServiceAdvertisement) -> Self {
        let id: u128 = rand::thread_rng().r#gen();
        let mut device = Self {
            id: format!("{id:032X}"),
            friendly_name: String::new(),
            ip_address: ad.ip_address,
            model_name: None,
            manufacturer: None,
            last_seen: 0,
            key,
            services: Vec::new(),
        };
        device.refresh(ad);
        device
    }

    /// Rebuild a device the store remembers, under a fresh key
    #[must_use]
    pub fn restore(key: DeviceKey, stored: &StoredDevice, ad: &ServiceAdvertisement) -> Self {
        let mut device = Self::new(key, ad);
        device.id.clone_from(&stored.id);
        device
    }

    /// Identity key
    #[must_use]
    pub fn key(&self) -> &DeviceKey {
        &self.key
    }

    pub(crate) fn set_key(&mut self, key: DeviceKey) {
        self.key = key;
    }

    /// Copy descriptive fields from an advertisement
    pub(crate) fn refresh(&mut self, ad: &ServiceAdvertisement) {
        self.friendly_name.clone_from(&ad.friendly_name);
        self.ip_address = ad.ip_address;
        if ad.model_name.is_some() {
            self.model_name.clone_from(&ad.model_name);
        }
        if ad.manufacturer.is_some() {
            self.manufacturer.clone_from(&ad.manufacturer);
        }
        self.last_seen = unix_now();
    }

    /// Attached endpoints in attachment order
    #[must_use]
    pub fn services(&self) -> &[Arc<dyn DeviceService>] {
        &self.services
    }

    /// Endpoint for a protocol id
    #[must_use]
    pub fn service(&self, service_id: &str) -> Option<Arc<dyn DeviceService>> {
        self.services
            .iter()
            .find(|s| s.service_id() == service_id)
            .cloned()
    }

    /// Endpoint with a service UUID
    #[must_use]
    pub fn service_with_uuid(&self, uuid: &str) -> Option<Arc<dyn DeviceService>> {
        self.services
            .iter()
            .find(|s| s.service_config().service_uuid == uuid)
            .cloned()
    }

    pub(crate) fn attach(&mut self, service: Arc<dyn DeviceService>) {
        self.services.retain(|s| s.service_id() != service.service_id());
        self.services.push(service);
    }

    pub(crate) fn detach(&mut self, service_id: &str) -> Option<Arc<dyn DeviceService>> {
        let pos = self
            .services
            .iter()
            .position(|s| s.service_id() == service_id)?;
        Some(self.services.remove(pos))
    }

    pub(crate) fn take_services(&mut self) -> Vec<Arc<dyn DeviceService>> {
        std::mem::take(&mut self.services)
    }

    /// Union of every endpoint's capabilities
    #[must_use]
    pub fn capabilities(&self) -> BTreeSet<String> {
        self.services
            .iter()
            .flat_map(|s| s.capabilities().iter().map(|c| (*c).to_string()))
            .collect()
    }

    /// True if the device has every listed capability
    #[must_use]
    pub fn has_capabilities(&self, capabilities: &[&str]) -> bool {
        let own = self.capabilities();
        capabilities.iter().all(|c| own.contains(*c))
    }

    /// True if any endpoint is connected
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.services.iter().any(|s| s.is_connected())
    }

    /// Snapshot for the device store
    #[must_use]
    pub fn to_stored(&self) -> StoredDevice {
        StoredDevice {
            id: self.id.clone(),
            friendly_name: self.friendly_name.clone(),
            last_known_ip: self.ip_address,
            last_seen: self.last_seen,
            services: self
                .services
                .iter()
                .map(|s| crate::store::StoredService {
                    service_id: s.service_id().to_string(),
                    config: s.service_config(),
                })
                .collect(),
        }
    }
}

fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
