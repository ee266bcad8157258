//! Reconciles advertisements into devices and tracks the compatible set
//!
//! All state lives behind one lock, so reconciliations never interleave.
//! Listener callbacks are posted to the dispatcher while the lock is held,
//! which makes the delivery order match the order of state changes.

use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::catalog::{ServiceCatalog, ServiceDescriptor};
use super::filter::compatible;
use crate::error::ConnectError;
use crate::events::{Dispatcher, DiscoveryListener, ListenerId, isolate};
use crate::service::{DeviceService, ServiceContext};
use crate::store::{DeviceStore, StoredDevice};
use crate::types::{
    CapabilityFilter, Device, DeviceKey, IdentityMode, ServiceAdvertisement, ServiceConfig,
};

type Listeners = Arc<Vec<(ListenerId, Arc<dyn DiscoveryListener>)>>;

#[derive(Debug, Clone, Copy)]
enum Change {
    Added,
    Updated,
    Removed,
}

#[derive(Default)]
struct RegistryState {
    devices: HashMap<DeviceKey, Device>,
    // Insertion order of `devices`
    order: Vec<DeviceKey>,
    compatible: HashSet<DeviceKey>,
    filters: Vec<CapabilityFilter>,
    listeners: Listeners,
    catalog: ServiceCatalog,
    identity: IdentityMode,
}

impl RegistryState {
    fn find_by_endpoint(&self, service_id: &str, uuid: &str) -> Option<DeviceKey> {
        self.order
            .iter()
            .find(|key| {
                self.devices[*key]
                    .service(service_id)
                    .is_some_and(|s| s.advertisement().uuid == uuid)
            })
            .cloned()
    }

    fn evict(&mut self, key: &DeviceKey) -> Option<(Device, bool)> {
        let device = self.devices.remove(key)?;
        self.order.retain(|k| k != key);
        let was_compatible = self.compatible.remove(key);
        Some((device, was_compatible))
    }
}

/// Device registry
pub struct DeviceRegistry {
    state: Mutex<RegistryState>,
    dispatcher: Dispatcher,
    store: Option<Arc<dyn DeviceStore>>,
    ctx: ServiceContext,
}

impl DeviceRegistry {
    /// Create an empty registry
    ///
    /// `ctx` is handed to every endpoint the registry builds.
    #[must_use]
    pub fn new(
        ctx: ServiceContext,
        store: Option<Arc<dyn DeviceStore>>,
        identity: IdentityMode,
    ) -> Self {
        Self {
            state: Mutex::new(RegistryState {
                identity,
                ..RegistryState::default()
            }),
            dispatcher: ctx.dispatcher.clone(),
            store,
            ctx,
        }
    }

    fn fire(&self, listeners: &Listeners, change: Change, device: &Device) {
        if listeners.is_empty() {
            return;
        }
        let listeners = Arc::clone(listeners);
        let device = device.clone();
        self.dispatcher.post(move || {
            for (_, listener) in listeners.iter() {
                isolate(|| match change {
                    Change::Added => listener.on_device_added(&device),
                    Change::Updated => listener.on_device_updated(&device),
                    Change::Removed => listener.on_device_removed(&device),
                });
            }
        });
    }

    /// Move `key` across the compatibility boundary if needed, firing the
    /// matching event. Returns endpoints to disconnect.
    fn transition(&self, state: &mut RegistryState, key: &DeviceKey) -> Vec<Arc<dyn DeviceService>> {
        let Some(device) = state.devices.get(key) else {
            return Vec::new();
        };
        let now = compatible(&device.capabilities(), &state.filters);
        let was = state.compatible.contains(key);

        match (now, was) {
            (true, true) => self.fire(&state.listeners, Change::Updated, device),
            (true, false) => {
                debug!(device = %device.friendly_name, "Device became compatible");
                self.fire(&state.listeners, Change::Added, device);
                state.compatible.insert(key.clone());
            }
            (false, true) => {
                debug!(device = %device.friendly_name, "Device no longer compatible");
                self.fire(&state.listeners, Change::Removed, device);
                let services = device.services().to_vec();
                state.compatible.remove(key);
                return services;
            }
            (false, false) => {}
        }
        Vec::new()
    }

    async fn disconnect_all(services: Vec<Arc<dyn DeviceService>>) {
        for service in services {
            service.disconnect().await;
        }
    }

    /// Apply a found or updated advertisement
    pub async fn on_advertised(&self, ad: ServiceAdvertisement) {
        let (stored, saved_config) = match &self.store {
            Some(store) => (
                store.lookup_by_uuid(&ad.uuid).await,
                store.lookup_service_config(&ad).await,
            ),
            None => (None, None),
        };

        let to_disconnect = {
            let mut state = self.state.lock().await;
            self.reconcile(&mut state, &ad, stored.as_ref(), saved_config)
        };
        Self::disconnect_all(to_disconnect).await;
    }

    fn reconcile(
        &self,
        state: &mut RegistryState,
        ad: &ServiceAdvertisement,
        stored: Option<&StoredDevice>,
        saved_config: Option<ServiceConfig>,
    ) -> Vec<Arc<dyn DeviceService>> {
        let key = DeviceKey::for_advertisement(ad, state.identity);

        if !state.devices.contains_key(&key) {
            let old_key = Self::renamed_device(state, ad)
                .or_else(|| stored.and_then(|s| Self::moved_device(state, s, ad)));
            if let Some(old_key) = old_key {
                self.rebind_locked(state, &old_key, ad);
            }
        }

        if !state.devices.contains_key(&key) {
            let device = match stored {
                Some(stored) => Device::restore(key.clone(), stored, ad),
                None => Device::new(key.clone(), ad),
            };
            state.devices.insert(key.clone(), device);
            state.order.push(key.clone());
        }

        let RegistryState {
            devices, catalog, ..
        } = &mut *state;
        let Some(device) = devices.get_mut(&key) else {
            return Vec::new();
        };
        device.refresh(ad);
        let mut to_disconnect: Vec<Arc<dyn DeviceService>> =
            self.reconcile_endpoint(device, catalog.get(&ad.service_id), ad, saved_config)
                .into_iter()
                .collect();

        if device.services().is_empty() {
            debug!(service = %ad.service_id, name = %ad.friendly_name, "No endpoint for advertisement");
            if let Some((device, was_compatible)) = state.evict(&key) {
                if was_compatible {
                    self.fire(&state.listeners, Change::Removed, &device);
                }
            }
            return to_disconnect;
        }

        to_disconnect.extend(self.transition(state, &key));
        to_disconnect
    }

    /// Returns the endpoint that was replaced, if any
    fn reconcile_endpoint(
        &self,
        device: &mut Device,
        descriptor: Option<&ServiceDescriptor>,
        ad: &ServiceAdvertisement,
        saved_config: Option<ServiceConfig>,
    ) -> Option<Arc<dyn DeviceService>> {
        let Some(descriptor) = descriptor else {
            debug!(service = %ad.service_id, "Unregistered protocol, ignoring");
            return None;
        };
        if !descriptor.admission.admits(ad) {
            debug!(service = %ad.service_id, name = %ad.friendly_name, "Advertisement not admitted");
            return None;
        }

        let mut replaced = None;
        if let Some(existing) = device.service(&ad.service_id) {
            if existing.advertisement().uuid == ad.uuid {
                existing.update_advertisement(ad.clone());
                return None;
            }
            info!(service = %ad.service_id, device = %device.friendly_name, "Endpoint answered by a new service instance");
            replaced = device.detach(&ad.service_id);
        }

        let config = saved_config.unwrap_or_else(|| ServiceConfig::new(ad.uuid.clone()));
        device.attach((descriptor.build)(ad.clone(), config, self.ctx.clone()));
        replaced
    }

    /// Key of a device at the same address already holding this endpoint
    /// under another name
    fn renamed_device(state: &RegistryState, ad: &ServiceAdvertisement) -> Option<DeviceKey> {
        state
            .find_by_endpoint(&ad.service_id, &ad.uuid)
            .filter(|key| state.devices[key].ip_address == ad.ip_address)
    }

    /// Key of a registered device the store remembers at another address
    fn moved_device(
        state: &RegistryState,
        stored: &StoredDevice,
        ad: &ServiceAdvertisement,
    ) -> Option<DeviceKey> {
        state
            .order
            .iter()
            .find(|key| {
                let device = &state.devices[*key];
                device.id == stored.id && device.ip_address != ad.ip_address
            })
            .cloned()
    }

    /// Apply a lost advertisement
    pub async fn on_lost(&self, ad: ServiceAdvertisement) {
        let to_disconnect = {
            let mut state = self.state.lock().await;
            self.remove_endpoint(&mut state, &ad)
        };
        Self::disconnect_all(to_disconnect).await;
    }

    fn remove_endpoint(
        &self,
        state: &mut RegistryState,
        ad: &ServiceAdvertisement,
    ) -> Vec<Arc<dyn DeviceService>> {
        let key = DeviceKey::for_advertisement(ad, state.identity);
        let owns_endpoint = state.devices.get(&key).is_some_and(|d| {
            d.service(&ad.service_id)
                .is_some_and(|s| s.advertisement().uuid == ad.uuid)
        });
        let key = if owns_endpoint {
            Some(key)
        } else {
            state.find_by_endpoint(&ad.service_id, &ad.uuid)
        };
        let Some(key) = key else {
            debug!(service = %ad.service_id, uuid = %ad.uuid, "Lost service was not tracked");
            return Vec::new();
        };

        let Some(device) = state.devices.get_mut(&key) else {
            return Vec::new();
        };
        let mut to_disconnect: Vec<_> = device.detach(&ad.service_id).into_iter().collect();

        if device.services().is_empty() {
            if let Some((device, was_compatible)) = state.evict(&key) {
                info!(device = %device.friendly_name, "Device lost");
                if was_compatible {
                    self.fire(&state.listeners, Change::Removed, &device);
                }
            }
            return to_disconnect;
        }

        to_disconnect.extend(self.transition(state, &key));
        to_disconnect
    }

    /// Re-key a device that reappeared at a new address
    ///
    /// Endpoints and compatibility membership are kept. Returns false if
    /// `old_key` is unknown or the new key is taken.
    pub async fn rebind(&self, old_key: &DeviceKey, ad: &ServiceAdvertisement) -> bool {
        let mut state = self.state.lock().await;
        self.rebind_locked(&mut state, old_key, ad)
    }

    fn rebind_locked(
        &self,
        state: &mut RegistryState,
        old_key: &DeviceKey,
        ad: &ServiceAdvertisement,
    ) -> bool {
        let new_key = DeviceKey::for_advertisement(ad, state.identity);
        if &new_key == old_key {
            return true;
        }
        if state.devices.contains_key(&new_key) {
            warn!(%old_key, %new_key, "Cannot rebind, key already in use");
            return false;
        }
        let Some(mut device) = state.devices.remove(old_key) else {
            return false;
        };

        info!(device = %device.friendly_name, from = %old_key, to = %new_key, "Device re-keyed");
        device.set_key(new_key.clone());
        device.ip_address = ad.ip_address;
        state.devices.insert(new_key.clone(), device);

        if let Some(slot) = state.order.iter_mut().find(|k| *k == old_key) {
            *slot = new_key.clone();
        }
        if state.compatible.remove(old_key) {
            state.compatible.insert(new_key);
        }
        true
    }

    /// Re-evaluate the device owning a service after its capabilities or
    /// connection state changed
    pub async fn handle_update(&self, service_uuid: &str) {
        let to_disconnect = {
            let mut state = self.state.lock().await;
            let key = state.order.iter().find(|key| {
                state.devices[*key]
                    .service_with_uuid(service_uuid)
                    .is_some()
            });
            match key.cloned() {
                Some(key) => self.transition(&mut state, &key),
                None => Vec::new(),
            }
        };
        Self::disconnect_all(to_disconnect).await;
    }

    /// Replace the capability filters and recompute the compatible set
    pub async fn set_capability_filters(&self, filters: Vec<CapabilityFilter>) {
        let to_disconnect = {
            let mut state = self.state.lock().await;
            state.filters = filters;

            let mut to_disconnect = Vec::new();
            let keys = state.order.clone();
            for key in &keys {
                let device = &state.devices[key];
                let now = compatible(&device.capabilities(), &state.filters);
                let was = state.compatible.contains(key);
                // Unchanged membership fires nothing
                if now != was {
                    to_disconnect.extend(self.transition(&mut state, key));
                }
            }
            to_disconnect
        };
        Self::disconnect_all(to_disconnect).await;
    }

    /// Current capability filters
    pub async fn capability_filters(&self) -> Vec<CapabilityFilter> {
        self.state.lock().await.filters.clone()
    }

    /// Register a listener; it is first replayed every compatible device
    pub async fn add_listener(&self, listener: Arc<dyn DiscoveryListener>) -> ListenerId {
        let id = ListenerId::next();
        let mut state = self.state.lock().await;

        let replay: Vec<Device> = state
            .order
            .iter()
            .filter(|key| state.compatible.contains(*key))
            .map(|key| state.devices[key].clone())
            .collect();

        let mut listeners = state.listeners.as_ref().clone();
        listeners.push((id, Arc::clone(&listener)));
        state.listeners = Arc::new(listeners);

        // Posted under the lock: no live event can slip in ahead of the replay
        if !replay.is_empty() {
            self.dispatcher.post(move || {
                for device in &replay {
                    listener.on_device_added(device);
                }
            });
        }
        id
    }

    /// Unregister a listener; returns false if it was not registered
    pub async fn remove_listener(&self, id: ListenerId) -> bool {
        let mut state = self.state.lock().await;
        let before = state.listeners.len();
        let listeners: Vec<_> = state
            .listeners
            .iter()
            .filter(|(existing, _)| *existing != id)
            .cloned()
            .collect();
        let removed = listeners.len() != before;
        state.listeners = Arc::new(listeners);
        removed
    }

    /// Tell every listener that discovery could not run
    pub async fn notify_discovery_failed(&self, error: ConnectError) {
        let state = self.state.lock().await;
        let listeners = Arc::clone(&state.listeners);
        self.dispatcher.post(move || {
            for (_, listener) in listeners.iter() {
                isolate(|| listener.on_discovery_failed(&error));
            }
        });
    }

    /// Evict every device, firing `Removed` for each compatible one
    pub async fn clear(&self) {
        let to_disconnect = {
            let mut state = self.state.lock().await;
            let mut to_disconnect = Vec::new();
            let keys = std::mem::take(&mut state.order);
            for key in &keys {
                let Some(mut device) = state.devices.remove(key) else {
                    continue;
                };
                if state.compatible.remove(key) {
                    self.fire(&state.listeners, Change::Removed, &device);
                }
                to_disconnect.extend(device.take_services());
            }
            state.devices.clear();
            state.compatible.clear();
            to_disconnect
        };
        Self::disconnect_all(to_disconnect).await;
    }

    /// Switch identity mode; existing devices keep their keys
    pub async fn set_identity_mode(&self, mode: IdentityMode) {
        self.state.lock().await.identity = mode;
    }

    /// Current identity mode
    pub async fn identity_mode(&self) -> IdentityMode {
        self.state.lock().await.identity
    }

    pub(crate) async fn register_descriptor(&self, descriptor: ServiceDescriptor) {
        self.state.lock().await.catalog.insert(descriptor);
    }

    pub(crate) async fn unregister_descriptor(&self, id: &str) -> Option<ServiceDescriptor> {
        self.state.lock().await.catalog.remove(id)
    }

    /// Registered device-service types
    pub async fn descriptors(&self) -> ServiceCatalog {
        self.state.lock().await.catalog.clone()
    }

    /// Device by its id
    pub async fn device_by_id(&self, id: &str) -> Option<Device> {
        let state = self.state.lock().await;
        state.devices.values().find(|d| d.id == id).cloned()
    }

    /// First device (in insertion order) at an address
    pub async fn device_by_ip(&self, ip: IpAddr) -> Option<Device> {
        let state = self.state.lock().await;
        state
            .order
            .iter()
            .map(|key| &state.devices[key])
            .find(|d| d.ip_address == ip)
            .cloned()
    }

    /// Device by identity key
    pub async fn device(&self, key: &DeviceKey) -> Option<Device> {
        self.state.lock().await.devices.get(key).cloned()
    }

    /// Device owning a service UUID
    pub async fn device_for_service(&self, service_uuid: &str) -> Option<Device> {
        let state = self.state.lock().await;
        state
            .order
            .iter()
            .map(|key| &state.devices[key])
            .find(|d| d.service_with_uuid(service_uuid).is_some())
            .cloned()
    }

    /// Every device in insertion order
    pub async fn all_devices(&self) -> Vec<Device> {
        let state = self.state.lock().await;
        state
            .order
            .iter()
            .map(|key| state.devices[key].clone())
            .collect()
    }

    /// Compatible devices in insertion order
    pub async fn compatible_devices(&self) -> Vec<Device> {
        let state = self.state.lock().await;
        state
            .order
            .iter()
            .filter(|key| state.compatible.contains(*key))
            .map(|key| state.devices[key].clone())
            .collect()
    }

    /// Persist the device owning a service after its config changed
    pub(crate) async fn persist_service(&self, config: &ServiceConfig) {
        let Some(store) = &self.store else {
            return;
        };
        let Some(device) = self.device_for_service(&config.service_uuid).await else {
            debug!(uuid = %config.service_uuid, "Config update for unknown service");
            return;
        };
        if let Err(e) = store.persist(&device.to_stored()).await {
            warn!(device = %device.friendly_name, error = %e, "Failed to persist device");
        }
    }
}

impl std::fmt::Debug for DeviceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceRegistry")
            .field("has_store", &self.store.is_some())
            .finish_non_exhaustive()
    }
}
