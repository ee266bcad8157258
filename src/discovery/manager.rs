//! Discovery orchestrator: owns providers, the registry and the event pump

use std::any::TypeId;
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;

use tokio::sync::{Mutex, mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::catalog::{ServiceCatalog, ServiceDescriptor};
use super::provider::{DiscoveryProvider, ProviderEvent, ProviderSink};
use super::registry::DeviceRegistry;
use super::zeroconf::ZeroconfProvider;
use crate::error::{ConnectError, Result};
use crate::events::{ChannelListener, Dispatcher, DiscoveryListener, DiscoveryStream, ListenerId};
use crate::net::{HostPlatform, MulticastLock, NetworkPlatform, NetworkState};
use crate::protocol::PairingTransport;
use crate::service::{BasicService, PinPairingService, ServiceContext, ServiceNotice};
use crate::service::{ANDROID_TV_ID, ANDROID_TV_V2_ID, PIN_PAIRING_ID};
use crate::store::DeviceStore;
use crate::types::{CapabilityFilter, ConnectConfig, Device, IdentityMode};

/// DNS-SD type of the PIN pairing TV service
pub const VIZIO_SERVICE_TYPE: &str = "_viziocast._tcp.local.";
/// DNS-SD type of the Android TV remote service
pub const ANDROID_TV_SERVICE_TYPE: &str = "_androidtvremote._tcp.local.";
/// DNS-SD type of the Android TV remote v2 service
pub const ANDROID_TV_V2_SERVICE_TYPE: &str = "_androidtvremote2._tcp.local.";

/// Device-service types registered by `start()` when none are
#[must_use]
pub fn default_descriptors() -> Vec<ServiceDescriptor> {
    vec![
        ServiceDescriptor::new(
            PIN_PAIRING_ID,
            VIZIO_SERVICE_TYPE,
            ZeroconfProvider::factory(),
            PinPairingService::build,
        ),
        ServiceDescriptor::new(
            ANDROID_TV_ID,
            ANDROID_TV_SERVICE_TYPE,
            ZeroconfProvider::factory(),
            BasicService::android_tv,
        ),
        ServiceDescriptor::new(
            ANDROID_TV_V2_ID,
            ANDROID_TV_V2_SERVICE_TYPE,
            ZeroconfProvider::factory(),
            BasicService::android_tv_v2,
        ),
    ]
}

/// Discovery lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryState {
    /// Providers idle
    Stopped,
    /// `start()` was called; providers run while the network is up
    Searching,
}

struct ProviderSlot {
    type_id: TypeId,
    name: &'static str,
    provider: Box<dyn DiscoveryProvider>,
}

struct Control {
    state: DiscoveryState,
    providers: Vec<ProviderSlot>,
    defaults: Vec<ServiceDescriptor>,
}

struct Shared {
    registry: Arc<DeviceRegistry>,
    platform: Arc<dyn NetworkPlatform>,
    multicast: MulticastLock,
    control: Mutex<Control>,
    provider_tx: ProviderSink,
    dispatcher: Dispatcher,
    shutdown: CancellationToken,
}

/// Finds devices and keeps the set of compatible ones current
///
/// One instance per application. Dropping it ends the background pump;
/// call [`shutdown`](Self::shutdown) to also stop providers and release
/// multicast.
pub struct DiscoveryManager {
    shared: Arc<Shared>,
}

impl DiscoveryManager {
    /// Manager with default platform, transport and no store
    ///
    /// Must be called inside a tokio runtime.
    #[must_use]
    pub fn new(config: ConnectConfig) -> Self {
        Self::builder().config(config).build()
    }

    /// Create a manager builder
    #[must_use]
    pub fn builder() -> DiscoveryManagerBuilder {
        DiscoveryManagerBuilder::default()
    }

    /// Current lifecycle state
    pub async fn state(&self) -> DiscoveryState {
        self.shared.control.lock().await.state
    }

    /// Begin discovery; no-op while searching
    pub async fn start(&self) {
        let mut control = self.shared.control.lock().await;
        if control.state == DiscoveryState::Searching {
            return;
        }

        if let Err(e) = self.shared.multicast.acquire() {
            warn!(error = %e, "Multicast unavailable");
        }

        // Registered while stopped, so the providers start once below
        if control.providers.is_empty() {
            let defaults = control.defaults.clone();
            for descriptor in defaults {
                // Failures are logged inside
                let _ = self.shared.register(&mut control, descriptor).await;
            }
        }
        control.state = DiscoveryState::Searching;

        if !self.shared.platform.is_connected() {
            warn!("Network unavailable, discovery deferred");
            self.shared
                .registry
                .notify_discovery_failed(ConnectError::DiscoveryFailed {
                    message: "network not connected".to_string(),
                })
                .await;
            return;
        }

        for slot in &mut control.providers {
            debug!(provider = slot.name, "Starting provider");
            slot.provider.start();
        }
        info!(providers = control.providers.len(), "Discovery started");
    }

    /// Stop discovery; no-op while stopped
    pub async fn stop(&self) {
        let mut control = self.shared.control.lock().await;
        if control.state == DiscoveryState::Stopped {
            return;
        }
        control.state = DiscoveryState::Stopped;

        for slot in &mut control.providers {
            slot.provider.stop();
        }
        self.shared.multicast.release();
        info!("Discovery stopped");
    }

    /// Stop discovery and end the background pump
    pub async fn shutdown(&self) {
        self.stop().await;
        self.shared.shutdown.cancel();
    }

    /// Register a device-service type
    ///
    /// # Errors
    ///
    /// Returns [`ConnectError::Registration`] if the provider for the type
    /// cannot be built; nothing is registered in that case
    pub async fn register_device_service(&self, descriptor: ServiceDescriptor) -> Result<()> {
        let mut control = self.shared.control.lock().await;
        self.shared.register(&mut control, descriptor).await
    }

    /// Unregister a device-service type; returns false if it was unknown
    ///
    /// Devices already built keep their endpoints.
    pub async fn unregister_device_service(&self, service_id: &str) -> bool {
        let mut control = self.shared.control.lock().await;
        let Some(descriptor) = self.shared.registry.unregister_descriptor(service_id).await else {
            return false;
        };
        Shared::detach_filter(&mut control, &descriptor);
        info!(service = service_id, "Device service unregistered");
        true
    }

    /// Registered device-service types
    pub async fn descriptors(&self) -> ServiceCatalog {
        self.shared.registry.descriptors().await
    }

    /// Number of live providers
    pub async fn provider_count(&self) -> usize {
        self.shared.control.lock().await.providers.len()
    }

    /// Register a listener; it first receives every compatible device
    pub async fn add_listener(&self, listener: Arc<dyn DiscoveryListener>) -> ListenerId {
        self.shared.registry.add_listener(listener).await
    }

    /// Unregister a listener
    pub async fn remove_listener(&self, id: ListenerId) -> bool {
        self.shared.registry.remove_listener(id).await
    }

    /// Discovery events as a stream
    pub async fn subscribe(&self) -> DiscoveryStream {
        let (listener, rx) = ChannelListener::new();
        let id = self.shared.registry.add_listener(Arc::new(listener)).await;
        DiscoveryStream::new(id, rx)
    }

    /// Replace the capability filters
    pub async fn set_capability_filters(&self, filters: Vec<CapabilityFilter>) {
        self.shared.registry.set_capability_filters(filters).await;
    }

    /// Merge protocols on one host into one device for future discoveries
    pub async fn set_service_integration(&self, enabled: bool) {
        self.shared
            .registry
            .set_identity_mode(IdentityMode::from_integration(enabled))
            .await;
    }

    /// Every known device
    pub async fn all_devices(&self) -> Vec<Device> {
        self.shared.registry.all_devices().await
    }

    /// Devices passing the capability filters
    pub async fn compatible_devices(&self) -> Vec<Device> {
        self.shared.registry.compatible_devices().await
    }

    /// Device by id
    pub async fn device_by_id(&self, id: &str) -> Option<Device> {
        self.shared.registry.device_by_id(id).await
    }

    /// Device by address
    pub async fn device_by_ip(&self, ip: IpAddr) -> Option<Device> {
        self.shared.registry.device_by_ip(ip).await
    }

    /// The device registry
    #[must_use]
    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.shared.registry
    }

    /// Wait until every callback posted so far has run
    pub async fn flush(&self) {
        self.shared.dispatcher.flush().await;
    }
}

impl Drop for DiscoveryManager {
    fn drop(&mut self) {
        self.shared.shutdown.cancel();
    }
}

impl fmt::Debug for DiscoveryManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiscoveryManager")
            .field("registry", &self.shared.registry)
            .field("multicast", &self.shared.multicast)
            .finish_non_exhaustive()
    }
}

impl Shared {
    async fn register(&self, control: &mut Control, descriptor: ServiceDescriptor) -> Result<()> {
        let type_id = descriptor.provider.type_id();
        if !control.providers.iter().any(|s| s.type_id == type_id) {
            let provider = descriptor
                .provider
                .build(self.provider_tx.clone())
                .map_err(|e| {
                    let err = ConnectError::Registration {
                        service_id: descriptor.id.to_string(),
                        message: e.to_string(),
                    };
                    warn!(error = %err, "Device service not registered");
                    err
                })?;
            control.providers.push(ProviderSlot {
                type_id,
                name: descriptor.provider.name(),
                provider,
            });
        }

        if let Some(slot) = control.providers.iter_mut().find(|s| s.type_id == type_id) {
            slot.provider.add_filter(descriptor.filter.clone());
        }

        // Re-registration replaces the old entry and its filter
        if let Some(previous) = self.registry.unregister_descriptor(descriptor.id).await {
            if previous.provider.type_id() != type_id || previous.filter != descriptor.filter {
                Self::detach_filter(control, &previous);
            }
        }

        let searching = control.state == DiscoveryState::Searching;
        if let Some(slot) = control.providers.iter_mut().find(|s| s.type_id == type_id) {
            if searching {
                slot.provider.restart();
            }
            info!(service = descriptor.id, provider = slot.name, "Device service registered");
        }
        self.registry.register_descriptor(descriptor).await;
        Ok(())
    }

    /// Remove a descriptor's filter; a provider left empty is stopped and
    /// dropped
    fn detach_filter(control: &mut Control, descriptor: &ServiceDescriptor) {
        let type_id = descriptor.provider.type_id();
        let Some(index) = control.providers.iter().position(|s| s.type_id == type_id) else {
            return;
        };
        let slot = &mut control.providers[index];
        slot.provider.remove_filter(&descriptor.filter);
        if slot.provider.is_empty() {
            slot.provider.stop();
            debug!(provider = slot.name, "Provider dropped");
            control.providers.remove(index);
        }
    }

    async fn on_network(&self, network: NetworkState) {
        match network {
            NetworkState::Connected => {
                let mut control = self.control.lock().await;
                if control.state == DiscoveryState::Searching {
                    info!("Network back, restarting discovery");
                    for slot in &mut control.providers {
                        slot.provider.restart();
                    }
                }
            }
            NetworkState::Disconnected => {
                {
                    let mut control = self.control.lock().await;
                    for slot in &mut control.providers {
                        slot.provider.reset();
                    }
                }
                info!("Network lost, dropping every device");
                self.registry.clear().await;
            }
        }
    }

    async fn on_provider_event(&self, event: ProviderEvent) {
        match event {
            ProviderEvent::ServiceFound(ad) => self.registry.on_advertised(ad).await,
            ProviderEvent::ServiceLost(ad) => self.registry.on_lost(ad).await,
            ProviderEvent::ScanFailed(e) => warn!(error = %e, "Discovery scan failed"),
        }
    }

    async fn on_notice(&self, notice: ServiceNotice) {
        match notice {
            ServiceNotice::ConfigUpdated(config) => {
                self.registry.persist_service(&config).await;
                self.registry.handle_update(&config.service_uuid).await;
            }
            ServiceNotice::CapabilitiesUpdated { service_uuid } => {
                self.registry.handle_update(&service_uuid).await;
            }
        }
    }
}

enum Step {
    Provider(ProviderEvent),
    Notice(ServiceNotice),
    Network(Option<NetworkState>),
    Stop,
}

async fn network_changed(rx: &mut Option<watch::Receiver<NetworkState>>) -> Option<NetworkState> {
    match rx {
        Some(rx) => {
            if rx.changed().await.is_err() {
                return None;
            }
            Some(*rx.borrow_and_update())
        }
        None => std::future::pending().await,
    }
}

async fn pump(
    shared: Arc<Shared>,
    mut provider_rx: mpsc::UnboundedReceiver<ProviderEvent>,
    mut notice_rx: mpsc::UnboundedReceiver<ServiceNotice>,
    mut network: Option<watch::Receiver<NetworkState>>,
) {
    let shutdown = shared.shutdown.clone();
    loop {
        let step = tokio::select! {
            () = shutdown.cancelled() => Step::Stop,
            Some(event) = provider_rx.recv() => Step::Provider(event),
            Some(notice) = notice_rx.recv() => Step::Notice(notice),
            state = network_changed(&mut network) => Step::Network(state),
            else => Step::Stop,
        };

        match step {
            Step::Provider(event) => shared.on_provider_event(event).await,
            Step::Notice(notice) => shared.on_notice(notice).await,
            Step::Network(Some(state)) => shared.on_network(state).await,
            Step::Network(None) => {
                debug!("Network watch closed");
                network = None;
            }
            Step::Stop => break,
        }
    }
    debug!("Discovery pump stopped");
}

/// Builder for [`DiscoveryManager`]
#[derive(Default)]
pub struct DiscoveryManagerBuilder {
    config: ConnectConfig,
    store: Option<Arc<dyn DeviceStore>>,
    platform: Option<Arc<dyn NetworkPlatform>>,
    transport: Option<Arc<dyn PairingTransport>>,
    defaults: Option<Vec<ServiceDescriptor>>,
}

impl DiscoveryManagerBuilder {
    /// Set the configuration
    #[must_use]
    pub fn config(mut self, config: ConnectConfig) -> Self {
        self.config = config;
        self
    }

    /// Persist paired devices in `store`
    #[must_use]
    pub fn store(mut self, store: Arc<dyn DeviceStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Use a custom network platform
    #[must_use]
    pub fn platform(mut self, platform: Arc<dyn NetworkPlatform>) -> Self {
        self.platform = Some(platform);
        self
    }

    /// Use a custom pairing transport
    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn PairingTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Replace the device-service types `start()` registers when none are
    #[must_use]
    pub fn default_services(mut self, descriptors: Vec<ServiceDescriptor>) -> Self {
        self.defaults = Some(descriptors);
        self
    }

    /// Build the manager and spawn its pump
    ///
    /// Must be called inside a tokio runtime.
    #[must_use]
    pub fn build(self) -> DiscoveryManager {
        let config = Arc::new(self.config);
        let dispatcher = Dispatcher::spawn();
        let (notice_tx, notice_rx) = mpsc::unbounded_channel();
        let (provider_tx, provider_rx) = mpsc::unbounded_channel();

        let transport = self
            .transport
            .unwrap_or_else(|| default_transport(&config));
        let ctx = ServiceContext {
            dispatcher: dispatcher.clone(),
            notices: notice_tx,
            config: Arc::clone(&config),
            transport,
        };
        let registry = Arc::new(DeviceRegistry::new(
            ctx,
            self.store,
            IdentityMode::from_integration(config.service_integration),
        ));

        let platform = self
            .platform
            .unwrap_or_else(|| Arc::new(HostPlatform::new()));
        let network = platform.watch();

        let shared = Arc::new(Shared {
            registry,
            multicast: MulticastLock::new(Arc::clone(&platform)),
            platform,
            control: Mutex::new(Control {
                state: DiscoveryState::Stopped,
                providers: Vec::new(),
                defaults: self.defaults.unwrap_or_else(default_descriptors),
            }),
            provider_tx,
            dispatcher,
            shutdown: CancellationToken::new(),
        });

        tokio::spawn(pump(Arc::clone(&shared), provider_rx, notice_rx, network));
        DiscoveryManager { shared }
    }
}

#[cfg(feature = "https")]
fn default_transport(config: &ConnectConfig) -> Arc<dyn PairingTransport> {
    Arc::new(crate::protocol::HttpsTransport::new(config.request_timeout))
}

#[cfg(not(feature = "https"))]
fn default_transport(_config: &ConnectConfig) -> Arc<dyn PairingTransport> {
    Arc::new(crate::protocol::UnavailableTransport)
}
