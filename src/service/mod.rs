//! Protocol endpoints on a device and their connection state machines

mod basic;
mod keycodes;
mod pin_pairing;
mod state;


use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::{ConnectError, Result};
use crate::events::Dispatcher;
use crate::protocol::PairingTransport;
use crate::types::{ConnectConfig, PairingType, ServiceAdvertisement, ServiceConfig};

pub use basic::{ANDROID_TV_ID, ANDROID_TV_V2_ID, BasicService};
pub use keycodes::{KeyCode, KeyControl};
pub use pin_pairing::{PIN_PAIRING_ID, PinPairingService};
pub use state::PairingState;

/// Result of [`DeviceService::connect`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// The endpoint is connected
    Connected,
    /// The device is showing a PIN; answer with `submit_pairing_key`
    PairingRequired,
    /// Not in `Initial`; nothing was done
    Unchanged(PairingState),
}

/// Receives connection lifecycle callbacks of one endpoint
///
/// Callbacks run on the dispatcher task, interleaved in one order with
/// discovery callbacks.
pub trait ServiceListener: Send + Sync {
    /// The endpoint is connected and commands may be sent
    fn on_connected(&self, service: &ServiceAdvertisement);

    /// The endpoint left the connected or pairing states
    fn on_disconnected(&self, service: &ServiceAdvertisement);

    /// The device is waiting for a PIN
    fn on_pairing_required(&self, service: &ServiceAdvertisement, pairing_type: PairingType);

    /// A connect or pairing attempt failed
    fn on_connection_failure(&self, service: &ServiceAdvertisement, error: &ConnectError);
}

/// Service listener callback as a value
#[derive(Debug, Clone)]
pub enum ServiceEvent {
    /// See [`ServiceListener::on_connected`]
    Connected(ServiceAdvertisement),
    /// See [`ServiceListener::on_disconnected`]
    Disconnected(ServiceAdvertisement),
    /// See [`ServiceListener::on_pairing_required`]
    PairingRequired(ServiceAdvertisement, PairingType),
    /// See [`ServiceListener::on_connection_failure`]
    ConnectionFailure(ServiceAdvertisement, ConnectError),
}

impl ServiceListener for mpsc::UnboundedSender<ServiceEvent> {
    fn on_connected(&self, service: &ServiceAdvertisement) {
        let _ = self.send(ServiceEvent::Connected(service.clone()));
    }

    fn on_disconnected(&self, service: &ServiceAdvertisement) {
        let _ = self.send(ServiceEvent::Disconnected(service.clone()));
    }

    fn on_pairing_required(&self, service: &ServiceAdvertisement, pairing_type: PairingType) {
        let _ = self.send(ServiceEvent::PairingRequired(service.clone(), pairing_type));
    }

    fn on_connection_failure(&self, service: &ServiceAdvertisement, error: &ConnectError) {
        let _ = self.send(ServiceEvent::ConnectionFailure(
            service.clone(),
            error.clone(),
        ));
    }
}

/// Changes an endpoint reports back to discovery
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceNotice {
    /// Persisted configuration changed (auth token stored or cleared)
    ConfigUpdated(ServiceConfig),
    /// Capabilities or connection state changed
    CapabilitiesUpdated {
        /// UUID of the reporting service
        service_uuid: String,
    },
}

/// Everything an endpoint needs from its environment
#[derive(Clone)]
pub struct ServiceContext {
    /// Delivery channel for listener callbacks
    pub dispatcher: Dispatcher,
    /// Where config and capability changes are reported
    pub notices: mpsc::UnboundedSender<ServiceNotice>,
    /// Client identity, timeouts and ports
    pub config: Arc<ConnectConfig>,
    /// Pairing and command transport
    pub transport: Arc<dyn PairingTransport>,
}

impl ServiceContext {
    pub(crate) fn notify(&self, notice: ServiceNotice) {
        if self.notices.send(notice).is_err() {
            tracing::trace!("Notice receiver gone");
        }
    }
}

impl std::fmt::Debug for ServiceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceContext")
            .field("dispatcher", &self.dispatcher)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Constructs an endpoint for an advertisement and its saved config
pub type ServiceBuilder =
    fn(ServiceAdvertisement, ServiceConfig, ServiceContext) -> Arc<dyn DeviceService>;

/// One protocol endpoint on a device
///
/// Endpoints are shared between the registry and every `Device` clone, so
/// all methods take `&self`.
#[async_trait]
pub trait DeviceService: Send + Sync {
    /// Protocol id (e.g. "Vizio")
    fn service_id(&self) -> &'static str;

    /// Advertisement the endpoint was last updated from
    fn advertisement(&self) -> ServiceAdvertisement;

    /// Replace the advertisement (same UUID, new details)
    fn update_advertisement(&self, ad: ServiceAdvertisement);

    /// Snapshot of the persisted configuration
    fn service_config(&self) -> ServiceConfig;

    /// Capability names this endpoint provides
    fn capabilities(&self) -> &'static [&'static str];

    /// Pairing flow the endpoint uses
    fn pairing_type(&self) -> PairingType;

    /// Whether `connect` does anything
    fn is_connectable(&self) -> bool {
        true
    }

    /// Current state of the pairing state machine
    fn state(&self) -> PairingState;

    /// True once commands may be sent
    fn is_connected(&self) -> bool {
        self.state() == PairingState::Paired
    }

    /// Install or clear the lifecycle listener
    fn set_listener(&self, listener: Option<Arc<dyn ServiceListener>>);

    /// Key command interface, if the endpoint has one
    fn key_control(&self) -> Option<&dyn KeyControl> {
        None
    }

    /// Start connecting; no-op unless in `Initial`
    ///
    /// # Errors
    ///
    /// Returns an error if the device refuses or cannot be reached
    async fn connect(&self) -> Result<ConnectOutcome>;

    /// Return to `Initial`; no-op if already there
    async fn disconnect(&self);

    /// Answer the PIN challenge
    ///
    /// # Errors
    ///
    /// Returns an error if the PIN is empty or rejected, or no pairing session exists
    async fn submit_pairing_key(&self, pin: &str) -> Result<()>;

    /// Abandon any pairing session; safe in every state
    async fn cancel_pairing(&self);

    /// Drop saved credentials so the next `connect` pairs from scratch
    ///
    /// Disconnects first. For pinned endpoints this also forgets the
    /// certificate fingerprint, so a device that regenerated its certificate
    /// can be paired again.
    async fn forget_credentials(&self) {
        self.disconnect().await;
    }
}

/// Listener and advertisement captured under an endpoint's lock, posted after it is released
#[derive(Clone)]
pub(crate) struct Callback {
    listener: Option<Arc<dyn ServiceListener>>,
    ad: ServiceAdvertisement,
}

impl Callback {
    pub(crate) fn new(
        listener: Option<&Arc<dyn ServiceListener>>,
        ad: &ServiceAdvertisement,
    ) -> Self {
        Self {
            listener: listener.cloned(),
            ad: ad.clone(),
        }
    }

    pub(crate) fn post<F>(self, dispatcher: &Dispatcher, f: F)
    where
        F: FnOnce(&dyn ServiceListener, &ServiceAdvertisement) + Send + 'static,
    {
        if let Some(listener) = self.listener {
            let ad = self.ad;
            dispatcher.post(move || f(listener.as_ref(), &ad));
        }
    }
}
