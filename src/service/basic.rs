use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{
    Callback, ConnectOutcome, DeviceService, PairingState, ServiceContext, ServiceListener,
    ServiceNotice,
};
use crate::error::{ConnectError, Result};
use crate::types::capability::names;
use crate::types::{PairingType, ServiceAdvertisement, ServiceConfig};

/// Protocol id of the Android TV remote profile
pub const ANDROID_TV_ID: &str = "AndroidTV";
/// Protocol id of the Android TV remote v2 profile
pub const ANDROID_TV_V2_ID: &str = "AndroidTV2";

const CAPABILITIES: &[&str] = &[names::REMOTE_SESSION];

struct Inner {
    ad: ServiceAdvertisement,
    config: ServiceConfig,
    connected: bool,
    listener: Option<Arc<dyn ServiceListener>>,
}

/// Endpoint that connects without pairing
pub struct BasicService {
    service_id: &'static str,
    ctx: ServiceContext,
    inner: Mutex<Inner>,
}

impl BasicService {
    /// Create a disconnected endpoint
    #[must_use]
    pub fn new(
        service_id: &'static str,
        ad: ServiceAdvertisement,
        mut config: ServiceConfig,
        ctx: ServiceContext,
    ) -> Self {
        if config.service_uuid.is_empty() {
            config.service_uuid.clone_from(&ad.uuid);
        }
        Self {
            service_id,
            ctx,
            inner: Mutex::new(Inner {
                ad,
                config,
                connected: false,
                listener: None,
            }),
        }
    }

    /// Builder for the `AndroidTV` catalog entry
    pub fn android_tv(
        ad: ServiceAdvertisement,
        config: ServiceConfig,
        ctx: ServiceContext,
    ) -> Arc<dyn DeviceService> {
        Arc::new(Self::new(ANDROID_TV_ID, ad, config, ctx))
    }

    /// Builder for the `AndroidTV2` catalog entry
    pub fn android_tv_v2(
        ad: ServiceAdvertisement,
        config: ServiceConfig,
        ctx: ServiceContext,
    ) -> Arc<dyn DeviceService> {
        Arc::new(Self::new(ANDROID_TV_V2_ID, ad, config, ctx))
    }

    fn set_connected(&self, connected: bool) -> Option<Callback> {
        let mut inner = self.inner.lock();
        if inner.connected == connected {
            return None;
        }
        inner.connected = connected;
        Some(Callback::new(inner.listener.as_ref(), &inner.ad))
    }
}

#[async_trait]
impl DeviceService for BasicService {
    fn service_id(&self) -> &'static str {
        self.service_id
    }

    fn advertisement(&self) -> ServiceAdvertisement {
        self.inner.lock().ad.clone()
    }

    fn update_advertisement(&self, ad: ServiceAdvertisement) {
        self.inner.lock().ad = ad;
    }

    fn service_config(&self) -> ServiceConfig {
        self.inner.lock().config.clone()
    }

    fn capabilities(&self) -> &'static [&'static str] {
        CAPABILITIES
    }

    fn pairing_type(&self) -> PairingType {
        PairingType::None
    }

    fn state(&self) -> PairingState {
        if self.inner.lock().connected {
            PairingState::Paired
        } else {
            PairingState::Initial
        }
    }

    fn set_listener(&self, listener: Option<Arc<dyn ServiceListener>>) {
        self.inner.lock().listener = listener;
    }

    async fn connect(&self) -> Result<ConnectOutcome> {
        let Some(callback) = self.set_connected(true) else {
            return Ok(ConnectOutcome::Unchanged(PairingState::Paired));
        };

        tracing::info!(service = self.service_id, device = %callback.ad.friendly_name, "Connected");
        let service_uuid = callback.ad.uuid.clone();
        callback.post(&self.ctx.dispatcher, |l, ad| l.on_connected(ad));
        self.ctx
            .notify(ServiceNotice::CapabilitiesUpdated { service_uuid });
        Ok(ConnectOutcome::Connected)
    }

    async fn disconnect(&self) {
        if let Some(callback) = self.set_connected(false) {
            let service_uuid = callback.ad.uuid.clone();
            callback.post(&self.ctx.dispatcher, |l, ad| l.on_disconnected(ad));
            self.ctx
                .notify(ServiceNotice::CapabilitiesUpdated { service_uuid });
        }
    }

    async fn submit_pairing_key(&self, _pin: &str) -> Result<()> {
        Err(ConnectError::InvalidState {
            message: format!("{} does not pair", self.service_id),
            current_state: self.state().to_string(),
        })
    }

    async fn cancel_pairing(&self) {}
}
