//! PIN pairing over HTTPS
//!
//! `connect` asks the device to display a PIN (`/pairing/start`), the user
//! answers with `submit_pairing_key` (`/pairing/pair`) and the returned auth
//! token authenticates later key commands. At most one pairing exchange runs
//! at a time; results that arrive after `cancel_pairing` or `disconnect` are
//! discarded.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::keycodes::{KeyCode, KeyControl};
use super::{
    Callback, ConnectOutcome, DeviceService, PairingState, ServiceContext, ServiceListener,
    ServiceNotice,
};
use crate::error::{ConnectError, PairingErrorKind, Result};
use crate::protocol::PairingRequest;
use crate::protocol::messages::{self, Status};
use crate::types::capability::names;
use crate::types::{PairingType, ServiceAdvertisement, ServiceConfig};

/// Protocol id of the PIN pairing service
pub const PIN_PAIRING_ID: &str = "Vizio";

const CAPABILITIES: &[&str] = &[
    names::KEY_CONTROL_UP,
    names::KEY_CONTROL_DOWN,
    names::KEY_CONTROL_LEFT,
    names::KEY_CONTROL_RIGHT,
    names::KEY_CONTROL_OK,
    names::KEY_CONTROL_BACK,
    names::KEY_CONTROL_HOME,
    names::KEY_CONTROL_SEND_KEY,
    names::VOLUME_UP_DOWN,
    names::VOLUME_MUTE_SET,
    names::MEDIA_CONTROL_PLAY,
    names::MEDIA_CONTROL_PAUSE,
    names::MEDIA_CONTROL_REWIND,
    names::MEDIA_CONTROL_FAST_FORWARD,
    names::TV_CONTROL_CHANNEL_UP,
    names::TV_CONTROL_CHANNEL_DOWN,
    names::POWER_CONTROL_OFF,
    names::POWER_CONTROL_ON,
];

struct Inner {
    ad: ServiceAdvertisement,
    config: ServiceConfig,
    state: PairingState,
    request_token: Option<String>,
    listener: Option<Arc<dyn ServiceListener>>,
}

impl Inner {
    fn callback(&self) -> Callback {
        Callback::new(self.listener.as_ref(), &self.ad)
    }
}

/// Endpoint that pairs with a PIN shown on the TV
pub struct PinPairingService {
    ctx: ServiceContext,
    inner: Mutex<Inner>,
    // Bumped by every reset; exchanges started under an older value are stale
    generation: AtomicU64,
    exchange: tokio::sync::Mutex<()>,
}

impl PinPairingService {
    /// Create an endpoint in `Initial`
    #[must_use]
    pub fn new(ad: ServiceAdvertisement, mut config: ServiceConfig, ctx: ServiceContext) -> Self {
        if config.service_uuid.is_empty() {
            config.service_uuid.clone_from(&ad.uuid);
        }
        config.pairing_type = PairingType::PinCode;

        Self {
            ctx,
            inner: Mutex::new(Inner {
                ad,
                config,
                state: PairingState::Initial,
                request_token: None,
                listener: None,
            }),
            generation: AtomicU64::new(0),
            exchange: tokio::sync::Mutex::new(()),
        }
    }

    /// Builder for the service catalog
    pub fn build(
        ad: ServiceAdvertisement,
        config: ServiceConfig,
        ctx: ServiceContext,
    ) -> Arc<dyn DeviceService> {
        Arc::new(Self::new(ad, config, ctx))
    }

    /// True while the device holds a pairing session for us
    #[must_use]
    pub fn has_session(&self) -> bool {
        self.inner.lock().request_token.is_some()
    }

    fn session_body(&self) -> Value {
        messages::session_body(
            &self.ctx.config.client_device_id,
            &self.ctx.config.client_device_name,
        )
    }

    fn request(&self, inner: &Inner, path: &'static str, body: Value) -> PairingRequest {
        PairingRequest::new(inner.ad.ip_address, self.ctx.config.pairing_port, path, body)
            .with_pin(inner.config.cert_fingerprint.clone())
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    /// Back to `Initial` with no session; returns whether a session existed
    fn reset_locked(&self, inner: &mut Inner) -> bool {
        self.generation.fetch_add(1, Ordering::SeqCst);
        inner.state = PairingState::Initial;
        inner.request_token.take().is_some()
    }

    fn send_cancel(&self, request: PairingRequest) {
        let transport = Arc::clone(&self.ctx.transport);
        tokio::spawn(async move {
            if let Err(e) = transport.put(request).await {
                debug!(error = %e, "Pairing cancel not delivered");
            }
        });
    }

    /// Cancel the session on both ends and report `error`, unless the
    /// exchange was already superseded
    fn fail(&self, generation: u64, error: ConnectError) -> ConnectError {
        let (cancel, callback) = {
            let mut inner = self.inner.lock();
            if !self.is_current(generation) {
                debug!(%error, "Discarding result of cancelled exchange");
                return ConnectError::Cancelled;
            }
            self.reset_locked(&mut inner);
            let cancel = self.request(&inner, messages::PAIRING_CANCEL, self.session_body());
            (cancel, inner.callback())
        };

        self.send_cancel(cancel);
        self.report_failure(callback, &error);
        error
    }

    fn report_failure(&self, callback: Callback, error: &ConnectError) {
        warn!(device = %callback.ad.friendly_name, %error, "Pairing failed");
        let error = error.clone();
        callback.post(&self.ctx.dispatcher, move |l, ad| {
            l.on_connection_failure(ad, &error);
        });
    }

    fn report_connected(&self, callback: Callback) {
        let service_uuid = callback.ad.uuid.clone();
        callback.post(&self.ctx.dispatcher, |l, ad| l.on_connected(ad));
        self.ctx
            .notify(ServiceNotice::CapabilitiesUpdated { service_uuid });
    }

    fn report_disconnected(&self, callback: Callback) {
        let service_uuid = callback.ad.uuid.clone();
        callback.post(&self.ctx.dispatcher, |l, ad| l.on_disconnected(ad));
        self.ctx
            .notify(ServiceNotice::CapabilitiesUpdated { service_uuid });
    }

    fn disconnect_now(&self) {
        let callback = {
            let mut inner = self.inner.lock();
            if inner.state == PairingState::Initial {
                return;
            }
            self.generation.fetch_add(1, Ordering::SeqCst);
            inner.state = PairingState::Initial;
            inner.callback()
        };

        info!(device = %callback.ad.friendly_name, "Disconnected");
        self.report_disconnected(callback);
    }

    fn invalid_state(message: &str, state: PairingState) -> ConnectError {
        ConnectError::InvalidState {
            message: message.to_string(),
            current_state: state.to_string(),
        }
    }
}

#[async_trait]
impl DeviceService for PinPairingService {
    fn service_id(&self) -> &'static str {
        PIN_PAIRING_ID
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
        PairingType::PinCode
    }

    fn state(&self) -> PairingState {
        self.inner.lock().state
    }

    fn set_listener(&self, listener: Option<Arc<dyn ServiceListener>>) {
        self.inner.lock().listener = listener;
    }

    fn key_control(&self) -> Option<&dyn KeyControl> {
        Some(self)
    }

    async fn connect(&self) -> Result<ConnectOutcome> {
        let Ok(_exchange) = self.exchange.try_lock() else {
            let state = self.state();
            return if state == PairingState::Initial {
                Err(ConnectError::DeviceBusy)
            } else {
                Ok(ConnectOutcome::Unchanged(state))
            };
        };

        let (generation, request) = {
            let mut inner = self.inner.lock();
            if inner.state != PairingState::Initial {
                return Ok(ConnectOutcome::Unchanged(inner.state));
            }

            if inner.config.auth().is_some() {
                inner.state = PairingState::Paired;
                let callback = inner.callback();
                drop(inner);
                info!(device = %callback.ad.friendly_name, "Connected with saved credential");
                self.report_connected(callback);
                return Ok(ConnectOutcome::Connected);
            }

            inner.state = PairingState::Connecting;
            let request = self.request(&inner, messages::PAIRING_START, self.session_body());
            (self.generation.load(Ordering::SeqCst), request)
        };

        debug!(url = %request.url(), "Requesting pairing PIN");
        let response = match self.ctx.transport.put(request).await {
            Ok(response) => response,
            Err(e) => return Err(self.fail(generation, e)),
        };

        match messages::status(&response.body) {
            Some(Status::Success) => {
                let Some(token) = messages::item(&response.body, messages::PAIRING_REQ_TOKEN)
                else {
                    return Err(self.fail(
                        generation,
                        ConnectError::protocol("pairing start response has no request token"),
                    ));
                };

                let callback = {
                    let mut inner = self.inner.lock();
                    if !self.is_current(generation) {
                        return Err(ConnectError::Cancelled);
                    }
                    inner.state = PairingState::Pairing;
                    inner.request_token = Some(token);
                    inner.callback()
                };

                info!(device = %callback.ad.friendly_name, "PIN displayed, waiting for input");
                callback.post(&self.ctx.dispatcher, |l, ad| {
                    l.on_pairing_required(ad, PairingType::PinCode);
                });
                Ok(ConnectOutcome::PairingRequired)
            }
            Some(Status::Blocked) => {
                let (has_session, callback) = {
                    let mut inner = self.inner.lock();
                    if !self.is_current(generation) {
                        return Err(ConnectError::Cancelled);
                    }
                    inner.state = PairingState::Initial;
                    (inner.request_token.is_some(), inner.callback())
                };

                // The PIN already on screen can still be submitted
                if has_session {
                    callback.clone().post(&self.ctx.dispatcher, |l, ad| {
                        l.on_pairing_required(ad, PairingType::PinCode);
                    });
                }
                let error = ConnectError::pairing(PairingErrorKind::Blocked);
                self.report_failure(callback, &error);
                Err(error)
            }
            Some(status) => {
                debug!(%status, "Pairing start refused");
                Err(self.fail(
                    generation,
                    ConnectError::pairing(PairingErrorKind::InvalidCredentials),
                ))
            }
            None => Err(self.fail(
                generation,
                ConnectError::protocol("pairing start response has no status"),
            )),
        }
    }

    async fn disconnect(&self) {
        self.disconnect_now();
    }

    async fn submit_pairing_key(&self, pin: &str) -> Result<()> {
        if pin.is_empty() {
            let (cancel, callback) = {
                let mut inner = self.inner.lock();
                let was_pairing = inner.state.is_pairing();
                let had_session = self.reset_locked(&mut inner);
                // A session kept across a local reset is not cancelled on the device
                let cancel = (was_pairing && had_session)
                    .then(|| self.request(&inner, messages::PAIRING_CANCEL, self.session_body()));
                (cancel, inner.callback())
            };
            if let Some(cancel) = cancel {
                self.send_cancel(cancel);
            }
            let error = ConnectError::pairing(PairingErrorKind::EmptyPin);
            self.report_failure(callback, &error);
            return Err(error);
        }

        let Ok(_exchange) = self.exchange.try_lock() else {
            return Err(ConnectError::DeviceBusy);
        };

        let (generation, request) = {
            let mut inner = self.inner.lock();
            let Some(token) = inner.request_token.clone() else {
                return Err(Self::invalid_state(
                    "no pairing session, call connect first",
                    inner.state,
                ));
            };
            inner.state = PairingState::Pairing;
            let body = messages::pair_body(&self.ctx.config.client_device_id, pin, &token);
            let request = self.request(&inner, messages::PAIRING_PAIR, body);
            (self.generation.load(Ordering::SeqCst), request)
        };

        let response = match self.ctx.transport.put(request).await {
            Ok(response) => response,
            Err(e) => return Err(self.fail(generation, e)),
        };

        match messages::status(&response.body) {
            Some(Status::Success) => {
                let Some(auth) = messages::item(&response.body, messages::AUTH_TOKEN) else {
                    return Err(self.fail(
                        generation,
                        ConnectError::protocol("pair response has no auth token"),
                    ));
                };

                let (config, callback) = {
                    let mut inner = self.inner.lock();
                    if !self.is_current(generation) {
                        return Err(ConnectError::Cancelled);
                    }
                    inner.config.auth_token = Some(auth);
                    if inner.config.cert_fingerprint.is_none() {
                        inner
                            .config
                            .cert_fingerprint
                            .clone_from(&response.peer_fingerprint);
                    }
                    inner.state = PairingState::Paired;
                    inner.request_token = None;
                    (inner.config.clone(), inner.callback())
                };

                info!(device = %callback.ad.friendly_name, "Paired");
                self.ctx.notify(ServiceNotice::ConfigUpdated(config));
                self.report_connected(callback);
                Ok(())
            }
            Some(status) => {
                debug!(%status, "PIN rejected");
                Err(self.fail(
                    generation,
                    ConnectError::pairing(PairingErrorKind::InvalidPin),
                ))
            }
            None => Err(self.fail(
                generation,
                ConnectError::protocol("pair response has no status"),
            )),
        }
    }

    async fn cancel_pairing(&self) {
        let (was_paired, cancel, callback) = {
            let mut inner = self.inner.lock();
            let was_paired = inner.state == PairingState::Paired;
            self.reset_locked(&mut inner);
            let cancel = self.request(&inner, messages::PAIRING_CANCEL, self.session_body());
            (was_paired, cancel, inner.callback())
        };

        debug!(device = %callback.ad.friendly_name, "Pairing cancelled");
        self.send_cancel(cancel);
        if was_paired {
            self.report_disconnected(callback);
        }
    }

    async fn forget_credentials(&self) {
        let _exchange = self.exchange.lock().await;
        self.disconnect_now();

        let config = {
            let mut inner = self.inner.lock();
            self.reset_locked(&mut inner);
            if inner.config.auth_token.is_none() && inner.config.cert_fingerprint.is_none() {
                return;
            }
            inner.config.auth_token = None;
            inner.config.cert_fingerprint = None;
            inner.config.clone()
        };

        info!(device = %self.inner.lock().ad.friendly_name, "Saved credentials forgotten");
        self.ctx.notify(ServiceNotice::ConfigUpdated(config));
    }
}

#[async_trait]
impl KeyControl for PinPairingService {
    async fn send_key(&self, key: KeyCode) -> Result<()> {
        let _exchange = self.exchange.lock().await;

        let request = {
            let inner = self.inner.lock();
            if inner.state != PairingState::Paired {
                return Err(Self::invalid_state("not paired", inner.state));
            }
            let Some(auth) = inner.config.auth().map(ToString::to_string) else {
                return Err(ConnectError::PairingRequired {
                    service: PIN_PAIRING_ID.to_string(),
                });
            };
            let (codeset, code) = key.wire();
            self.request(&inner, messages::KEY_COMMAND, messages::key_body(codeset, code))
                .with_auth(auth)
        };

        debug!(?key, "Sending key");
        let response = self.ctx.transport.put(request).await?;

        match messages::status(&response.body) {
            Some(Status::Success) => Ok(()),
            Some(Status::RequiresPairing) => {
                let config = {
                    let mut inner = self.inner.lock();
                    inner.config.auth_token = None;
                    inner.request_token = None;
                    inner.config.clone()
                };
                warn!("Device no longer accepts the saved credential");
                self.ctx.notify(ServiceNotice::ConfigUpdated(config));
                self.disconnect_now();
                Err(ConnectError::PairingRequired {
                    service: PIN_PAIRING_ID.to_string(),
                })
            }
            Some(status) => Err(ConnectError::protocol(format!(
                "key command rejected: {status}"
            ))),
            None => Err(ConnectError::protocol("key command response has no status")),
        }
    }
}
