//! Shared helpers for integration tests

#![allow(dead_code)]

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tvconnect::discovery::{ANDROID_TV_SERVICE_TYPE, ServiceDescriptor, VIZIO_SERVICE_TYPE};
use tvconnect::service::{ANDROID_TV_ID, BasicService, PIN_PAIRING_ID, PinPairingService};
use tvconnect::testing::{MockProviderHandle, MockTransport, StaticPlatform};
use tvconnect::{DeviceStore, DiscoveryManager};

/// Install a test subscriber honouring `RUST_LOG`
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Poll `check` until it holds, for up to two seconds
pub async fn eventually<F, Fut>(what: &str, mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..400 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("timed out waiting for {what}");
}

/// Everything a scenario needs to drive a manager without a network
pub struct Harness {
    pub manager: DiscoveryManager,
    pub provider: MockProviderHandle,
    pub platform: Arc<StaticPlatform>,
    pub transport: Arc<MockTransport>,
}

impl Harness {
    pub fn new(store: Option<Arc<dyn DeviceStore>>, integrated: bool) -> Self {
        Self::with_transport(Arc::new(MockTransport::new()), store, integrated)
    }

    pub fn with_transport(
        transport: Arc<MockTransport>,
        store: Option<Arc<dyn DeviceStore>>,
        integrated: bool,
    ) -> Self {
        let provider = MockProviderHandle::new();
        let platform = Arc::new(StaticPlatform::online());
        let config = tvconnect::ConnectConfig::builder()
            .service_integration(integrated)
            .client_device_id("it-client")
            .client_device_name("Integration Remote")
            .build();

        let mut builder = DiscoveryManager::builder()
            .config(config)
            .platform(platform.clone())
            .transport(transport.clone())
            .default_services(vec![
                ServiceDescriptor::new(
                    PIN_PAIRING_ID,
                    VIZIO_SERVICE_TYPE,
                    provider.factory(),
                    PinPairingService::build,
                ),
                ServiceDescriptor::new(
                    ANDROID_TV_ID,
                    ANDROID_TV_SERVICE_TYPE,
                    provider.factory(),
                    BasicService::android_tv,
                ),
            ]);
        if let Some(store) = store {
            builder = builder.store(store);
        }

        Self {
            manager: builder.build(),
            provider,
            platform,
            transport,
        }
    }

    /// Wait until the registry holds `count` devices
    pub async fn wait_for_devices(&self, count: usize) {
        let manager = &self.manager;
        eventually(&format!("{count} devices"), || async move {
            manager.all_devices().await.len() == count
        })
        .await;
    }
}
