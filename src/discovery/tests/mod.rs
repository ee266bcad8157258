mod manager;

use std::sync::Arc;

use super::*;
use crate::events::Dispatcher;
use crate::service::{ANDROID_TV_ID, BasicService, PIN_PAIRING_ID, PinPairingService};
use crate::store::DeviceStore;
use crate::testing::{MockProviderHandle, MockTransport, RecordingListener, test_context};
use crate::types::IdentityMode;

/// Descriptor for the PIN pairing service on `handle`'s provider
fn vizio_descriptor(handle: &MockProviderHandle) -> ServiceDescriptor {
    ServiceDescriptor::new(
        PIN_PAIRING_ID,
        VIZIO_SERVICE_TYPE,
        handle.factory(),
        PinPairingService::build,
    )
}

/// Descriptor for the Android TV service on `handle`'s provider
fn android_descriptor(handle: &MockProviderHandle) -> ServiceDescriptor {
    ServiceDescriptor::new(
        ANDROID_TV_ID,
        ANDROID_TV_SERVICE_TYPE,
        handle.factory(),
        BasicService::android_tv,
    )
}

struct RegistryFixture {
    registry: DeviceRegistry,
    dispatcher: Dispatcher,
    listener: Arc<RecordingListener>,
}

impl RegistryFixture {
    async fn new(store: Option<Arc<dyn DeviceStore>>, identity: IdentityMode) -> Self {
        let (ctx, _notices) = test_context(Arc::new(MockTransport::new()));
        let dispatcher = ctx.dispatcher.clone();
        let registry = DeviceRegistry::new(ctx, store, identity);

        let handle = MockProviderHandle::new();
        registry.register_descriptor(vizio_descriptor(&handle)).await;
        registry.register_descriptor(android_descriptor(&handle)).await;

        let listener = RecordingListener::new();
        registry.add_listener(listener.clone()).await;

        Self {
            registry,
            dispatcher,
            listener,
        }
    }

    async fn plain() -> Self {
        Self::new(None, IdentityMode::PerService).await
    }

    /// Events delivered so far, then forget them
    async fn take(&self) -> Vec<(&'static str, String)> {
        self.dispatcher.flush().await;
        let summary = self.listener.summary();
        self.listener.clear();
        summary
    }
}
