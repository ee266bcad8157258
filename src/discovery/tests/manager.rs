use std::time::Duration;

use futures::StreamExt;

use super::*;
use crate::error::ConnectError;
use crate::events::DiscoveryEvent;
use crate::net::NetworkState;
use crate::service::ANDROID_TV_V2_ID;
use crate::testing::{ProviderCall, StaticPlatform, android_tv_ad, vizio_ad};

struct ManagerFixture {
    manager: DiscoveryManager,
    platform: Arc<StaticPlatform>,
    provider: MockProviderHandle,
    listener: Arc<RecordingListener>,
}

impl ManagerFixture {
    async fn with_platform(platform: StaticPlatform) -> Self {
        let platform = Arc::new(platform);
        let provider = MockProviderHandle::new();
        let manager = DiscoveryManager::builder()
            .platform(platform.clone())
            .transport(Arc::new(MockTransport::new()))
            .default_services(vec![
                vizio_descriptor(&provider),
                android_descriptor(&provider),
            ])
            .build();
        let listener = RecordingListener::new();
        manager.add_listener(listener.clone()).await;

        Self {
            manager,
            platform,
            provider,
            listener,
        }
    }

    async fn online() -> Self {
        Self::with_platform(StaticPlatform::online()).await
    }

    async fn started() -> Self {
        let fx = Self::online().await;
        fx.manager.start().await;
        fx.provider.clear_calls();
        fx
    }

    async fn take(&self) -> Vec<(&'static str, String)> {
        self.manager.flush().await;
        let summary = self.listener.summary();
        self.listener.clear();
        summary
    }

    /// Wait for the pump to bring the registry to `count` devices
    async fn wait_for_devices(&self, count: usize) {
        for _ in 0..200 {
            if self.manager.all_devices().await.len() == count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("registry never reached {count} devices");
    }

    async fn wait_for_call(&self, call: &ProviderCall) {
        for _ in 0..200 {
            if self.provider.calls().contains(call) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("provider never saw {call:?}");
    }
}

#[tokio::test]
async fn test_start_registers_defaults_on_one_provider() {
    let fx = ManagerFixture::online().await;
    assert_eq!(fx.manager.state().await, DiscoveryState::Stopped);

    fx.manager.start().await;

    assert_eq!(fx.manager.state().await, DiscoveryState::Searching);
    assert_eq!(fx.manager.provider_count().await, 1);
    assert_eq!(fx.provider.builds(), 1);
    assert_eq!(fx.provider.filters().len(), 2);
    assert_eq!(fx.manager.descriptors().await.len(), 2);
    let calls = fx.provider.calls();
    assert_eq!(calls.last(), Some(&ProviderCall::Start));
    assert!(!calls.contains(&ProviderCall::Restart));
    assert!(fx.provider.is_running());
    assert_eq!(fx.platform.multicast_acquired(), 1);
}

#[tokio::test]
async fn test_start_is_idempotent() {
    let fx = ManagerFixture::started().await;

    fx.manager.start().await;

    assert!(fx.provider.calls().is_empty());
    assert_eq!(fx.platform.multicast_acquired(), 1);
}

#[tokio::test]
async fn test_stop_stops_providers_and_releases_multicast() {
    let fx = ManagerFixture::started().await;

    fx.manager.stop().await;
    fx.manager.stop().await;

    assert_eq!(fx.manager.state().await, DiscoveryState::Stopped);
    assert_eq!(fx.provider.calls(), vec![ProviderCall::Stop]);
    assert!(!fx.provider.is_running());
    assert_eq!(fx.platform.multicast_released(), 1);
}

#[tokio::test]
async fn test_offline_start_reports_failure_and_waits() {
    let fx = ManagerFixture::with_platform(StaticPlatform::offline()).await;

    fx.manager.start().await;

    let events = fx.take().await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].0, "failed");
    assert_eq!(fx.manager.state().await, DiscoveryState::Searching);
    assert!(!fx.provider.is_running());

    fx.platform.set_state(NetworkState::Connected);
    fx.wait_for_call(&ProviderCall::Restart).await;
    assert!(fx.provider.is_running());
}

#[tokio::test]
async fn test_provider_events_reach_listeners() {
    let fx = ManagerFixture::started().await;

    assert!(fx.provider.found(vizio_ad("U1", "10.0.0.5", "Den")));
    fx.wait_for_devices(1).await;
    assert_eq!(fx.take().await, vec![("added", "Den".to_string())]);

    assert!(fx.provider.lost(vizio_ad("U1", "10.0.0.5", "Den")));
    fx.wait_for_devices(0).await;
    assert_eq!(fx.take().await, vec![("removed", "Den".to_string())]);
}

#[tokio::test]
async fn test_scan_failure_is_tolerated() {
    let fx = ManagerFixture::started().await;

    fx.provider.fail(ConnectError::DiscoveryFailed {
        message: "socket closed".to_string(),
    });
    fx.provider.found(vizio_ad("U1", "10.0.0.5", "Den"));

    fx.wait_for_devices(1).await;
    assert_eq!(fx.manager.state().await, DiscoveryState::Searching);
}

#[tokio::test]
async fn test_network_loss_drops_every_device() {
    let fx = ManagerFixture::started().await;
    fx.provider.found(vizio_ad("U1", "10.0.0.5", "Den"));
    fx.provider.found(android_tv_ad("U2", "10.0.0.6", "Office"));
    fx.wait_for_devices(2).await;
    fx.take().await;

    fx.platform.set_state(NetworkState::Disconnected);
    fx.wait_for_devices(0).await;

    assert_eq!(
        fx.take().await,
        vec![
            ("removed", "Den".to_string()),
            ("removed", "Office".to_string()),
        ]
    );
    assert!(fx.manager.compatible_devices().await.is_empty());
    assert!(fx.provider.calls().contains(&ProviderCall::Reset));

    fx.provider.clear_calls();
    fx.platform.set_state(NetworkState::Connected);
    fx.wait_for_call(&ProviderCall::Restart).await;

    assert!(fx.take().await.is_empty());
    assert!(fx.manager.all_devices().await.is_empty());
}

#[tokio::test]
async fn test_reconnect_while_stopped_does_not_restart() {
    let fx = ManagerFixture::started().await;
    fx.manager.stop().await;
    fx.provider.clear_calls();

    fx.platform.set_state(NetworkState::Disconnected);
    fx.wait_for_call(&ProviderCall::Reset).await;
    fx.platform.set_state(NetworkState::Connected);
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(fx.provider.calls(), vec![ProviderCall::Reset]);
}

#[tokio::test]
async fn test_register_while_searching_restarts_shared_provider() {
    let fx = ManagerFixture::started().await;
    let descriptor = ServiceDescriptor::new(
        ANDROID_TV_V2_ID,
        ANDROID_TV_V2_SERVICE_TYPE,
        fx.provider.factory(),
        BasicService::android_tv_v2,
    );

    fx.manager.register_device_service(descriptor.clone()).await.unwrap();

    assert_eq!(fx.provider.builds(), 1);
    assert_eq!(fx.manager.provider_count().await, 1);
    assert_eq!(
        fx.provider.calls(),
        vec![
            ProviderCall::AddFilter(descriptor.filter.clone()),
            ProviderCall::Restart,
        ]
    );
    assert_eq!(fx.manager.descriptors().await.len(), 3);
}

#[tokio::test]
async fn test_register_before_start_does_not_restart() {
    let fx = ManagerFixture::online().await;

    fx.manager
        .register_device_service(vizio_descriptor(&fx.provider))
        .await
        .unwrap();

    assert_eq!(
        fx.provider.calls(),
        vec![ProviderCall::AddFilter(vizio_descriptor(&fx.provider).filter)]
    );
    assert!(!fx.provider.is_running());

    // Providers exist, so start does not add the defaults
    fx.manager.start().await;
    assert_eq!(fx.manager.descriptors().await.len(), 1);
}

#[tokio::test]
async fn test_reregistering_keeps_one_entry() {
    let fx = ManagerFixture::started().await;

    fx.manager
        .register_device_service(vizio_descriptor(&fx.provider))
        .await
        .unwrap();

    assert_eq!(fx.manager.descriptors().await.len(), 2);
    assert_eq!(fx.provider.filters().len(), 2);
}

#[tokio::test]
async fn test_failing_provider_registers_nothing() {
    let fx = ManagerFixture::online().await;
    let broken = MockProviderHandle::failing();

    let err = fx
        .manager
        .register_device_service(vizio_descriptor(&broken))
        .await
        .unwrap_err();

    assert!(matches!(err, ConnectError::Registration { ref service_id, .. } if service_id == "Vizio"));
    assert!(fx.manager.descriptors().await.is_empty());
    assert_eq!(fx.manager.provider_count().await, 0);
}

#[tokio::test]
async fn test_unregister_drops_empty_provider() {
    let fx = ManagerFixture::started().await;

    assert!(fx.manager.unregister_device_service("Vizio").await);
    assert_eq!(fx.manager.provider_count().await, 1);
    assert!(!fx.manager.unregister_device_service("Vizio").await);

    assert!(fx.manager.unregister_device_service("AndroidTV").await);
    assert_eq!(fx.manager.provider_count().await, 0);
    assert!(fx.manager.descriptors().await.is_empty());
    assert_eq!(fx.provider.calls().last(), Some(&ProviderCall::Stop));
}

#[tokio::test]
async fn test_subscribe_replays_and_streams() {
    let fx = ManagerFixture::started().await;
    fx.provider.found(vizio_ad("U1", "10.0.0.5", "Den"));
    fx.wait_for_devices(1).await;

    let mut stream = fx.manager.subscribe().await;
    fx.provider.found(android_tv_ad("U2", "10.0.0.6", "Office"));

    let first = stream.next().await.unwrap();
    assert!(matches!(first, DiscoveryEvent::Added(ref d) if d.friendly_name == "Den"));
    let second = stream.next().await.unwrap();
    assert!(matches!(second, DiscoveryEvent::Added(ref d) if d.friendly_name == "Office"));

    assert!(fx.manager.remove_listener(stream.id()).await);
}

#[tokio::test]
async fn test_filters_and_queries_go_through_registry() {
    let fx = ManagerFixture::started().await;
    fx.provider.found(vizio_ad("U1", "10.0.0.5", "Den"));
    fx.provider.found(android_tv_ad("U2", "10.0.0.6", "Office"));
    fx.wait_for_devices(2).await;

    fx.manager
        .set_capability_filters(vec![crate::types::CapabilityFilter::new([
            crate::types::capability::names::VOLUME_UP_DOWN,
        ])])
        .await;

    let compatible = fx.manager.compatible_devices().await;
    assert_eq!(compatible.len(), 1);
    let den = &compatible[0];
    assert_eq!(fx.manager.device_by_id(&den.id).await.unwrap().friendly_name, "Den");
    assert_eq!(
        fx.manager
            .device_by_ip(crate::testing::ip("10.0.0.6"))
            .await
            .unwrap()
            .friendly_name,
        "Office"
    );
}

#[tokio::test]
async fn test_service_integration_switch() {
    let fx = ManagerFixture::online().await;

    fx.manager.set_service_integration(true).await;
    assert_eq!(
        fx.manager.registry().identity_mode().await,
        IdentityMode::Integrated
    );
}

#[tokio::test]
async fn test_shutdown_ends_pump() {
    let fx = ManagerFixture::started().await;

    fx.manager.shutdown().await;
    assert_eq!(fx.manager.state().await, DiscoveryState::Stopped);

    // The pump drops its receiver once it exits
    for _ in 0..200 {
        if !fx.provider.found(vizio_ad("U1", "10.0.0.5", "Den")) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("pump still running after shutdown");
}
