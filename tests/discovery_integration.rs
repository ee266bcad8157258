//! End-to-end discovery scenarios driven through a scripted provider

use std::sync::Arc;

use futures::StreamExt;

mod common;
use common::Harness;
use tvconnect::testing::{RecordingListener, android_tv_ad, ip, vizio_ad};
use tvconnect::types::capability::names;
use tvconnect::{CapabilityFilter, DeviceStore, DiscoveryEvent, MemoryStore, NetworkState};

#[tokio::test]
async fn test_tv_lifecycle_on_one_address() {
    common::init_logging();
    let h = Harness::new(None, false);
    let listener = RecordingListener::new();
    h.manager.add_listener(listener.clone()).await;
    h.manager.start().await;

    h.provider.found(vizio_ad("U1", "10.0.0.5", "Living Room"));
    h.wait_for_devices(1).await;
    let id = h.manager.all_devices().await[0].id.clone();

    h.provider.found(vizio_ad("U1", "10.0.0.5", "Living Room TV"));
    h.provider.found(android_tv_ad("U2", "10.0.0.5", "Living Room TV"));
    h.wait_for_devices(2).await;
    h.manager.flush().await;

    assert_eq!(
        listener.summary(),
        vec![
            ("added", "Living Room".to_string()),
            ("updated", "Living Room TV".to_string()),
            ("added", "Living Room TV".to_string()),
        ]
    );
    let renamed = h.manager.device_by_id(&id).await.unwrap();
    assert_eq!(renamed.friendly_name, "Living Room TV");
}

#[tokio::test]
async fn test_integrated_mode_merges_protocols() {
    let h = Harness::new(None, true);
    h.manager.start().await;

    h.provider.found(vizio_ad("U1", "10.0.0.5", "Den"));
    h.provider.found(android_tv_ad("U2", "10.0.0.5", "Den"));
    h.wait_for_devices(1).await;

    let manager = &h.manager;
    common::eventually("both endpoints", || async move {
        manager.all_devices().await[0].services().len() == 2
    })
    .await;
    let device = h.manager.device_by_ip(ip("10.0.0.5")).await.unwrap();
    assert!(device.has_capabilities(&[names::VOLUME_UP_DOWN, names::REMOTE_SESSION]));
}

#[tokio::test]
async fn test_network_drop_and_recovery() {
    let h = Harness::new(None, false);
    let mut stream = h.manager.subscribe().await;
    h.manager.start().await;

    h.provider.found(vizio_ad("U1", "10.0.0.5", "Den"));
    h.provider.found(vizio_ad("U2", "10.0.0.6", "Office"));
    assert!(matches!(stream.next().await, Some(DiscoveryEvent::Added(_))));
    assert!(matches!(stream.next().await, Some(DiscoveryEvent::Added(_))));

    h.platform.set_state(NetworkState::Disconnected);
    let mut gone = Vec::new();
    for _ in 0..2 {
        match stream.next().await {
            Some(DiscoveryEvent::Removed(device)) => gone.push(device.friendly_name),
            other => panic!("expected removal, got {other:?}"),
        }
    }
    assert_eq!(gone, vec!["Den", "Office"]);
    assert!(h.manager.all_devices().await.is_empty());

    h.platform.set_state(NetworkState::Connected);
    h.provider.found(vizio_ad("U1", "10.0.0.5", "Den"));
    let back = stream.next().await.unwrap();
    assert_eq!(back.device().unwrap().friendly_name, "Den");
}

#[tokio::test]
async fn test_capability_filters_select_devices() {
    let h = Harness::new(None, false);
    h.manager
        .set_capability_filters(vec![
            CapabilityFilter::new([names::KEY_CONTROL_UP]).with(names::POWER_CONTROL_OFF),
        ])
        .await;
    let listener = RecordingListener::new();
    h.manager.add_listener(listener.clone()).await;
    h.manager.start().await;

    h.provider.found(vizio_ad("U1", "10.0.0.5", "Den"));
    h.provider.found(android_tv_ad("U2", "10.0.0.6", "Office"));
    h.wait_for_devices(2).await;
    h.manager.flush().await;

    assert_eq!(listener.summary(), vec![("added", "Den".to_string())]);
    assert_eq!(h.manager.compatible_devices().await.len(), 1);

    h.manager.set_capability_filters(Vec::new()).await;
    h.manager.flush().await;
    assert_eq!(
        listener.summary().last(),
        Some(&("added", "Office".to_string()))
    );
}

#[tokio::test]
async fn test_moved_device_keeps_identity_with_store() {
    let store = Arc::new(MemoryStore::new());
    let h = Harness::new(Some(store.clone() as Arc<dyn DeviceStore>), false);
    h.manager.start().await;

    h.provider.found(vizio_ad("U1", "10.0.0.5", "Den"));
    h.wait_for_devices(1).await;
    let device = h.manager.all_devices().await.remove(0);
    store.persist(&device.to_stored()).await.unwrap();

    h.provider.found(vizio_ad("U1", "10.0.0.77", "Den"));
    let manager = &h.manager;
    common::eventually("device at new address", || async move {
        manager.device_by_ip(ip("10.0.0.77")).await.is_some()
    })
    .await;

    let devices = h.manager.all_devices().await;
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].id, device.id);
}
