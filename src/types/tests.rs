use super::*;
use std::collections::BTreeSet;
use std::net::IpAddr;
use std::time::Duration;

use proptest::prelude::*;

fn addr(s: &str) -> IpAddr {
    s.parse().unwrap()
}

// --- config.rs tests ---

#[test]
fn test_config_defaults() {
    let config = ConnectConfig::default();

    assert!(!config.service_integration);
    assert_eq!(config.request_timeout, Duration::from_secs(10));
    assert_eq!(config.pairing_port, DEFAULT_PAIRING_PORT);
    assert_eq!(config.client_device_id.len(), 16);
    assert!(!config.client_device_name.is_empty());
}

#[test]
fn test_config_builder() {
    let config = ConnectConfig::builder()
        .service_integration(true)
        .request_timeout(Duration::from_secs(3))
        .client_device_id("remote-1")
        .client_device_name("Kitchen Tablet")
        .pairing_port(9000)
        .build();

    assert!(config.service_integration);
    assert_eq!(config.request_timeout, Duration::from_secs(3));
    assert_eq!(config.client_device_id, "remote-1");
    assert_eq!(config.client_device_name, "Kitchen Tablet");
    assert_eq!(config.pairing_port, 9000);
}

#[test]
fn test_client_ids_are_random() {
    let a = ConnectConfig::default();
    let b = ConnectConfig::default();
    assert_ne!(a.client_device_id, b.client_device_id);
}

// --- service_config.rs tests ---

#[test]
fn test_service_config_ignores_empty_token() {
    let mut config = ServiceConfig::new("uuid-1");
    assert_eq!(config.auth(), None);
    assert_eq!(config.pairing_type, PairingType::None);

    config.auth_token = Some(String::new());
    assert_eq!(config.auth(), None);

    config.auth_token = Some("abc".to_string());
    assert_eq!(config.auth(), Some("abc"));
}

#[test]
fn test_service_config_serde_skips_absent_fields() {
    let config = ServiceConfig::new("uuid-1");
    let json = serde_json::to_value(&config).unwrap();
    assert!(json.get("auth_token").is_none());
    assert!(json.get("cert_fingerprint").is_none());

    let back: ServiceConfig = serde_json::from_str(r#"{"service_uuid":"uuid-1"}"#).unwrap();
    assert_eq!(back, config);
}

// --- capability.rs tests ---

#[test]
fn test_capability_filter_requires_all() {
    let filter = CapabilityFilter::new([capability::names::KEY_CONTROL_UP])
        .with(capability::names::VOLUME_UP_DOWN);
    let mut caps: BTreeSet<String> = [capability::names::KEY_CONTROL_UP.to_string()].into();
    assert!(!filter.matches(&caps));

    caps.insert(capability::names::VOLUME_UP_DOWN.to_string());
    assert!(filter.matches(&caps));
    assert_eq!(filter.required().count(), 2);
}

#[test]
fn test_empty_capability_filter_matches_everything() {
    assert!(CapabilityFilter::default().matches(&BTreeSet::new()));
}

// --- device.rs tests ---

#[test]
fn test_identity_keys() {
    let ad = ServiceAdvertisement::new("Vizio", "u1", addr("10.0.0.2"), "Den");

    let per_service = DeviceKey::for_advertisement(&ad, IdentityMode::PerService);
    assert_eq!(per_service.friendly_name(), "Den");
    assert_eq!(per_service.ip(), addr("10.0.0.2"));
    assert_eq!(per_service.service_id(), Some("Vizio"));
    assert_eq!(per_service.to_string(), "\"Den\"@10.0.0.2/Vizio");

    let integrated = DeviceKey::for_advertisement(&ad, IdentityMode::Integrated);
    assert_eq!(integrated.service_id(), None);
    assert_eq!(integrated.to_string(), "\"Den\"@10.0.0.2");
    assert_eq!(IdentityMode::from_integration(true), IdentityMode::Integrated);
    assert_eq!(IdentityMode::default(), IdentityMode::PerService);
}

#[test]
fn test_identity_keys_do_not_collide_across_parts() {
    let a = DeviceKey::new("A1", addr("0.0.0.1"), "Vizio", IdentityMode::Integrated);
    let b = DeviceKey::new("A", addr("10.0.0.1"), "Vizio", IdentityMode::Integrated);
    assert_ne!(a, b);

    let c = DeviceKey::new("Den", addr("10.0.0.1"), "Vizio", IdentityMode::PerService);
    let d = DeviceKey::new("Den1", addr("0.0.0.1"), "Vizio", IdentityMode::PerService);
    assert_ne!(c, d);
}

#[test]
fn test_new_device_copies_advertisement() {
    let ad = ServiceAdvertisement::new("Vizio", "u1", addr("10.0.0.2"), "Den")
        .with_model("P65", Some("Smart TV"))
        .with_manufacturer("VIZIO");
    let device = Device::new(DeviceKey::for_advertisement(&ad, IdentityMode::PerService), &ad);

    assert_eq!(device.id.len(), 32);
    assert_eq!(device.friendly_name, "Den");
    assert_eq!(device.model_name.as_deref(), Some("P65"));
    assert_eq!(device.manufacturer.as_deref(), Some("VIZIO"));
    assert!(device.last_seen > 0);
    assert!(device.services().is_empty());
    assert!(device.capabilities().is_empty());
    assert!(!device.is_connected());
}

#[test]
fn test_stored_device_keeps_id() {
    let ad = ServiceAdvertisement::new("Vizio", "u1", addr("10.0.0.9"), "Den");
    let stored = crate::store::StoredDevice {
        id: "ABCDEF".to_string(),
        friendly_name: "Old name".to_string(),
        last_known_ip: addr("10.0.0.2"),
        last_seen: 1,
        services: Vec::new(),
    };
    let key = DeviceKey::for_advertisement(&ad, IdentityMode::PerService);
    let device = Device::restore(key, &stored, &ad);

    assert_eq!(device.id, "ABCDEF");
    assert_eq!(device.friendly_name, "Den");
    assert_eq!(device.ip_address, addr("10.0.0.9"));
    assert_eq!(device.to_stored().id, "ABCDEF");
}

proptest! {
    #[test]
    fn prop_per_service_key_extends_integrated_key(
        name in "[A-Za-z ]{0,12}",
        octets in any::<[u8; 4]>(),
        service in "[A-Za-z0-9]{1,10}",
    ) {
        let ip = IpAddr::from(octets);
        let integrated = DeviceKey::new(&name, ip, &service, IdentityMode::Integrated);
        let per_service = DeviceKey::new(&name, ip, &service, IdentityMode::PerService);

        prop_assert_eq!(integrated.friendly_name(), per_service.friendly_name());
        prop_assert_eq!(integrated.ip(), per_service.ip());
        prop_assert_eq!(integrated.service_id(), None);
        prop_assert_eq!(per_service.service_id(), Some(service.as_str()));
    }

    #[test]
    fn prop_integrated_key_ignores_protocol(
        name in "[A-Za-z ]{0,12}",
        octets in any::<[u8; 4]>(),
        a in "[A-Za-z0-9]{1,10}",
        b in "[A-Za-z0-9]{1,10}",
    ) {
        let ip = IpAddr::from(octets);
        prop_assert_eq!(
            DeviceKey::new(&name, ip, &a, IdentityMode::Integrated),
            DeviceKey::new(&name, ip, &b, IdentityMode::Integrated)
        );
    }
}
