use std::net::IpAddr;

use super::*;
use crate::types::PairingType;

fn stored(id: &str, uuid: &str, token: Option<&str>) -> StoredDevice {
    StoredDevice {
        id: id.to_string(),
        friendly_name: "Den TV".to_string(),
        last_known_ip: "10.0.0.7".parse::<IpAddr>().unwrap(),
        last_seen: 1_700_000_000,
        services: vec![StoredService {
            service_id: "Vizio".to_string(),
            config: ServiceConfig {
                service_uuid: uuid.to_string(),
                auth_token: token.map(ToString::to_string),
                pairing_type: PairingType::PinCode,
                cert_fingerprint: None,
            },
        }],
    }
}

#[tokio::test]
async fn test_memory_store_lookup() {
    let store = MemoryStore::new();
    store.persist(&stored("D1", "U1", Some("tok"))).await.unwrap();

    let found = store.lookup_by_uuid("U1").await.unwrap();
    assert_eq!(found.id, "D1");
    assert!(store.lookup_by_uuid("U2").await.is_none());

    let ad = ServiceAdvertisement::new("Vizio", "U1", found.last_known_ip, "Den TV");
    let config = store.lookup_service_config(&ad).await.unwrap();
    assert_eq!(config.auth(), Some("tok"));
}

#[tokio::test]
async fn test_memory_store_replace_and_remove() {
    let store = MemoryStore::new();
    store.persist(&stored("D1", "U1", Some("old"))).await.unwrap();
    store.persist(&stored("D1", "U1", Some("new"))).await.unwrap();

    let found = store.lookup_by_uuid("U1").await.unwrap();
    assert_eq!(found.services[0].config.auth(), Some("new"));

    store.remove("D1").await.unwrap();
    assert!(store.lookup_by_uuid("U1").await.is_none());
}

#[tokio::test]
async fn test_file_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("devices.json");

    {
        let store = FileStore::new(&path).await.unwrap();
        store.persist(&stored("D1", "U1", Some("secret"))).await.unwrap();
    }

    let store = FileStore::new(&path).await.unwrap();
    let found = store.lookup_by_uuid("U1").await.unwrap();
    assert_eq!(found.friendly_name, "Den TV");
    assert_eq!(found.services[0].config.auth(), Some("secret"));
}

#[tokio::test]
async fn test_file_store_empty_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("devices.json");
    tokio::fs::write(&path, b"").await.unwrap();

    let store = FileStore::new(&path).await.unwrap();
    assert!(store.lookup_by_uuid("U1").await.is_none());
}

#[tokio::test]
async fn test_file_store_rejects_garbage() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("devices.json");
    tokio::fs::write(&path, b"{not json").await.unwrap();

    let result = FileStore::new(&path).await;
    assert!(matches!(result, Err(StorageError::Serialization(_))));
}

#[tokio::test]
async fn test_file_store_remove_is_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("devices.json");

    let store = tokio_test::assert_ok!(FileStore::new(&path).await);
    tokio_test::assert_ok!(store.persist(&stored("D1", "U1", None)).await);
    tokio_test::assert_ok!(store.persist(&stored("D2", "U2", Some("tok"))).await);
    tokio_test::assert_ok!(store.remove("D1").await);

    let reopened = tokio_test::assert_ok!(FileStore::new(&path).await);
    assert!(reopened.lookup_by_uuid("U1").await.is_none());
    assert_eq!(reopened.lookup_by_uuid("U2").await.unwrap().id, "D2");
}
