use std::net::IpAddr;

use serde_json::json;

use super::messages::{self, Status};
use super::*;

#[test]
fn test_status_parse_is_case_insensitive() {
    assert_eq!(Status::parse("SUCCESS"), Status::Success);
    assert_eq!(Status::parse("success"), Status::Success);
    assert_eq!(Status::parse("Blocked"), Status::Blocked);
    assert_eq!(Status::parse("requires_pairing"), Status::RequiresPairing);
    assert_eq!(
        Status::parse("INVALID_PARAMETER"),
        Status::Other("INVALID_PARAMETER".to_string())
    );
}

#[test]
fn test_status_extraction() {
    let body = json!({"STATUS": {"RESULT": "SUCCESS", "DETAIL": "Success"}});
    assert_eq!(messages::status(&body), Some(Status::Success));

    assert_eq!(messages::status(&json!({})), None);
    assert_eq!(messages::status(&json!({"STATUS": {"RESULT": 7}})), None);
}

#[test]
fn test_item_accepts_numbers_and_strings() {
    let body = json!({"ITEM": {"PAIRING_REQ_TOKEN": 41_234, "AUTH_TOKEN": "Zmx1ZmY"}});
    assert_eq!(
        messages::item(&body, messages::PAIRING_REQ_TOKEN).as_deref(),
        Some("41234")
    );
    assert_eq!(
        messages::item(&body, messages::AUTH_TOKEN).as_deref(),
        Some("Zmx1ZmY")
    );
    assert_eq!(messages::item(&body, "MISSING"), None);

    let empty = json!({"ITEM": {"AUTH_TOKEN": ""}});
    assert_eq!(messages::item(&empty, messages::AUTH_TOKEN), None);
}

#[test]
fn test_pair_body_numeric_token() {
    let body = messages::pair_body("client", "1234", "5678");
    assert_eq!(
        body,
        json!({
            "DEVICE_ID": "client",
            "CHALLENGE_TYPE": 1,
            "RESPONSE_VALUE": "1234",
            "PAIRING_REQ_TOKEN": 5678,
        })
    );

    let body = messages::pair_body("client", "1234", "abc");
    assert_eq!(body["PAIRING_REQ_TOKEN"], json!("abc"));
}

#[test]
fn test_session_and_key_bodies() {
    assert_eq!(
        messages::session_body("id", "phone"),
        json!({"DEVICE_ID": "id", "DEVICE_NAME": "phone"})
    );
    assert_eq!(
        messages::key_body(3, 8),
        json!({"KEYLIST": [{"CODESET": 3, "CODE": 8, "ACTION": "KEYPRESS"}]})
    );
}

#[test]
fn test_request_url() {
    let v4: IpAddr = "192.168.1.20".parse().unwrap();
    let request = PairingRequest::new(v4, 7345, messages::PAIRING_START, json!({}));
    assert_eq!(request.url(), "https://192.168.1.20:7345/pairing/start");
    assert!(request.auth.is_none());

    let v6: IpAddr = "fe80::1".parse().unwrap();
    let request =
        PairingRequest::new(v6, 7345, messages::KEY_COMMAND, json!({})).with_auth("token");
    assert_eq!(request.url(), "https://[fe80::1]:7345/key_command/");
    assert_eq!(request.auth.as_deref(), Some("token"));
}

#[tokio::test]
async fn test_unavailable_transport_fails() {
    let request = PairingRequest::new(
        "10.0.0.1".parse().unwrap(),
        7345,
        messages::PAIRING_START,
        json!({}),
    );
    let err = UnavailableTransport.put(request).await.unwrap_err();
    assert!(matches!(err, crate::ConnectError::Transport { status: None, .. }));
}

#[cfg(feature = "https")]
mod tofu {
    use super::super::{TofuVerifier, fingerprint};

    #[test]
    fn test_fingerprint_is_sha256_hex() {
        // SHA-256 of the empty input
        assert_eq!(
            fingerprint(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_unpinned_accepts_anything() {
        let verifier = TofuVerifier::new(None);
        assert!(verifier.check(b"any certificate").is_ok());
        assert!(verifier.pinned().is_none());
    }

    #[test]
    fn test_pinned_rejects_other_certificate() {
        let cert = b"device certificate";
        let verifier = TofuVerifier::new(Some(fingerprint(cert).to_uppercase()));
        assert!(verifier.check(cert).is_ok());
        assert!(verifier.check(b"impostor").is_err());
    }
}
