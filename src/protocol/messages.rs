//! Request bodies and response fields of the pairing service
//!
//! All bodies are JSON objects sent with `PUT`. Responses carry their status
//! under `STATUS.RESULT` and payload under `ITEM`.

use serde_json::{Value, json};

/// Ask the device to show a PIN
pub const PAIRING_START: &str = "/pairing/start";
/// Answer the PIN challenge
pub const PAIRING_PAIR: &str = "/pairing/pair";
/// Abandon the pairing session
pub const PAIRING_CANCEL: &str = "/pairing/cancel";
/// Send a key press
pub const KEY_COMMAND: &str = "/key_command/";

/// Header carrying the auth token on authenticated commands
pub const AUTH_HEADER: &str = "AUTH";

/// Field holding the session token in a start response
pub const PAIRING_REQ_TOKEN: &str = "PAIRING_REQ_TOKEN";
/// Field holding the credential in a pair response
pub const AUTH_TOKEN: &str = "AUTH_TOKEN";

const CHALLENGE_TYPE_PIN: u8 = 1;

/// `STATUS.RESULT` of a response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    /// `SUCCESS`
    Success,
    /// `BLOCKED`: a PIN is already displayed
    Blocked,
    /// `REQUIRES_PAIRING`: the credential is no longer recognized
    RequiresPairing,
    /// Anything else
    Other(String),
}

impl Status {
    /// Parse a status string (case-insensitive)
    #[must_use]
    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("SUCCESS") {
            Self::Success
        } else if s.eq_ignore_ascii_case("BLOCKED") {
            Self::Blocked
        } else if s.eq_ignore_ascii_case("REQUIRES_PAIRING") {
            Self::RequiresPairing
        } else {
            Self::Other(s.to_string())
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => f.write_str("SUCCESS"),
            Self::Blocked => f.write_str("BLOCKED"),
            Self::RequiresPairing => f.write_str("REQUIRES_PAIRING"),
            Self::Other(s) => f.write_str(s),
        }
    }
}

/// Extract `STATUS.RESULT`, `None` if the body has no status
#[must_use]
pub fn status(body: &Value) -> Option<Status> {
    body.get("STATUS")?
        .get("RESULT")?
        .as_str()
        .map(Status::parse)
}

/// Extract `ITEM.<field>` as a string; numbers are rendered in decimal
#[must_use]
pub fn item(body: &Value, field: &str) -> Option<String> {
    match body.get("ITEM")?.get(field)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Body of `/pairing/start` and `/pairing/cancel`
#[must_use]
pub fn session_body(device_id: &str, device_name: &str) -> Value {
    json!({
        "DEVICE_ID": device_id,
        "DEVICE_NAME": device_name,
    })
}

/// Body of `/pairing/pair`
///
/// The session token is sent as a number when it is one.
#[must_use]
pub fn pair_body(device_id: &str, pin: &str, request_token: &str) -> Value {
    let token = request_token
        .parse::<i64>()
        .map_or_else(|_| Value::from(request_token), Value::from);

    json!({
        "DEVICE_ID": device_id,
        "CHALLENGE_TYPE": CHALLENGE_TYPE_PIN,
        "RESPONSE_VALUE": pin,
        "PAIRING_REQ_TOKEN": token,
    })
}

/// Body of `/key_command/` for a single key press
#[must_use]
pub fn key_body(codeset: u8, code: u8) -> Value {
    json!({
        "KEYLIST": [{
            "CODESET": codeset,
            "CODE": code,
            "ACTION": "KEYPRESS",
        }],
    })
}
