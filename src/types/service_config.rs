use serde::{Deserialize, Serialize};

/// How a device service authenticates the client
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PairingType {
    /// No pairing step
    #[default]
    None,
    /// User confirms a prompt on the device
    FirstScreen,
    /// User types a PIN shown on the device
    PinCode,
}

/// Per-endpoint persisted configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Stable UUID of the service this config belongs to
    pub service_uuid: String,

    /// Credential returned by a successful pairing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,

    /// Pairing flow the service uses
    #[serde(default)]
    pub pairing_type: PairingType,

    /// Hex SHA-256 of the device's TLS leaf certificate, pinned on first pairing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cert_fingerprint: Option<String>,
}

impl ServiceConfig {
    /// Empty config for a service
    pub fn new(service_uuid: impl Into<String>) -> Self {
        Self {
            service_uuid: service_uuid.into(),
            ..Self::default()
        }
    }

    /// Usable auth token, ignoring empty strings
    #[must_use]
    pub fn auth(&self) -> Option<&str> {
        self.auth_token.as_deref().filter(|t| !t.is_empty())
    }
}
