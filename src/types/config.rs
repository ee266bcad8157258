use std::time::Duration;

use rand::Rng;

/// Port the PIN pairing service listens on
pub const DEFAULT_PAIRING_PORT: u16 = 7345;

/// Configuration for discovery and pairing behavior
#[derive(Debug, Clone)]
pub struct ConnectConfig {
    /// Merge every protocol answering on one (name, address) into one device
    /// (default: false, one device per protocol)
    pub service_integration: bool,

    /// Timeout for each pairing or command request (default: 10 seconds)
    pub request_timeout: Duration,

    /// Identifier this client presents to devices when pairing
    pub client_device_id: String,

    /// Name this client presents to devices when pairing
    pub client_device_name: String,

    /// Port of the PIN pairing service (default: 7345)
    pub pairing_port: u16,
}

impl Default for ConnectConfig {
    fn default() -> Self {
        Self {
            service_integration: false,
            request_timeout: Duration::from_secs(10),
            client_device_id: random_client_id(),
            client_device_name: default_client_name(),
            pairing_port: DEFAULT_PAIRING_PORT,
        }
    }
}

impl ConnectConfig {
    /// Create a new config builder
    #[must_use]
    pub fn builder() -> ConnectConfigBuilder {
        ConnectConfigBuilder::default()
    }
}

fn random_client_id() -> String {
    let id: u64 = rand::thread_rng().r#gen();
    format!("{id:016x}")
}

fn default_client_name() -> String {
    hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "tvconnect".to_string())
}

/// Builder for `ConnectConfig`
#[derive(Debug, Clone, Default)]
pub struct ConnectConfigBuilder {
    config: ConnectConfig,
}

impl ConnectConfigBuilder {
    /// Enable or disable service integration identity keys
    #[must_use]
    pub fn service_integration(mut self, enable: bool) -> Self {
        self.config.service_integration = enable;
        self
    }

    /// Set per-request timeout
    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Set the client identifier sent during pairing
    #[must_use]
    pub fn client_device_id(mut self, id: impl Into<String>) -> Self {
        self.config.client_device_id = id.into();
        self
    }

    /// Set the client name sent during pairing
    #[must_use]
    pub fn client_device_name(mut self, name: impl Into<String>) -> Self {
        self.config.client_device_name = name.into();
        self
    }

    /// Set the pairing service port
    #[must_use]
    pub fn pairing_port(mut self, port: u16) -> Self {
        self.config.pairing_port = port;
        self
    }

    /// Build the configuration
    #[must_use]
    pub fn build(self) -> ConnectConfig {
        self.config
    }
}
