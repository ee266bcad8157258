use std::net::{IpAddr, SocketAddr};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{ConnectError, Result};

/// One `PUT` to a device's pairing service
#[derive(Debug, Clone)]
pub struct PairingRequest {
    /// Device address
    pub host: IpAddr,
    /// Pairing service port
    pub port: u16,
    /// Request path (see [`messages`](super::messages))
    pub path: &'static str,
    /// JSON body
    pub body: Value,
    /// Value of the `AUTH` header, if the command is authenticated
    pub auth: Option<String>,
    /// Certificate fingerprint the device must present, if pinned
    pub pinned_fingerprint: Option<String>,
}

impl PairingRequest {
    /// Unauthenticated request
    #[must_use]
    pub fn new(host: IpAddr, port: u16, path: &'static str, body: Value) -> Self {
        Self {
            host,
            port,
            path,
            body,
            auth: None,
            pinned_fingerprint: None,
        }
    }

    /// Attach the `AUTH` header
    #[must_use]
    pub fn with_auth(mut self, token: impl Into<String>) -> Self {
        self.auth = Some(token.into());
        self
    }

    /// Require a certificate fingerprint
    #[must_use]
    pub fn with_pin(mut self, fingerprint: Option<String>) -> Self {
        self.pinned_fingerprint = fingerprint;
        self
    }

    /// Target URL
    #[must_use]
    pub fn url(&self) -> String {
        format!("https://{}{}", SocketAddr::new(self.host, self.port), self.path)
    }
}

/// Parsed `200 OK` response
#[derive(Debug, Clone)]
pub struct PairingResponse {
    /// JSON body
    pub body: Value,
    /// Fingerprint of the certificate the device presented
    pub peer_fingerprint: Option<String>,
}

/// Sends pairing and command requests to a device
///
/// Implementations map connection failures and non-200 statuses to
/// [`ConnectError::Transport`] and unparsable bodies to
/// [`ConnectError::Protocol`].
#[async_trait]
pub trait PairingTransport: Send + Sync {
    /// Perform the request
    async fn put(&self, request: PairingRequest) -> Result<PairingResponse>;
}

/// Transport used when no HTTPS stack is compiled in
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableTransport;

#[async_trait]
impl PairingTransport for UnavailableTransport {
    async fn put(&self, request: PairingRequest) -> Result<PairingResponse> {
        Err(ConnectError::transport(format!(
            "no HTTPS transport available for {}",
            request.url()
        )))
    }
}

#[cfg(feature = "https")]
pub use https::HttpsTransport;

#[cfg(feature = "https")]
mod https {
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use reqwest::header::CONTENT_TYPE;

    use super::{PairingRequest, PairingResponse, PairingTransport};
    use crate::error::{ConnectError, Result};
    use crate::protocol::messages::AUTH_HEADER;
    use crate::protocol::tls::{TofuVerifier, fingerprint};

    /// `reqwest` transport with trust-on-first-use certificate pinning
    ///
    /// One client is kept per pinned fingerprint so connections are reused
    /// across requests to the same device.
    pub struct HttpsTransport {
        timeout: Duration,
        clients: Mutex<HashMap<Option<String>, reqwest::Client>>,
    }

    impl HttpsTransport {
        /// Create a transport with a per-request timeout
        #[must_use]
        pub fn new(timeout: Duration) -> Self {
            Self {
                timeout,
                clients: Mutex::new(HashMap::new()),
            }
        }

        fn client(&self, pinned: Option<String>) -> Result<reqwest::Client> {
            let mut clients = self.clients.lock();
            if let Some(client) = clients.get(&pinned) {
                return Ok(client.clone());
            }

            let tls = rustls::ClientConfig::builder_with_provider(Arc::new(
                rustls::crypto::ring::default_provider(),
            ))
            .with_safe_default_protocol_versions()
            .map_err(|e| ConnectError::transport(format!("TLS setup failed: {e}")))?
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(TofuVerifier::new(pinned.clone())))
            .with_no_client_auth();

            let client = reqwest::Client::builder()
                .use_preconfigured_tls(tls)
                .tls_info(true)
                .timeout(self.timeout)
                .build()
                .map_err(|e| ConnectError::transport(format!("HTTP client setup failed: {e}")))?;

            clients.insert(pinned, client.clone());
            Ok(client)
        }
    }

    impl std::fmt::Debug for HttpsTransport {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("HttpsTransport")
                .field("timeout", &self.timeout)
                .finish_non_exhaustive()
        }
    }

    #[async_trait]
    impl PairingTransport for HttpsTransport {
        async fn put(&self, request: PairingRequest) -> Result<PairingResponse> {
            let url = request.url();
            let client = self.client(request.pinned_fingerprint.clone())?;

            let body = serde_json::to_vec(&request.body)
                .map_err(|e| ConnectError::protocol(format!("cannot encode body: {e}")))?;

            let mut builder = client
                .put(&url)
                .header(CONTENT_TYPE, "application/json")
                .body(body);
            if let Some(token) = &request.auth {
                builder = builder.header(AUTH_HEADER, token);
            }

            tracing::debug!(%url, "PUT");
            let response = builder.send().await.map_err(|e| ConnectError::Transport {
                message: e.to_string(),
                status: None,
            })?;

            let status = response.status();
            if status != reqwest::StatusCode::OK {
                return Err(ConnectError::Transport {
                    message: format!("{url} returned {status}"),
                    status: Some(status.as_u16()),
                });
            }

            let peer_fingerprint = response
                .extensions()
                .get::<reqwest::tls::TlsInfo>()
                .and_then(reqwest::tls::TlsInfo::peer_certificate)
                .map(fingerprint);

            let bytes = response.bytes().await.map_err(|e| ConnectError::Transport {
                message: e.to_string(),
                status: Some(status.as_u16()),
            })?;
            let body = serde_json::from_slice(&bytes)
                .map_err(|e| ConnectError::protocol(format!("malformed response body: {e}")))?;

            Ok(PairingResponse {
                body,
                peer_fingerprint,
            })
        }
    }
}
