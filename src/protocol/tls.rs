//! Trust-on-first-use certificate verification
//!
//! TV pairing services present self-signed certificates, so there is no
//! chain to validate. The first successful pairing records the SHA-256 of
//! the leaf certificate; later connections must present the same one.

use rustls::DigitallySignedStruct;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use sha2::{Digest, Sha256};

/// Hex SHA-256 of a DER certificate
#[must_use]
pub fn fingerprint(der: &[u8]) -> String {
    hex::encode(Sha256::digest(der))
}

/// Accepts any certificate until one is pinned, then only that one
#[derive(Debug)]
pub struct TofuVerifier {
    pinned: Option<String>,
}

impl TofuVerifier {
    /// Verifier for a service, pinned if a fingerprint is known
    #[must_use]
    pub fn new(pinned: Option<String>) -> Self {
        Self {
            pinned: pinned.map(|p| p.to_ascii_lowercase()),
        }
    }

    /// Pinned fingerprint, if any
    #[must_use]
    pub fn pinned(&self) -> Option<&str> {
        self.pinned.as_deref()
    }

    /// Check a leaf certificate against the pin
    ///
    /// # Errors
    ///
    /// Returns an error if a pin exists and the certificate does not match it
    pub fn check(&self, end_entity: &[u8]) -> Result<(), rustls::Error> {
        let Some(expected) = &self.pinned else {
            tracing::debug!("No pinned certificate, trusting on first use");
            return Ok(());
        };

        let actual = fingerprint(end_entity);
        if &actual != expected {
            tracing::warn!(%expected, %actual, "Certificate fingerprint mismatch");
            return Err(rustls::Error::General(format!(
                "certificate fingerprint mismatch: expected {expected}, got {actual}"
            )));
        }
        Ok(())
    }
}

impl ServerCertVerifier for TofuVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        self.check(end_entity.as_ref())?;
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &rustls::crypto::ring::default_provider().signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &rustls::crypto::ring::default_provider().signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        rustls::crypto::ring::default_provider()
            .signature_verification_algorithms
            .supported_schemes()
    }
}
