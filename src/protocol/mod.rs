//! PIN pairing wire protocol and HTTPS transport

pub mod messages;
#[cfg(feature = "https")]
mod tls;
mod transport;

#[cfg(test)]
mod tests;

#[cfg(feature = "https")]
pub use tls::{TofuVerifier, fingerprint};
#[cfg(feature = "https")]
pub use transport::HttpsTransport;
pub use transport::{PairingRequest, PairingResponse, PairingTransport, UnavailableTransport};
