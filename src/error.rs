use thiserror::Error;

use crate::store::StorageError;

/// Why a pairing attempt was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairingErrorKind {
    /// The user submitted an empty PIN
    EmptyPin,
    /// The device rejected the submitted PIN
    InvalidPin,
    /// The device refused to start a pairing session
    InvalidCredentials,
    /// Another pairing session is already showing a PIN on the device
    Blocked,
}

impl std::fmt::Display for PairingErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::EmptyPin => "empty pairing PIN",
            Self::InvalidPin => "invalid PIN code",
            Self::InvalidCredentials => "device refused pairing",
            Self::Blocked => "a PIN is already displayed on the device",
        };
        f.write_str(text)
    }
}

/// Errors that can occur during discovery, pairing or command exchange
#[derive(Debug, Clone, Error)]
pub enum ConnectError {
    // ===== Transport Errors =====
    /// Connection refused, timeout, TLS failure or non-200 HTTP status
    #[error("network error: {message}")]
    Transport {
        /// Description of the failure
        message: String,
        /// HTTP status code if the device answered
        status: Option<u16>,
    },

    // ===== Protocol Errors =====
    /// Malformed or unexpected response body
    #[error("unexpected response: {message}")]
    Protocol {
        /// Description of the error
        message: String,
    },

    // ===== Pairing Errors =====
    /// Pairing was rejected
    #[error("pairing failed: {kind}")]
    Pairing {
        /// Sub-kind so callers can prompt the user appropriately
        kind: PairingErrorKind,
    },

    /// The device no longer recognizes our credential
    #[error("pairing required by {service}")]
    PairingRequired {
        /// Protocol id of the endpoint
        service: String,
    },

    // ===== Discovery Errors =====
    /// A device service type could not be registered
    #[error("cannot register {service_id}: {message}")]
    Registration {
        /// Protocol id of the rejected service type
        service_id: String,
        /// Description of the failure
        message: String,
    },

    /// Discovery could not be started
    #[error("discovery failed: {message}")]
    DiscoveryFailed {
        /// Description of the failure
        message: String,
    },

    // ===== State Errors =====
    /// Operation not valid in current state
    #[error("invalid state: {message}")]
    InvalidState {
        /// Description of why the state is invalid
        message: String,
        /// The current state
        current_state: String,
    },

    /// Another exchange with the device is in flight
    #[error("device busy")]
    DeviceBusy,

    /// The exchange was cancelled before its result arrived
    #[error("operation cancelled")]
    Cancelled,

    // ===== Storage Errors =====
    /// Device store failure
    #[error("storage error: {message}")]
    Storage {
        /// Description of the failure
        message: String,
    },
}

impl ConnectError {
    /// Build a transport error without an HTTP status
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            status: None,
        }
    }

    /// Build a protocol error
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Build a pairing error of the given kind
    #[must_use]
    pub fn pairing(kind: PairingErrorKind) -> Self {
        Self::Pairing { kind }
    }

    /// Check if this error is recoverable by retrying
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. } | Self::DeviceBusy | Self::Cancelled
        ) || matches!(
            self,
            Self::Pairing {
                kind: PairingErrorKind::Blocked
            }
        )
    }

    /// Pairing sub-kind, if this is a pairing rejection
    #[must_use]
    pub fn pairing_kind(&self) -> Option<PairingErrorKind> {
        match self {
            Self::Pairing { kind } => Some(*kind),
            _ => None,
        }
    }
}

impl From<StorageError> for ConnectError {
    fn from(err: StorageError) -> Self {
        Self::Storage {
            message: err.to_string(),
        }
    }
}

/// Result type alias for tvconnect operations
pub type Result<T> = std::result::Result<T, ConnectError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ConnectError::pairing(PairingErrorKind::InvalidPin);
        assert_eq!(err.to_string(), "pairing failed: invalid PIN code");

        let err = ConnectError::Registration {
            service_id: "Vizio".to_string(),
            message: "provider failed".to_string(),
        };
        assert_eq!(err.to_string(), "cannot register Vizio: provider failed");
    }

    #[test]
    fn test_error_is_recoverable() {
        assert!(ConnectError::transport("refused").is_recoverable());
        assert!(ConnectError::DeviceBusy.is_recoverable());
        assert!(ConnectError::pairing(PairingErrorKind::Blocked).is_recoverable());
        assert!(!ConnectError::pairing(PairingErrorKind::InvalidPin).is_recoverable());
        assert!(!ConnectError::protocol("garbage").is_recoverable());
    }

    #[test]
    fn test_pairing_kind() {
        let err = ConnectError::pairing(PairingErrorKind::EmptyPin);
        assert_eq!(err.pairing_kind(), Some(PairingErrorKind::EmptyPin));
        assert_eq!(ConnectError::Cancelled.pairing_kind(), None);
    }

    #[test]
    fn test_error_from_storage() {
        let err: ConnectError = StorageError::NotAvailable.into();
        assert!(matches!(err, ConnectError::Storage { .. }));
    }

    #[test]
    fn test_error_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ConnectError>();
    }
}
