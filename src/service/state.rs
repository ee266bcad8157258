/// Pairing and connection state of an endpoint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PairingState {
    /// Not connected, nothing in flight
    #[default]
    Initial,
    /// Asking the device to start a pairing session
    Connecting,
    /// Waiting for (or submitting) the PIN
    Pairing,
    /// Connected with a valid credential
    Paired,
}

impl PairingState {
    /// True while a session is being negotiated
    #[must_use]
    pub fn is_pairing(self) -> bool {
        matches!(self, Self::Connecting | Self::Pairing)
    }
}

impl std::fmt::Display for PairingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Initial => "Initial",
            Self::Connecting => "Connecting",
            Self::Pairing => "Pairing",
            Self::Paired => "Paired",
        };
        f.write_str(name)
    }
}
