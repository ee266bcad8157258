//! Capability names and filters

use std::collections::BTreeSet;

/// Capability names advertised by device services
pub mod names {
    /// Directional navigation keys
    pub const KEY_CONTROL_UP: &str = "KeyControl.Up";
    /// Directional navigation keys
    pub const KEY_CONTROL_DOWN: &str = "KeyControl.Down";
    /// Directional navigation keys
    pub const KEY_CONTROL_LEFT: &str = "KeyControl.Left";
    /// Directional navigation keys
    pub const KEY_CONTROL_RIGHT: &str = "KeyControl.Right";
    /// Select / OK key
    pub const KEY_CONTROL_OK: &str = "KeyControl.OK";
    /// Back key
    pub const KEY_CONTROL_BACK: &str = "KeyControl.Back";
    /// Home key
    pub const KEY_CONTROL_HOME: &str = "KeyControl.Home";
    /// Raw key codes
    pub const KEY_CONTROL_SEND_KEY: &str = "KeyControl.SendKey";

    /// Relative volume
    pub const VOLUME_UP_DOWN: &str = "VolumeControl.UpDown";
    /// Mute toggle
    pub const VOLUME_MUTE_SET: &str = "VolumeControl.Mute.Set";

    /// Media transport
    pub const MEDIA_CONTROL_PLAY: &str = "MediaControl.Play";
    /// Media transport
    pub const MEDIA_CONTROL_PAUSE: &str = "MediaControl.Pause";
    /// Media transport
    pub const MEDIA_CONTROL_REWIND: &str = "MediaControl.Rewind";
    /// Media transport
    pub const MEDIA_CONTROL_FAST_FORWARD: &str = "MediaControl.FastForward";

    /// Channel stepping
    pub const TV_CONTROL_CHANNEL_UP: &str = "TVControl.Channel.Up";
    /// Channel stepping
    pub const TV_CONTROL_CHANNEL_DOWN: &str = "TVControl.Channel.Down";

    /// Power off
    pub const POWER_CONTROL_OFF: &str = "PowerControl.Off";
    /// Power on
    pub const POWER_CONTROL_ON: &str = "PowerControl.On";

    /// Remote control session without pairing
    pub const REMOTE_SESSION: &str = "Remote.Session";
}

/// A set of capabilities a device must have *all* of to match
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilityFilter {
    required: BTreeSet<String>,
}

impl CapabilityFilter {
    /// Create a filter from capability names
    pub fn new<I, S>(capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            required: capabilities.into_iter().map(Into::into).collect(),
        }
    }

    /// Add a required capability
    #[must_use]
    pub fn with(mut self, capability: impl Into<String>) -> Self {
        self.required.insert(capability.into());
        self
    }

    /// Required capability names
    pub fn required(&self) -> impl Iterator<Item = &str> {
        self.required.iter().map(String::as_str)
    }

    /// True if `capabilities` contains every required name
    #[must_use]
    pub fn matches(&self, capabilities: &BTreeSet<String>) -> bool {
        self.required.is_subset(capabilities)
    }
}
