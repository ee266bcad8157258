use async_trait::async_trait;

use crate::error::Result;

/// Remote control keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum KeyCode {
    Number0,
    Number1,
    Number2,
    Number3,
    Number4,
    Number5,
    Number6,
    Number7,
    Number8,
    Number9,
    Dash,
    Enter,
    Home,
    Exit,
    ThreeD,
    Source,
    ViewMode,
    ClosedCaption,
    AspectRatio,
    TopMenu,
    Play,
    Pause,
    Rewind,
    FastForward,
    Back,
    VolumeUp,
    VolumeDown,
    Mute,
    ChannelUp,
    ChannelDown,
    PowerOn,
    Power,
    Left,
    Right,
    Up,
    Down,
    Info,
    PreviousChannel,
    Delete,
}

// (key, codeset, code)
const KEY_TABLE: &[(KeyCode, u8, u8)] = &[
    (KeyCode::Number0, 0, 48),
    (KeyCode::Number1, 0, 49),
    (KeyCode::Number2, 0, 50),
    (KeyCode::Number3, 0, 51),
    (KeyCode::Number4, 0, 52),
    (KeyCode::Number5, 0, 53),
    (KeyCode::Number6, 0, 54),
    (KeyCode::Number7, 0, 55),
    (KeyCode::Number8, 0, 56),
    (KeyCode::Number9, 0, 57),
    (KeyCode::Dash, 0, 45),
    (KeyCode::Enter, 3, 2),
    (KeyCode::Home, 4, 15),
    (KeyCode::Exit, 4, 3),
    (KeyCode::ThreeD, 12, 0),
    (KeyCode::Source, 7, 1),
    (KeyCode::ViewMode, 6, 0),
    (KeyCode::ClosedCaption, 4, 4),
    (KeyCode::AspectRatio, 6, 2),
    (KeyCode::TopMenu, 4, 8),
    (KeyCode::Play, 2, 3),
    (KeyCode::Pause, 2, 2),
    (KeyCode::Rewind, 2, 1),
    (KeyCode::FastForward, 2, 0),
    (KeyCode::Back, 4, 0),
    (KeyCode::VolumeUp, 5, 1),
    (KeyCode::VolumeDown, 5, 0),
    (KeyCode::Mute, 5, 4),
    (KeyCode::ChannelUp, 8, 1),
    (KeyCode::ChannelDown, 8, 0),
    (KeyCode::PowerOn, 11, 1),
    (KeyCode::Power, 11, 0),
    (KeyCode::Left, 3, 1),
    (KeyCode::Right, 3, 7),
    (KeyCode::Up, 3, 8),
    (KeyCode::Down, 3, 0),
    (KeyCode::Info, 4, 6),
    (KeyCode::PreviousChannel, 8, 2),
    (KeyCode::Delete, 0, 8),
];

impl KeyCode {
    /// `(codeset, code)` pair sent on the wire
    #[must_use]
    pub fn wire(self) -> (u8, u8) {
        KEY_TABLE
            .iter()
            .find(|(key, _, _)| *key == self)
            .map_or((0, 0), |&(_, codeset, code)| (codeset, code))
    }

    /// Key for a decimal digit
    #[must_use]
    pub fn digit(n: u8) -> Option<Self> {
        const DIGITS: [KeyCode; 10] = [
            KeyCode::Number0,
            KeyCode::Number1,
            KeyCode::Number2,
            KeyCode::Number3,
            KeyCode::Number4,
            KeyCode::Number5,
            KeyCode::Number6,
            KeyCode::Number7,
            KeyCode::Number8,
            KeyCode::Number9,
        ];
        DIGITS.get(usize::from(n)).copied()
    }
}

/// Key press commands
///
/// Commands to one endpoint are serialized; a command issued while another
/// exchange is in flight waits for it.
#[async_trait]
pub trait KeyControl: Send + Sync {
    /// Send one key press
    ///
    /// # Errors
    ///
    /// Returns [`ConnectError::PairingRequired`](crate::ConnectError::PairingRequired)
    /// if the device no longer accepts the credential, or a transport error
    async fn send_key(&self, key: KeyCode) -> Result<()>;

    /// Navigate up
    async fn up(&self) -> Result<()> {
        self.send_key(KeyCode::Up).await
    }

    /// Navigate down
    async fn down(&self) -> Result<()> {
        self.send_key(KeyCode::Down).await
    }

    /// Navigate left
    async fn left(&self) -> Result<()> {
        self.send_key(KeyCode::Left).await
    }

    /// Navigate right
    async fn right(&self) -> Result<()> {
        self.send_key(KeyCode::Right).await
    }

    /// Select
    async fn ok(&self) -> Result<()> {
        self.send_key(KeyCode::Enter).await
    }

    /// Back
    async fn back(&self) -> Result<()> {
        self.send_key(KeyCode::Back).await
    }

    /// Home
    async fn home(&self) -> Result<()> {
        self.send_key(KeyCode::Home).await
    }

    /// Volume up
    async fn volume_up(&self) -> Result<()> {
        self.send_key(KeyCode::VolumeUp).await
    }

    /// Volume down
    async fn volume_down(&self) -> Result<()> {
        self.send_key(KeyCode::VolumeDown).await
    }

    /// Toggle mute
    async fn mute(&self) -> Result<()> {
        self.send_key(KeyCode::Mute).await
    }

    /// Next channel
    async fn channel_up(&self) -> Result<()> {
        self.send_key(KeyCode::ChannelUp).await
    }

    /// Previous channel in the lineup
    async fn channel_down(&self) -> Result<()> {
        self.send_key(KeyCode::ChannelDown).await
    }

    /// Play
    async fn play(&self) -> Result<()> {
        self.send_key(KeyCode::Play).await
    }

    /// Pause
    async fn pause(&self) -> Result<()> {
        self.send_key(KeyCode::Pause).await
    }

    /// Rewind
    async fn rewind(&self) -> Result<()> {
        self.send_key(KeyCode::Rewind).await
    }

    /// Fast forward
    async fn fast_forward(&self) -> Result<()> {
        self.send_key(KeyCode::FastForward).await
    }

    /// Power on
    async fn power_on(&self) -> Result<()> {
        self.send_key(KeyCode::PowerOn).await
    }

    /// Power off
    async fn power_off(&self) -> Result<()> {
        self.send_key(KeyCode::Power).await
    }

    /// Show program info
    async fn info(&self) -> Result<()> {
        self.send_key(KeyCode::Info).await
    }
}
