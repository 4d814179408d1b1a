//! Wire protocol shared by the clicker relay and its controller clients.
//!
//! Controllers talk to the relay over a websocket carrying JSON text frames.
//! Two frame shapes flow upstream: key commands (`{"action": "key-press",
//! "key": "Home"}`) and control messages tagged with a `type` field. The
//! relay answers with [`ServerMessage`] frames. Key commands arrive as raw
//! strings and are checked against the closed action and key sets in a
//! separate validation step, so a frame that parses but names an unknown key
//! can be reported differently from one that is not JSON at all.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Key press phase understood by the set-top box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KeyAction {
    KeyDown,
    KeyUp,
    KeyPress,
}

impl KeyAction {
    /// Path segment used by the device control protocol.
    pub fn path_segment(&self) -> &'static str {
        match self {
            KeyAction::KeyDown => "keydown",
            KeyAction::KeyUp => "keyup",
            KeyAction::KeyPress => "keypress",
        }
    }

    /// Spelling used on the websocket wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyAction::KeyDown => "key-down",
            KeyAction::KeyUp => "key-up",
            KeyAction::KeyPress => "key-press",
        }
    }
}

impl fmt::Display for KeyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeyAction {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "key-down" => Ok(KeyAction::KeyDown),
            "key-up" => Ok(KeyAction::KeyUp),
            "key-press" => Ok(KeyAction::KeyPress),
            other => Err(CommandError::UnknownAction(other.to_string())),
        }
    }
}

/// Remote-control key recognised by the set-top box.
///
/// The wire spelling matches the device's own key names, so a validated key
/// can be dropped straight into a control request path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ControlKey {
    Up,
    Down,
    Left,
    Right,
    Select,
    Back,
    Home,
    Play,
    Rev,
    Fwd,
    InstantReplay,
    Info,
}

impl ControlKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            ControlKey::Up => "Up",
            ControlKey::Down => "Down",
            ControlKey::Left => "Left",
            ControlKey::Right => "Right",
            ControlKey::Select => "Select",
            ControlKey::Back => "Back",
            ControlKey::Home => "Home",
            ControlKey::Play => "Play",
            ControlKey::Rev => "Rev",
            ControlKey::Fwd => "Fwd",
            ControlKey::InstantReplay => "InstantReplay",
            ControlKey::Info => "Info",
        }
    }
}

impl fmt::Display for ControlKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ControlKey {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Up" => Ok(ControlKey::Up),
            "Down" => Ok(ControlKey::Down),
            "Left" => Ok(ControlKey::Left),
            "Right" => Ok(ControlKey::Right),
            "Select" => Ok(ControlKey::Select),
            "Back" => Ok(ControlKey::Back),
            "Home" => Ok(ControlKey::Home),
            "Play" => Ok(ControlKey::Play),
            "Rev" => Ok(ControlKey::Rev),
            "Fwd" => Ok(ControlKey::Fwd),
            "InstantReplay" => Ok(ControlKey::InstantReplay),
            "Info" => Ok(ControlKey::Info),
            other => Err(CommandError::UnknownKey(other.to_string())),
        }
    }
}

/// Why a parsed command frame was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("unknown action '{0}'")]
    UnknownAction(String),
    #[error("unknown key '{0}'")]
    UnknownKey(String),
}

/// A key command as it appears on the wire, before validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandFrame {
    pub action: String,
    pub key: String,
}

impl CommandFrame {
    pub fn new(action: KeyAction, key: ControlKey) -> Self {
        Self {
            action: action.as_str().to_string(),
            key: key.as_str().to_string(),
        }
    }

    /// Check the raw fields against the closed action and key sets.
    pub fn validate(&self) -> Result<Command, CommandError> {
        let action = self.action.parse::<KeyAction>()?;
        let key = self.key.parse::<ControlKey>()?;
        Ok(Command { action, key })
    }
}

/// A validated key command, safe to forward to the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command {
    pub action: KeyAction,
    pub key: ControlKey,
}

/// Control messages multiplexed onto the command socket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ControlMessage {
    /// Point the relay at a different set-top box.
    SetRokuIp { ip: String },
}

/// Any frame a controller can send to the relay.
///
/// Control messages carry a `type` tag; command frames do not, so the two
/// shapes never overlap and untagged dispatch is unambiguous.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClientFrame {
    Control(ControlMessage),
    Command(CommandFrame),
}

/// Frames the relay sends to controllers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    /// Target snapshot. `server_time` is populated on the connect snapshot
    /// and omitted on retarget acknowledgements.
    Config {
        #[serde(rename = "rokuIp")]
        roku_ip: String,
        #[serde(
            rename = "serverTime",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        server_time: Option<i64>,
    },
    /// One-line diagnostic for a command that could not be delivered.
    Error { message: String },
}
