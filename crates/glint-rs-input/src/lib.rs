//! Gamepad slot mappings and controller enumeration.

use serde::{Deserialize, Serialize};
use thiserror::Error;

mod devices;
mod mapping;

pub use devices::{
    connected_gamepads, ConnectedGamepad, ControllerSubsystem, DeviceInfo, SysfsInput,
};
pub use mapping::GamepadMapping;

/// Number of player slots a controller can be pinned to
pub const MAX_PLAYERS: u8 = 4;

#[derive(Error, Debug)]
pub enum InputError {
    #[error("Controller subsystem unavailable: {0}")]
    Subsystem(String),

    #[error("Invalid player slot: {0}")]
    InvalidSlot(String),

    #[error("Config error: {0}")]
    Config(#[from] glint_rs_config::ConfigError),
}

/// Player slot a controller is assigned to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Slot {
    /// Let the streaming session pick the next free slot
    #[default]
    Automatic,
    Player(u8),
}

impl Slot {
    /// Player slot clamped into `0..MAX_PLAYERS`
    pub fn player(index: u8) -> Self {
        Slot::Player(index.min(MAX_PLAYERS - 1))
    }

    /// Interpret a persisted integer. Negative values mean automatic.
    pub fn from_stored(value: i64) -> Self {
        if value < 0 {
            Slot::Automatic
        } else {
            Slot::player(value.min(i64::from(MAX_PLAYERS - 1)) as u8)
        }
    }

    pub fn index(self) -> Option<u8> {
        match self {
            Slot::Automatic => None,
            Slot::Player(index) => Some(index),
        }
    }
}

impl std::fmt::Display for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Slot::Automatic => write!(f, "auto"),
            Slot::Player(index) => write!(f, "{}", index),
        }
    }
}

impl std::str::FromStr for Slot {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("auto") || s == "-1" {
            return Ok(Slot::Automatic);
        }
        s.parse::<u8>()
            .map(Slot::player)
            .map_err(|_| InputError::InvalidSlot(s.to_string()))
    }
}
