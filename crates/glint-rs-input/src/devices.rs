use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::InputError;

const UNKNOWN_CONTROLLER: &str = "<Unknown Controller>";

/// One joystick as reported by a controller subsystem
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub name: Option<String>,
    /// 32 hex digit SDL-style GUID
    pub guid: String,
    pub is_game_controller: bool,
}

/// A game controller available for slot mapping
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectedGamepad {
    pub name: String,
    pub guid: String,
    /// Position in the subsystem's device list
    pub index: usize,
}

/// Platform joystick/game controller layer
pub trait ControllerSubsystem {
    fn was_init(&self) -> bool;

    fn init(&mut self) -> Result<(), InputError>;

    fn quit(&mut self);

    fn devices(&self) -> Vec<DeviceInfo>;
}

/// Keeps the subsystem initialized for its lifetime and shuts it down on
/// drop if it was the one that started it.
struct SubsystemGuard<'a> {
    subsystem: &'a mut dyn ControllerSubsystem,
    started: bool,
}

impl<'a> SubsystemGuard<'a> {
    fn acquire(subsystem: &'a mut dyn ControllerSubsystem) -> Result<Self, InputError> {
        let started = !subsystem.was_init();
        if started {
            subsystem.init()?;
        }
        Ok(Self { subsystem, started })
    }

    fn devices(&self) -> Vec<DeviceInfo> {
        self.subsystem.devices()
    }
}

impl Drop for SubsystemGuard<'_> {
    fn drop(&mut self) {
        if self.started {
            self.subsystem.quit();
        }
    }
}

/// Game controllers currently attached. The subsystem is brought up just for
/// the scan and left in the state it was found in.
pub fn connected_gamepads(subsystem: &mut dyn ControllerSubsystem) -> Vec<ConnectedGamepad> {
    let guard = match SubsystemGuard::acquire(subsystem) {
        Ok(guard) => guard,
        Err(e) => {
            warn!("Failed to init controller subsystem: {}", e);
            return Vec::new();
        }
    };

    guard
        .devices()
        .into_iter()
        .enumerate()
        .filter(|(_, device)| device.is_game_controller)
        .map(|(index, device)| ConnectedGamepad {
            name: device.name.unwrap_or_else(|| UNKNOWN_CONTROLLER.to_string()),
            guid: device.guid,
            index,
        })
        .collect()
}

/// Linux joystick enumeration through `/sys/class/input`
#[derive(Debug)]
pub struct SysfsInput {
    root: PathBuf,
    initialized: bool,
}

impl Default for SysfsInput {
    fn default() -> Self {
        Self::new("/sys/class/input")
    }
}

impl SysfsInput {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            initialized: false,
        }
    }

    fn read_hex(device: &Path, name: &str) -> u16 {
        fs::read_to_string(device.join("id").join(name))
            .ok()
            .and_then(|raw| u16::from_str_radix(raw.trim(), 16).ok())
            .unwrap_or(0)
    }

    /// Same layout SDL uses on Linux: bus, vendor, product and version as
    /// little-endian words, each followed by a zero word.
    fn guid(device: &Path) -> String {
        let mut bytes = [0u8; 16];
        for (slot, field) in ["bustype", "vendor", "product", "version"].iter().enumerate() {
            let value = Self::read_hex(device, field);
            let offset = slot * 4;
            bytes[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
        }
        bytes.iter().map(|b| format!("{:02x}", b)).collect()
    }

    fn read_device(path: &Path) -> DeviceInfo {
        let device = path.join("device");
        let name = fs::read_to_string(device.join("name"))
            .ok()
            .map(|raw| raw.trim().to_string())
            .filter(|name| !name.is_empty());
        DeviceInfo {
            name,
            guid: Self::guid(&device),
            is_game_controller: true,
        }
    }
}

impl ControllerSubsystem for SysfsInput {
    fn was_init(&self) -> bool {
        self.initialized
    }

    fn init(&mut self) -> Result<(), InputError> {
        if !self.root.is_dir() {
            return Err(InputError::Subsystem(format!(
                "{} is not available",
                self.root.display()
            )));
        }
        debug!("Controller subsystem up at {:?}", self.root);
        self.initialized = true;
        Ok(())
    }

    fn quit(&mut self) {
        debug!("Controller subsystem down");
        self.initialized = false;
    }

    fn devices(&self) -> Vec<DeviceInfo> {
        if !self.initialized {
            return Vec::new();
        }

        let mut joysticks: Vec<PathBuf> = WalkDir::new(&self.root)
            .min_depth(1)
            .max_depth(1)
            .follow_links(false)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with("js"))
            .map(|e| e.path().to_path_buf())
            .collect();
        joysticks.sort();

        joysticks.iter().map(|path| Self::read_device(path)).collect()
    }
}
