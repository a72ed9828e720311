use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info, warn};

use crate::{ConfigChannel, ConfigError, ConfigValue, SettingsStore};

/// TOML-backed settings store.
///
/// Every channel is kept in memory; [`SettingsStore::sync`] rewrites the whole
/// file. A store created with [`FileSettings::in_memory`] never touches disk.
pub struct FileSettings {
    channels: RwLock<BTreeMap<String, ConfigChannel>>,
    config_path: Option<PathBuf>,
}

impl std::fmt::Debug for FileSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSettings")
            .field("config_path", &self.config_path)
            .field("channels", &"RwLock<BTreeMap<...>>")
            .finish()
    }
}

impl FileSettings {
    pub fn new(config_path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let config_path = config_path.into();
        let channels = Self::load_from_file(&config_path)?;
        info!("Loaded {} settings channels from {:?}", channels.len(), config_path);

        Ok(Self {
            channels: RwLock::new(channels),
            config_path: Some(config_path),
        })
    }

    pub fn in_memory() -> Self {
        Self {
            channels: RwLock::new(BTreeMap::new()),
            config_path: None,
        }
    }

    /// `$XDG_CONFIG_HOME/glint-rs/settings.toml` or a local fallback
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("glint-rs")
            .join("settings.toml")
    }

    pub fn open_default() -> Result<Self, ConfigError> {
        Self::new(Self::default_path())
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Discard in-memory state and read the file again
    pub fn reload(&self) -> Result<(), ConfigError> {
        if let Some(path) = &self.config_path {
            let channels = Self::load_from_file(path)?;
            *self.write_channels() = channels;
        }
        Ok(())
    }

    fn load_from_file(path: &Path) -> Result<BTreeMap<String, ConfigChannel>, ConfigError> {
        if !path.exists() {
            return Ok(BTreeMap::new());
        }

        let content = std::fs::read_to_string(path)?;
        let config: BTreeMap<String, ConfigChannel> = toml::from_str(&content)?;
        Ok(config)
    }

    fn read_channels(&self) -> RwLockReadGuard<'_, BTreeMap<String, ConfigChannel>> {
        self.channels.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_channels(&self) -> RwLockWriteGuard<'_, BTreeMap<String, ConfigChannel>> {
        self.channels.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SettingsStore for FileSettings {
    fn get_property(&self, channel: &str, property: &str) -> Result<ConfigValue, ConfigError> {
        let channels = self.read_channels();

        channels
            .get(channel)
            .and_then(|entry| entry.get(property))
            .cloned()
            .ok_or_else(|| ConfigError::PropertyNotFound {
                channel: channel.to_string(),
                property: property.to_string(),
            })
    }

    fn set_property(&self, channel: &str, property: &str, value: ConfigValue) {
        let mut channels = self.write_channels();
        let channel_entry = channels.entry(channel.to_string()).or_insert_with(ConfigChannel::new);
        channel_entry.set(property.to_string(), value);
    }

    fn remove_property(&self, channel: &str, property: &str) -> Option<ConfigValue> {
        let mut channels = self.write_channels();
        let entry = channels.get_mut(channel)?;
        let removed = entry.remove(property);
        if entry.properties.is_empty() {
            channels.remove(channel);
        }
        removed
    }

    fn remove_channel(&self, channel: &str) {
        let nested = format!("{}/", channel);
        self.write_channels()
            .retain(|name, _| name != channel && !name.starts_with(&nested));
    }

    fn replace_channel(&self, channel: &str, replacement: BTreeMap<String, ConfigChannel>) {
        let nested = format!("{}/", channel);
        let mut channels = self.write_channels();
        channels.retain(|name, _| name != channel && !name.starts_with(&nested));
        for (name, entry) in replacement {
            if name != channel && !name.starts_with(&nested) {
                warn!("Skipping channel {} outside of {}", name, channel);
                continue;
            }
            if !entry.properties.is_empty() {
                channels.insert(name, entry);
            }
        }
    }

    fn list_channels(&self) -> Vec<String> {
        self.read_channels().keys().cloned().collect()
    }

    fn list_properties(&self, channel: &str) -> Vec<String> {
        self.read_channels()
            .get(channel)
            .map(|entry| entry.properties.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn sync(&self) -> Result<(), ConfigError> {
        let Some(path) = &self.config_path else {
            return Ok(());
        };

        let content = {
            let channels = self.read_channels();
            toml::to_string_pretty(&*channels)
                .map_err(|e| ConfigError::InvalidFormat { reason: e.to_string() })?
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content)?;
        debug!("Settings flushed to {:?}", path);
        Ok(())
    }
}
