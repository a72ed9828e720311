use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

mod preferences;
mod store;

pub use preferences::{Preferences, SortMode};
pub use store::FileSettings;

/// Error types for configuration operations
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration format: {reason}")]
    InvalidFormat { reason: String },

    #[error("Configuration property not found: {channel}.{property}")]
    PropertyNotFound { channel: String, property: String },

    #[error("Unknown sort mode: {0}")]
    UnknownSortMode(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Configuration value types
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ConfigValue {
    String(String),
    Integer(i64),
    Boolean(bool),
    Float(f64),
    Array(Vec<ConfigValue>),
}

impl ConfigValue {
    /// Build an array value out of plain strings
    pub fn string_list<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ConfigValue::Array(items.into_iter().map(|s| ConfigValue::String(s.into())).collect())
    }

    /// Read an array value back as strings. Non-string members are skipped.
    pub fn as_string_list(&self) -> Option<Vec<String>> {
        match self {
            ConfigValue::Array(items) => Some(
                items
                    .iter()
                    .filter_map(|item| match item {
                        ConfigValue::String(s) => Some(s.clone()),
                        _ => None,
                    })
                    .collect(),
            ),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            ConfigValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConfigValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }
}

/// Configuration channel containing properties
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigChannel {
    pub properties: BTreeMap<String, ConfigValue>,
}

impl ConfigChannel {
    pub fn new() -> Self {
        Self {
            properties: BTreeMap::new(),
        }
    }

    pub fn get(&self, property: &str) -> Option<&ConfigValue> {
        self.properties.get(property)
    }

    pub fn set(&mut self, property: String, value: ConfigValue) {
        self.properties.insert(property, value);
    }

    pub fn remove(&mut self, property: &str) -> Option<ConfigValue> {
        self.properties.remove(property)
    }
}

/// Key/value settings backend shared by every subsystem.
///
/// Values are grouped in channels; a channel name may contain `/` to express
/// nesting (`appFolders/<host>`), which [`SettingsStore::list_channels_under`]
/// understands. Mutations stay in memory until [`SettingsStore::sync`] is called.
pub trait SettingsStore: Send + Sync {
    fn get_property(&self, channel: &str, property: &str) -> Result<ConfigValue, ConfigError>;

    fn set_property(&self, channel: &str, property: &str, value: ConfigValue);

    fn remove_property(&self, channel: &str, property: &str) -> Option<ConfigValue>;

    /// Remove a channel and every channel nested below it
    fn remove_channel(&self, channel: &str);

    /// Swap `channel` and everything nested below it for `channels` in one
    /// step. Keys of `channels` are full channel names under `channel`.
    fn replace_channel(&self, channel: &str, channels: BTreeMap<String, ConfigChannel>);

    fn list_channels(&self) -> Vec<String>;

    fn list_properties(&self, channel: &str) -> Vec<String>;

    /// Flush pending changes to durable storage
    fn sync(&self) -> Result<(), ConfigError>;

    fn get_string_list(&self, channel: &str, property: &str) -> Vec<String> {
        self.get_property(channel, property)
            .ok()
            .and_then(|value| value.as_string_list())
            .unwrap_or_default()
    }

    fn set_string_list(&self, channel: &str, property: &str, items: &[String]) {
        self.set_property(channel, property, ConfigValue::string_list(items.iter().cloned()));
    }

    fn get_bool(&self, channel: &str, property: &str, default: bool) -> bool {
        self.get_property(channel, property)
            .ok()
            .and_then(|value| value.as_bool())
            .unwrap_or(default)
    }

    /// Names of the direct children of `prefix` (`prefix/<child>` or deeper)
    fn list_channels_under(&self, prefix: &str) -> Vec<String> {
        let lead = format!("{}/", prefix.trim_end_matches('/'));
        let mut children: Vec<String> = self
            .list_channels()
            .iter()
            .filter_map(|channel| channel.strip_prefix(&lead))
            .filter_map(|rest| rest.split('/').next())
            .filter(|child| !child.is_empty())
            .map(str::to_string)
            .collect();
        children.sort();
        children.dedup();
        children
    }
}
