//! Hosts fixture file feeding the in-process host store.
//!
//! ```toml
//! [[host]]
//! uuid = "2f3c..."
//! name = "Den PC"
//! state = "online"
//! pair_state = "paired"
//! mac = "00:1a:2b:3c:4d:5e"
//!
//! [[host.app]]
//! id = 1
//! name = "Steam"
//! ```

use std::collections::HashSet;
use std::path::Path;

use anyhow::{anyhow, Context as _};
use glint_rs_model::{App, ComputerManager, ComputerState, ComputerStatus, HostStore, PairState};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HostsFile {
    #[serde(default, rename = "host")]
    pub hosts: Vec<HostEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HostEntry {
    pub uuid: String,
    pub name: String,
    #[serde(default)]
    pub state: ComputerStatus,
    #[serde(default)]
    pub pair_state: PairState,
    #[serde(default)]
    pub current_game_id: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv6_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manual_address: Option<String>,
    #[serde(default)]
    pub https_port: u16,
    #[serde(default = "default_true")]
    pub server_supported: bool,
    #[serde(default, rename = "app")]
    pub apps: Vec<App>,
}

fn parse_mac(raw: &str) -> anyhow::Result<[u8; 6]> {
    let bytes = raw
        .split(':')
        .map(|part| u8::from_str_radix(part, 16))
        .collect::<Result<Vec<u8>, _>>()
        .with_context(|| format!("Invalid MAC address {:?}", raw))?;
    bytes
        .try_into()
        .map_err(|_| anyhow!("MAC address {:?} must have six octets", raw))
}

fn format_mac(bytes: &[u8; 6]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(":")
}

impl HostEntry {
    pub fn to_state(&self) -> anyhow::Result<ComputerState> {
        let mut state = ComputerState::new(self.name.clone());
        state.state = self.state;
        state.pair_state = self.pair_state;
        state.current_game_id = self.current_game_id;
        state.mac_address = self.mac.as_deref().map(parse_mac).transpose()?;
        state.active_address = self.active_address.clone();
        state.local_address = self.local_address.clone();
        state.remote_address = self.remote_address.clone();
        state.ipv6_address = self.ipv6_address.clone();
        state.manual_address = self.manual_address.clone();
        state.active_https_port = self.https_port;
        state.server_supported = self.server_supported;
        state.apps = self.apps.clone();
        Ok(state)
    }

    pub fn from_state(uuid: &str, state: &ComputerState) -> Self {
        Self {
            uuid: uuid.to_string(),
            name: state.name.clone(),
            state: state.state,
            pair_state: state.pair_state,
            current_game_id: state.current_game_id,
            mac: state.mac_address.as_ref().map(format_mac),
            active_address: state.active_address.clone(),
            local_address: state.local_address.clone(),
            remote_address: state.remote_address.clone(),
            ipv6_address: state.ipv6_address.clone(),
            manual_address: state.manual_address.clone(),
            https_port: state.active_https_port,
            server_supported: state.server_supported,
            apps: state.apps.clone(),
        }
    }
}

impl HostsFile {
    /// Read the file; a missing file is an empty host list
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            debug!("No hosts file at {:?}", path);
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read hosts file {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse hosts file {:?}", path))
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize hosts")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write hosts file {:?}", path))
    }

    pub fn from_store(store: &dyn HostStore) -> Self {
        let hosts = store
            .computers()
            .iter()
            .map(|computer| HostEntry::from_state(computer.uuid(), &computer.read()))
            .collect();
        Self { hosts }
    }

    /// Make the store match this file: add or update every listed host and
    /// drop hosts that are no longer listed.
    pub fn apply(&self, manager: &ComputerManager) -> anyhow::Result<()> {
        let mut listed = HashSet::new();
        for entry in &self.hosts {
            let state = entry
                .to_state()
                .with_context(|| format!("Invalid host entry {:?}", entry.uuid))?;
            listed.insert(entry.uuid.clone());

            let unchanged = manager
                .find(&entry.uuid)
                .is_some_and(|existing| *existing.read() == state);
            if !unchanged {
                manager.add_host(entry.uuid.clone(), state);
            }
        }

        for computer in manager.computers() {
            if !listed.contains(computer.uuid()) {
                manager.remove_host(computer.uuid());
            }
        }

        info!("Host store holds {} hosts", manager.computers().len());
        Ok(())
    }
}
