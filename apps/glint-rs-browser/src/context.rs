use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context as _};
use glint_rs_config::{FileSettings, Preferences, SettingsStore};
use glint_rs_input::GamepadMapping;
use glint_rs_model::{ComputerManager, HostStore};
use tracing::info;

use crate::hosts_file::HostsFile;

/// Everything the commands share, built once at startup
pub struct Context {
    pub preferences: Preferences,
    pub gamepads: GamepadMapping,
    pub hosts: Arc<ComputerManager>,
    pub hosts_path: PathBuf,
}

pub fn default_hosts_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("glint-rs")
        .join("hosts.toml")
}

impl Context {
    pub fn load(config: Option<PathBuf>, hosts: Option<PathBuf>) -> anyhow::Result<Self> {
        let settings_path = config.unwrap_or_else(FileSettings::default_path);
        let store: Arc<dyn SettingsStore> = Arc::new(
            FileSettings::new(&settings_path)
                .with_context(|| format!("Failed to load settings from {:?}", settings_path))?,
        );

        let hosts_path = hosts.unwrap_or_else(default_hosts_path);
        let manager = Arc::new(ComputerManager::new());
        HostsFile::load(&hosts_path)?.apply(&manager)?;

        info!("Using settings {:?} and hosts {:?}", settings_path, hosts_path);
        Ok(Self {
            preferences: Preferences::new(store.clone()),
            gamepads: GamepadMapping::new(store),
            hosts: manager,
            hosts_path,
        })
    }

    pub fn store(&self) -> Arc<dyn HostStore> {
        self.hosts.clone()
    }

    /// Uuid of the host whose uuid or (case-insensitive) name is `query`
    pub fn resolve_host(&self, query: &str) -> anyhow::Result<String> {
        let computers = self.hosts.computers();
        if let Some(computer) = computers.iter().find(|c| c.uuid() == query) {
            return Ok(computer.uuid().to_string());
        }

        let matches: Vec<String> = computers
            .iter()
            .filter(|c| c.read().name.eq_ignore_ascii_case(query))
            .map(|c| c.uuid().to_string())
            .collect();
        match matches.as_slice() {
            [uuid] => Ok(uuid.clone()),
            [] => bail!("No host named {:?}", query),
            _ => bail!("Several hosts are named {:?}, use the uuid", query),
        }
    }

    /// Write client-side host attributes back to the hosts file
    pub fn save_hosts(&self) -> anyhow::Result<()> {
        HostsFile::from_store(self.hosts.as_ref()).save(&self.hosts_path)
    }

    pub fn reload_hosts(&self) -> anyhow::Result<()> {
        HostsFile::load(&self.hosts_path)?.apply(&self.hosts)
    }

    pub fn hosts_path(&self) -> &Path {
        &self.hosts_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn context(dir: &Path) -> Context {
        std::fs::write(
            dir.join("hosts.toml"),
            "[[host]]\nuuid = \"u1\"\nname = \"Den\"\n\n[[host]]\nuuid = \"u2\"\nname = \"Office\"\n\n[[host]]\nuuid = \"u3\"\nname = \"office\"\n",
        )
        .unwrap();
        Context::load(Some(dir.join("settings.toml")), Some(dir.join("hosts.toml"))).unwrap()
    }

    #[test]
    fn test_resolve_host() {
        let temp_dir = tempdir().unwrap();
        let ctx = context(temp_dir.path());

        assert_eq!(ctx.resolve_host("u2").unwrap(), "u2");
        assert_eq!(ctx.resolve_host("den").unwrap(), "u1");
        assert!(ctx.resolve_host("Office").is_err());
        assert!(ctx.resolve_host("Garage").is_err());
    }

    #[test]
    fn test_hosts_are_saved_back() {
        let temp_dir = tempdir().unwrap();
        let ctx = context(temp_dir.path());
        ctx.hosts.update_host("u1", |state| state.name = "Den 2".to_string());
        ctx.save_hosts().unwrap();

        let dir = temp_dir.path();
        let reloaded = Context::load(Some(dir.join("settings.toml")), Some(dir.join("hosts.toml"))).unwrap();
        assert_eq!(reloaded.resolve_host("Den 2").unwrap(), "u1");
    }
}
