use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{ConfigError, ConfigValue, SettingsStore};

const GENERAL_CHANNEL: &str = "general";
const APP_SORT_MODE: &str = "appSortMode";
const PC_SORT_MODE: &str = "pcSortMode";
const PC_SHOW_SECTIONS: &str = "pcShowSections";

const ORDER_CHANNEL: &str = "ordering";
const PC_CUSTOM_ORDER: &str = "pcCustomOrder";
const APP_CUSTOM_ORDER_CHANNEL: &str = "appCustomOrder";

const APP_FOLDERS_CHANNEL: &str = "appFolders";

/// How a projection orders its items
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum SortMode {
    /// Alphabetical, optionally grouped by section
    #[default]
    Default,
    /// User-defined order with alphabetical fallback
    Custom,
}

impl std::fmt::Display for SortMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SortMode::Default => write!(f, "default"),
            SortMode::Custom => write!(f, "custom"),
        }
    }
}

impl FromStr for SortMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "default" | "alphabetical" => Ok(SortMode::Default),
            "custom" => Ok(SortMode::Custom),
            other => Err(ConfigError::UnknownSortMode(other.to_string())),
        }
    }
}

/// Typed view over the persisted ordering, section and folder settings.
///
/// Reads go straight to the store so edits made by another projection are
/// picked up on the next pass. Every write is flushed immediately; a failed
/// flush is logged and the in-memory value is kept.
#[derive(Clone)]
pub struct Preferences {
    store: Arc<dyn SettingsStore>,
}

impl std::fmt::Debug for Preferences {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Preferences").field("store", &"<SettingsStore>").finish()
    }
}

impl Preferences {
    pub fn new(store: Arc<dyn SettingsStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn SettingsStore> {
        &self.store
    }

    fn flush(&self, what: &str) {
        if let Err(e) = self.store.sync() {
            warn!("Failed to persist {}: {}", what, e);
        }
    }

    fn sort_mode(&self, property: &str) -> SortMode {
        match self.store.get_property(GENERAL_CHANNEL, property) {
            Ok(ConfigValue::String(raw)) => raw.parse().unwrap_or_else(|e| {
                warn!("Ignoring stored {}: {}", property, e);
                SortMode::Default
            }),
            _ => SortMode::Default,
        }
    }

    fn set_sort_mode(&self, property: &str, mode: SortMode) {
        debug!("Setting {} to {}", property, mode);
        self.store
            .set_property(GENERAL_CHANNEL, property, ConfigValue::String(mode.to_string()));
        self.flush(property);
    }

    pub fn app_sort_mode(&self) -> SortMode {
        self.sort_mode(APP_SORT_MODE)
    }

    pub fn set_app_sort_mode(&self, mode: SortMode) {
        self.set_sort_mode(APP_SORT_MODE, mode);
    }

    pub fn pc_sort_mode(&self) -> SortMode {
        self.sort_mode(PC_SORT_MODE)
    }

    pub fn set_pc_sort_mode(&self, mode: SortMode) {
        self.set_sort_mode(PC_SORT_MODE, mode);
    }

    /// Group hosts by online/unpaired/offline sections (on by default)
    pub fn pc_show_sections(&self) -> bool {
        self.store.get_bool(GENERAL_CHANNEL, PC_SHOW_SECTIONS, true)
    }

    pub fn set_pc_show_sections(&self, show: bool) {
        self.store
            .set_property(GENERAL_CHANNEL, PC_SHOW_SECTIONS, ConfigValue::Boolean(show));
        self.flush(PC_SHOW_SECTIONS);
    }

    pub fn app_custom_order(&self, host_uuid: &str) -> Vec<String> {
        self.store.get_string_list(APP_CUSTOM_ORDER_CHANNEL, host_uuid)
    }

    pub fn set_app_custom_order(&self, host_uuid: &str, app_ids: &[String]) {
        self.store.set_string_list(APP_CUSTOM_ORDER_CHANNEL, host_uuid, app_ids);
        self.flush("app custom order");
    }

    pub fn pc_custom_order(&self) -> Vec<String> {
        self.store.get_string_list(ORDER_CHANNEL, PC_CUSTOM_ORDER)
    }

    pub fn set_pc_custom_order(&self, host_uuids: &[String]) {
        self.store.set_string_list(ORDER_CHANNEL, PC_CUSTOM_ORDER, host_uuids);
        self.flush("host custom order");
    }

    fn folders_channel(host_uuid: &str) -> String {
        format!("{}/{}", APP_FOLDERS_CHANNEL, host_uuid)
    }

    pub fn app_folders(&self, host_uuid: &str) -> Vec<String> {
        self.store.list_properties(&Self::folders_channel(host_uuid))
    }

    /// Create an empty folder; an existing folder keeps its members
    pub fn create_app_folder(&self, host_uuid: &str, folder: &str) {
        let channel = Self::folders_channel(host_uuid);
        if self.store.get_property(&channel, folder).is_ok() {
            return;
        }
        self.store.set_string_list(&channel, folder, &[]);
        self.flush("app folder");
    }

    pub fn delete_app_folder(&self, host_uuid: &str, folder: &str) {
        if self
            .store
            .remove_property(&Self::folders_channel(host_uuid), folder)
            .is_some()
        {
            self.flush("app folder");
        }
    }

    /// Move a folder's members under a new name. Renaming onto an existing
    /// folder merges the two member lists.
    pub fn rename_app_folder(&self, host_uuid: &str, old_name: &str, new_name: &str) {
        if old_name == new_name {
            return;
        }
        let channel = Self::folders_channel(host_uuid);
        let Some(value) = self.store.remove_property(&channel, old_name) else {
            warn!("Cannot rename missing folder {:?} of host {}", old_name, host_uuid);
            return;
        };

        let mut members = self.store.get_string_list(&channel, new_name);
        for app_id in value.as_string_list().unwrap_or_default() {
            if !members.contains(&app_id) {
                members.push(app_id);
            }
        }
        self.store.set_string_list(&channel, new_name, &members);
        self.flush("app folder");
    }

    pub fn apps_in_folder(&self, host_uuid: &str, folder: &str) -> Vec<String> {
        self.store.get_string_list(&Self::folders_channel(host_uuid), folder)
    }

    pub fn set_apps_in_folder(&self, host_uuid: &str, folder: &str, app_ids: &[String]) {
        self.store
            .set_string_list(&Self::folders_channel(host_uuid), folder, app_ids);
        self.flush("app folder");
    }

    /// Place an app in `folder`. An app lives in at most one folder, so it is
    /// taken out of every other folder of the same host first.
    pub fn add_app_to_folder(&self, host_uuid: &str, folder: &str, app_id: &str) {
        let channel = Self::folders_channel(host_uuid);
        for other in self.app_folders(host_uuid) {
            if other == folder {
                continue;
            }
            let mut members = self.store.get_string_list(&channel, &other);
            let before = members.len();
            members.retain(|id| id != app_id);
            if members.len() != before {
                self.store.set_string_list(&channel, &other, &members);
            }
        }

        let mut members = self.store.get_string_list(&channel, folder);
        if !members.iter().any(|id| id == app_id) {
            members.push(app_id.to_string());
        }
        self.store.set_string_list(&channel, folder, &members);
        self.flush("app folder");
    }

    pub fn remove_app_from_folder(&self, host_uuid: &str, folder: &str, app_id: &str) {
        let mut members = self.apps_in_folder(host_uuid, folder);
        members.retain(|id| id != app_id);
        self.set_apps_in_folder(host_uuid, folder, &members);
    }

    /// The folder holding `app_id`, if any
    pub fn app_folder(&self, host_uuid: &str, app_id: &str) -> Option<String> {
        self.app_folders(host_uuid)
            .into_iter()
            .find(|folder| self.apps_in_folder(host_uuid, folder).iter().any(|id| id == app_id))
    }
}
