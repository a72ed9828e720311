use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use glint_rs_config::{ConfigChannel, ConfigValue, SettingsStore};
use tracing::{debug, info, warn};

use crate::{InputError, Slot, MAX_PLAYERS};

const GROUP: &str = "gamepadmappings";
const GLOBAL_CHANNEL: &str = "gamepadmappings/global";
const CLIENTS_CHANNEL: &str = "gamepadmappings/clients";
const ENABLED: &str = "enabled";
const MAPPINGS: &str = "mappings";

#[derive(Debug, Default)]
struct MappingTables {
    global: BTreeMap<String, u8>,
    clients: BTreeMap<String, BTreeMap<String, u8>>,
    enabled: BTreeMap<String, bool>,
}

fn client_channel(client: &str) -> String {
    format!("{}/{}", CLIENTS_CHANNEL, client)
}

fn client_mappings_channel(client: &str) -> String {
    format!("{}/{}/{}", CLIENTS_CHANNEL, client, MAPPINGS)
}

fn store_slot(table: &mut BTreeMap<String, u8>, guid: &str, slot: Slot) {
    match slot {
        Slot::Automatic => {
            table.remove(guid);
        }
        Slot::Player(index) => {
            table.insert(guid.to_string(), index.min(MAX_PLAYERS - 1));
        }
    }
}

/// Controller GUID to player slot assignments.
///
/// A global table applies everywhere; a client (streaming host) can carry
/// its own table that wins while it is enabled. One lock guards all tables
/// and each write is persisted before the lock is released.
pub struct GamepadMapping {
    store: Arc<dyn SettingsStore>,
    tables: RwLock<MappingTables>,
}

impl std::fmt::Debug for GamepadMapping {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GamepadMapping")
            .field("tables", &*self.read())
            .finish()
    }
}

impl GamepadMapping {
    /// Load the persisted tables from `store`
    pub fn new(store: Arc<dyn SettingsStore>) -> Self {
        let mapping = Self {
            store,
            tables: RwLock::new(MappingTables::default()),
        };
        mapping.reload();
        mapping
    }

    fn read(&self) -> RwLockReadGuard<'_, MappingTables> {
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, MappingTables> {
        self.tables.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_global_mapping(&self, guid: &str, slot: Slot) {
        let mut tables = self.write();
        store_slot(&mut tables.global, guid, slot);
        self.persist(&tables);
    }

    pub fn remove_global_mapping(&self, guid: &str) {
        let mut tables = self.write();
        tables.global.remove(guid);
        self.persist(&tables);
    }

    pub fn global_mapping(&self, guid: &str) -> Slot {
        self.read()
            .global
            .get(guid)
            .map_or(Slot::Automatic, |&index| Slot::Player(index))
    }

    pub fn set_client_mapping(&self, client: &str, guid: &str, slot: Slot) {
        if client.is_empty() {
            return;
        }
        let mut tables = self.write();
        let table = tables.clients.entry(client.to_string()).or_default();
        store_slot(table, guid, slot);
        if table.is_empty() {
            tables.clients.remove(client);
        }
        self.persist(&tables);
    }

    pub fn remove_client_mapping(&self, client: &str, guid: &str) {
        self.set_client_mapping(client, guid, Slot::Automatic);
    }

    pub fn client_mapping(&self, client: &str, guid: &str) -> Slot {
        if client.is_empty() {
            return Slot::Automatic;
        }
        self.read()
            .clients
            .get(client)
            .and_then(|table| table.get(guid))
            .map_or(Slot::Automatic, |&index| Slot::Player(index))
    }

    pub fn has_client_mappings(&self, client: &str) -> bool {
        !client.is_empty()
            && self
                .read()
                .clients
                .get(client)
                .is_some_and(|table| !table.is_empty())
    }

    pub fn set_client_mapping_enabled(&self, client: &str, enabled: bool) {
        if client.is_empty() {
            return;
        }
        let mut tables = self.write();
        tables.enabled.insert(client.to_string(), enabled);
        self.persist(&tables);
    }

    pub fn is_client_mapping_enabled(&self, client: &str) -> bool {
        !client.is_empty() && self.read().enabled.get(client).copied().unwrap_or(false)
    }

    /// Drop a client's mappings and its enabled flag
    pub fn reset_client_mappings(&self, client: &str) {
        if client.is_empty() {
            return;
        }
        let mut tables = self.write();
        tables.clients.remove(client);
        tables.enabled.remove(client);
        self.persist(&tables);
    }

    /// Effective slot for `guid` when streaming from `client`.
    ///
    /// The client's own table wins when it is enabled and has an entry;
    /// otherwise the global table decides.
    pub fn resolve(&self, client: &str, guid: &str) -> Slot {
        let tables = self.read();

        if !client.is_empty() && tables.enabled.get(client).copied().unwrap_or(false) {
            if let Some(&index) = tables.clients.get(client).and_then(|table| table.get(guid)) {
                return Slot::Player(index);
            }
        }

        tables
            .global
            .get(guid)
            .map_or(Slot::Automatic, |&index| Slot::Player(index))
    }

    pub fn all_global_mappings(&self) -> BTreeMap<String, u8> {
        self.read().global.clone()
    }

    pub fn all_client_mappings(&self, client: &str) -> BTreeMap<String, u8> {
        if client.is_empty() {
            return BTreeMap::new();
        }
        self.read().clients.get(client).cloned().unwrap_or_default()
    }

    /// Clients with mappings or an enabled flag on record
    pub fn clients(&self) -> Vec<String> {
        let tables = self.read();
        let mut clients: Vec<String> = tables
            .clients
            .keys()
            .chain(tables.enabled.keys())
            .cloned()
            .collect();
        clients.sort();
        clients.dedup();
        clients
    }

    /// Write every table back to the store and flush it
    pub fn save(&self) -> Result<(), InputError> {
        let tables = self.write();
        self.store.replace_channel(GROUP, Self::group_channels(&tables));
        self.store.sync()?;
        Ok(())
    }

    /// Replace the in-memory tables with what the store holds
    pub fn reload(&self) {
        let mut tables = self.write();
        *tables = MappingTables::default();

        for guid in self.store.list_properties(GLOBAL_CHANNEL) {
            if let Some(index) = self.stored_slot(GLOBAL_CHANNEL, &guid) {
                tables.global.insert(guid, index);
            }
        }

        for client in self.store.list_channels_under(CLIENTS_CHANNEL) {
            let enabled = self.store.get_bool(&client_channel(&client), ENABLED, false);
            tables.enabled.insert(client.clone(), enabled);

            let channel = client_mappings_channel(&client);
            let table: BTreeMap<String, u8> = self
                .store
                .list_properties(&channel)
                .into_iter()
                .filter_map(|guid| self.stored_slot(&channel, &guid).map(|index| (guid, index)))
                .collect();
            if !table.is_empty() {
                tables.clients.insert(client, table);
            }
        }

        info!(
            "Loaded gamepad mappings: {} global, {} clients",
            tables.global.len(),
            tables.clients.len()
        );
    }

    fn stored_slot(&self, channel: &str, guid: &str) -> Option<u8> {
        let value = self.store.get_property(channel, guid).ok()?;
        match value.as_integer().map(Slot::from_stored) {
            Some(Slot::Player(index)) => Some(index),
            Some(Slot::Automatic) => None,
            None => {
                warn!("Ignoring non-integer gamepad mapping {}.{}", channel, guid);
                None
            }
        }
    }

    /// Channels holding `tables`, keyed by full channel name
    fn group_channels(tables: &MappingTables) -> BTreeMap<String, ConfigChannel> {
        let mut channels = BTreeMap::new();

        let mut global = ConfigChannel::new();
        for (guid, index) in &tables.global {
            global.set(guid.clone(), ConfigValue::Integer(i64::from(*index)));
        }
        channels.insert(GLOBAL_CHANNEL.to_string(), global);

        for (client, enabled) in &tables.enabled {
            let mut flags = ConfigChannel::new();
            flags.set(ENABLED.to_string(), ConfigValue::Boolean(*enabled));
            channels.insert(client_channel(client), flags);
        }

        for (client, table) in &tables.clients {
            channels
                .entry(client_channel(client))
                .or_insert_with(ConfigChannel::new)
                .properties
                .entry(ENABLED.to_string())
                .or_insert(ConfigValue::Boolean(false));

            let mut mappings = ConfigChannel::new();
            for (guid, index) in table {
                mappings.set(guid.clone(), ConfigValue::Integer(i64::from(*index)));
            }
            channels.insert(client_mappings_channel(client), mappings);
        }

        channels
    }

    /// Rewrite the whole mapping group and flush. Called with the lock held.
    fn persist(&self, tables: &MappingTables) {
        self.store.replace_channel(GROUP, Self::group_channels(tables));
        match self.store.sync() {
            Ok(()) => debug!("Saved gamepad mappings"),
            Err(e) => warn!("Failed to persist gamepad mappings: {}", e),
        }
    }
}
