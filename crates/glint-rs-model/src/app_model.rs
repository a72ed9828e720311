//! App list projection for one host.

use std::collections::{HashMap, HashSet};
use std::sync::mpsc::Receiver;
use std::sync::Arc;

use glint_rs_config::{Preferences, SortMode};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::delta::{self, Delta, FieldDiff, Row};
use crate::error::ModelError;
use crate::filter::VisibilityFilter;
use crate::host::{App, Computer, ComputerStatus, HostStore, PairState, SessionFactory, StoreEvent};
use crate::observer::{AppRole, Listeners, ModelEvent, ModelListener};
use crate::ordering::OrderingPolicy;
use crate::snapshot::{take_snapshot, Classification, SnapshotEntry};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppItem {
    pub id: u32,
    pub name: String,
    pub running: bool,
    pub hidden: bool,
    pub direct_launch: bool,
    pub app_collector_game: bool,
    /// Folder holding the app, empty at the root
    pub folder: String,
}

impl FieldDiff for AppItem {
    type Field = AppRole;

    fn changed_fields(&self, newer: &Self) -> Vec<AppRole> {
        let mut fields = Vec::new();
        if self.name != newer.name {
            fields.push(AppRole::Name);
        }
        if self.running != newer.running {
            fields.push(AppRole::Running);
        }
        if self.hidden != newer.hidden {
            fields.push(AppRole::Hidden);
        }
        if self.direct_launch != newer.direct_launch {
            fields.push(AppRole::DirectLaunch);
        }
        if self.app_collector_game != newer.app_collector_game {
            fields.push(AppRole::AppCollectorGame);
        }
        if self.folder != newer.folder {
            fields.push(AppRole::Folder);
        }
        fields
    }
}

/// Result of one projection pass
struct Pass {
    rows: Vec<Row<u32, AppItem>>,
    apps: Vec<App>,
    current_game_id: u32,
}

fn parse_ids(ids: Vec<String>) -> impl Iterator<Item = u32> {
    ids.into_iter().filter_map(|id| id.parse().ok())
}

/// Ordered, filtered view of one host's apps.
///
/// Hidden apps stay out unless `show_hidden` was requested at initialize,
/// except that an app already on screen is never pulled away just because
/// it was hidden. Opening a folder narrows the view to its members.
pub struct AppModel {
    prefs: Preferences,
    store: Option<Arc<dyn HostStore>>,
    events: Option<Receiver<StoreEvent>>,
    host_uuid: String,
    rows: Vec<Row<u32, AppItem>>,
    all_apps: Vec<App>,
    current_game_id: u32,
    show_hidden: bool,
    sort_mode: SortMode,
    current_folder: Option<String>,
    host_lost: bool,
    listeners: Listeners<AppRole>,
}

impl AppModel {
    pub fn new(prefs: Preferences) -> Self {
        Self {
            prefs,
            store: None,
            events: None,
            host_uuid: String::new(),
            rows: Vec::new(),
            all_apps: Vec::new(),
            current_game_id: 0,
            show_hidden: false,
            sort_mode: SortMode::Default,
            current_folder: None,
            host_lost: false,
            listeners: Listeners::new(),
        }
    }

    /// Bind to the host at `host_index` in the store's current order
    pub fn initialize(
        &mut self,
        store: Arc<dyn HostStore>,
        host_index: usize,
        show_hidden: bool,
    ) -> Result<(), ModelError> {
        if self.store.is_some() {
            return Err(ModelError::AlreadyInitialized);
        }
        let computer = store
            .computers()
            .get(host_index)
            .cloned()
            .ok_or(ModelError::UnknownHost(host_index))?;
        self.bind(store, &computer, show_hidden);
        Ok(())
    }

    pub fn initialize_for_host(
        &mut self,
        store: Arc<dyn HostStore>,
        host_uuid: &str,
        show_hidden: bool,
    ) -> Result<(), ModelError> {
        if self.store.is_some() {
            return Err(ModelError::AlreadyInitialized);
        }
        let computer = store
            .computers()
            .into_iter()
            .find(|computer| computer.uuid() == host_uuid)
            .ok_or_else(|| ModelError::HostGone(host_uuid.to_string()))?;
        self.bind(store, &computer, show_hidden);
        Ok(())
    }

    fn bind(&mut self, store: Arc<dyn HostStore>, computer: &Arc<Computer>, show_hidden: bool) {
        self.host_uuid = computer.uuid().to_string();
        self.show_hidden = show_hidden;
        self.sort_mode = self.prefs.app_sort_mode();
        self.events = Some(store.subscribe());
        self.store = Some(store);

        info!(
            "App model bound to host {} (sort: {}, show hidden: {})",
            self.host_uuid, self.sort_mode, show_hidden
        );
        self.reset();
    }

    pub fn subscribe(&mut self, listener: ModelListener<AppRole>) {
        self.listeners.push(listener);
    }

    pub fn host_uuid(&self) -> &str {
        &self.host_uuid
    }

    pub fn count(&self) -> usize {
        self.rows.len()
    }

    pub fn item_at(&self, index: usize) -> Result<&AppItem, ModelError> {
        self.rows
            .get(index)
            .map(|row| &row.item)
            .ok_or(ModelError::IndexOutOfRange { index, count: self.rows.len() })
    }

    pub fn items(&self) -> impl Iterator<Item = &AppItem> {
        self.rows.iter().map(|row| &row.item)
    }

    pub fn sort_mode(&self) -> SortMode {
        self.sort_mode
    }

    pub fn current_folder(&self) -> Option<&str> {
        self.current_folder.as_deref()
    }

    pub fn running_app_id(&self) -> u32 {
        self.current_game_id
    }

    pub fn running_app_name(&self) -> Option<String> {
        if self.current_game_id == 0 {
            return None;
        }
        self.all_apps
            .iter()
            .find(|app| app.id == self.current_game_id)
            .map(|app| app.name.clone())
    }

    /// Name of the visible app at `index`, empty when out of range
    pub fn app_name(&self, index: usize) -> String {
        self.rows
            .get(index)
            .map(|row| row.item.name.clone())
            .unwrap_or_default()
    }

    /// Id of the visible app at `index`, 0 when out of range
    pub fn app_id(&self, index: usize) -> u32 {
        self.rows.get(index).map_or(0, |row| row.key)
    }

    pub fn direct_launch_app_index(&self) -> Option<usize> {
        self.rows.iter().position(|row| row.item.direct_launch)
    }

    pub fn set_sort_mode(&mut self, mode: SortMode) {
        if self.store.is_none() || mode == self.sort_mode {
            return;
        }
        info!("App sort mode: {} -> {}", self.sort_mode, mode);
        self.sort_mode = mode;
        self.prefs.set_app_sort_mode(mode);
        self.reset();
    }

    /// Open a folder, or return to the root with `None` (or an empty name)
    pub fn set_current_folder(&mut self, folder: Option<&str>) {
        let folder = folder.filter(|name| !name.is_empty()).map(str::to_string);
        if self.store.is_none() || folder == self.current_folder {
            return;
        }
        debug!("App model folder: {:?} -> {:?}", self.current_folder, folder);
        self.current_folder = folder;
        // Sticky visibility does not carry across folders.
        self.rows.clear();
        self.reset();
    }

    /// Drag-reorder. Switches to custom sorting and persists the new order
    /// for this host.
    pub fn move_app(&mut self, from: usize, to: usize) {
        if self.store.is_none() || from == to || from >= self.rows.len() || to >= self.rows.len() {
            return;
        }

        if self.sort_mode != SortMode::Custom {
            info!("App sort mode: {} -> {} (reorder)", self.sort_mode, SortMode::Custom);
            self.sort_mode = SortMode::Custom;
            self.prefs.set_app_sort_mode(SortMode::Custom);
        }

        delta::move_row(&mut self.rows, from, to);
        let order: Vec<String> = self.rows.iter().map(|row| row.key.to_string()).collect();
        self.prefs.set_app_custom_order(&self.host_uuid, &order);

        self.listeners.emit(ModelEvent::Moved { from, to });
    }

    pub fn set_app_hidden(&mut self, index: usize, hidden: bool) -> Result<(), ModelError> {
        let app_id = self.visible_id(index)?;
        let (store, computer) = self.host()?;
        {
            let mut state = computer.write();
            if let Some(app) = state.apps.iter_mut().find(|app| app.id == app_id) {
                app.hidden = hidden;
            }
        }
        store.client_side_attribute_updated(&computer);
        Ok(())
    }

    /// Mark the app at `index` for direct launch. At most one app per host
    /// carries the flag.
    pub fn set_app_direct_launch(
        &mut self,
        index: usize,
        direct_launch: bool,
    ) -> Result<(), ModelError> {
        let app_id = self.visible_id(index)?;
        let (store, computer) = self.host()?;
        {
            let mut state = computer.write();
            for app in state.apps.iter_mut() {
                if direct_launch {
                    app.direct_launch = app.id == app_id;
                } else if app.id == app_id {
                    app.direct_launch = false;
                    break;
                }
            }
        }
        store.client_side_attribute_updated(&computer);
        Ok(())
    }

    pub fn quit_running_app(&self) -> Result<(), ModelError> {
        let (store, computer) = self.host()?;
        store.quit_running_app(&computer);
        Ok(())
    }

    pub fn create_session_for_app<F: SessionFactory>(
        &self,
        index: usize,
        factory: &F,
    ) -> Result<F::Session, ModelError> {
        let app_id = self.visible_id(index)?;
        let (_, computer) = self.host()?;
        let app = self
            .all_apps
            .iter()
            .find(|app| app.id == app_id)
            .ok_or(ModelError::IndexOutOfRange { index, count: self.rows.len() })?;
        Ok(factory.create_session(&computer, app))
    }

    /// Box art for `app_id` of host `host_uuid` finished loading.
    /// App ids are only unique per host, so art for other hosts is ignored.
    pub fn handle_box_art_loaded(&mut self, host_uuid: &str, app_id: u32) {
        if host_uuid != self.host_uuid {
            return;
        }
        match self.rows.iter().position(|row| row.key == app_id) {
            Some(index) => {
                self.listeners.emit(ModelEvent::FieldChanged { index, field: AppRole::BoxArt })
            }
            None => warn!("Box art loaded for app {} which is not visible", app_id),
        }
    }

    /// Drain pending store notifications. Returns how many were handled.
    pub fn process_store_events(&mut self) -> usize {
        let pending: Vec<StoreEvent> = match &self.events {
            Some(rx) => rx.try_iter().collect(),
            None => return 0,
        };
        for event in &pending {
            self.handle_store_event(event);
        }
        pending.len()
    }

    pub fn handle_store_event(&mut self, event: &StoreEvent) {
        if self.store.is_none() {
            return;
        }

        match event {
            StoreEvent::HostRemoved(uuid) if *uuid == self.host_uuid => self.lose_host(),
            StoreEvent::HostRemoved(_) => {}
            StoreEvent::ComputerStateChanged(computer) if computer.uuid() == self.host_uuid => {
                let unusable = {
                    let state = computer.read();
                    state.state == ComputerStatus::Offline
                        || state.pair_state == PairState::NotPaired
                };
                if unusable {
                    self.lose_host();
                } else {
                    if self.host_lost {
                        info!("Host {} is reachable again", self.host_uuid);
                        self.host_lost = false;
                    }
                    self.refresh();
                }
            }
            StoreEvent::ComputerStateChanged(computer) => {
                debug!("Ignoring update for host {}", computer.uuid());
            }
        }
    }

    fn lose_host(&mut self) {
        if self.host_lost {
            return;
        }
        info!("Lost host {}", self.host_uuid);
        self.host_lost = true;
        self.listeners.emit(ModelEvent::HostLost);
    }

    fn visible_id(&self, index: usize) -> Result<u32, ModelError> {
        if self.store.is_none() {
            return Err(ModelError::NotInitialized);
        }
        self.rows
            .get(index)
            .map(|row| row.key)
            .ok_or(ModelError::IndexOutOfRange { index, count: self.rows.len() })
    }

    fn computer(&self) -> Option<Arc<Computer>> {
        self.store
            .as_ref()?
            .computers()
            .into_iter()
            .find(|computer| computer.uuid() == self.host_uuid)
    }

    fn host(&self) -> Result<(Arc<dyn HostStore>, Arc<Computer>), ModelError> {
        let store = self.store.clone().ok_or(ModelError::NotInitialized)?;
        let computer = self
            .computer()
            .ok_or_else(|| ModelError::HostGone(self.host_uuid.clone()))?;
        Ok((store, computer))
    }

    fn project(&self) -> Pass {
        let Some(computer) = self.computer() else {
            return Pass { rows: Vec::new(), apps: Vec::new(), current_game_id: 0 };
        };
        let (apps, current_game_id) = {
            let state = computer.read();
            (state.apps.clone(), state.current_game_id)
        };

        let mut folder_of: HashMap<u32, String> = HashMap::new();
        for folder in self.prefs.app_folders(&self.host_uuid) {
            for id in parse_ids(self.prefs.apps_in_folder(&self.host_uuid, &folder)) {
                folder_of.entry(id).or_insert_with(|| folder.clone());
            }
        }

        let mut snapshot = take_snapshot(&apps, |app| {
            let item = AppItem {
                id: app.id,
                name: app.name.clone(),
                running: current_game_id != 0 && app.id == current_game_id,
                hidden: app.hidden,
                direct_launch: app.direct_launch,
                app_collector_game: app.app_collector_game,
                folder: folder_of.get(&app.id).cloned().unwrap_or_default(),
            };
            (app.id, SnapshotEntry { class: Classification::new(0, "", &app.name), item })
        });

        let scope: Option<HashSet<u32>> = self
            .current_folder
            .as_ref()
            .map(|folder| parse_ids(self.prefs.apps_in_folder(&self.host_uuid, folder)).collect());
        let previously_visible: HashSet<u32> = self.rows.iter().map(|row| row.key).collect();
        let filter = VisibilityFilter {
            show_hidden: self.show_hidden,
            previously_visible: &previously_visible,
            scope: scope.as_ref(),
        };

        let mut seen = HashSet::new();
        let unique: Vec<&App> = apps.iter().filter(|app| seen.insert(app.id)).collect();
        let keys: Vec<u32> = filter
            .apply(unique, |app| app.id, |app| app.hidden)
            .into_iter()
            .map(|app| app.id)
            .collect();

        let custom_order = self.prefs.app_custom_order(&self.host_uuid);
        let policy = OrderingPolicy {
            mode: self.sort_mode,
            custom_order: &custom_order,
            group_sections: false,
        };
        let sorted = policy.sort(keys, |id| *id, &snapshot);

        let rows = sorted
            .into_iter()
            .filter_map(|key| {
                snapshot.remove(&key).map(|entry| Row {
                    key,
                    section: entry.class.section,
                    item: entry.item,
                })
            })
            .collect();
        Pass { rows, apps, current_game_id }
    }

    fn apply(&mut self, pass: Pass) {
        self.rows = pass.rows;
        self.all_apps = pass.apps;
        self.current_game_id = pass.current_game_id;
    }

    fn reset(&mut self) {
        let pass = self.project();
        self.apply(pass);
        self.listeners.emit(ModelEvent::Reset);
    }

    fn refresh(&mut self) {
        let pass = self.project();
        let delta = delta::diff(&self.rows, &pass.rows, false);
        self.apply(pass);
        match delta {
            Delta::Reset => self.listeners.emit(ModelEvent::Reset),
            Delta::Patch(changes) => {
                for (index, field) in changes {
                    self.listeners.emit(ModelEvent::FieldChanged { index, field });
                }
            }
        }
    }
}
