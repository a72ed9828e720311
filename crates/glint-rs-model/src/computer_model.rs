//! Host list projection.

use std::collections::HashSet;
use std::sync::mpsc::Receiver;
use std::sync::Arc;

use glint_rs_config::{Preferences, SortMode};
use serde::Serialize;
use tracing::{debug, info};

use crate::delta::{self, Delta, FieldDiff, Row};
use crate::error::ModelError;
use crate::host::{Computer, ComputerState, ComputerStatus, HostStore, SessionFactory, StoreEvent};
use crate::observer::{ComputerRole, Listeners, ModelEvent, ModelListener};
use crate::ordering::OrderingPolicy;
use crate::snapshot::{take_snapshot, HostSection, SnapshotEntry};

/// What the observer sees of one host, captured under a single read lock
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComputerItem {
    pub uuid: String,
    pub name: String,
    pub online: bool,
    pub paired: bool,
    pub busy: bool,
    pub wakeable: bool,
    pub status_unknown: bool,
    pub server_supported: bool,
    /// Label of the section the host was sorted into
    pub section: &'static str,
    pub details: String,
}

impl ComputerItem {
    fn capture(uuid: &str, state: &ComputerState, section: HostSection) -> Self {
        Self {
            uuid: uuid.to_string(),
            name: state.name.clone(),
            online: state.is_online(),
            paired: state.is_paired(),
            busy: state.current_game_id != 0,
            wakeable: state.mac_address.is_some(),
            status_unknown: state.state == ComputerStatus::Unknown,
            server_supported: state.server_supported,
            section: section.label(),
            details: details(uuid, state),
        }
    }
}

impl FieldDiff for ComputerItem {
    type Field = ComputerRole;

    fn changed_fields(&self, newer: &Self) -> Vec<ComputerRole> {
        let mut fields = Vec::new();
        if self.name != newer.name {
            fields.push(ComputerRole::Name);
        }
        if self.online != newer.online {
            fields.push(ComputerRole::Online);
        }
        if self.paired != newer.paired {
            fields.push(ComputerRole::Paired);
        }
        if self.busy != newer.busy {
            fields.push(ComputerRole::Busy);
        }
        if self.wakeable != newer.wakeable {
            fields.push(ComputerRole::Wakeable);
        }
        if self.status_unknown != newer.status_unknown {
            fields.push(ComputerRole::StatusUnknown);
        }
        if self.server_supported != newer.server_supported {
            fields.push(ComputerRole::ServerSupported);
        }
        if self.section != newer.section {
            fields.push(ComputerRole::Section);
        }
        if self.details != newer.details {
            fields.push(ComputerRole::Details);
        }
        fields
    }
}

fn address(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("")
}

/// Multi-line host summary shown in the details dialog
fn details(uuid: &str, state: &ComputerState) -> String {
    let mac = match state.mac_address {
        Some(bytes) => bytes
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect::<Vec<_>>()
            .join(":"),
        None => "Unknown".to_string(),
    };
    let (game_id, https_port) = if state.is_online() {
        (state.current_game_id.to_string(), state.active_https_port.to_string())
    } else {
        ("Unknown".to_string(), "Unknown".to_string())
    };

    [
        format!("Name: {}", state.name),
        format!("Status: {}", state.state),
        format!("Active Address: {}", address(&state.active_address)),
        format!("UUID: {}", uuid),
        format!("Local Address: {}", address(&state.local_address)),
        format!("Remote Address: {}", address(&state.remote_address)),
        format!("IPv6 Address: {}", address(&state.ipv6_address)),
        format!("Manual Address: {}", address(&state.manual_address)),
        format!("MAC Address: {}", mac),
        format!("Pair State: {}", state.pair_state),
        format!("Running Game ID: {}", game_id),
        format!("HTTPS Port: {}", https_port),
    ]
    .join("\n")
}

/// Ordered, sectioned view of every host in the store.
///
/// The model owns its visible rows. Store mutations are picked up by
/// [`ComputerModel::process_store_events`] (or fed one by one to
/// [`ComputerModel::handle_store_event`]) and turned into the smallest
/// notification set the delta rules allow.
pub struct ComputerModel {
    prefs: Preferences,
    store: Option<Arc<dyn HostStore>>,
    events: Option<Receiver<StoreEvent>>,
    rows: Vec<Row<String, ComputerItem>>,
    sort_mode: SortMode,
    show_sections: bool,
    listeners: Listeners<ComputerRole>,
}

impl ComputerModel {
    pub fn new(prefs: Preferences) -> Self {
        Self {
            prefs,
            store: None,
            events: None,
            rows: Vec::new(),
            sort_mode: SortMode::Default,
            show_sections: true,
            listeners: Listeners::new(),
        }
    }

    pub fn initialize(&mut self, store: Arc<dyn HostStore>) -> Result<(), ModelError> {
        if self.store.is_some() {
            return Err(ModelError::AlreadyInitialized);
        }

        self.sort_mode = self.prefs.pc_sort_mode();
        self.show_sections = self.prefs.pc_show_sections();
        self.events = Some(store.subscribe());
        self.store = Some(store);

        info!(
            "Host model initialized (sort: {}, sections: {})",
            self.sort_mode, self.show_sections
        );
        self.reset();
        Ok(())
    }

    pub fn subscribe(&mut self, listener: ModelListener<ComputerRole>) {
        self.listeners.push(listener);
    }

    pub fn count(&self) -> usize {
        self.rows.len()
    }

    pub fn item_at(&self, index: usize) -> Result<&ComputerItem, ModelError> {
        self.rows
            .get(index)
            .map(|row| &row.item)
            .ok_or(ModelError::IndexOutOfRange { index, count: self.rows.len() })
    }

    pub fn items(&self) -> impl Iterator<Item = &ComputerItem> {
        self.rows.iter().map(|row| &row.item)
    }

    pub fn sort_mode(&self) -> SortMode {
        self.sort_mode
    }

    pub fn show_sections(&self) -> bool {
        self.show_sections
    }

    pub fn set_sort_mode(&mut self, mode: SortMode) {
        if self.store.is_none() || mode == self.sort_mode {
            return;
        }
        info!("Host sort mode: {} -> {}", self.sort_mode, mode);
        self.sort_mode = mode;
        self.prefs.set_pc_sort_mode(mode);
        self.reset();
    }

    pub fn set_show_sections(&mut self, show: bool) {
        if self.store.is_none() || show == self.show_sections {
            return;
        }
        self.show_sections = show;
        self.prefs.set_pc_show_sections(show);
        self.reset();
    }

    /// Drag-reorder. Switches to custom sorting and persists the new order.
    pub fn move_computer(&mut self, from: usize, to: usize) {
        if self.store.is_none() || from == to || from >= self.rows.len() || to >= self.rows.len() {
            return;
        }

        if self.sort_mode != SortMode::Custom {
            info!("Host sort mode: {} -> {} (reorder)", self.sort_mode, SortMode::Custom);
            self.sort_mode = SortMode::Custom;
            self.prefs.set_pc_sort_mode(SortMode::Custom);
        }

        delta::move_row(&mut self.rows, from, to);
        let order: Vec<String> = self.rows.iter().map(|row| row.key.clone()).collect();
        self.prefs.set_pc_custom_order(&order);

        self.listeners.emit(ModelEvent::Moved { from, to });
    }

    /// Remove the host at `index` from the store and from the projection
    pub fn delete_computer(&mut self, index: usize) -> Result<(), ModelError> {
        let store = self.store.clone().ok_or(ModelError::NotInitialized)?;
        let computer = self.computer_at(index)?;

        store.delete_host(&computer);
        self.rows.remove(index);
        self.listeners.emit(ModelEvent::Removed { first: index, last: index });
        Ok(())
    }

    pub fn rename_computer(&self, index: usize, name: &str) -> Result<(), ModelError> {
        let store = self.store.as_ref().ok_or(ModelError::NotInitialized)?;
        let computer = self.computer_at(index)?;
        store.rename_host(&computer, name);
        Ok(())
    }

    /// Session for the game the host at `index` is running, `None` when it is idle
    /// or runs an app missing from its list
    pub fn create_session_for_current_game<F: SessionFactory>(
        &self,
        index: usize,
        factory: &F,
    ) -> Result<Option<F::Session>, ModelError> {
        let computer = self.computer_at(index)?;
        let app = computer.read().running_app().cloned();
        Ok(app.map(|app| factory.create_session(&computer, &app)))
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
        if let StoreEvent::HostRemoved(uuid) = event {
            debug!("Host {} left the store", uuid);
        }
        self.refresh();
    }

    fn computer_at(&self, index: usize) -> Result<Arc<Computer>, ModelError> {
        let store = self.store.as_ref().ok_or(ModelError::NotInitialized)?;
        let row = self
            .rows
            .get(index)
            .ok_or(ModelError::UnknownHost(index))?;
        store
            .computers()
            .into_iter()
            .find(|computer| computer.uuid() == row.key)
            .ok_or_else(|| ModelError::HostGone(row.key.clone()))
    }

    /// Compute the next visible sequence from one snapshot of every host
    fn project(&self) -> Vec<Row<String, ComputerItem>> {
        let Some(store) = &self.store else {
            return Vec::new();
        };
        let computers = store.computers();

        let mut snapshot = take_snapshot(&computers, |computer| {
            let state = computer.read();
            let section = HostSection::of(&state);
            let entry = SnapshotEntry {
                class: HostSection::classify(&state),
                item: ComputerItem::capture(computer.uuid(), &state, section),
            };
            (computer.uuid().to_string(), entry)
        });

        let mut seen = HashSet::new();
        let keys: Vec<String> = computers
            .iter()
            .map(|computer| computer.uuid().to_string())
            .filter(|uuid| seen.insert(uuid.clone()))
            .collect();

        let custom_order = self.prefs.pc_custom_order();
        let policy = OrderingPolicy {
            mode: self.sort_mode,
            custom_order: &custom_order,
            group_sections: self.show_sections,
        };
        let sorted = policy.sort(keys, |uuid| uuid.clone(), &snapshot);

        sorted
            .into_iter()
            .filter_map(|key| {
                snapshot.remove(&key).map(|entry| Row {
                    key,
                    section: entry.class.section,
                    item: entry.item,
                })
            })
            .collect()
    }

    fn reset(&mut self) {
        self.rows = self.project();
        self.listeners.emit(ModelEvent::Reset);
    }

    fn refresh(&mut self) {
        let next = self.project();
        match delta::diff(&self.rows, &next, self.show_sections) {
            Delta::Reset => {
                self.rows = next;
                self.listeners.emit(ModelEvent::Reset);
            }
            Delta::Patch(changes) => {
                self.rows = next;
                for (index, field) in changes {
                    self.listeners.emit(ModelEvent::FieldChanged { index, field });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{App, ComputerManager, PairState};
    use crate::observer::channel_listener;
    use glint_rs_config::FileSettings;
    use std::sync::mpsc::Receiver;

    fn prefs() -> Preferences {
        Preferences::new(Arc::new(FileSettings::in_memory()))
    }

    fn online(name: &str) -> ComputerState {
        let mut state = ComputerState::new(name);
        state.state = ComputerStatus::Online;
        state.pair_state = PairState::Paired;
        state
    }

    fn names(model: &ComputerModel) -> Vec<String> {
        model.items().map(|item| item.name.clone()).collect()
    }

    fn setup(prefs: &Preferences, hosts: &[(&str, ComputerState)]) -> (Arc<ComputerManager>, ComputerModel) {
        let manager = Arc::new(ComputerManager::new());
        for (uuid, state) in hosts {
            manager.add_host(*uuid, state.clone());
        }
        let mut model = ComputerModel::new(prefs.clone());
        model.initialize(manager.clone()).unwrap();
        (manager, model)
    }

    /// Observer-side copy of the projection, driven only by events
    struct Replica {
        names: Vec<String>,
        rx: Receiver<ModelEvent<ComputerRole>>,
    }

    impl Replica {
        fn attach(model: &mut ComputerModel) -> Self {
            let (listener, rx) = channel_listener();
            model.subscribe(listener);
            Self { names: names(model), rx }
        }

        fn sync(&mut self, model: &ComputerModel) {
            for event in self.rx.try_iter() {
                match event {
                    ModelEvent::Reset => self.names = names(model),
                    ModelEvent::Moved { from, to } => delta::move_row(&mut self.names, from, to),
                    ModelEvent::Removed { first, last } => {
                        self.names.drain(first..=last);
                    }
                    ModelEvent::FieldChanged { index, field: ComputerRole::Name } => {
                        self.names[index] = model.item_at(index).unwrap().name.clone();
                    }
                    _ => {}
                }
            }
        }
    }

    #[test]
    fn test_initialize_twice_fails() {
        let (manager, mut model) = setup(&prefs(), &[]);
        assert_eq!(model.initialize(manager), Err(ModelError::AlreadyInitialized));
    }

    #[test]
    fn test_uninitialized_model_is_inert() {
        let mut model = ComputerModel::new(prefs());
        model.move_computer(0, 1);
        model.set_sort_mode(SortMode::Custom);
        assert_eq!(model.count(), 0);
        assert_eq!(model.process_store_events(), 0);
        assert_eq!(model.delete_computer(0), Err(ModelError::NotInitialized));
    }

    #[test]
    fn test_default_order_is_alphabetical() {
        let prefs = prefs();
        prefs.set_pc_show_sections(false);
        let (_, model) = setup(&prefs, &[("a", online("Zeta")), ("b", online("Apple")), ("c", online("Mango"))]);
        assert_eq!(names(&model), vec!["Apple", "Mango", "Zeta"]);
    }

    #[test]
    fn test_sections_group_hosts() {
        let mut unpaired = online("Beta");
        unpaired.pair_state = PairState::NotPaired;
        let (_, model) = setup(
            &prefs(),
            &[("a", ComputerState::new("Alpha")), ("b", unpaired), ("c", online("Zulu"))],
        );

        assert_eq!(names(&model), vec!["Zulu", "Beta", "Alpha"]);
        let sections: Vec<&str> = model.items().map(|item| item.section).collect();
        assert_eq!(sections, vec!["Online", "Not Paired", "Offline"]);
    }

    #[test]
    fn test_custom_order_with_unlisted_host() {
        let prefs = prefs();
        prefs.set_pc_show_sections(false);
        prefs.set_pc_sort_mode(SortMode::Custom);
        prefs.set_pc_custom_order(&["c".to_string(), "a".to_string()]);

        let (_, model) = setup(&prefs, &[("a", online("A")), ("b", online("B")), ("c", online("C"))]);
        assert_eq!(names(&model), vec!["C", "A", "B"]);
    }

    #[test]
    fn test_move_persists_custom_order() {
        let prefs = prefs();
        prefs.set_pc_show_sections(false);
        let (manager, mut model) = setup(&prefs, &[("a", online("A")), ("b", online("B")), ("c", online("C"))]);
        let (listener, rx) = channel_listener();
        model.subscribe(listener);

        model.move_computer(0, 2);

        assert_eq!(names(&model), vec!["B", "C", "A"]);
        assert_eq!(model.sort_mode(), SortMode::Custom);
        assert_eq!(prefs.pc_sort_mode(), SortMode::Custom);
        assert_eq!(prefs.pc_custom_order(), vec!["b", "c", "a"]);
        assert_eq!(rx.try_iter().collect::<Vec<_>>(), vec![ModelEvent::Moved { from: 0, to: 2 }]);

        // A fresh model over the same settings lands on the same order.
        let mut reloaded = ComputerModel::new(prefs.clone());
        reloaded.initialize(manager).unwrap();
        assert_eq!(names(&reloaded), vec!["B", "C", "A"]);
    }

    #[test]
    fn test_move_out_of_range_is_ignored() {
        let prefs = prefs();
        let (_, mut model) = setup(&prefs, &[("a", online("A")), ("b", online("B"))]);
        let (listener, rx) = channel_listener();
        model.subscribe(listener);

        model.move_computer(1, 1);
        model.move_computer(0, 5);

        assert_eq!(rx.try_iter().count(), 0);
        assert_eq!(model.sort_mode(), SortMode::Default);
        assert!(prefs.pc_custom_order().is_empty());
    }

    #[test]
    fn test_recompute_is_idempotent() {
        let (_, mut model) = setup(&prefs(), &[("a", online("A")), ("b", online("B"))]);
        let (listener, rx) = channel_listener();
        model.subscribe(listener);

        model.handle_store_event(&StoreEvent::HostRemoved("ghost".to_string()));
        model.handle_store_event(&StoreEvent::HostRemoved("ghost".to_string()));

        assert_eq!(rx.try_iter().count(), 0);
    }

    #[test]
    fn test_field_change_without_reorder() {
        let (manager, mut model) = setup(&prefs(), &[("a", online("A")), ("b", online("B"))]);
        let (listener, rx) = channel_listener();
        model.subscribe(listener);

        manager.update_host("b", |state| {
            state.apps = vec![App::new(3, "Steam")];
            state.current_game_id = 3;
        });
        model.process_store_events();

        let events: Vec<_> = rx.try_iter().collect();
        assert!(events.contains(&ModelEvent::FieldChanged { index: 1, field: ComputerRole::Busy }));
        assert!(events.contains(&ModelEvent::FieldChanged { index: 1, field: ComputerRole::Details }));
        assert!(!events.contains(&ModelEvent::Reset));
        assert!(model.item_at(1).unwrap().busy);
    }

    #[test]
    fn test_section_change_resets() {
        let (manager, mut model) = setup(&prefs(), &[("a", online("A")), ("b", online("B"))]);
        let (listener, rx) = channel_listener();
        model.subscribe(listener);

        manager.update_host("a", |state| state.state = ComputerStatus::Offline);
        model.process_store_events();

        assert_eq!(rx.try_iter().collect::<Vec<_>>(), vec![ModelEvent::Reset]);
        assert_eq!(names(&model), vec!["B", "A"]);
        assert_eq!(model.item_at(1).unwrap().section, "Offline");
    }

    #[test]
    fn test_events_replay_to_final_sequence() {
        let prefs = prefs();
        prefs.set_pc_show_sections(false);
        let (manager, mut model) = setup(&prefs, &[("a", online("Delta")), ("b", online("Bravo"))]);
        let mut replica = Replica::attach(&mut model);

        manager.add_host("c", online("Charlie"));
        model.process_store_events();
        replica.sync(&model);

        model.move_computer(2, 0);
        replica.sync(&model);

        manager.update_host("a", |state| state.name = "Alpha".to_string());
        model.process_store_events();
        replica.sync(&model);

        model.delete_computer(1).unwrap();
        replica.sync(&model);
        model.process_store_events();
        replica.sync(&model);

        manager.update_host("b", |state| state.name = "Bravo 2".to_string());
        model.process_store_events();
        replica.sync(&model);

        model.set_sort_mode(SortMode::Default);
        replica.sync(&model);

        assert_eq!(replica.names, names(&model));
        assert_eq!(manager.computers().len(), 2);
    }

    #[test]
    fn test_delete_emits_removed() {
        let (manager, mut model) = setup(&prefs(), &[("a", online("A")), ("b", online("B"))]);
        let (listener, rx) = channel_listener();
        model.subscribe(listener);

        model.delete_computer(0).unwrap();
        model.process_store_events();

        assert_eq!(
            rx.try_iter().collect::<Vec<_>>(),
            vec![ModelEvent::Removed { first: 0, last: 0 }]
        );
        assert!(manager.find("a").is_none());
        assert_eq!(names(&model), vec!["B"]);
        assert_eq!(model.item_at(1), Err(ModelError::IndexOutOfRange { index: 1, count: 1 }));
    }

    #[test]
    fn test_rename_goes_through_store() {
        let (manager, mut model) = setup(&prefs(), &[("a", online("A"))]);
        model.rename_computer(0, "Living Room").unwrap();
        model.process_store_events();

        assert_eq!(manager.find("a").unwrap().read().name, "Living Room");
        assert_eq!(model.item_at(0).unwrap().name, "Living Room");
    }

    struct Launcher;

    impl SessionFactory for Launcher {
        type Session = String;

        fn create_session(&self, computer: &Arc<Computer>, app: &App) -> String {
            format!("{}:{}", computer.uuid(), app.name)
        }
    }

    #[test]
    fn test_session_for_current_game() {
        let mut busy = online("Den");
        busy.apps = vec![App::new(5, "Portal")];
        busy.current_game_id = 5;
        let mut stale = online("Office");
        stale.current_game_id = 9;
        let (_, model) = setup(&prefs(), &[("den", busy), ("office", stale), ("lab", online("Lab"))]);

        assert_eq!(model.create_session_for_current_game(0, &Launcher), Ok(Some("den:Portal".to_string())));
        assert_eq!(model.create_session_for_current_game(1, &Launcher), Ok(None));
        assert_eq!(model.create_session_for_current_game(2, &Launcher), Ok(None));
        assert_eq!(model.create_session_for_current_game(7, &Launcher), Err(ModelError::UnknownHost(7)));
    }

    #[test]
    fn test_details_text() {
        let mut state = online("Den");
        state.mac_address = Some([0x00, 0x1a, 0x2b, 0x3c, 0x4d, 0x5e]);
        state.active_address = Some("10.0.0.2".to_string());
        state.active_https_port = 47984;
        let (_, model) = setup(&prefs(), &[("den", state)]);

        let item = model.item_at(0).unwrap();
        assert!(item.wakeable);
        assert!(item.details.contains("MAC Address: 00:1a:2b:3c:4d:5e"));
        assert!(item.details.contains("Active Address: 10.0.0.2"));
        assert!(item.details.contains("HTTPS Port: 47984"));
        assert!(item.details.contains("Pair State: Paired"));

        let offline = details("x", &ComputerState::new("Off"));
        assert!(offline.contains("MAC Address: Unknown"));
        assert!(offline.contains("Running Game ID: Unknown"));
    }
}
