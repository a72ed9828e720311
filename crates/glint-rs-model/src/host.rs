//! Authoritative host collection.
//!
//! Hosts are shared as `Arc<Computer>` between the discovery/polling threads
//! that mutate them and the projections that read them. Every field access
//! goes through the host's own reader/writer lock.

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComputerStatus {
    #[default]
    Unknown,
    Online,
    Offline,
}

impl std::fmt::Display for ComputerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ComputerStatus::Unknown => write!(f, "Unknown"),
            ComputerStatus::Online => write!(f, "Online"),
            ComputerStatus::Offline => write!(f, "Offline"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairState {
    #[default]
    Unknown,
    Paired,
    NotPaired,
}

impl std::fmt::Display for PairState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PairState::Unknown => write!(f, "Unknown"),
            PairState::Paired => write!(f, "Paired"),
            PairState::NotPaired => write!(f, "Unpaired"),
        }
    }
}

/// An application exported by a host
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct App {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub direct_launch: bool,
    #[serde(default)]
    pub app_collector_game: bool,
}

impl App {
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            ..Default::default()
        }
    }

    /// Key used in persisted orders and folders
    pub fn key(&self) -> String {
        self.id.to_string()
    }
}

/// Mutable host fields, guarded by [`Computer`]'s lock
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComputerState {
    pub name: String,
    pub state: ComputerStatus,
    pub pair_state: PairState,
    /// Id of the running app, 0 when idle
    pub current_game_id: u32,
    pub mac_address: Option<[u8; 6]>,
    pub active_address: Option<String>,
    pub local_address: Option<String>,
    pub remote_address: Option<String>,
    pub ipv6_address: Option<String>,
    pub manual_address: Option<String>,
    pub active_https_port: u16,
    pub server_supported: bool,
    pub apps: Vec<App>,
}

impl ComputerState {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            server_supported: true,
            ..Default::default()
        }
    }

    pub fn is_online(&self) -> bool {
        self.state == ComputerStatus::Online
    }

    pub fn is_paired(&self) -> bool {
        self.pair_state == PairState::Paired
    }

    pub fn running_app(&self) -> Option<&App> {
        if self.current_game_id == 0 {
            return None;
        }
        self.apps.iter().find(|app| app.id == self.current_game_id)
    }
}

/// A streaming host. The uuid never changes; everything else sits behind the lock.
pub struct Computer {
    uuid: String,
    state: RwLock<ComputerState>,
}

impl std::fmt::Debug for Computer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Computer")
            .field("uuid", &self.uuid)
            .field("state", &"RwLock<ComputerState>")
            .finish()
    }
}

impl Computer {
    pub fn new(uuid: impl Into<String>, state: ComputerState) -> Self {
        Self {
            uuid: uuid.into(),
            state: RwLock::new(state),
        }
    }

    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    pub fn read(&self) -> RwLockReadGuard<'_, ComputerState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, ComputerState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Change notifications published by a [`HostStore`]
#[derive(Debug, Clone)]
pub enum StoreEvent {
    /// A host was added or one of its fields changed
    ComputerStateChanged(Arc<Computer>),
    /// A host left the store
    HostRemoved(String),
}

/// The entity store the projections read from.
pub trait HostStore: Send + Sync {
    /// Current hosts, in store order
    fn computers(&self) -> Vec<Arc<Computer>>;

    /// Register for change notifications. Events arrive in mutation order.
    fn subscribe(&self) -> Receiver<StoreEvent>;

    fn delete_host(&self, computer: &Arc<Computer>);

    fn rename_host(&self, computer: &Arc<Computer>, name: &str);

    fn quit_running_app(&self, computer: &Arc<Computer>);

    /// Called after a client-side attribute (hidden, direct launch) was edited
    fn client_side_attribute_updated(&self, computer: &Arc<Computer>);
}

/// Builds a streaming session for an app; the transport is opaque to the projections.
pub trait SessionFactory {
    type Session;

    fn create_session(&self, computer: &Arc<Computer>, app: &App) -> Self::Session;
}

/// In-process [`HostStore`].
///
/// Background producers call [`ComputerManager::add_host`],
/// [`ComputerManager::update_host`] and [`ComputerManager::remove_host`];
/// subscribers receive one [`StoreEvent`] per mutation.
#[derive(Default)]
pub struct ComputerManager {
    hosts: RwLock<Vec<Arc<Computer>>>,
    subscribers: Mutex<Vec<Sender<StoreEvent>>>,
}

impl std::fmt::Debug for ComputerManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComputerManager")
            .field("hosts", &self.computers().len())
            .finish()
    }
}

impl ComputerManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn notify(&self, event: StoreEvent) {
        let mut subscribers = self.subscribers.lock().unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn find(&self, uuid: &str) -> Option<Arc<Computer>> {
        self.hosts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|host| host.uuid() == uuid)
            .cloned()
    }

    /// Insert a host, or replace the state of the host with the same uuid
    pub fn add_host(&self, uuid: impl Into<String>, state: ComputerState) -> Arc<Computer> {
        let uuid = uuid.into();
        let computer = {
            let mut hosts = self.hosts.write().unwrap_or_else(PoisonError::into_inner);
            match hosts.iter().find(|host| host.uuid() == uuid) {
                Some(existing) => {
                    *existing.write() = state;
                    existing.clone()
                }
                None => {
                    let computer = Arc::new(Computer::new(uuid.clone(), state));
                    hosts.push(computer.clone());
                    info!("Added host {}", uuid);
                    computer
                }
            }
        };
        self.notify(StoreEvent::ComputerStateChanged(computer.clone()));
        computer
    }

    /// Add a host under a freshly generated uuid
    pub fn add_new_host(&self, state: ComputerState) -> Arc<Computer> {
        self.add_host(Uuid::new_v4().to_string(), state)
    }

    /// Mutate a host under its write lock. Returns false for unknown hosts.
    pub fn update_host<F>(&self, uuid: &str, update: F) -> bool
    where
        F: FnOnce(&mut ComputerState),
    {
        let Some(computer) = self.find(uuid) else {
            return false;
        };
        {
            let mut state = computer.write();
            update(&mut state);
        }
        self.notify(StoreEvent::ComputerStateChanged(computer));
        true
    }

    pub fn remove_host(&self, uuid: &str) -> Option<Arc<Computer>> {
        let removed = {
            let mut hosts = self.hosts.write().unwrap_or_else(PoisonError::into_inner);
            let position = hosts.iter().position(|host| host.uuid() == uuid)?;
            hosts.remove(position)
        };
        info!("Removed host {}", uuid);
        self.notify(StoreEvent::HostRemoved(uuid.to_string()));
        Some(removed)
    }
}

impl HostStore for ComputerManager {
    fn computers(&self) -> Vec<Arc<Computer>> {
        self.hosts.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn subscribe(&self) -> Receiver<StoreEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    fn delete_host(&self, computer: &Arc<Computer>) {
        self.remove_host(computer.uuid());
    }

    fn rename_host(&self, computer: &Arc<Computer>, name: &str) {
        self.update_host(computer.uuid(), |state| state.name = name.to_string());
    }

    fn quit_running_app(&self, computer: &Arc<Computer>) {
        // Local stand-in for the quit request: the host reports idle afterwards.
        self.update_host(computer.uuid(), |state| state.current_game_id = 0);
    }

    fn client_side_attribute_updated(&self, computer: &Arc<Computer>) {
        debug!("Client-side attributes updated for {}", computer.uuid());
        self.notify(StoreEvent::ComputerStateChanged(computer.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_updates_reach_subscribers_in_order() {
        let manager = ComputerManager::new();
        let rx = manager.subscribe();

        manager.add_host("a", ComputerState::new("Alpha"));
        assert!(manager.update_host("a", |state| state.state = ComputerStatus::Online));
        assert!(!manager.update_host("missing", |_| {}));
        manager.remove_host("a");

        let events: Vec<StoreEvent> = rx.try_iter().collect();
        assert_eq!(events.len(), 3);
        assert!(matches!(&events[0], StoreEvent::ComputerStateChanged(c) if c.uuid() == "a"));
        assert!(matches!(&events[1], StoreEvent::ComputerStateChanged(c) if c.read().is_online()));
        assert!(matches!(&events[2], StoreEvent::HostRemoved(uuid) if uuid == "a"));
    }

    #[test]
    fn test_add_host_replaces_existing_state() {
        let manager = ComputerManager::new();
        let first = manager.add_host("a", ComputerState::new("Alpha"));
        let second = manager.add_host("a", ComputerState::new("Renamed"));

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(manager.computers().len(), 1);
        assert_eq!(first.read().name, "Renamed");
    }

    #[test]
    fn test_concurrent_add_host_keeps_one_entry() {
        use std::sync::Barrier;
        use std::thread;

        for _ in 0..200 {
            let manager = Arc::new(ComputerManager::new());
            let barrier = Arc::new(Barrier::new(8));
            let workers: Vec<_> = (0..8)
                .map(|i| {
                    let manager = manager.clone();
                    let barrier = barrier.clone();
                    thread::spawn(move || {
                        barrier.wait();
                        manager.add_host("same", ComputerState::new(format!("Host {}", i)));
                    })
                })
                .collect();
            for worker in workers {
                worker.join().unwrap();
            }

            assert_eq!(manager.computers().len(), 1);
            manager.remove_host("same");
            assert!(manager.find("same").is_none());
        }
    }

    #[test]
    fn test_dropped_subscriber_is_pruned() {
        let manager = ComputerManager::new();
        drop(manager.subscribe());
        let live = manager.subscribe();

        manager.add_new_host(ComputerState::new("Fresh"));

        assert_eq!(live.try_iter().count(), 1);
        assert_eq!(manager.subscribers.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_running_app_lookup() {
        let mut state = ComputerState::new("Den");
        state.apps = vec![App::new(7, "Steam"), App::new(9, "Desktop")];
        assert!(state.running_app().is_none());

        state.current_game_id = 9;
        assert_eq!(state.running_app().map(|app| app.name.as_str()), Some("Desktop"));

        state.current_game_id = 42;
        assert!(state.running_app().is_none());
    }

    #[test]
    fn test_quit_running_app_marks_host_idle() {
        let manager = ComputerManager::new();
        let mut state = ComputerState::new("Den");
        state.current_game_id = 3;
        let host = manager.add_host("den", state);

        manager.quit_running_app(&host);

        assert_eq!(host.read().current_game_id, 0);
    }
}
