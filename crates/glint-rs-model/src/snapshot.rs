//! Frozen per-pass classification.
//!
//! The sort comparator must never look at a live entity: a host's state can
//! flip between two comparisons and break the ordering contract. Each pass
//! therefore reads every entity exactly once, up front, into an immutable
//! [`Snapshot`], and ordering works from that map only.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::hash::Hash;

use tracing::warn;

use crate::host::ComputerState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub section: u8,
    pub label: &'static str,
    /// Lowercased display name
    pub sort_key: String,
}

impl Classification {
    pub fn new(section: u8, label: &'static str, name: &str) -> Self {
        Self {
            section,
            label,
            sort_key: name.to_lowercase(),
        }
    }
}

/// Classification plus the observable fields captured in the same read
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotEntry<I> {
    pub class: Classification,
    pub item: I,
}

pub type Snapshot<K, I> = HashMap<K, SnapshotEntry<I>>;

/// Build a snapshot, calling `capture` exactly once per entity.
///
/// `capture` is where the entity's lock is taken; nothing after this
/// function touches entity state. Duplicate keys keep their first entry.
pub fn take_snapshot<E, K, I, F>(entities: &[E], mut capture: F) -> Snapshot<K, I>
where
    K: Eq + Hash + std::fmt::Debug,
    F: FnMut(&E) -> (K, SnapshotEntry<I>),
{
    let mut snapshot = HashMap::with_capacity(entities.len());
    for entity in entities {
        let (key, entry) = capture(entity);
        match snapshot.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert(entry);
            }
            Entry::Occupied(slot) => {
                warn!("Duplicate entity key {:?} in one pass, keeping the first", slot.key());
            }
        }
    }
    snapshot
}

/// Host grouping used by the host projection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostSection {
    Online,
    NotPaired,
    Offline,
}

impl HostSection {
    pub fn of(state: &ComputerState) -> Self {
        match (state.is_online(), state.is_paired()) {
            (true, true) => HostSection::Online,
            (true, false) => HostSection::NotPaired,
            _ => HostSection::Offline,
        }
    }

    pub fn id(self) -> u8 {
        match self {
            HostSection::Online => 0,
            HostSection::NotPaired => 1,
            HostSection::Offline => 2,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            HostSection::Online => "Online",
            HostSection::NotPaired => "Not Paired",
            HostSection::Offline => "Offline",
        }
    }

    pub fn classify(state: &ComputerState) -> Classification {
        let section = Self::of(state);
        Classification::new(section.id(), section.label(), &state.name)
    }
}
