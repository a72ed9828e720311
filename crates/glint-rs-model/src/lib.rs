//! Host store and list projections.
//!
//! [`ComputerModel`] and [`AppModel`] turn the live, concurrently mutated
//! host collection into ordered lists an observer can index into, and keep
//! that observer in sync with [`ModelEvent`] notifications.

mod app_model;
mod computer_model;
pub mod delta;
mod error;
mod filter;
pub mod host;
mod observer;
mod ordering;
pub mod snapshot;

pub use app_model::{AppItem, AppModel};
pub use computer_model::{ComputerItem, ComputerModel};
pub use error::ModelError;
pub use filter::VisibilityFilter;
pub use host::{
    App, Computer, ComputerManager, ComputerState, ComputerStatus, HostStore, PairState,
    SessionFactory, StoreEvent,
};
pub use observer::{channel_listener, AppRole, ComputerRole, ModelEvent, ModelListener};
pub use ordering::OrderingPolicy;
