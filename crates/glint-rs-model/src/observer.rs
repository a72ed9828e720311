use std::sync::mpsc::{self, Receiver};

use serde::Serialize;
use tracing::debug;

/// Observable fields of a host row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ComputerRole {
    Name,
    Online,
    Paired,
    Busy,
    Wakeable,
    StatusUnknown,
    ServerSupported,
    Details,
    Uuid,
    Section,
}

/// Observable fields of an app row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AppRole {
    Name,
    Running,
    BoxArt,
    Hidden,
    AppId,
    DirectLaunch,
    AppCollectorGame,
    Folder,
}

/// Change notification delivered to a projection's observer.
///
/// Indices refer to the projection as it is after the event. After `Reset`
/// every previously held index is invalid and rows must be re-read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ModelEvent<R> {
    Reset,
    /// Rows `first..=last` were inserted
    Inserted { first: usize, last: usize },
    /// Rows `first..=last` were removed
    Removed { first: usize, last: usize },
    /// The row at `from` now sits at `to`; rows in between shift by one
    Moved { from: usize, to: usize },
    FieldChanged { index: usize, field: R },
    /// The host backing an app projection went away (offline, unpaired, deleted)
    HostLost,
}

pub type ModelListener<R> = Box<dyn FnMut(&ModelEvent<R>) + Send>;

/// Listener that forwards every event into a channel
pub fn channel_listener<R>() -> (ModelListener<R>, Receiver<ModelEvent<R>>)
where
    R: Clone + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    let listener: ModelListener<R> = Box::new(move |event| {
        let _ = tx.send(event.clone());
    });
    (listener, rx)
}

pub(crate) struct Listeners<R> {
    inner: Vec<ModelListener<R>>,
}

impl<R: std::fmt::Debug> Listeners<R> {
    pub(crate) fn new() -> Self {
        Self { inner: Vec::new() }
    }

    pub(crate) fn push(&mut self, listener: ModelListener<R>) {
        self.inner.push(listener);
    }

    pub(crate) fn emit(&mut self, event: ModelEvent<R>) {
        debug!("Model event: {:?}", event);
        for listener in self.inner.iter_mut() {
            listener(&event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_reach_every_listener_once() {
        let mut listeners = Listeners::new();
        let (first, first_rx) = channel_listener::<AppRole>();
        let (second, second_rx) = channel_listener::<AppRole>();
        listeners.push(first);
        listeners.push(second);

        listeners.emit(ModelEvent::Reset);
        listeners.emit(ModelEvent::FieldChanged { index: 2, field: AppRole::Running });

        let expected = vec![
            ModelEvent::Reset,
            ModelEvent::FieldChanged { index: 2, field: AppRole::Running },
        ];
        assert_eq!(first_rx.try_iter().collect::<Vec<_>>(), expected);
        assert_eq!(second_rx.try_iter().collect::<Vec<_>>(), expected);
    }
}
