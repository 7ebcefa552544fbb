//! Subscription registry: event type -> handler bindings sorted by priority.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::binding::{HandlerBinding, ListenerId};
use crate::event::EventType;

/// Per-bus handler table.
///
/// Invariants:
/// - a key exists only while its list is non-empty
/// - every list is stable-sorted by ascending priority whenever a mutating
///   method returns
#[derive(Debug, Default)]
pub(crate) struct Registry {
    table: HashMap<EventType, Vec<Arc<HandlerBinding>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bindings and re-sort every list that changed.
    pub fn insert(&mut self, bindings: impl IntoIterator<Item = (EventType, HandlerBinding)>) {
        let mut touched = HashSet::new();
        for (event, binding) in bindings {
            self.table.entry(event).or_default().push(Arc::new(binding));
            touched.insert(event);
        }

        for event in touched {
            if let Some(list) = self.table.get_mut(&event) {
                // `sort_by_key` is stable: equal priorities keep subscription order.
                list.sort_by_key(|binding| binding.priority());
            }
        }
    }

    /// Remove every binding owned by `listener`. Returns how many were removed.
    pub fn remove(&mut self, listener: ListenerId) -> usize {
        self.retain(|binding| binding.listener() != listener)
    }

    /// Drop bindings whose listener no longer exists.
    pub fn purge_dead(&mut self) -> usize {
        self.retain(HandlerBinding::is_live)
    }

    fn retain(&mut self, mut keep: impl FnMut(&HandlerBinding) -> bool) -> usize {
        let mut removed = 0;
        self.table.retain(|_, list| {
            let before = list.len();
            list.retain(|binding| keep(&**binding));
            removed += before - list.len();
            !list.is_empty()
        });
        removed
    }

    /// Capture the current dispatch order for `event`.
    pub fn snapshot(&self, event: &EventType) -> Option<Vec<Arc<HandlerBinding>>> {
        self.table.get(event).cloned()
    }

    /// Live bindings for `event`. Dead ones still in the table are not counted.
    pub fn count(&self, event: &EventType) -> usize {
        self.table
            .get(event)
            .map_or(0, |list| list.iter().filter(|b| b.is_live()).count())
    }

    /// Event types with at least one live binding.
    pub fn event_types(&self) -> Vec<EventType> {
        self.table
            .iter()
            .filter(|(_, list)| list.iter().any(|b| b.is_live()))
            .map(|(event, _)| *event)
            .collect()
    }

    pub fn contains_listener(&self, listener: ListenerId) -> bool {
        self.table
            .values()
            .flatten()
            .any(|binding| binding.listener() == listener)
    }

    /// No live bindings left.
    pub fn is_empty(&self) -> bool {
        self.table.values().flatten().all(|b| !b.is_live())
    }
}
