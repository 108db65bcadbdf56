//! Listener Registry
//!
//! Maps event names to ordered sets of listener descriptors. The registry
//! itself is plain data stored inside an instance's state record; the
//! instance drives dispatch so that no lock is held while a listener runs.
//!
//! # Dispatch Protocol
//!
//! 1. Take a snapshot of the listener IDs registered for the event.
//!
//! 2. For each ID, [`EventBus::claim`] the listener. A listener removed
//!    since the snapshot is skipped; a `once` listener is removed here,
//!    before it is invoked.
//!
//! 3. Invoke the claimed listener outside the lock.

use indexmap::IndexMap;
use smallvec::SmallVec;

use super::listener::{Listener, ListenerId};

/// A registered listener plus its once-flag.
pub struct Descriptor<V, E> {
    /// The registered callback.
    pub listener: Listener<V, E>,

    /// Remove the listener before its first invocation.
    pub once: bool,
}

impl<V, E> Clone for Descriptor<V, E> {
    fn clone(&self) -> Self {
        Self {
            listener: self.listener.clone(),
            once: self.once,
        }
    }
}

/// IDs snapshotted for one dispatch round.
pub type Snapshot = SmallVec<[ListenerId; 8]>;

type ListenerSet<V, E> = IndexMap<ListenerId, Descriptor<V, E>>;

/// Per-instance registry of named listener sets.
pub struct EventBus<V, E> {
    sets: IndexMap<String, ListenerSet<V, E>>,
}

impl<V, E> EventBus<V, E> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            sets: IndexMap::new(),
        }
    }

    /// Add a listener under `event`.
    ///
    /// The set holds each listener once. Adding a listener that is already
    /// registered keeps its position and overwrites its once-flag.
    pub fn insert(&mut self, event: &str, listener: Listener<V, E>, once: bool) {
        let set = self.sets.entry(event.to_owned()).or_default();
        match set.get_mut(&listener.id()) {
            Some(descriptor) => descriptor.once = once,
            None => {
                set.insert(listener.id(), Descriptor { listener, once });
            }
        }
    }

    /// Remove a listener by identity. Returns whether it was registered.
    pub fn remove(&mut self, event: &str, id: ListenerId) -> bool {
        self.sets
            .get_mut(event)
            .map(|set| set.shift_remove(&id).is_some())
            .unwrap_or(false)
    }

    /// IDs currently registered for `event`, in insertion order.
    pub fn snapshot(&self, event: &str) -> Snapshot {
        self.sets
            .get(event)
            .map(|set| set.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Fetch a listener for invocation.
    ///
    /// Returns `None` if it is no longer registered. A `once` listener is
    /// removed from its set by this call.
    pub fn claim(&mut self, event: &str, id: ListenerId) -> Option<Listener<V, E>> {
        let set = self.sets.get_mut(event)?;
        let once = set.get(&id)?.once;
        if once {
            set.shift_remove(&id).map(|descriptor| descriptor.listener)
        } else {
            set.get(&id).map(|descriptor| descriptor.listener.clone())
        }
    }

    /// Whether `listener` is registered under `event`.
    pub fn contains(&self, event: &str, id: ListenerId) -> bool {
        self.sets
            .get(event)
            .map(|set| set.contains_key(&id))
            .unwrap_or(false)
    }

    /// Descriptors registered under `event`.
    pub fn descriptors(&self, event: &str) -> Vec<Descriptor<V, E>> {
        self.sets
            .get(event)
            .map(|set| set.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of listeners registered under `event`.
    pub fn len(&self, event: &str) -> usize {
        self.sets.get(event).map(IndexMap::len).unwrap_or(0)
    }

    /// Whether no listener is registered under any name.
    pub fn is_empty(&self) -> bool {
        self.sets.values().all(IndexMap::is_empty)
    }

    /// Event names that have been registered at least once.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.sets.keys().map(String::as_str)
    }
}

impl<V, E> Default for EventBus<V, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V, E> Clone for EventBus<V, E> {
    fn clone(&self) -> Self {
        Self {
            sets: self.sets.clone(),
        }
    }
}

impl<V, E> std::fmt::Debug for EventBus<V, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.sets.iter().map(|(name, set)| (name, set.len())))
            .finish()
    }
}
