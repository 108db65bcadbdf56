//! Listener types for the event bus.
//!
//! A Listener is a callback registered under an event name. Clones of one
//! listener share its [`ListenerId`], which is how `off` finds it again.

use std::ops::ControlFlow;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::payload::Payload;

/// Token passed to every listener invocation.
///
/// Returning `ControlFlow::Break(BREAK)` stops the remaining listeners of
/// the current `trigger` call. Later triggers are unaffected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Break;

/// The break sentinel.
pub const BREAK: Break = Break;

/// Unique identifier for a listener.
///
/// Each listener gets a unique ID when created; the registry is keyed on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    /// Generate a new unique listener ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ListenerId {
    fn default() -> Self {
        Self::new()
    }
}

type Callback<V, E> = dyn Fn(&Payload<V, E>, Break) -> ControlFlow<Break> + Send + Sync;

/// A callback registered on an instance's event bus.
pub struct Listener<V, E> {
    id: ListenerId,
    callback: Arc<Callback<V, E>>,
}

impl<V, E> Listener<V, E> {
    /// Create a listener that may stop dispatch by returning
    /// `ControlFlow::Break` with the sentinel it receives.
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&Payload<V, E>, Break) -> ControlFlow<Break> + Send + Sync + 'static,
    {
        Self::with_id(ListenerId::new(), callback)
    }

    /// Create a listener that always lets dispatch continue.
    pub fn notify<F>(callback: F) -> Self
    where
        F: Fn(&Payload<V, E>) + Send + Sync + 'static,
    {
        Self::new(move |payload, _| {
            callback(payload);
            ControlFlow::Continue(())
        })
    }

    pub(crate) fn with_id<F>(id: ListenerId, callback: F) -> Self
    where
        F: Fn(&Payload<V, E>, Break) -> ControlFlow<Break> + Send + Sync + 'static,
    {
        Self {
            id,
            callback: Arc::new(callback),
        }
    }

    /// Get the listener's unique ID.
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Invoke the callback.
    pub fn invoke(&self, payload: &Payload<V, E>, brk: Break) -> ControlFlow<Break> {
        (self.callback)(payload, brk)
    }
}

impl<V, E> Clone for Listener<V, E> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            callback: Arc::clone(&self.callback),
        }
    }
}

impl<V, E> std::fmt::Debug for Listener<V, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listener").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    #[test]
    fn listener_ids_are_unique() {
        let id1 = ListenerId::new();
        let id2 = ListenerId::new();
        let id3 = ListenerId::new();

        assert_ne!(id1, id2);
        assert_ne!(id2, id3);
        assert_ne!(id1, id3);
    }

    #[test]
    fn clones_share_identity() {
        let listener: Listener<i32, ()> = Listener::notify(|_| {});
        let clone = listener.clone();
        assert_eq!(listener.id(), clone.id());
    }

    #[test]
    fn notify_listener_continues() {
        let called = Arc::new(AtomicBool::new(false));
        let called_clone = called.clone();

        let listener: Listener<i32, ()> = Listener::notify(move |_| {
            called_clone.store(true, Ordering::SeqCst);
        });

        assert!(!called.load(Ordering::SeqCst));
        let flow = listener.invoke(&Payload::Empty, BREAK);
        assert!(called.load(Ordering::SeqCst));
        assert_eq!(flow, ControlFlow::Continue(()));
    }

    #[test]
    fn listener_can_return_break() {
        let listener: Listener<i32, ()> = Listener::new(|_, brk| ControlFlow::Break(brk));
        assert_eq!(listener.invoke(&Payload::Empty, BREAK), ControlFlow::Break(BREAK));
    }
}
