//! Async Instance
//!
//! An [`Async`] is the state of one asynchronous operation: whether it is
//! loading, whether it ever loaded, its response and its error.
//!
//! # How Invocation Works
//!
//! 1. `update()` marks the instance stale and sets `loading`. Nothing runs yet.
//!
//! 2. The first accessor read afterwards dispatches the cycle: the `update`
//!    event fires and the request runs with resolve/reject handles.
//!
//! 3. Further reads in the same cycle do not run the request again.
//!
//! 4. Whoever holds the handles settles the cycle with `resolve`/`reject`,
//!    synchronously or later from another task.
//!
//! # Locking
//!
//! The state record sits behind a `parking_lot::Mutex` that is never held
//! while user code runs (requests, transforms, thunks, listeners). Any of
//! those may call back into the instance.

use std::fmt::Debug;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::events::{EventBus, Listener, ListenerId, Payload, BREAK, REJECT, RESOLVE, UPDATE};
use crate::field::{Data, Field};
use crate::options::Options;
use crate::state::{Response, State};
use crate::status::Status;

/// Counter for generating unique instance IDs.
static INSTANCE_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

fn next_instance_id() -> u64 {
    INSTANCE_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

struct Inner<V, E> {
    id: u64,
    state: Mutex<State<V, E>>,
}

/// Reactive state of one asynchronous operation.
///
/// Cloning is cheap and yields another handle to the same instance.
///
/// # Example
///
/// ```rust,ignore
/// let count = Async::new(|resolve, _reject| {
///     resolve.resolve(1);
/// });
///
/// // The first read runs the request.
/// assert_eq!(count.value(), Some(1));
/// assert!(!count.loading());
/// ```
pub struct Async<V, E> {
    inner: Arc<Inner<V, E>>,
}

/// Non-owning handle, upgraded when a listener fires.
pub(crate) struct WeakAsync<V, E> {
    inner: Weak<Inner<V, E>>,
}

impl<V, E> WeakAsync<V, E> {
    pub(crate) fn upgrade(&self) -> Option<Async<V, E>> {
        self.inner.upgrade().map(|inner| Async { inner })
    }
}

impl<V, E> Clone for WeakAsync<V, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

/// Resolve handle passed to a request.
pub struct Resolver<V, E> {
    target: Async<V, E>,
}

impl<V, E> Resolver<V, E>
where
    V: Data,
    E: Data,
{
    /// Settle the current cycle successfully.
    pub fn resolve(&self, value: impl Into<Field<V>>) -> &Async<V, E> {
        self.target.resolve(value)
    }

    /// The instance this handle settles.
    pub fn target(&self) -> &Async<V, E> {
        &self.target
    }
}

impl<V, E> Clone for Resolver<V, E> {
    fn clone(&self) -> Self {
        Self {
            target: self.target.clone(),
        }
    }
}

/// Reject handle passed to a request.
pub struct Rejecter<V, E> {
    target: Async<V, E>,
}

impl<V, E> Rejecter<V, E>
where
    V: Data,
    E: Data,
{
    /// Settle the current cycle with an error.
    pub fn reject(&self, error: impl Into<Field<E>>) -> &Async<V, E> {
        self.target.reject(error)
    }

    /// The instance this handle settles.
    pub fn target(&self) -> &Async<V, E> {
        &self.target
    }
}

impl<V, E> Clone for Rejecter<V, E> {
    fn clone(&self) -> Self {
        Self {
            target: self.target.clone(),
        }
    }
}

impl<V, E> Async<V, E>
where
    V: Data,
    E: Data,
{
    /// Create an instance backed by `request`.
    ///
    /// The instance starts stale; the request runs on the first read.
    pub fn new<F>(request: F) -> Self
    where
        F: Fn(Resolver<V, E>, Rejecter<V, E>) + Send + Sync + 'static,
    {
        Self::with_options(Options::new().request(request))
    }

    /// Create an instance from a full options record.
    ///
    /// Without a request the instance is a plain value holder and does not
    /// start loading.
    pub fn with_options(options: Options<V, E>) -> Self {
        let instance = Self {
            inner: Arc::new(Inner {
                id: next_instance_id(),
                state: Mutex::new(options.into_state()),
            }),
        };
        instance.update();
        instance
    }

    /// Create a request-less instance that starts loading and waits for an
    /// external `resolve`/`reject`.
    ///
    /// Unlike a plain value holder, `update()` marks it loading again.
    pub fn pending() -> Self {
        Self::with_options(Options::new().pulse())
    }

    /// Get the instance's unique ID.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub(crate) fn downgrade(&self) -> WeakAsync<V, E> {
        WeakAsync {
            inner: Arc::downgrade(&self.inner),
        }
    }

    // ------------------------------------------------------------------------
    // Lazy invocation
    // ------------------------------------------------------------------------

    /// Mark the instance stale so the next read runs the request again.
    ///
    /// No-op when the instance has nothing to invoke, is already loading,
    /// or resolved less than its configured timeout ago.
    pub fn update(&self) -> &Self {
        if let Some(source) = self.delegate() {
            source.update();
            return self;
        }
        self.refresh(None)
    }

    /// Like [`update`](Self::update) with an explicit debounce window.
    ///
    /// `Duration::ZERO` disables the debounce for this call.
    pub fn update_within(&self, timeout: Duration) -> &Self {
        if let Some(source) = self.delegate() {
            source.update_within(timeout);
            return self;
        }
        self.refresh(Some(timeout))
    }

    /// Own update, never forwarded to a delegate.
    pub(crate) fn refresh(&self, timeout: Option<Duration>) -> &Self {
        let mut state = self.inner.state.lock();

        if state.request.is_none() && !state.pulse {
            return self;
        }

        if let (Some(window), Some(last)) = (timeout.or(state.timeout), state.last_resolved_at) {
            if !window.is_zero() && last.elapsed() < window {
                trace!(id = self.inner.id, ?window, "update debounced");
                return self;
            }
        }

        if state.is_loading() {
            return self;
        }

        state.invoked = false;
        state.loading = Some(true);
        trace!(id = self.inner.id, "marked stale");
        self
    }

    /// Dispatch the current staleness cycle if it has not run yet.
    ///
    /// Every accessor goes through here first.
    pub(crate) fn call(&self) {
        if let Some(source) = self.delegate() {
            source.call();
        }

        let request = {
            let mut state = self.inner.state.lock();
            if !state.is_loading() || state.invoked {
                return;
            }
            state.invoked = true;
            state.request.clone()
        };

        trace!(id = self.inner.id, "dispatching invocation");
        self.trigger(UPDATE, Payload::Empty);

        if let Some(request) = request {
            request(
                Resolver {
                    target: self.clone(),
                },
                Rejecter {
                    target: self.clone(),
                },
            );
        }
    }

    fn delegate(&self) -> Option<Async<V, E>> {
        self.inner.state.lock().delegate.clone()
    }

    pub(crate) fn set_delegate(&self, source: Async<V, E>) {
        self.inner.state.lock().delegate = Some(source);
    }

    pub(crate) fn hold(&self, nested: Async<V, E>) {
        self.inner.state.lock().held = Some(nested);
    }

    // ------------------------------------------------------------------------
    // Resolution
    // ------------------------------------------------------------------------

    /// Settle successfully.
    ///
    /// Applies the resolve transform, stores the response, clears the error
    /// unless `keep_error` is set, and fires `resolve`.
    pub fn resolve(&self, value: impl Into<Field<V>>) -> &Self {
        self.settle_resolved(Some(value.into()))
    }

    /// Resolve with a possibly empty response.
    ///
    /// The transform only sees present values.
    pub(crate) fn settle_resolved(&self, value: Option<Field<V>>) -> &Self {
        let transform = self.inner.state.lock().resolve_transform.clone();
        let value = match (transform, value) {
            (Some(transform), Some(value)) => Some(transform(value)),
            (_, value) => value,
        };

        let released = {
            let mut state = self.inner.state.lock();
            state.loading = Some(false);
            state.loaded = true;
            state.response = Response::Set(value.clone());
            if !state.keep_error {
                state.error = None;
            }
            state.last_resolved_at = Some(Instant::now());
            state.held.take()
        };
        drop(released);

        debug!(id = self.inner.id, "resolved");
        self.trigger(RESOLVE, Payload::Response(value))
    }

    /// Settle with an error.
    ///
    /// Applies the reject transform, stores the error, clears the response
    /// unless `keep_response` is set, and fires `reject`. `loaded` keeps its
    /// value.
    pub fn reject(&self, error: impl Into<Field<E>>) -> &Self {
        let error = error.into();
        let transform = self.inner.state.lock().reject_transform.clone();
        let error = match transform {
            Some(transform) => transform(error),
            None => error,
        };

        let released = {
            let mut state = self.inner.state.lock();
            state.loading = Some(false);
            state.error = Some(error.clone());
            if !state.keep_response {
                state.response = Response::Set(None);
            }
            state.held.take()
        };
        drop(released);

        debug!(id = self.inner.id, "rejected");
        self.trigger(REJECT, Payload::Error(error))
    }

    /// Restore the response to the default and clear the error.
    ///
    /// Fires no event and leaves `loading`/`loaded` alone.
    pub fn reset(&self) -> &Self {
        let mut state = self.inner.state.lock();
        let default = state.default.clone();
        state.response = Response::Set(default);
        state.error = None;
        self
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    /// Whether a cycle is pending.
    pub fn loading(&self) -> bool {
        self.call();
        self.inner.state.lock().is_loading()
    }

    /// Whether the instance ever resolved.
    pub fn loaded(&self) -> bool {
        self.call();
        self.inner.state.lock().loaded
    }

    /// The fallback value, evaluated now.
    pub fn default_value(&self) -> Option<V> {
        self.call();
        let field = self.inner.state.lock().default.clone();
        field.map(|field| field.get())
    }

    /// The response, evaluated now.
    pub fn response(&self) -> Option<V> {
        self.call();
        let field = self.inner.state.lock().response.field();
        field.map(|field| field.get())
    }

    /// The error, evaluated now.
    pub fn error(&self) -> Option<E> {
        self.call();
        let field = self.inner.state.lock().error.clone();
        field.map(|field| field.get())
    }

    /// The response if one was ever written, otherwise the default.
    ///
    /// A response cleared by a rejection counts as written: the result is
    /// then `None`, not the default.
    pub fn value(&self) -> Option<V> {
        self.call();
        let written = self.inner.state.lock().response.is_set();
        if written {
            self.response()
        } else {
            self.default_value()
        }
    }

    /// Snapshot of the flags, for shipping inside a UI state tree.
    pub fn status(&self) -> Status {
        self.call();
        let state = self.inner.state.lock();
        Status {
            loading: state.is_loading(),
            loaded: state.loaded,
            has_response: state.response.field().is_some(),
            has_error: state.error.is_some(),
        }
    }

    /// Loading flag without dispatching the cycle.
    pub(crate) fn is_pending(&self) -> bool {
        self.inner.state.lock().is_loading()
    }

    /// Raw response and error fields without dispatching the cycle.
    pub(crate) fn fields(&self) -> (Option<Field<V>>, Option<Field<E>>) {
        let state = self.inner.state.lock();
        (state.response.field(), state.error.clone())
    }

    // ------------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------------

    /// Snapshot of the listener registry.
    pub fn events(&self) -> EventBus<V, E> {
        self.inner.state.lock().events.clone()
    }

    /// Register a persistent listener.
    pub fn on(&self, event: &str, listener: &Listener<V, E>) -> &Self {
        self.inner
            .state
            .lock()
            .events
            .insert(event, listener.clone(), false);
        self
    }

    /// Register a listener that is removed before its first invocation.
    pub fn once(&self, event: &str, listener: &Listener<V, E>) -> &Self {
        self.inner
            .state
            .lock()
            .events
            .insert(event, listener.clone(), true);
        self
    }

    /// Remove a listener.
    pub fn off(&self, event: &str, listener: &Listener<V, E>) -> &Self {
        self.off_id(event, listener.id())
    }

    pub(crate) fn off_id(&self, event: &str, id: ListenerId) -> &Self {
        self.inner.state.lock().events.remove(event, id);
        self
    }

    /// Register `listeners` under the same lock that reads the loading flag.
    ///
    /// Without `always` they are only registered while a cycle is pending.
    /// Returns whether a cycle was pending. A settlement on another thread
    /// either sees the listeners or happened before the check.
    pub(crate) fn subscribe(
        &self,
        listeners: &[(&str, Listener<V, E>)],
        once: bool,
        always: bool,
    ) -> bool {
        let mut state = self.inner.state.lock();
        let pending = state.is_loading();
        if pending || always {
            for (event, listener) in listeners {
                state.events.insert(event, listener.clone(), once);
            }
        }
        pending
    }

    /// Invoke the listeners registered under `event`.
    ///
    /// Stops early when a listener returns `ControlFlow::Break`. Listeners
    /// added while dispatching run from the next trigger on.
    pub fn trigger(&self, event: &str, payload: Payload<V, E>) -> &Self {
        let ids = self.inner.state.lock().events.snapshot(event);

        for id in ids {
            let claimed = self.inner.state.lock().events.claim(event, id);
            let Some(listener) = claimed else {
                continue;
            };
            if let ControlFlow::Break(_) = listener.invoke(&payload, BREAK) {
                trace!(id = self.inner.id, event, "dispatch stopped by listener");
                break;
            }
        }

        self
    }
}

impl<V, E> Clone for Async<V, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V, E> Default for Async<V, E>
where
    V: Data,
    E: Data,
{
    fn default() -> Self {
        Self::with_options(Options::new())
    }
}

impl<V, E> Debug for Async<V, E>
where
    V: Data + Debug,
    E: Data + Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (response, error) = self.fields();
        f.debug_struct("Async")
            .field("id", &self.inner.id)
            .field("loading", &self.is_pending())
            .field("response", &response)
            .field("error", &error)
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
