//! Instance Options
//!
//! The recognized configuration record for an instance:
//! `request`, `timeout`, `loading`, `loaded`, `default`, `response`,
//! `error`, `resolve`, `reject`, `keep_response`, `keep_error` and initial
//! event listeners.
//!
//! # Example
//!
//! ```rust,ignore
//! let user = Async::with_options(
//!     Options::new()
//!         .request(|resolve, _reject| { resolve.resolve(load_user()); })
//!         .default(User::guest())
//!         .timeout(Duration::from_secs(30))
//!         .keep_response(true),
//! );
//! ```

use std::sync::Arc;
use std::time::Duration;

use crate::events::{EventBus, Listener};
use crate::field::{Data, Field};
use crate::instance::{Rejecter, Resolver};
use crate::state::{Response, State};

/// Builder for an instance's initial state.
pub struct Options<V, E> {
    state: State<V, E>,
}

impl<V, E> Options<V, E>
where
    V: Data,
    E: Data,
{
    /// Start from an empty record: no request, nothing loaded.
    pub fn new() -> Self {
        Self {
            state: State::default(),
        }
    }

    /// Backing operation. Called with resolve/reject handles on the first
    /// read of each staleness cycle.
    pub fn request<F>(mut self, request: F) -> Self
    where
        F: Fn(Resolver<V, E>, Rejecter<V, E>) + Send + Sync + 'static,
    {
        self.state.request = Some(Arc::new(request));
        self
    }

    /// Minimum time after a resolution before `update()` restarts the request.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.state.timeout = Some(timeout);
        self
    }

    /// Initial loading flag.
    ///
    /// Starting with `true` means the instance waits for an external
    /// `resolve`/`reject` and does not run its request on first read.
    pub fn loading(mut self, loading: bool) -> Self {
        self.state.loading = Some(loading);
        self
    }

    /// Initial loaded flag.
    pub fn loaded(mut self, loaded: bool) -> Self {
        self.state.loaded = loaded;
        self
    }

    /// Fallback used while no response has been written.
    pub fn default(mut self, default: impl Into<Field<V>>) -> Self {
        self.state.default = Some(default.into());
        self
    }

    /// Initial response.
    pub fn response(mut self, response: impl Into<Field<V>>) -> Self {
        self.state.response = Response::Set(Some(response.into()));
        self
    }

    /// Initial error.
    pub fn error(mut self, error: impl Into<Field<E>>) -> Self {
        self.state.error = Some(error.into());
        self
    }

    /// Transform applied to every resolved value before it is stored.
    pub fn resolve<F>(mut self, transform: F) -> Self
    where
        F: Fn(Field<V>) -> Field<V> + Send + Sync + 'static,
    {
        self.state.resolve_transform = Some(Arc::new(transform));
        self
    }

    /// Transform applied to every rejection before it is stored.
    pub fn reject<F>(mut self, transform: F) -> Self
    where
        F: Fn(Field<E>) -> Field<E> + Send + Sync + 'static,
    {
        self.state.reject_transform = Some(Arc::new(transform));
        self
    }

    /// Keep the response when the instance rejects.
    pub fn keep_response(mut self, keep: bool) -> Self {
        self.state.keep_response = keep;
        self
    }

    /// Keep the error when the instance resolves.
    pub fn keep_error(mut self, keep: bool) -> Self {
        self.state.keep_error = keep;
        self
    }

    /// Register a persistent listener from the start.
    pub fn on(mut self, event: &str, listener: Listener<V, E>) -> Self {
        self.state.events.insert(event, listener, false);
        self
    }

    /// Register a one-shot listener from the start.
    pub fn once(mut self, event: &str, listener: Listener<V, E>) -> Self {
        self.state.events.insert(event, listener, true);
        self
    }

    /// Replace the whole listener registry.
    pub fn events(mut self, events: EventBus<V, E>) -> Self {
        self.state.events = events;
        self
    }

    pub(crate) fn pulse(mut self) -> Self {
        self.state.pulse = true;
        self
    }

    pub(crate) fn into_state(self) -> State<V, E> {
        self.state
    }
}

impl<V, E> Default for Options<V, E>
where
    V: Data,
    E: Data,
{
    fn default() -> Self {
        Self::new()
    }
}
