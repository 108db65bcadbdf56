//! State Record
//!
//! The mutable fields describing one async operation. Owned exclusively
//! by one instance and only touched while its lock is held.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::events::EventBus;
use crate::field::Field;
use crate::instance::{Async, Rejecter, Resolver};

/// The backing operation, called with the instance's settle handles.
pub type Request<V, E> = Arc<dyn Fn(Resolver<V, E>, Rejecter<V, E>) + Send + Sync>;

/// Applied to a value before it is stored by `resolve`/`reject`.
pub type Transform<T> = Arc<dyn Fn(Field<T>) -> Field<T> + Send + Sync>;

/// Whether the response slot has been written.
///
/// A response that was cleared by a rejection is still `Set(None)`: once
/// written, `value` never falls back to the default again until `reset`.
pub(crate) enum Response<V> {
    Unset,
    Set(Option<Field<V>>),
}

impl<V> Response<V>
where
    V: Clone,
{
    pub(crate) fn field(&self) -> Option<Field<V>> {
        match self {
            Response::Unset => None,
            Response::Set(field) => field.clone(),
        }
    }

    pub(crate) fn is_set(&self) -> bool {
        matches!(self, Response::Set(_))
    }
}

pub(crate) struct State<V, E> {
    pub(crate) request: Option<Request<V, E>>,

    /// Accept `update()` without a request.
    pub(crate) pulse: bool,

    /// Absent until the first update or explicit option.
    pub(crate) loading: Option<bool>,
    pub(crate) loaded: bool,

    pub(crate) response: Response<V>,
    pub(crate) error: Option<Field<E>>,
    pub(crate) default: Option<Field<V>>,

    pub(crate) resolve_transform: Option<Transform<V>>,
    pub(crate) reject_transform: Option<Transform<E>>,
    pub(crate) keep_response: bool,
    pub(crate) keep_error: bool,

    /// Debounce window applied by `update()`.
    pub(crate) timeout: Option<Duration>,
    pub(crate) last_resolved_at: Option<Instant>,

    pub(crate) events: EventBus<V, E>,

    /// The request for the current staleness cycle was dispatched.
    pub(crate) invoked: bool,

    /// Source that `update()` and `call()` are forwarded to.
    pub(crate) delegate: Option<Async<V, E>>,

    /// Nested instance this node is waiting on.
    pub(crate) held: Option<Async<V, E>>,
}

impl<V, E> State<V, E> {
    pub(crate) fn is_loading(&self) -> bool {
        self.loading == Some(true)
    }
}

impl<V, E> Default for State<V, E> {
    fn default() -> Self {
        Self {
            request: None,
            pulse: false,
            loading: None,
            loaded: false,
            response: Response::Unset,
            error: None,
            default: None,
            resolve_transform: None,
            reject_transform: None,
            keep_response: false,
            keep_error: false,
            timeout: None,
            last_resolved_at: None,
            events: EventBus::new(),
            invoked: true,
            delegate: None,
            held: None,
        }
    }
}
