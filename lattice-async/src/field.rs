//! Field Values
//!
//! Every observable slot of an [`Async`](crate::Async) (`response`, `error`,
//! `default`) holds a [`Field`]: either a plain value or a thunk that is
//! evaluated on every read.
//!
//! Thunks give "compute on demand" semantics. Nothing is cached, so two
//! consecutive reads may return different values when the thunk has side
//! effects or reads state that changed in between.

use std::fmt::{self, Debug};
use std::sync::Arc;

/// Bound shared by every value type stored in an instance.
///
/// Values are cloned out of the state record on each read and may cross
/// into tokio tasks, hence `Clone + Send + Sync`.
pub trait Data: Clone + Send + Sync + 'static {}

impl<T> Data for T where T: Clone + Send + Sync + 'static {}

/// A zero-argument getter producing a fresh value on every call.
pub type Thunk<T> = Arc<dyn Fn() -> T + Send + Sync>;

/// A literal value or a lazily evaluated thunk.
pub enum Field<T> {
    /// A literal, returned as-is (cloned) on every read.
    Value(T),

    /// A getter, invoked on every read.
    Thunk(Thunk<T>),
}

impl<T> Field<T>
where
    T: Data,
{
    /// Wrap a closure as a thunk field.
    pub fn thunk<F>(getter: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Field::Thunk(Arc::new(getter))
    }

    /// Evaluate the field.
    ///
    /// Literals are cloned; thunks are invoked. No caching takes place.
    pub fn get(&self) -> T {
        match self {
            Field::Value(value) => value.clone(),
            Field::Thunk(getter) => getter(),
        }
    }

    /// Whether this field is a thunk.
    pub fn is_thunk(&self) -> bool {
        matches!(self, Field::Thunk(_))
    }
}

impl<T> From<T> for Field<T> {
    fn from(value: T) -> Self {
        Field::Value(value)
    }
}

impl<T> Clone for Field<T>
where
    T: Clone,
{
    fn clone(&self) -> Self {
        match self {
            Field::Value(value) => Field::Value(value.clone()),
            Field::Thunk(getter) => Field::Thunk(Arc::clone(getter)),
        }
    }
}

impl<T> Debug for Field<T>
where
    T: Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Field::Thunk(_) => f.write_str("Thunk(..)"),
        }
    }
}
