//! Event payloads.

use std::any::Any;
use std::fmt::{self, Debug};
use std::sync::Arc;

use crate::field::{Data, Field};

/// Data handed to listeners by `trigger`.
pub enum Payload<V, E> {
    /// No payload (`update` and bare custom triggers).
    Empty,

    /// A resolution. `None` when the instance was settled with nothing,
    /// which happens when a derived node forwards an empty response.
    Response(Option<Field<V>>),

    /// A rejection.
    Error(Field<E>),

    /// Payload of an application-defined event.
    Custom(Arc<dyn Any + Send + Sync>),
}

impl<V, E> Payload<V, E>
where
    V: Data,
    E: Data,
{
    /// Wrap an arbitrary value for a custom event.
    pub fn custom<T>(value: T) -> Self
    where
        T: Any + Send + Sync,
    {
        Payload::Custom(Arc::new(value))
    }

    /// Evaluate a `Response` payload.
    ///
    /// Returns `None` for other variants and for empty responses.
    pub fn response(&self) -> Option<V> {
        match self {
            Payload::Response(field) => field.as_ref().map(Field::get),
            _ => None,
        }
    }

    /// Evaluate an `Error` payload.
    pub fn error(&self) -> Option<E> {
        match self {
            Payload::Error(field) => Some(field.get()),
            _ => None,
        }
    }

    /// Downcast a `Custom` payload.
    pub fn downcast_ref<T>(&self) -> Option<&T>
    where
        T: Any,
    {
        match self {
            Payload::Custom(value) => value.downcast_ref::<T>(),
            _ => None,
        }
    }
}

impl<V, E> Clone for Payload<V, E>
where
    V: Clone,
    E: Clone,
{
    fn clone(&self) -> Self {
        match self {
            Payload::Empty => Payload::Empty,
            Payload::Response(field) => Payload::Response(field.clone()),
            Payload::Error(field) => Payload::Error(field.clone()),
            Payload::Custom(value) => Payload::Custom(Arc::clone(value)),
        }
    }
}

impl<V, E> Debug for Payload<V, E>
where
    V: Debug,
    E: Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Empty => f.write_str("Empty"),
            Payload::Response(field) => f.debug_tuple("Response").field(field).finish(),
            Payload::Error(field) => f.debug_tuple("Error").field(field).finish(),
            Payload::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_payload_evaluates_field() {
        let payload: Payload<i32, String> = Payload::Response(Some(Field::thunk(|| 3)));
        assert_eq!(payload.response(), Some(3));
        assert_eq!(payload.error(), None);
    }

    #[test]
    fn empty_response_has_no_value() {
        let payload: Payload<i32, String> = Payload::Response(None);
        assert_eq!(payload.response(), None);
    }

    #[test]
    fn custom_payload_downcasts() {
        let payload: Payload<i32, String> = Payload::custom(("row", 4usize));
        assert_eq!(payload.downcast_ref::<(&str, usize)>(), Some(&("row", 4)));
        assert!(payload.downcast_ref::<i32>().is_none());
    }
}
