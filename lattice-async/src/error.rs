//! Error types for future interop.

use thiserror::Error;

/// Why awaiting an instance did not produce a value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettleError<E> {
    /// The instance rejected with this error.
    #[error("async operation rejected")]
    Rejected(E),

    /// The instance was dropped before it settled.
    #[error("async instance dropped before settling")]
    Abandoned,
}

impl<E> SettleError<E> {
    /// The rejection value, if this is a rejection.
    pub fn into_rejection(self) -> Option<E> {
        match self {
            SettleError::Rejected(error) => Some(error),
            SettleError::Abandoned => None,
        }
    }
}
