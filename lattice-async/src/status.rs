//! Status Snapshot
//!
//! A plain, serializable view of an instance's flags. Values themselves are
//! application types and are not part of the snapshot.

use serde::{Deserialize, Serialize};

/// Flags of an instance at one point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Status {
    /// A cycle is pending.
    pub loading: bool,

    /// The instance resolved at least once.
    pub loaded: bool,

    /// A non-empty response is stored.
    pub has_response: bool,

    /// An error is stored.
    pub has_error: bool,
}

impl Status {
    /// Settled with an error and no response to show.
    pub fn is_failed(&self) -> bool {
        !self.loading && self.has_error && !self.has_response
    }
}
