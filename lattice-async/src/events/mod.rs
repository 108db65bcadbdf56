//! Event Bus
//!
//! Each instance owns a registry of named listener sets. Three names are
//! fired by the instance itself:
//!
//! - [`UPDATE`]: an invocation cycle starts (fired on the first read after
//!   `update()`, just before the request runs).
//! - [`RESOLVE`]: the instance resolved; the payload is the stored response.
//! - [`REJECT`]: the instance rejected; the payload is the stored error.
//!
//! Any other name may be used by applications through `trigger`.
//!
//! This is the integration point for reactive frameworks: a consumer that
//! must re-run when the instance changes subscribes to these events.

mod bus;
mod listener;
mod payload;

pub use bus::{Descriptor, EventBus, Snapshot};
pub use listener::{Break, Listener, ListenerId, BREAK};
pub use payload::Payload;

/// Fired when an invocation cycle is dispatched.
pub const UPDATE: &str = "update";

/// Fired after a resolution.
pub const RESOLVE: &str = "resolve";

/// Fired after a rejection.
pub const REJECT: &str = "reject";
