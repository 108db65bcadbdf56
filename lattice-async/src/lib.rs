//! Lattice Async
//!
//! This crate provides a reactive container for the state of asynchronous
//! operations. An [`Async`] tracks whether its operation is loading, whether
//! it ever loaded, its response and its error. It implements:
//!
//! - Lazy invocation: the backing request runs on the first read after
//!   `update()`, at most once per cycle
//! - Update debouncing with a per-instance timeout
//! - A per-instance event bus (`update`, `resolve`, `reject`, custom names)
//! - Promise-style chaining into derived nodes that follow their source
//! - Awaiting an instance as a future
//!
//! # Architecture
//!
//! - `events`: listener registry, listener handles and payloads
//! - `chain`: derived nodes and future interop
//!
//! The instance, its options record and the lazily evaluated [`Field`] live
//! at the crate root.
//!
//! # Example
//!
//! ```rust,ignore
//! use lattice_async::{Async, Outcome};
//!
//! let count = Async::<i32, String>::new(|resolve, _reject| {
//!     resolve.resolve(1);
//! });
//!
//! // Follows every later settlement of `count`
//! let next = count.then_reusable(|v| Outcome::resolve(v.unwrap_or(0) + 1));
//!
//! assert_eq!(next.value(), Some(2));
//!
//! count.update();
//! assert_eq!(next.value(), Some(2));
//! ```

pub mod chain;
pub mod events;

mod error;
mod field;
mod instance;
mod options;
mod state;
mod status;

pub use chain::{Chain, Outcome, Settled, Settlement};
pub use error::SettleError;
pub use events::{
    Break, Descriptor, EventBus, Listener, ListenerId, Payload, BREAK, REJECT, RESOLVE, UPDATE,
};
pub use field::{Data, Field, Thunk};
pub use instance::{Async, Rejecter, Resolver};
pub use options::Options;
pub use state::{Request, Transform};
pub use status::Status;
