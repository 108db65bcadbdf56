//! Handler Outcomes
//!
//! A chain handler returns an [`Outcome`] describing how the derived node
//! settles. Nested futures and nested instances are followed until they
//! settle, so results never arrive wrapped.

use std::future::Future;
use std::ops::ControlFlow;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tracing::trace;

use crate::events::{Listener, ListenerId, Payload, REJECT, RESOLVE};
use crate::field::{Data, Field};
use crate::instance::{Async, WeakAsync};

/// What a chain handler asks the derived node to do.
pub enum Outcome<V, E> {
    /// Resolve with a value or thunk.
    Resolve(Field<V>),

    /// Reject with a value or thunk.
    Reject(Field<E>),

    /// Settle when the future completes. Spawned on the current tokio
    /// runtime.
    Future(BoxFuture<'static, Result<V, E>>),

    /// Mirror another instance: now if it is settled, otherwise on its
    /// next settlement.
    Async(Async<V, E>),
}

impl<V, E> Outcome<V, E>
where
    V: Data,
    E: Data,
{
    /// Resolve the derived node.
    pub fn resolve(value: impl Into<Field<V>>) -> Self {
        Outcome::Resolve(value.into())
    }

    /// Reject the derived node.
    pub fn reject(error: impl Into<Field<E>>) -> Self {
        Outcome::Reject(error.into())
    }

    /// Settle the derived node from a future.
    pub fn future<F>(future: F) -> Self
    where
        F: Future<Output = Result<V, E>> + Send + 'static,
    {
        Outcome::Future(future.boxed())
    }

    /// Settle `target` according to this outcome.
    ///
    /// # Panics
    ///
    /// A `Future` outcome panics outside a tokio runtime.
    pub(crate) fn apply(self, target: &Async<V, E>) {
        match self {
            Outcome::Resolve(value) => {
                target.resolve(value);
            }
            Outcome::Reject(error) => {
                target.reject(error);
            }
            Outcome::Future(future) => {
                trace!(target = target.id(), "spawning future outcome");
                let target = target.downgrade();
                tokio::spawn(async move {
                    let result = future.await;
                    let Some(target) = target.upgrade() else {
                        return;
                    };
                    match result {
                        Ok(value) => {
                            target.resolve(value);
                        }
                        Err(error) => {
                            target.reject(error);
                        }
                    }
                });
            }
            Outcome::Async(nested) => follow(target, nested),
        }
    }
}

impl<V, E> From<Async<V, E>> for Outcome<V, E> {
    fn from(nested: Async<V, E>) -> Self {
        Outcome::Async(nested)
    }
}

/// Settlement handed to `finally` handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settlement<V, E> {
    /// The source resolved, possibly with nothing.
    Resolved(Option<V>),

    /// The source rejected.
    Rejected(E),
}

fn follow<V, E>(target: &Async<V, E>, nested: Async<V, E>)
where
    V: Data,
    E: Data,
{
    nested.call();

    // Keep the nested instance alive until it settles into `target`.
    target.hold(nested.clone());

    let (on_resolve, on_reject) = settle_pair(&nested, target.downgrade());
    if nested.subscribe(&[(RESOLVE, on_resolve), (REJECT, on_reject)], true, false) {
        return;
    }

    // Already settled: copy it over, which also releases the hold.
    let (response, error) = nested.fields();
    match error {
        Some(error) => {
            target.reject(error);
        }
        None => {
            target.settle_resolved(response);
        }
    }
}

/// Build the `resolve`/`reject` listeners that forward one settlement of
/// `source` into `target`.
///
/// The pair is single-use: whichever fires first unregisters the other.
pub(crate) fn settle_pair<V, E>(
    source: &Async<V, E>,
    target: WeakAsync<V, E>,
) -> (Listener<V, E>, Listener<V, E>)
where
    V: Data,
    E: Data,
{
    let resolve_id = ListenerId::new();
    let reject_id = ListenerId::new();

    let on_resolve = {
        let source = source.downgrade();
        let target = target.clone();
        Listener::with_id(resolve_id, move |payload: &Payload<V, E>, _| {
            if let Some(source) = source.upgrade() {
                source.off_id(REJECT, reject_id);
            }
            if let (Some(target), Payload::Response(value)) = (target.upgrade(), payload) {
                target.settle_resolved(value.clone());
            }
            ControlFlow::Continue(())
        })
    };

    let on_reject = {
        let source = source.downgrade();
        Listener::with_id(reject_id, move |payload: &Payload<V, E>, _| {
            if let Some(source) = source.upgrade() {
                source.off_id(RESOLVE, resolve_id);
            }
            if let (Some(target), Payload::Error(error)) = (target.upgrade(), payload) {
                target.reject(error.clone());
            }
            ControlFlow::Continue(())
        })
    };

    (on_resolve, on_reject)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_outcomes_settle_directly() {
        let target: Async<i32, String> = Async::pending();
        Outcome::resolve(2).apply(&target);
        assert_eq!(target.value(), Some(2));

        Outcome::reject("bad".to_string()).apply(&target);
        assert_eq!(target.error(), Some("bad".to_string()));
    }

    #[test]
    fn settled_nested_instance_is_copied() {
        let target: Async<i32, String> = Async::pending();
        let nested = Async::new(|resolve, _| {
            resolve.resolve(9);
        });

        Outcome::from(nested).apply(&target);
        assert!(!target.loading());
        assert_eq!(target.value(), Some(9));
    }

    #[test]
    fn pending_nested_instance_is_followed_once() {
        let target: Async<i32, String> = Async::pending();
        let nested: Async<i32, String> = Async::pending();

        Outcome::Async(nested.clone()).apply(&target);
        assert!(target.loading());

        nested.resolve(1);
        assert_eq!(target.value(), Some(1));

        // Both halves of the pair are gone
        assert_eq!(nested.events().len(RESOLVE), 0);
        assert_eq!(nested.events().len(REJECT), 0);

        nested.update();
        nested.reject("late".to_string());
        assert_eq!(target.value(), Some(1));
        assert_eq!(target.error(), None);
    }

    #[test]
    fn nested_instance_kept_alive_by_target() {
        let target: Async<i32, String> = Async::pending();
        let nested: Async<i32, String> = Async::pending();
        let resolver = nested.downgrade();

        Outcome::Async(nested).apply(&target);

        // The only strong handle now lives in `target`
        let nested = resolver.upgrade().expect("held by target");
        nested.reject("nope".to_string());
        drop(nested);

        assert_eq!(target.error(), Some("nope".to_string()));
        assert!(resolver.upgrade().is_none());
    }

    #[tokio::test]
    async fn future_outcome_settles_after_spawn() {
        let target: Async<i32, String> = Async::pending();
        Outcome::future(async { Ok::<i32, String>(5) }).apply(&target);

        assert_eq!(target.clone().await, Ok(Some(5)));
    }

    #[tokio::test]
    async fn failing_future_rejects() {
        let target: Async<i32, String> = Async::pending();
        Outcome::future(async { Err::<i32, String>("io".to_string()) }).apply(&target);

        let result = (&target).await;
        assert_eq!(
            result,
            Err(crate::error::SettleError::Rejected("io".to_string()))
        );
    }
}
