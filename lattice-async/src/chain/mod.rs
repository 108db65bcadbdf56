//! Chaining
//!
//! `then`, `catch` and `finally` build a *derived node*: a new instance
//! wired to the *source* through its event bus.
//!
//! # Wiring
//!
//! 1. The source's pending cycle is dispatched first.
//!
//! 2. If the source is already settled, the matching handler runs at once
//!    and the derived node settles synchronously.
//!
//! 3. A reusable chain keeps persistent listeners on the source: every later
//!    `update`/`resolve`/`reject` of the source re-propagates into the same
//!    derived node.
//!
//! 4. A one-shot chain on a loading source registers single-use listeners
//!    instead. The first settlement removes the whole group, so the derived
//!    node reflects exactly one settlement.
//!
//! In cases 3 and 4 the derived node forwards `update()` (and its pending
//! reads) to the source.
//!
//! # Ownership
//!
//! A derived node keeps its source alive. Listeners on the source only hold
//! weak handles to the derived node; dropping the derived node silences them.

mod outcome;
mod promise;

pub use outcome::{Outcome, Settlement};
pub use promise::Settled;

use std::ops::ControlFlow;
use std::sync::Arc;

use tracing::debug;

use crate::events::{Listener, ListenerId, Payload, REJECT, RESOLVE, UPDATE};
use crate::field::{Data, Field};
use crate::instance::{Async, WeakAsync};

type ResolveHandler<V, E> = Arc<dyn Fn(Option<V>) -> Outcome<V, E> + Send + Sync>;
type RejectHandler<V, E> = Arc<dyn Fn(E) -> Outcome<V, E> + Send + Sync>;
type Forward<T> = Arc<dyn Fn(T) + Send + Sync>;

/// Handlers and flags for one derived node.
pub struct Chain<V, E> {
    on_resolve: Option<ResolveHandler<V, E>>,
    on_reject: Option<RejectHandler<V, E>>,
    reusable: bool,
}

impl<V, E> Chain<V, E>
where
    V: Data,
    E: Data,
{
    /// A chain that forwards both paths unchanged.
    pub fn new() -> Self {
        Self {
            on_resolve: None,
            on_reject: None,
            reusable: false,
        }
    }

    /// Handler for the resolve path.
    pub fn on_resolve<F>(mut self, handler: F) -> Self
    where
        F: Fn(Option<V>) -> Outcome<V, E> + Send + Sync + 'static,
    {
        self.on_resolve = Some(Arc::new(handler));
        self
    }

    /// Handler for the reject path.
    pub fn on_reject<F>(mut self, handler: F) -> Self
    where
        F: Fn(E) -> Outcome<V, E> + Send + Sync + 'static,
    {
        self.on_reject = Some(Arc::new(handler));
        self
    }

    /// One handler for both paths.
    pub fn on_settle<F>(self, handler: F) -> Self
    where
        F: Fn(Settlement<V, E>) -> Outcome<V, E> + Send + Sync + 'static,
    {
        let handler = Arc::new(handler);
        let on_reject = Arc::clone(&handler);
        self.on_resolve(move |value| handler(Settlement::Resolved(value)))
            .on_reject(move |error| on_reject(Settlement::Rejected(error)))
    }

    /// Re-propagate every later settlement of the source.
    pub fn reusable(mut self, reusable: bool) -> Self {
        self.reusable = reusable;
        self
    }
}

impl<V, E> Default for Chain<V, E>
where
    V: Data,
    E: Data,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<V, E> Async<V, E>
where
    V: Data,
    E: Data,
{
    /// Build a derived node from a full [`Chain`].
    pub fn chain(&self, chain: Chain<V, E>) -> Async<V, E> {
        self.call();

        let derived = Async::pending();
        let handle_resolve = resolve_path(derived.downgrade(), chain.on_resolve);
        let handle_reject = reject_path(derived.downgrade(), chain.on_reject);

        let once = !chain.reusable;
        let listeners = wire(
            self,
            derived.downgrade(),
            Arc::clone(&handle_resolve),
            Arc::clone(&handle_reject),
            once,
        );
        let loading = self.subscribe(&listeners, once, chain.reusable);
        if chain.reusable || loading {
            derived.set_delegate(self.clone());
        }

        if !loading {
            let (response, error) = self.fields();
            match error {
                Some(error) => handle_reject(error),
                None => handle_resolve(response),
            }
        }

        debug!(
            source = self.id(),
            derived = derived.id(),
            reusable = chain.reusable,
            "chained"
        );
        derived
    }

    /// Derived node mapping the next settlement's response.
    pub fn then<F>(&self, on_resolve: F) -> Async<V, E>
    where
        F: Fn(Option<V>) -> Outcome<V, E> + Send + Sync + 'static,
    {
        self.chain(Chain::new().on_resolve(on_resolve))
    }

    /// Derived node mapping every settlement's response.
    pub fn then_reusable<F>(&self, on_resolve: F) -> Async<V, E>
    where
        F: Fn(Option<V>) -> Outcome<V, E> + Send + Sync + 'static,
    {
        self.chain(Chain::new().on_resolve(on_resolve).reusable(true))
    }

    /// Derived node mapping the next settlement's error.
    pub fn catch<F>(&self, on_reject: F) -> Async<V, E>
    where
        F: Fn(E) -> Outcome<V, E> + Send + Sync + 'static,
    {
        self.chain(Chain::new().on_reject(on_reject))
    }

    /// Derived node mapping every settlement's error.
    pub fn catch_reusable<F>(&self, on_reject: F) -> Async<V, E>
    where
        F: Fn(E) -> Outcome<V, E> + Send + Sync + 'static,
    {
        self.chain(Chain::new().on_reject(on_reject).reusable(true))
    }

    /// Derived node running `handler` on the next settlement, either way.
    pub fn finally<F>(&self, handler: F) -> Async<V, E>
    where
        F: Fn(Settlement<V, E>) -> Outcome<V, E> + Send + Sync + 'static,
    {
        self.chain(Chain::new().on_settle(handler))
    }

    /// Derived node running `handler` on every settlement.
    pub fn finally_reusable<F>(&self, handler: F) -> Async<V, E>
    where
        F: Fn(Settlement<V, E>) -> Outcome<V, E> + Send + Sync + 'static,
    {
        self.chain(Chain::new().on_settle(handler).reusable(true))
    }
}

fn resolve_path<V, E>(
    target: WeakAsync<V, E>,
    handler: Option<ResolveHandler<V, E>>,
) -> Forward<Option<Field<V>>>
where
    V: Data,
    E: Data,
{
    match handler {
        Some(handler) => Arc::new(move |value: Option<Field<V>>| {
            if let Some(target) = target.upgrade() {
                handler(value.map(|field| field.get())).apply(&target);
            }
        }),
        None => Arc::new(move |value| {
            if let Some(target) = target.upgrade() {
                target.settle_resolved(value);
            }
        }),
    }
}

fn reject_path<V, E>(
    target: WeakAsync<V, E>,
    handler: Option<RejectHandler<V, E>>,
) -> Forward<Field<E>>
where
    V: Data,
    E: Data,
{
    match handler {
        Some(handler) => Arc::new(move |error: Field<E>| {
            if let Some(target) = target.upgrade() {
                handler(error.get()).apply(&target);
            }
        }),
        None => Arc::new(move |error| {
            if let Some(target) = target.upgrade() {
                target.reject(error);
            }
        }),
    }
}

/// Build the source-side listeners of a chain.
fn wire<V, E>(
    source: &Async<V, E>,
    target: WeakAsync<V, E>,
    handle_resolve: Forward<Option<Field<V>>>,
    handle_reject: Forward<Field<E>>,
    once: bool,
) -> [(&'static str, Listener<V, E>); 3]
where
    V: Data,
    E: Data,
{
    let update_id = ListenerId::new();
    let resolve_id = ListenerId::new();
    let reject_id = ListenerId::new();

    // Drops the whole group after the first settlement of a one-shot chain.
    let release: Arc<dyn Fn() + Send + Sync> = {
        let source = source.downgrade();
        Arc::new(move || {
            if !once {
                return;
            }
            if let Some(source) = source.upgrade() {
                source
                    .off_id(UPDATE, update_id)
                    .off_id(RESOLVE, resolve_id)
                    .off_id(REJECT, reject_id);
            }
        })
    };

    let on_update = Listener::with_id(update_id, move |_: &Payload<V, E>, _| {
        if let Some(target) = target.upgrade() {
            target.refresh(None);
        }
        ControlFlow::Continue(())
    });

    let on_resolve = {
        let release = Arc::clone(&release);
        Listener::with_id(resolve_id, move |payload: &Payload<V, E>, _| {
            release();
            if let Payload::Response(value) = payload {
                handle_resolve(value.clone());
            }
            ControlFlow::Continue(())
        })
    };

    let on_reject = Listener::with_id(reject_id, move |payload: &Payload<V, E>, _| {
        release();
        if let Payload::Error(error) = payload {
            handle_reject(error.clone());
        }
        ControlFlow::Continue(())
    });

    [(UPDATE, on_update), (RESOLVE, on_resolve), (REJECT, on_reject)]
}
