//! Future Interop
//!
//! An instance can be awaited. The future completes with the value once the
//! instance settles, or immediately when it is not loading. Awaiting does
//! not create a derived node; it subscribes once and detaches.
//!
//! ```rust,ignore
//! let user = Async::new(|resolve, _| {
//!     tokio::spawn(async move { resolve.resolve(fetch_user().await); });
//! });
//! let value = user.clone().await?;
//! ```

use std::future::{Future, IntoFuture};
use std::ops::ControlFlow;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::FutureExt;
use parking_lot::Mutex;
use tokio::sync::oneshot;

use super::outcome::Settlement;
use crate::error::SettleError;
use crate::events::{Break, Listener, ListenerId, Payload, REJECT, RESOLVE};
use crate::field::Data;
use crate::instance::Async;

type Received<V, E> = Result<Option<V>, E>;

/// Future returned by [`Async::settled`].
pub struct Settled<V, E> {
    receiver: oneshot::Receiver<Received<V, E>>,
}

impl<V, E> Future for Settled<V, E> {
    type Output = Result<Option<V>, SettleError<E>>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|received| match received {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(error)) => Err(SettleError::Rejected(error)),
                Err(_) => Err(SettleError::Abandoned),
            })
    }
}

impl<V, E> Async<V, E>
where
    V: Data,
    E: Data,
{
    /// Future of the next settlement.
    ///
    /// Completes immediately with the current value or error when the
    /// instance is not loading. Yields [`SettleError::Abandoned`] if the
    /// instance is dropped first.
    pub fn settled(&self) -> Settled<V, E> {
        self.call();

        let (sender, receiver) = oneshot::channel();
        let sender = Arc::new(Mutex::new(Some(sender)));
        let resolve_id = ListenerId::new();
        let reject_id = ListenerId::new();

        let finish = |sibling: &'static str, sibling_id: ListenerId| {
            let sender = Arc::clone(&sender);
            let source = self.downgrade();
            move |_: &Payload<V, E>, _: Break| {
                if let Some(source) = source.upgrade() {
                    source.off_id(sibling, sibling_id);
                    let pending = sender.lock().take();
                    if let Some(sender) = pending {
                        let _ = sender.send(source.current());
                    }
                }
                ControlFlow::Continue(())
            }
        };

        let on_resolve = Listener::with_id(resolve_id, finish(REJECT, reject_id));
        let on_reject = Listener::with_id(reject_id, finish(RESOLVE, resolve_id));
        let listeners = [(RESOLVE, on_resolve), (REJECT, on_reject)];

        if !self.subscribe(&listeners, true, false) {
            let pending = sender.lock().take();
            if let Some(sender) = pending {
                let _ = sender.send(self.current());
            }
        }

        Settled { receiver }
    }

    /// Await the next settlement and map its value.
    pub fn then_promise<T, F>(
        &self,
        on_resolve: F,
    ) -> impl Future<Output = Result<T, SettleError<E>>>
    where
        F: FnOnce(Option<V>) -> T,
    {
        self.settled().map(move |settled| settled.map(on_resolve))
    }

    /// Await the next settlement, turning a rejection into a value.
    pub fn catch_promise<F>(
        &self,
        on_reject: F,
    ) -> impl Future<Output = Result<Option<V>, SettleError<E>>>
    where
        F: FnOnce(E) -> Option<V>,
    {
        self.settled().map(move |settled| match settled {
            Err(SettleError::Rejected(error)) => Ok(on_reject(error)),
            other => other,
        })
    }

    /// Await the next settlement and hand it to `handler` either way.
    ///
    /// Only [`SettleError::Abandoned`] is left as an error.
    pub fn finally_promise<T, F>(
        &self,
        handler: F,
    ) -> impl Future<Output = Result<T, SettleError<E>>>
    where
        F: FnOnce(Settlement<V, E>) -> T,
    {
        self.settled().map(move |settled| match settled {
            Ok(value) => Ok(handler(Settlement::Resolved(value))),
            Err(SettleError::Rejected(error)) => Ok(handler(Settlement::Rejected(error))),
            Err(SettleError::Abandoned) => Err(SettleError::Abandoned),
        })
    }

    fn current(&self) -> Received<V, E> {
        match self.error() {
            Some(error) => Err(error),
            None => Ok(self.value()),
        }
    }
}

impl<V, E> IntoFuture for Async<V, E>
where
    V: Data,
    E: Data,
{
    type Output = Result<Option<V>, SettleError<E>>;
    type IntoFuture = Settled<V, E>;

    fn into_future(self) -> Self::IntoFuture {
        self.settled()
    }
}

impl<V, E> IntoFuture for &Async<V, E>
where
    V: Data,
    E: Data,
{
    type Output = Result<Option<V>, SettleError<E>>;
    type IntoFuture = Settled<V, E>;

    fn into_future(self) -> Self::IntoFuture {
        self.settled()
    }
}
