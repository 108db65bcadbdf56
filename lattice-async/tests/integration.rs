//! Integration Tests for Async Instances
//!
//! These tests verify that lazy invocation, the event bus, chaining and
//! future interop work together correctly.

use std::ops::ControlFlow;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use lattice_async::{
    Async, Field, Listener, Options, Outcome, Payload, SettleError, Settlement, Status, REJECT,
    RESOLVE, UPDATE,
};

/// Test that a synchronous request settles on the first read.
#[test]
fn sync_request_resolves_on_first_read() {
    let instance: Async<i32, String> = Async::new(|resolve, _| {
        resolve.resolve(1);
    });

    assert_eq!(instance.value(), Some(1));
    assert!(!instance.loading());
    assert!(instance.loaded());
    assert_eq!(instance.error(), None);
}

/// Test that a rejecting request stores the error and no response.
#[test]
fn sync_request_rejects_on_first_read() {
    let instance: Async<i32, String> = Async::new(|_, reject| {
        reject.reject("x".to_string());
    });

    assert_eq!(instance.error(), Some("x".to_string()));
    assert_eq!(instance.value(), None);
    assert!(!instance.loading());
    assert!(!instance.loaded());
}

/// Test that a thunk response is re-evaluated on every read.
#[test]
fn thunk_response_counts_reads() {
    let counter = Arc::new(AtomicI32::new(0));
    let counter_clone = counter.clone();

    let instance: Async<i32, String> = Async::new(move |resolve, _| {
        let counter = counter_clone.clone();
        resolve.resolve(Field::thunk(move || counter.fetch_add(1, Ordering::SeqCst) + 1));
    });

    assert_eq!(instance.value(), Some(1));
    assert_eq!(instance.value(), Some(2));
    assert_eq!(instance.response(), Some(3));
}

/// Test that a reusable chain follows an externally settled source.
#[test]
fn reusable_then_follows_external_resolve() {
    let a: Async<i32, String> = Async::pending();
    let b = a.then_reusable(|v| Outcome::resolve(v.unwrap_or(0) + 1));

    a.update();
    a.resolve(1);
    assert_eq!(b.value(), Some(2));

    a.update();
    a.resolve(10);
    assert_eq!(b.value(), Some(11));
}

/// Test that updates travel up a chain and settlements travel down.
#[test]
fn deep_reusable_chain_propagates() {
    let counter = Arc::new(AtomicI32::new(0));
    let counter_clone = counter.clone();

    let a: Async<i32, String> = Async::new(move |resolve, _| {
        resolve.resolve(counter_clone.fetch_add(1, Ordering::SeqCst));
    });
    let b = a.then_reusable(|v| Outcome::resolve(v.unwrap_or(0) + 1));
    let c = b.then_reusable(|v| Outcome::resolve(v.unwrap_or(0) * 2));

    assert_eq!(c.value(), Some(2));

    a.update();
    assert_eq!(c.value(), Some(4));
    assert_eq!(b.value(), Some(2));

    // Updating the tail re-runs the head's request
    c.update();
    assert_eq!(c.value(), Some(6));
    assert_eq!(a.value(), Some(2));
    assert_eq!(counter.load(Ordering::SeqCst), 3);
}

/// Test that a one-shot chain reflects only the first settlement.
#[test]
fn one_shot_chain_ignores_later_settlements() {
    let a: Async<i32, String> = Async::pending();
    let b = a.then(|v| Outcome::resolve(v.unwrap_or(0) * 10));

    a.resolve(1);
    assert_eq!(b.value(), Some(10));

    a.update();
    a.resolve(2);
    assert_eq!(b.value(), Some(10));
    assert!(a.events().is_empty());
}

/// Test that errors can be recovered and values survive a catch.
#[test]
fn catch_recovers_from_rejection() {
    let a: Async<i32, String> = Async::pending();
    let recovered = a.catch_reusable(|error| Outcome::resolve(error.len() as i32));

    a.reject("four".to_string());
    assert_eq!(recovered.value(), Some(4));
    assert_eq!(recovered.error(), None);

    a.update();
    a.resolve(9);
    assert_eq!(recovered.value(), Some(9));
}

/// Test that finally sees both settlement kinds.
#[test]
fn finally_runs_on_both_paths() {
    let runs = Arc::new(AtomicI32::new(0));
    let runs_clone = runs.clone();

    let a: Async<i32, String> = Async::pending();
    let done = a.finally_reusable(move |settlement| {
        runs_clone.fetch_add(1, Ordering::SeqCst);
        match settlement {
            Settlement::Resolved(value) => Outcome::resolve(value.unwrap_or(0)),
            Settlement::Rejected(_) => Outcome::resolve(-1),
        }
    });

    a.resolve(3);
    assert_eq!(done.value(), Some(3));
    a.update();
    a.reject("no".to_string());
    assert_eq!(done.value(), Some(-1));
    assert_eq!(runs.load(Ordering::SeqCst), 2);
}

/// Test that a handler may hand back another pending instance.
#[test]
fn nested_instance_outcome_is_followed() {
    let source: Async<i32, String> = Async::new(|resolve, _| {
        resolve.resolve(1);
    });
    let inner: Async<i32, String> = Async::pending();

    let inner_clone = inner.clone();
    let derived = source.then(move |_| Outcome::from(inner_clone.clone()));

    assert!(derived.loading());
    inner.resolve(9);
    assert!(!derived.loading());
    assert_eq!(derived.value(), Some(9));
}

/// Test that the keep flags hold the opposite field across settlements.
#[test]
fn keep_flags_from_options() {
    let instance: Async<&str, &str> = Async::with_options(
        Options::new()
            .request(|resolve, _| {
                resolve.resolve("ok");
            })
            .keep_response(true),
    );

    assert_eq!(instance.value(), Some("ok"));
    instance.reject("boom");
    assert_eq!(instance.value(), Some("ok"));
    assert_eq!(instance.error(), Some("boom"));

    // keep_error is off, so resolving clears the error
    instance.resolve("again");
    assert_eq!(instance.error(), None);
}

/// Test that the configured timeout debounces updates.
#[test]
fn timeout_debounces_updates() {
    let counter = Arc::new(AtomicI32::new(0));
    let counter_clone = counter.clone();

    let instance: Async<i32, String> = Async::with_options(
        Options::new()
            .request(move |resolve, _| {
                resolve.resolve(counter_clone.fetch_add(1, Ordering::SeqCst));
            })
            .timeout(Duration::from_millis(20)),
    );

    assert_eq!(instance.value(), Some(0));
    instance.update();
    assert_eq!(instance.value(), Some(0));

    std::thread::sleep(Duration::from_millis(30));
    instance.update();
    assert_eq!(instance.value(), Some(1));
}

/// Test listener bookkeeping: once, break and listeners added mid-dispatch.
#[test]
fn event_bus_semantics() {
    let instance: Async<i32, String> = Async::default();
    let log = Arc::new(AtomicI32::new(0));

    let late_log = log.clone();
    let late = Listener::notify(move |_| {
        late_log.fetch_add(100, Ordering::SeqCst);
    });

    let handle = instance.clone();
    let adder_log = log.clone();
    let adder = Listener::notify(move |_| {
        adder_log.fetch_add(1, Ordering::SeqCst);
        handle.on("tick", &late);
    });

    let stopper = Listener::new(|_, brk| ControlFlow::Break(brk));

    instance.once("tick", &adder);
    instance.trigger("tick", Payload::Empty);
    // `late` was added during dispatch and did not run yet
    assert_eq!(log.load(Ordering::SeqCst), 1);

    instance.trigger("tick", Payload::Empty);
    assert_eq!(log.load(Ordering::SeqCst), 101);

    // A breaking listener registered first stops the rest
    let fresh: Async<i32, String> = Async::default();
    let counted = log.clone();
    fresh
        .on("tick", &stopper)
        .on("tick", &Listener::notify(move |_| {
            counted.fetch_add(1000, Ordering::SeqCst);
        }));
    fresh.trigger("tick", Payload::Empty);
    assert_eq!(log.load(Ordering::SeqCst), 101);
}

/// Test that custom payloads reach listeners intact.
#[test]
fn custom_event_payload() {
    #[derive(Debug, PartialEq)]
    struct Progress(u8);

    let instance: Async<i32, String> = Async::default();
    let seen = Arc::new(AtomicI32::new(0));
    let seen_clone = seen.clone();

    instance.on(
        "progress",
        &Listener::notify(move |payload: &Payload<i32, String>| {
            if let Some(Progress(percent)) = payload.downcast_ref::<Progress>() {
                seen_clone.store(i32::from(*percent), Ordering::SeqCst);
            }
        }),
    );

    instance.trigger("progress", Payload::custom(Progress(40)));
    assert_eq!(seen.load(Ordering::SeqCst), 40);
}

/// Test that lifecycle events fire in order with their payloads.
#[test]
fn lifecycle_events_carry_payloads() {
    let updates = Arc::new(AtomicI32::new(0));
    let resolved = Arc::new(AtomicI32::new(0));
    let rejected = Arc::new(AtomicI32::new(0));

    let updates_clone = updates.clone();
    let resolved_clone = resolved.clone();
    let rejected_clone = rejected.clone();

    let instance: Async<i32, String> = Async::with_options(
        Options::new()
            .request(|resolve, _| {
                resolve.resolve(5);
            })
            .on(UPDATE, Listener::notify(move |_| {
                updates_clone.fetch_add(1, Ordering::SeqCst);
            }))
            .on(RESOLVE, Listener::notify(move |payload: &Payload<i32, String>| {
                resolved_clone.store(payload.response().unwrap_or_default(), Ordering::SeqCst);
            }))
            .on(REJECT, Listener::notify(move |payload: &Payload<i32, String>| {
                let len = payload.error().map(|e| e.len()).unwrap_or_default();
                rejected_clone.store(len as i32, Ordering::SeqCst);
            })),
    );

    assert_eq!(updates.load(Ordering::SeqCst), 0);
    instance.value();
    assert_eq!(updates.load(Ordering::SeqCst), 1);
    assert_eq!(resolved.load(Ordering::SeqCst), 5);

    instance.reject("three".to_string());
    assert_eq!(rejected.load(Ordering::SeqCst), 5);
}

/// Test that resolving from inside a resolve listener recurses.
#[test]
fn reentrant_resolve_recurses() {
    let instance: Async<i32, String> = Async::pending();
    let depth = Arc::new(AtomicI32::new(0));

    let handle = instance.clone();
    let depth_clone = depth.clone();
    let relay = Listener::notify(move |_| {
        let level = depth_clone.fetch_add(1, Ordering::SeqCst);
        if level < 2 {
            handle.resolve(level + 10);
        }
    });

    instance.on(RESOLVE, &relay);
    instance.resolve(0);

    assert_eq!(depth.load(Ordering::SeqCst), 3);
    assert_eq!(instance.value(), Some(11));

    instance.off(RESOLVE, &relay);
}

/// Test that the status snapshot serializes for a UI state tree.
#[test]
fn status_snapshot_json() {
    let instance: Async<i32, String> = Async::new(|_, reject| {
        reject.reject("down".to_string());
    });

    let status = instance.status();
    assert!(status.is_failed());

    let json = serde_json::to_value(status).unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "loading": false,
            "loaded": false,
            "has_response": false,
            "has_error": true,
        })
    );

    let back: Status = serde_json::from_value(json).unwrap();
    assert_eq!(back, status);
}

/// Test that reset restores the default without firing events.
#[test]
fn reset_restores_default() {
    let fired = Arc::new(AtomicI32::new(0));
    let fired_clone = fired.clone();

    let instance: Async<i32, String> = Async::with_options(
        Options::new()
            .request(|resolve, _| {
                resolve.resolve(3);
            })
            .default(-1),
    );
    assert_eq!(instance.value(), Some(3));

    instance.on(RESOLVE, &Listener::notify(move |_| {
        fired_clone.fetch_add(1, Ordering::SeqCst);
    }));
    instance.reset();

    assert_eq!(instance.value(), Some(-1));
    assert_eq!(fired.load(Ordering::SeqCst), 0);
}

/// Test that a request settling from a tokio task can be awaited.
#[tokio::test]
async fn spawned_request_can_be_awaited() {
    let instance: Async<String, String> = Async::new(|resolve, _| {
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            resolve.resolve("fetched".to_string());
        });
    });

    assert!(instance.loading());
    assert_eq!((&instance).await, Ok(Some("fetched".to_string())));
    assert!(instance.loaded());
}

/// Test that a future outcome settles the derived node later.
#[tokio::test]
async fn future_outcome_settles_derived_node() {
    let source: Async<i32, String> = Async::new(|resolve, _| {
        resolve.resolve(2);
    });

    let derived = source.then(|v| Outcome::future(async move { Ok(v.unwrap_or(0) * 5) }));
    assert_eq!(derived.clone().await, Ok(Some(10)));

    let failed = source.then(|_| Outcome::future(async { Err("late".to_string()) }));
    assert_eq!(
        failed.settled().await,
        Err(SettleError::Rejected("late".to_string()))
    );
}

/// Test the promise-style helpers on a chain.
#[tokio::test]
async fn promise_helpers_on_chain() {
    let source: Async<i32, String> = Async::pending();
    let doubled = source.then_reusable(|v| Outcome::resolve(v.unwrap_or(0) * 2));

    let waiter = doubled.then_promise(|v| v.map(|v| v + 1));
    source.resolve(4);
    assert_eq!(waiter.await, Ok(Some(9)));

    source.update();
    let recovered = doubled.catch_promise(|_| Some(0));
    source.reject("gone".to_string());
    assert_eq!(recovered.await, Ok(Some(0)));
}

/// Test that dropping the last handle abandons pending waiters.
#[tokio::test]
async fn dropped_instance_abandons_waiters() {
    let instance: Async<i32, String> = Async::pending();
    let waiter = instance.finally_promise(|settlement| settlement);
    drop(instance);

    assert_eq!(waiter.await, Err(SettleError::Abandoned));
}

fn resolved_from_thread(value: i32) -> Async<i32, String> {
    Async::new(move |resolve, _| {
        std::thread::spawn(move || {
            resolve.resolve(value);
        });
    })
}

/// Test that awaiting never misses a settlement made on another thread.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn settled_sees_cross_thread_resolve() {
    for _ in 0..500 {
        let instance = resolved_from_thread(1);
        let result = tokio::time::timeout(Duration::from_secs(5), instance.settled()).await;
        assert_eq!(result, Ok(Ok(Some(1))));
    }
}

/// Test that a one-shot chain never misses a cross-thread settlement.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn chain_sees_cross_thread_resolve() {
    for _ in 0..500 {
        let source = resolved_from_thread(1);
        let derived = source.then(|v| Outcome::resolve(v.unwrap_or(0) + 1));
        let result = tokio::time::timeout(Duration::from_secs(5), derived.settled()).await;
        assert_eq!(result, Ok(Ok(Some(2))));
    }
}

/// Test that following a nested instance never misses its settlement.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn nested_outcome_sees_cross_thread_resolve() {
    let source: Async<i32, String> = Async::new(|resolve, _| {
        resolve.resolve(0);
    });

    for _ in 0..500 {
        let derived = source.then(|_| Outcome::from(resolved_from_thread(7)));
        let result = tokio::time::timeout(Duration::from_secs(5), derived.settled()).await;
        assert_eq!(result, Ok(Ok(Some(7))));
    }
}
