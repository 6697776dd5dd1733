//! Integration tests for the reduce cycle
//!
//! Covers ordering of queued actions, listener notification, reducer
//! folding and the equivalence of queued and immediate dispatch.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use proptest::prelude::*;
use statecraft_core::{
    Action, Middleware, MiddlewareError, Phase, Reducer, StateListener, on_change, on_change_when,
    reducer_fn,
};
use statecraft_runtime::{DispatchMode, Store, StoreError};
use statecraft_testing::properties::{add_actions, tagged_actions};
use statecraft_testing::{RecordingListener, RecordingMiddleware};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ============================================================================
// Test Fixtures
// ============================================================================

fn adder() -> Arc<dyn Reducer<i64, i64>> {
    Arc::new(reducer_fn(|s: &i64, a: &Action<i64>| s + a.payload()))
}

fn counter_store(initial: i64) -> Store<i64, i64> {
    let store = Store::new(initial);
    store.add_reducer(adder());
    store
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime")
}

/// Appends to a shared log from both hooks and as a listener
struct Timeline {
    log: Arc<Mutex<Vec<String>>>,
}

impl Middleware<i64, i64> for Timeline {
    fn before(&self, state: &i64, _action: &Action<i64>) -> Result<(), MiddlewareError> {
        self.log.lock().unwrap().push(format!("before:{state}"));
        Ok(())
    }

    fn after(&self, state: &i64, _action: &Action<i64>) -> Result<(), MiddlewareError> {
        self.log.lock().unwrap().push(format!("after:{state}"));
        Ok(())
    }
}

impl StateListener<i64> for Timeline {
    fn has_changed(&self, _new_state: &i64, _old_state: &i64) -> bool {
        true
    }

    fn on_changed(&self, state: &i64) {
        self.log.lock().unwrap().push(format!("listener:{state}"));
    }
}

// ============================================================================
// Ordering
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn queued_actions_reduce_in_submission_order(actions in tagged_actions(64)) {
        let expected: Vec<usize> = actions.iter().map(|a| *a.payload()).collect();

        let reduced = runtime().block_on(async move {
            let store: Store<Vec<usize>, usize> = Store::new(Vec::new());
            store.add_reducer(Arc::new(reducer_fn(|s: &Vec<usize>, a: &Action<usize>| {
                let mut next = s.clone();
                next.push(*a.payload());
                next
            })));

            for action in actions {
                store.enqueue(action).unwrap();
            }
            store.flush().await;
            store.state()
        });

        prop_assert_eq!(&*reduced, &expected);
    }

    #[test]
    fn queued_and_immediate_dispatch_agree(actions in add_actions(32)) {
        let (queued, immediate) = runtime().block_on(async move {
            let queued_store = counter_store(0);
            let queued_seen = Arc::new(RecordingListener::<i64>::when_changed());
            queued_store.add_listener(queued_seen.clone());

            let immediate_store = counter_store(0);
            let immediate_seen = Arc::new(RecordingListener::<i64>::when_changed());
            immediate_store.add_listener(immediate_seen.clone());

            for action in actions {
                queued_store
                    .dispatch(action.clone(), DispatchMode::Queued)
                    .await
                    .unwrap();
                immediate_store
                    .dispatch(action, DispatchMode::Immediate)
                    .await
                    .unwrap();
            }
            queued_store.flush().await;

            (
                (*queued_store.state(), queued_seen.states()),
                (*immediate_store.state(), immediate_seen.states()),
            )
        });

        prop_assert_eq!(queued, immediate);
    }
}

// ============================================================================
// The reduce cycle
// ============================================================================

#[tokio::test]
async fn test_counter_scenario() {
    let store = counter_store(0);
    let recorder = Arc::new(RecordingListener::<i64>::when_changed());
    store.add_listener(recorder.clone());

    for n in [1, 2, 3] {
        store.enqueue(Action::new("add", n)).unwrap();
    }
    store.flush().await;

    assert_eq!(*store.state(), 6);
    assert_eq!(recorder.states(), vec![1, 3, 6]);
}

#[tokio::test]
async fn test_reducers_fold_in_registration_order() -> Result<(), StoreError> {
    let store: Store<i64, i64> = Store::new(1);
    store.add_reducer(Arc::new(reducer_fn(|s: &i64, a: &Action<i64>| s + a.payload())));
    store.add_reducer(Arc::new(reducer_fn(|s: &i64, _: &Action<i64>| s * 10)));

    let state = store.dispatch_now(Action::new("add", 2)).await?;
    assert_eq!(*state, 30);
    Ok(())
}

#[tokio::test]
async fn test_zero_reducers_still_run_hooks_and_listeners() -> Result<(), StoreError> {
    let store: Store<i64, i64> = Store::new(42);
    let hooks = Arc::new(RecordingMiddleware::<i64>::new());
    let every_state = Arc::new(RecordingListener::<i64>::new());
    let only_changes = Arc::new(RecordingListener::<i64>::when_changed());
    store.add_middleware(hooks.clone());
    store.add_listener(every_state.clone());
    store.add_listener(only_changes.clone());

    let state = store.dispatch_now(Action::new("anything", 9)).await?;

    assert_eq!(*state, 42);
    let before = hooks.calls_in(Phase::Before);
    let after = hooks.calls_in(Phase::After);
    assert_eq!(before.len(), 1);
    assert_eq!(after.len(), 1);
    assert_eq!((before[0].state, after[0].state), (42, 42));
    assert_eq!(every_state.states(), vec![42]);
    assert_eq!(only_changes.count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_listener_sees_old_and_new_state() -> Result<(), StoreError> {
    let store = counter_store(5);
    let pairs = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&pairs);
    store.add_listener(Arc::new(on_change_when(
        move |new: &i64, old: &i64| {
            sink.lock().unwrap().push((*old, *new));
            new > old
        },
        |_: &i64| {},
    )));

    store.dispatch_now(Action::new("add", 2)).await?;
    store.dispatch_now(Action::new("add", -1)).await?;
    assert_eq!(*pairs.lock().unwrap(), vec![(5, 7), (7, 6)]);
    Ok(())
}

#[tokio::test]
async fn test_listener_receives_exactly_the_published_state() -> Result<(), StoreError> {
    let store = counter_store(0);
    let published = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&published);
    store.add_listener(Arc::new(on_change(move |s: &i64| sink.lock().unwrap().push(*s))));

    let mut returned = Vec::new();
    for n in [4, 0, -2] {
        returned.push(*store.dispatch_now(Action::new("add", n)).await?);
    }

    assert_eq!(returned, vec![4, 4, 2]);
    assert_eq!(*published.lock().unwrap(), vec![4, 2]);
    Ok(())
}

#[tokio::test]
async fn test_hooks_bracket_listeners() -> Result<(), StoreError> {
    let store = counter_store(0);
    let log = Arc::new(Mutex::new(Vec::new()));
    let timeline = Arc::new(Timeline {
        log: Arc::clone(&log),
    });
    store.add_middleware(timeline.clone());
    store.add_listener(timeline);

    store.dispatch_now(Action::new("add", 3)).await?;
    assert_eq!(*log.lock().unwrap(), vec!["before:0", "listener:3", "after:3"]);
    Ok(())
}

#[tokio::test]
async fn test_before_sees_previous_state_after_sees_new_state() {
    let store = counter_store(10);
    let recorder = Arc::new(RecordingMiddleware::<i64>::new());
    store.add_middleware(recorder.clone());

    store.enqueue(Action::new("add", 1)).unwrap();
    store.enqueue(Action::new("add", 1)).unwrap();
    store.flush().await;

    let before: Vec<i64> = recorder.calls_in(Phase::Before).iter().map(|c| c.state).collect();
    let after: Vec<i64> = recorder.calls_in(Phase::After).iter().map(|c| c.state).collect();
    assert_eq!(before, vec![10, 11]);
    assert_eq!(after, vec![11, 12]);
}

#[tokio::test]
async fn test_subscribe_observes_latest_state() {
    let store = counter_store(0);
    let mut updates = store.subscribe();

    store.enqueue(Action::new("add", 8)).unwrap();
    tokio::time::timeout(Duration::from_secs(1), updates.changed())
        .await
        .expect("state published")
        .expect("store alive");

    assert_eq!(**updates.borrow(), 8);
}

#[tokio::test]
async fn test_removed_reducer_no_longer_applies() -> Result<(), StoreError> {
    let store: Store<i64, i64> = Store::new(0);
    let reducer = adder();
    assert!(store.add_reducer(Arc::clone(&reducer)));
    assert!(!store.add_reducer(Arc::clone(&reducer)));

    store.dispatch_now(Action::new("add", 1)).await?;
    assert!(store.remove_reducer(&reducer));
    store.dispatch_now(Action::new("add", 1)).await?;

    assert_eq!(*store.state(), 1);
    Ok(())
}
