//! The Store - owner of state and runner of the reduce pipeline.

use crate::config::StoreConfig;
use crate::dead_letter::FailedActionLog;
use crate::debug::DebugObserver;
use crate::dispatcher::{Dispatcher, Handler, WorkerState};
use crate::fanout::{fan_out, panic_message};
use crate::metrics::StoreMetrics;
use crate::observer::ErrorObserver;
use crate::registry::Registry;
use crate::StoreError;
use futures::FutureExt;
use statecraft_core::composition::fold_reducers;
use statecraft_core::{Action, Middleware, Phase, Reducer, StateListener};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Weak};
use std::time::Instant;
use tokio::sync::{Mutex, watch};
use tracing::Instrument;

/// How [`Store::dispatch`] processes an action
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum DispatchMode {
    /// Append to the queue; the background worker reduces it later, in order
    #[default]
    Queued,
    /// Run the reduce cycle on the caller's task before returning
    Immediate,
}

impl DispatchMode {
    /// Metrics label for this mode
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Immediate => "immediate",
        }
    }
}

/// The Store - single owner of the current state
///
/// The Store manages:
/// 1. The current state (immutable snapshots behind `Arc`)
/// 2. Ordered registries of reducers, middlewares, listeners and error observers
/// 3. A [`Dispatcher`] whose single worker reduces queued actions in order
///
/// Cloning a store yields another handle to the same state and registries.
///
/// # Type Parameters
///
/// - `S`: State type
/// - `P`: Action payload type
///
/// # Example
///
/// ```ignore
/// let store = Store::new(0_i64);
/// store.add_reducer(Arc::new(reducer_fn(|s: &i64, a: &Action<i64>| s + a.payload())));
///
/// store.enqueue(Action::new("add", 1))?;
/// let state = store.dispatch_now(Action::new("add", 2)).await?;
/// assert_eq!(*state, 3);
/// ```
pub struct Store<S, P> {
    inner: Arc<Inner<S, P>>,
}

struct Inner<S, P> {
    state: watch::Sender<Arc<S>>,
    /// Held from state capture through publish
    cycle: Mutex<()>,
    reducers: Registry<dyn Reducer<S, P>>,
    middlewares: Registry<dyn Middleware<S, P>>,
    listeners: Registry<dyn StateListener<S>>,
    observers: Registry<dyn ErrorObserver>,
    failed: FailedActionLog,
    dispatcher: Dispatcher<Action<P>>,
    debug: Option<Arc<DebugObserver>>,
    config: StoreConfig,
}

impl<S, P> Store<S, P>
where
    S: Send + Sync + 'static,
    P: Send + Sync + 'static,
{
    /// Create a store with default configuration and start its worker
    ///
    /// See [`with_config`](Self::with_config).
    #[must_use]
    pub fn new(initial_state: S) -> Self {
        Self::with_config(initial_state, StoreConfig::default())
    }

    /// Create a store and start its worker
    ///
    /// The worker is spawned on the current Tokio runtime. Without one the
    /// store is still usable for configuration, but queued dispatch returns
    /// [`StoreError::NotStarted`] until [`start`](Self::start) succeeds.
    ///
    /// With `config.debug` set, a [`DebugObserver`] is registered as both a
    /// middleware and a listener.
    ///
    /// # Arguments
    ///
    /// - `initial_state`: The first published snapshot
    /// - `config`: Queue capacity, fan-out width, failed-action log size and debug mode
    ///
    /// # Returns
    ///
    /// A store handle; clone it to share the store between tasks
    #[must_use]
    pub fn with_config(initial_state: S, config: StoreConfig) -> Self {
        let debug = config.debug.then(|| Arc::new(DebugObserver::new()));
        let inner = Arc::new_cyclic(|weak: &Weak<Inner<S, P>>| {
            let (state, _) = watch::channel(Arc::new(initial_state));
            Inner {
                state,
                cycle: Mutex::new(()),
                reducers: Registry::new(),
                middlewares: Registry::new(),
                listeners: Registry::new(),
                observers: Registry::new(),
                failed: FailedActionLog::new(config.failed_action_capacity),
                dispatcher: Dispatcher::new(config.queue_capacity, worker_handler(weak.clone())),
                debug: debug.clone(),
                config,
            }
        });
        let store = Self { inner };

        if let Some(observer) = debug {
            store.add_middleware(Arc::clone(&observer) as Arc<dyn Middleware<S, P>>);
            store.add_listener(observer);
        }

        if let Err(error) = store.start() {
            tracing::warn!(error = %error, "Store created without a running worker");
        }
        store
    }

    /// The observer registered by debug mode, if enabled
    #[must_use]
    pub fn debug_observer(&self) -> Option<Arc<DebugObserver>> {
        self.inner.debug.clone()
    }

    /// Start (or restart) the background worker
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NoRuntime`] outside a Tokio runtime.
    pub fn start(&self) -> Result<(), StoreError> {
        self.inner.dispatcher.start()
    }

    /// Stop the background worker
    ///
    /// The action currently being reduced completes; queued actions are not
    /// delivered and can be recovered with [`drain_pending`](Self::drain_pending).
    /// Later dispatches fail with [`StoreError::Stopped`]. Returns `false` if
    /// the worker was not running.
    pub fn stop(&self) -> bool {
        self.inner.dispatcher.stop()
    }

    /// Wait for the worker to exit after [`stop`](Self::stop)
    pub async fn stopped(&self) {
        self.inner.dispatcher.stopped().await;
    }

    /// Whether the worker is running and dispatch is accepted
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.inner.dispatcher.state() == WorkerState::Running
    }

    /// Worker lifecycle state
    #[must_use]
    pub fn worker_state(&self) -> WorkerState {
        self.inner.dispatcher.state()
    }

    /// Wait until every queued action has been reduced (or the store stopped)
    ///
    /// Must not be awaited from a middleware or listener.
    pub async fn flush(&self) {
        self.inner.dispatcher.flush().await;
    }

    /// Number of actions queued or being reduced by the worker
    #[must_use]
    pub fn pending(&self) -> usize {
        self.inner.dispatcher.pending()
    }

    /// Take actions still queued after the worker stopped
    ///
    /// Non-blocking; returns nothing while the worker still holds the queue.
    pub fn drain_pending(&self) -> Vec<Action<P>> {
        self.inner.dispatcher.drain_pending()
    }

    /// Submit an action
    ///
    /// # Errors
    ///
    /// - [`StoreError::NotStarted`] / [`StoreError::Stopped`] if the worker is not running
    /// - [`StoreError::QueueFull`] when a bounded queue is full (queued mode)
    /// - [`StoreError::Reducer`] / [`StoreError::ReducerPanicked`] if the fold fails (immediate mode)
    pub async fn dispatch(&self, action: Action<P>, mode: DispatchMode) -> Result<(), StoreError> {
        match mode {
            DispatchMode::Queued => self.enqueue(action),
            DispatchMode::Immediate => self.dispatch_now(action).await.map(|_| ()),
        }
    }

    /// Queue an action for the background worker; never blocks
    ///
    /// # Errors
    ///
    /// - [`StoreError::NotStarted`] before the worker was started
    /// - [`StoreError::Stopped`] after [`stop`](Self::stop)
    /// - [`StoreError::QueueFull`] when a bounded queue is full
    pub fn enqueue(&self, action: Action<P>) -> Result<(), StoreError> {
        let name = tracing::enabled!(tracing::Level::TRACE).then(|| action.name().to_string());

        self.inner.dispatcher.enqueue(action).inspect_err(|error| {
            StoreMetrics::record_error(error.kind());
            tracing::warn!(error = %error, "Rejected queued action");
        })?;

        StoreMetrics::record_dispatch(DispatchMode::Queued.as_str());
        if let Some(name) = name {
            tracing::trace!(action = %name, "Action queued");
        }
        Ok(())
    }

    /// Run the reduce cycle for `action` on the caller's task
    ///
    /// Returns the state published by this cycle. Concurrent immediate
    /// dispatches and the background worker are serialized from state
    /// capture through publish.
    ///
    /// # Errors
    ///
    /// - [`StoreError::NotStarted`] / [`StoreError::Stopped`] if the worker is not running
    /// - [`StoreError::Reducer`] / [`StoreError::ReducerPanicked`] if the fold fails;
    ///   the previous state stays published
    pub async fn dispatch_now(&self, action: Action<P>) -> Result<Arc<S>, StoreError> {
        match self.worker_state() {
            WorkerState::Idle => return Err(StoreError::NotStarted),
            WorkerState::Stopped => return Err(StoreError::Stopped),
            WorkerState::Running => {},
        }

        StoreMetrics::record_dispatch(DispatchMode::Immediate.as_str());
        self.reduce(action).await.inspect_err(|error| {
            StoreMetrics::record_error(error.kind());
            tracing::debug!(error = %error, "Immediate dispatch failed");
        })
    }

    /// Snapshot of the current state
    #[must_use]
    pub fn state(&self) -> Arc<S> {
        Arc::clone(&self.inner.state.borrow())
    }

    /// Observe published states asynchronously
    ///
    /// The receiver always holds the latest published state; intermediate
    /// states may be skipped by a slow consumer. Use a [`StateListener`] to
    /// see every transition.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Arc<S>> {
        self.inner.state.subscribe()
    }

    /// The configuration this store was built with
    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    /// Failures of queued actions
    #[must_use]
    pub fn failed_actions(&self) -> FailedActionLog {
        self.inner.failed.clone()
    }

    /// Append a reducer to the fold; returns `false` if already registered
    pub fn add_reducer(&self, reducer: Arc<dyn Reducer<S, P>>) -> bool {
        self.inner.reducers.add(reducer)
    }

    /// Remove a reducer; returns `false` if it was not registered
    pub fn remove_reducer(&self, reducer: &Arc<dyn Reducer<S, P>>) -> bool {
        self.inner.reducers.remove(reducer)
    }

    /// Register a middleware; returns `false` if already registered
    pub fn add_middleware(&self, middleware: Arc<dyn Middleware<S, P>>) -> bool {
        self.inner.middlewares.add(middleware)
    }

    /// Remove a middleware; returns `false` if it was not registered
    pub fn remove_middleware(&self, middleware: &Arc<dyn Middleware<S, P>>) -> bool {
        self.inner.middlewares.remove(middleware)
    }

    /// Register a listener; returns `false` if already registered
    pub fn add_listener(&self, listener: Arc<dyn StateListener<S>>) -> bool {
        self.inner.listeners.add(listener)
    }

    /// Remove a listener; returns `false` if it was not registered
    pub fn remove_listener(&self, listener: &Arc<dyn StateListener<S>>) -> bool {
        self.inner.listeners.remove(listener)
    }

    /// Register an error observer; returns `false` if already registered
    pub fn add_error_observer(&self, observer: Arc<dyn ErrorObserver>) -> bool {
        self.inner.observers.add(observer)
    }

    /// Remove an error observer; returns `false` if it was not registered
    pub fn remove_error_observer(&self, observer: &Arc<dyn ErrorObserver>) -> bool {
        self.inner.observers.remove(observer)
    }

    /// Number of registered reducers
    #[must_use]
    pub fn reducer_count(&self) -> usize {
        self.inner.reducers.len()
    }

    /// Number of registered middlewares
    #[must_use]
    pub fn middleware_count(&self) -> usize {
        self.inner.middlewares.len()
    }

    /// Number of registered listeners
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.len()
    }

    /// Worker entry point for one queued action
    async fn process_queued(&self, action: Action<P>) {
        let name = action.name().to_string();
        if let Err(error) = self.reduce(action).await {
            self.inner.failed.push(&name, &error);
            self.report(error);
        }
    }

    /// One reduce cycle: capture, before-hooks, fold, publish, notify, after-hooks
    async fn reduce(&self, action: Action<P>) -> Result<Arc<S>, StoreError> {
        let span = tracing::debug_span!("reduce_cycle", action = %action.name());
        let started = Instant::now();
        let action = Arc::new(action);

        async move {
            let (old_state, new_state) = {
                let _cycle = self.inner.cycle.lock().await;

                let old_state = self.state();
                self.run_middlewares(Phase::Before, &old_state, &action).await;

                let reducers = self.inner.reducers.snapshot();
                let new_state = match fold_action(&reducers, &old_state, &action)? {
                    Some(state) => Arc::new(state),
                    None => Arc::clone(&old_state),
                };

                self.inner.state.send_replace(Arc::clone(&new_state));
                tracing::trace!(reducers = reducers.len(), "State published");
                (old_state, new_state)
            };

            let notified = self.notify_listeners(&old_state, &new_state, &action).await;
            self.run_middlewares(Phase::After, &new_state, &action).await;

            let elapsed = started.elapsed();
            StoreMetrics::record_cycle(elapsed, notified);
            if self.inner.config.debug {
                tracing::info!(
                    action = %action.name(),
                    elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                    notified,
                    "Reduce cycle completed"
                );
            }
            Ok(new_state)
        }
        .instrument(span)
        .await
    }

    async fn run_middlewares(&self, phase: Phase, state: &Arc<S>, action: &Arc<Action<P>>) {
        let middlewares = self.inner.middlewares.snapshot();
        if middlewares.is_empty() {
            return;
        }

        let hook_state = Arc::clone(state);
        let hook_action = Arc::clone(action);
        let outcomes = fan_out(middlewares, self.inner.config.fan_out_width, move |middleware| {
            phase.invoke(middleware, &*hook_state, &*hook_action)
        })
        .await;

        for (middleware, outcome) in outcomes {
            let error = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(source)) => StoreError::Middleware {
                    action: action.name().to_string(),
                    phase,
                    middleware: middleware.name().to_string(),
                    source,
                },
                Err(message) => StoreError::MiddlewarePanicked {
                    action: action.name().to_string(),
                    phase,
                    middleware: middleware.name().to_string(),
                    message,
                },
            };
            self.report(error);
        }
    }

    async fn notify_listeners(&self, old_state: &Arc<S>, new_state: &Arc<S>, action: &Action<P>) -> usize {
        let listeners = self.inner.listeners.snapshot();
        if listeners.is_empty() {
            return 0;
        }

        let old = Arc::clone(old_state);
        let new = Arc::clone(new_state);
        let outcomes = fan_out(listeners, self.inner.config.fan_out_width, move |listener| {
            let changed = listener.has_changed(&new, &old);
            if changed {
                listener.on_changed(&new);
            }
            changed
        })
        .await;

        let mut notified = 0;
        for (listener, outcome) in outcomes {
            match outcome {
                Ok(true) => notified += 1,
                Ok(false) => {},
                Err(message) => self.report(StoreError::ListenerPanicked {
                    action: action.name().to_string(),
                    listener: listener.name().to_string(),
                    message,
                }),
            }
        }
        tracing::trace!(notified, "Listeners notified");
        notified
    }

    /// Log an error, count it and hand it to every error observer
    fn report(&self, error: StoreError) {
        StoreMetrics::record_error(error.kind());
        if error.is_fatal_to_cycle() {
            tracing::error!(error = %error, "Reduce cycle failed");
        } else {
            tracing::warn!(error = %error, "Reduce cycle participant failed");
        }

        for observer in self.inner.observers.snapshot() {
            if catch_unwind(AssertUnwindSafe(|| observer.on_error(&error))).is_err() {
                tracing::error!("Error observer panicked");
            }
        }
    }
}

impl<S, P> Clone for Store<S, P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S, P> std::fmt::Debug for Store<S, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("worker", &self.inner.dispatcher.state())
            .field("pending", &self.inner.dispatcher.pending())
            .field("reducers", &self.inner.reducers.len())
            .field("middlewares", &self.inner.middlewares.len())
            .field("listeners", &self.inner.listeners.len())
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

/// The worker holds only a weak handle so dropping every `Store` ends it
fn worker_handler<S, P>(store: Weak<Inner<S, P>>) -> Handler<Action<P>>
where
    S: Send + Sync + 'static,
    P: Send + Sync + 'static,
{
    Arc::new(move |action| {
        let store = store.upgrade().map(|inner| Store { inner });
        async move {
            match store {
                Some(store) => store.process_queued(action).await,
                None => tracing::debug!(action = %action.name(), "Store dropped, discarding queued action"),
            }
        }
        .boxed()
    })
}

/// Fold through the reducer snapshot, converting errors and panics
fn fold_action<S, P>(
    reducers: &[Arc<dyn Reducer<S, P>>],
    state: &S,
    action: &Action<P>,
) -> Result<Option<S>, StoreError> {
    match catch_unwind(AssertUnwindSafe(|| fold_reducers(reducers, state, action))) {
        Ok(Ok(folded)) => Ok(folded),
        Ok(Err(source)) => Err(StoreError::Reducer {
            action: action.name().to_string(),
            source,
        }),
        Err(payload) => Err(StoreError::ReducerPanicked {
            action: action.name().to_string(),
            message: panic_message(payload.as_ref()),
        }),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Mutex poison is unrecoverable in tests
mod tests {
    use super::*;
    use statecraft_core::{ReducerError, on_change, reducer_fn, try_reducer_fn};
    use std::sync::Mutex as StdMutex;

    fn adder() -> Arc<dyn Reducer<i64, i64>> {
        Arc::new(reducer_fn(|s: &i64, a: &Action<i64>| s + a.payload()))
    }

    #[test]
    fn test_dispatch_mode_labels() {
        assert_eq!(DispatchMode::default(), DispatchMode::Queued);
        assert_eq!(DispatchMode::Queued.as_str(), "queued");
        assert_eq!(DispatchMode::Immediate.as_str(), "immediate");
    }

    #[test]
    fn test_store_without_runtime_is_not_started() {
        let store: Store<i64, i64> = Store::new(0);
        assert_eq!(store.worker_state(), WorkerState::Idle);
        assert!(matches!(store.enqueue(Action::new("add", 1)), Err(StoreError::NotStarted)));
    }

    #[tokio::test]
    async fn test_dispatch_now_returns_published_state() -> Result<(), StoreError> {
        let store = Store::new(10_i64);
        store.add_reducer(adder());

        let state = store.dispatch_now(Action::new("add", 5)).await?;
        assert_eq!(*state, 15);
        assert_eq!(*store.state(), 15);
        Ok(())
    }

    #[tokio::test]
    async fn test_no_reducers_republishes_same_snapshot() -> Result<(), StoreError> {
        let store: Store<i64, i64> = Store::new(7);
        let before = store.state();

        let after = store.dispatch_now(Action::new("noop", 0)).await?;
        assert!(Arc::ptr_eq(&before, &after));
        Ok(())
    }

    #[tokio::test]
    async fn test_reducer_error_keeps_previous_state() {
        let store = Store::new(1_i64);
        store.add_reducer(Arc::new(try_reducer_fn(|_: &i64, _: &Action<i64>| {
            Err(ReducerError::new("rejected"))
        })));

        let result = store.dispatch_now(Action::new("bad", 1)).await;
        assert!(matches!(result, Err(StoreError::Reducer { ref action, .. }) if action == "bad"));
        assert_eq!(*store.state(), 1);
    }

    #[tokio::test]
    async fn test_queued_failure_reaches_observer_and_log() {
        let store = Store::new(0_i64);
        store.add_reducer(Arc::new(try_reducer_fn(|s: &i64, a: &Action<i64>| {
            if *a.payload() < 0 {
                Err(ReducerError::new("negative"))
            } else {
                Ok(s + a.payload())
            }
        })));

        let kinds = Arc::new(StdMutex::new(Vec::new()));
        let sink = Arc::clone(&kinds);
        store.add_error_observer(Arc::new(move |error: &StoreError| {
            sink.lock().unwrap().push(error.kind());
        }));

        store.enqueue(Action::new("add", 2)).unwrap();
        store.enqueue(Action::new("add", -1)).unwrap();
        store.enqueue(Action::new("add", 3)).unwrap();
        store.flush().await;

        assert_eq!(*store.state(), 5);
        assert_eq!(*kinds.lock().unwrap(), vec!["reducer"]);
        assert_eq!(store.failed_actions().latest().map(|f| f.action), Some("add".to_string()));
    }

    #[tokio::test]
    async fn test_reducer_panic_is_contained() {
        let store = Store::new(0_i64);
        #[allow(clippy::panic)] // Intentional panic for testing error handling
        store.add_reducer(Arc::new(reducer_fn(|_: &i64, _: &Action<i64>| -> i64 {
            panic!("reducer exploded")
        })));

        let result = store.dispatch_now(Action::new("boom", 0)).await;
        assert!(
            matches!(result, Err(StoreError::ReducerPanicked { ref message, .. }) if message == "reducer exploded")
        );
        assert_eq!(*store.state(), 0);
    }

    #[tokio::test]
    async fn test_listener_skipped_when_state_unchanged() -> Result<(), StoreError> {
        let store = Store::new(0_i64);
        store.add_reducer(adder());

        let calls = Arc::new(StdMutex::new(Vec::new()));
        let sink = Arc::clone(&calls);
        store.add_listener(Arc::new(on_change(move |s: &i64| sink.lock().unwrap().push(*s))));

        store.dispatch_now(Action::new("add", 0)).await?;
        store.dispatch_now(Action::new("add", 4)).await?;
        assert_eq!(*calls.lock().unwrap(), vec![4]);
        Ok(())
    }

    #[tokio::test]
    async fn test_debug_mode_registers_observer() -> Result<(), StoreError> {
        let store: Store<i64, i64> = Store::with_config(0, StoreConfig::default().with_debug(true));
        assert_eq!(store.middleware_count(), 1);
        assert_eq!(store.listener_count(), 1);

        store.dispatch_now(Action::new("noop", 0)).await?;
        let observer = store.debug_observer().unwrap();
        assert_eq!(observer.cycles_finished(), 1);

        let plain: Store<i64, i64> = Store::new(0);
        assert!(plain.debug_observer().is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_stopped_store_rejects_both_modes() {
        let store = Store::new(0_i64);
        store.add_reducer(adder());
        assert!(store.stop());
        store.stopped().await;

        assert!(matches!(store.enqueue(Action::new("add", 1)), Err(StoreError::Stopped)));
        assert!(matches!(
            store.dispatch(Action::new("add", 1), DispatchMode::Immediate).await,
            Err(StoreError::Stopped)
        ));
        assert!(!store.is_running());
    }

    #[tokio::test]
    async fn test_debug_output_reports_worker_and_registries() {
        let store = Store::new(0_i64);
        store.add_reducer(adder());

        let rendered = format!("{store:?}");
        assert!(rendered.starts_with("Store {"));
        assert!(rendered.contains("worker: Running"));
        assert!(rendered.contains("pending: 0"));
        assert!(rendered.contains("reducers: 1"));
    }

    #[tokio::test]
    async fn test_clones_share_state() -> Result<(), StoreError> {
        let store = Store::new(0_i64);
        let other = store.clone();
        store.add_reducer(adder());

        other.dispatch_now(Action::new("add", 3)).await?;
        assert_eq!(*store.state(), 3);
        assert_eq!(other.reducer_count(), 1);
        Ok(())
    }
}
