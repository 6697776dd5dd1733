//! Recording and failing collaborators for store tests.
//!
//! All of them are `Send + Sync` and record behind a mutex, so they can be
//! registered on a store and inspected from the test body while the worker
//! runs.

use statecraft_core::{Action, Middleware, MiddlewareError, Phase, StateListener};
use statecraft_runtime::{ErrorObserver, StoreError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// Listener that records every state it is notified with
///
/// # Example
///
/// ```ignore
/// let recorder = Arc::new(RecordingListener::new());
/// store.add_listener(recorder.clone());
/// store.dispatch_now(Action::new("add", 1)).await?;
/// assert_eq!(recorder.states(), vec![1]);
/// ```
pub struct RecordingListener<S> {
    name: String,
    changed: fn(&S, &S) -> bool,
    states: Mutex<Vec<S>>,
}

impl<S: Clone> RecordingListener<S> {
    /// Record every published state, changed or not
    #[must_use]
    pub fn new() -> Self {
        Self::with_predicate(|_, _| true)
    }

    /// Record only states that differ from the previous one
    #[must_use]
    pub fn when_changed() -> Self
    where
        S: PartialEq,
    {
        Self::with_predicate(|new_state, old_state| new_state != old_state)
    }

    /// Record states for which `changed(new, old)` holds
    #[must_use]
    pub fn with_predicate(changed: fn(&S, &S) -> bool) -> Self {
        Self {
            name: "recording-listener".to_string(),
            changed,
            states: Mutex::new(Vec::new()),
        }
    }

    /// Rename the listener (shows up in error reports)
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// States received so far, in notification order
    #[must_use]
    pub fn states(&self) -> Vec<S> {
        self.lock().clone()
    }

    /// Most recent state received
    #[must_use]
    pub fn last(&self) -> Option<S> {
        self.lock().last().cloned()
    }

    /// Number of notifications received
    #[must_use]
    pub fn count(&self) -> usize {
        self.lock().len()
    }

    /// Forget everything recorded
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Wait until at least `count` notifications arrived
    ///
    /// Returns `false` if `timeout` elapsed first.
    pub async fn wait_for(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.count() < count {
            if Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        true
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<S>> {
        self.states.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<S: Clone> Default for RecordingListener<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> StateListener<S> for RecordingListener<S>
where
    S: Clone + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn has_changed(&self, new_state: &S, old_state: &S) -> bool {
        (self.changed)(new_state, old_state)
    }

    fn on_changed(&self, state: &S) {
        self.states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(state.clone());
    }
}

/// One middleware hook invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookCall<S> {
    /// Which hook ran
    pub phase: Phase,
    /// Name of the action
    pub action: String,
    /// State the hook was given
    pub state: S,
}

/// Middleware that records every hook invocation
pub struct RecordingMiddleware<S> {
    name: String,
    calls: Mutex<Vec<HookCall<S>>>,
}

impl<S: Clone> RecordingMiddleware<S> {
    /// Create a recorder named `recording-middleware`
    #[must_use]
    pub fn new() -> Self {
        Self::named("recording-middleware")
    }

    /// Create a recorder with a custom name
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Every invocation so far
    #[must_use]
    pub fn calls(&self) -> Vec<HookCall<S>> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Invocations of one phase
    #[must_use]
    pub fn calls_in(&self, phase: Phase) -> Vec<HookCall<S>> {
        self.calls()
            .into_iter()
            .filter(|call| call.phase == phase)
            .collect()
    }

    /// Number of invocations of one phase
    #[must_use]
    pub fn count(&self, phase: Phase) -> usize {
        self.calls_in(phase).len()
    }

    fn record<P>(&self, phase: Phase, state: &S, action: &Action<P>) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(HookCall {
                phase,
                action: action.name().to_string(),
                state: state.clone(),
            });
    }
}

impl<S: Clone> Default for RecordingMiddleware<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S, P> Middleware<S, P> for RecordingMiddleware<S>
where
    S: Clone + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn before(&self, state: &S, action: &Action<P>) -> Result<(), MiddlewareError> {
        self.record(Phase::Before, state, action);
        Ok(())
    }

    fn after(&self, state: &S, action: &Action<P>) -> Result<(), MiddlewareError> {
        self.record(Phase::After, state, action);
        Ok(())
    }
}

/// How a [`FailingMiddleware`] misbehaves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    /// Return an error from the hook
    Error,
    /// Panic inside the hook
    Panic,
}

/// Middleware that fails in one phase and succeeds in the other
pub struct FailingMiddleware {
    name: String,
    phase: Phase,
    failure: Failure,
    invocations: AtomicUsize,
}

impl FailingMiddleware {
    /// Return an error from the `phase` hook
    #[must_use]
    pub fn erroring(phase: Phase) -> Self {
        Self::new(phase, Failure::Error)
    }

    /// Panic in the `phase` hook
    #[must_use]
    pub fn panicking(phase: Phase) -> Self {
        Self::new(phase, Failure::Panic)
    }

    fn new(phase: Phase, failure: Failure) -> Self {
        Self {
            name: "failing-middleware".to_string(),
            phase,
            failure,
            invocations: AtomicUsize::new(0),
        }
    }

    /// Rename the middleware (shows up in error reports)
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Number of times the failing hook ran
    #[must_use]
    pub fn invocations(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }

    #[allow(clippy::panic)] // Intentional panic for testing error handling
    fn fail(&self, phase: Phase) -> Result<(), MiddlewareError> {
        if phase != self.phase {
            return Ok(());
        }
        self.invocations.fetch_add(1, Ordering::SeqCst);
        match self.failure {
            Failure::Error => Err(MiddlewareError::new(format!("{} failed in {phase}", self.name))),
            Failure::Panic => panic!("{} panicked in {phase}", self.name),
        }
    }
}

impl<S, P> Middleware<S, P> for FailingMiddleware {
    fn name(&self) -> &str {
        &self.name
    }

    fn before(&self, _state: &S, _action: &Action<P>) -> Result<(), MiddlewareError> {
        self.fail(Phase::Before)
    }

    fn after(&self, _state: &S, _action: &Action<P>) -> Result<(), MiddlewareError> {
        self.fail(Phase::After)
    }
}

/// A reported error, reduced to comparable parts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectedError {
    /// Metrics label of the error kind
    pub kind: &'static str,
    /// Action the error belongs to, if any
    pub action: Option<String>,
    /// Rendered error
    pub message: String,
}

/// Error observer that keeps every error it sees
#[derive(Debug, Default)]
pub struct ErrorCollector {
    errors: Mutex<Vec<CollectedError>>,
}

impl ErrorCollector {
    /// Create an empty collector
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything collected so far
    #[must_use]
    pub fn errors(&self) -> Vec<CollectedError> {
        self.errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Kinds of the collected errors, in report order
    #[must_use]
    pub fn kinds(&self) -> Vec<&'static str> {
        self.errors().into_iter().map(|error| error.kind).collect()
    }

    /// Number of collected errors
    #[must_use]
    pub fn len(&self) -> usize {
        self.errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no error was reported
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ErrorObserver for ErrorCollector {
    fn on_error(&self, error: &StoreError) {
        self.errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(CollectedError {
                kind: error.kind(),
                action: error.action().map(str::to_string),
                message: error.to_string(),
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_listener_predicates() {
        let always = RecordingListener::<u8>::new();
        let changed = RecordingListener::<u8>::when_changed();

        assert!(always.has_changed(&1, &1));
        assert!(!changed.has_changed(&1, &1));
        assert!(changed.has_changed(&2, &1));

        changed.on_changed(&2);
        assert_eq!(changed.states(), vec![2]);
        assert_eq!(changed.last(), Some(2));
    }

    #[test]
    fn test_recording_listener_name_and_clear() {
        let recorder = RecordingListener::<u8>::new().named("watcher");
        assert_eq!(StateListener::name(&recorder), "watcher");

        recorder.on_changed(&1);
        recorder.on_changed(&2);
        recorder.clear();
        assert_eq!(recorder.count(), 0);
        assert_eq!(recorder.last(), None);
    }

    #[tokio::test]
    async fn test_wait_for_times_out_without_notifications() {
        let recorder = RecordingListener::<u8>::new();
        recorder.on_changed(&1);

        assert!(recorder.wait_for(1, Duration::from_millis(10)).await);
        assert!(!recorder.wait_for(2, Duration::from_millis(10)).await);
    }

    #[test]
    fn test_recording_middleware_records_phases() -> Result<(), MiddlewareError> {
        let recorder = RecordingMiddleware::<u8>::new();
        let action = Action::named("tick");

        Middleware::<u8, ()>::before(&recorder, &0, &action)?;
        Middleware::<u8, ()>::after(&recorder, &1, &action)?;

        assert_eq!(recorder.count(Phase::Before), 1);
        assert_eq!(recorder.calls_in(Phase::After)[0].state, 1);
        Ok(())
    }

    #[test]
    fn test_failing_middleware_only_fails_its_phase() {
        let failing = FailingMiddleware::erroring(Phase::After).named("audit");
        let action = Action::named("tick");

        assert!(Middleware::<u8, ()>::before(&failing, &0, &action).is_ok());
        let error = Middleware::<u8, ()>::after(&failing, &0, &action);
        assert_eq!(
            error.map_err(|e| e.to_string()),
            Err("audit failed in after".to_string())
        );
        assert_eq!(failing.invocations(), 1);
    }

    #[test]
    fn test_error_collector() {
        let collector = ErrorCollector::new();
        collector.on_error(&StoreError::QueueFull { capacity: 2 });

        assert_eq!(collector.kinds(), vec!["queue_full"]);
        assert_eq!(collector.errors()[0].action, None);
    }
}
