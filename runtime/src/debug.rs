//! Diagnostic observer registered by stores built with `debug = true`.
//!
//! [`DebugObserver`] is an ordinary collaborator: it implements both
//! [`Middleware`] and [`StateListener`] and only logs. It carries no
//! transition logic and can be registered by hand on any store.

use statecraft_core::{Action, Middleware, MiddlewareError, StateListener};
use std::sync::atomic::{AtomicU64, Ordering};

/// Logs every reduce cycle at `debug` level
#[derive(Debug, Default)]
pub struct DebugObserver {
    started: AtomicU64,
    finished: AtomicU64,
    published: AtomicU64,
}

impl DebugObserver {
    /// Create a new observer
    #[must_use]
    pub const fn new() -> Self {
        Self {
            started: AtomicU64::new(0),
            finished: AtomicU64::new(0),
            published: AtomicU64::new(0),
        }
    }

    /// Cycles whose `before` phase reached this observer
    #[must_use]
    pub fn cycles_started(&self) -> u64 {
        self.started.load(Ordering::Relaxed)
    }

    /// Cycles whose `after` phase reached this observer
    #[must_use]
    pub fn cycles_finished(&self) -> u64 {
        self.finished.load(Ordering::Relaxed)
    }

    /// Published states this observer was notified about
    #[must_use]
    pub fn states_published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }
}

impl<S, P> Middleware<S, P> for DebugObserver {
    fn name(&self) -> &str {
        "debug"
    }

    fn before(&self, _state: &S, action: &Action<P>) -> Result<(), MiddlewareError> {
        let cycle = self.started.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::debug!(action = %action.name(), cycle, "Action entering reduce cycle");
        Ok(())
    }

    fn after(&self, _state: &S, action: &Action<P>) -> Result<(), MiddlewareError> {
        let cycle = self.finished.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::debug!(action = %action.name(), cycle, "Action left reduce cycle");
        Ok(())
    }
}

impl<S> StateListener<S> for DebugObserver {
    fn name(&self) -> &str {
        "debug"
    }

    fn has_changed(&self, _new_state: &S, _old_state: &S) -> bool {
        true
    }

    fn on_changed(&self, _state: &S) {
        let published = self.published.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::debug!(published, "State published");
    }
}
