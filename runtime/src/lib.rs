//! # Statecraft Runtime
//!
//! Runtime for the Statecraft state container.
//!
//! This crate provides the [`Store`]: it owns the current state, the
//! reducer/middleware/listener registries and a [`Dispatcher`] that drains
//! queued actions on a single background worker.
//!
//! ## Core Components
//!
//! - **Store**: owns state, registries and the reduce pipeline
//! - **Dispatcher**: FIFO action queue plus one worker, giving queued actions a total order
//! - **Registry**: lock-guarded, insertion-ordered membership used for every collaborator set
//! - **Fan-out**: runs middlewares and listeners in parallel on the blocking pool, isolating panics
//!
//! ## The reduce cycle
//!
//! For every action, exactly once, regardless of dispatch mode:
//!
//! 1. capture the current state
//! 2. run every middleware's `before` hook in parallel, then wait for all of them
//! 3. fold the action through the reducers, in registration order
//! 4. publish the result
//! 5. notify every listener whose `has_changed(new, old)` holds, in parallel
//! 6. run every middleware's `after` hook in parallel
//!
//! Steps 1 to 4 hold the store's cycle lock, so an immediate dispatch and the
//! background worker can never interleave their capture and publish.
//!
//! ## Example
//!
//! ```no_run
//! use statecraft_core::{on_change, reducer_fn, Action};
//! use statecraft_runtime::{DispatchMode, Store};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), statecraft_runtime::StoreError> {
//! let store = Store::new(0_i64);
//! store.add_reducer(Arc::new(reducer_fn(|s: &i64, a: &Action<i64>| s + a.payload())));
//! store.add_listener(Arc::new(on_change(|s: &i64| println!("state = {s}"))));
//!
//! store.dispatch(Action::new("add", 2), DispatchMode::Queued).await?;
//! store.flush().await;
//! assert_eq!(*store.state(), 2);
//! # Ok(())
//! # }
//! ```

/// Listener bindings that unregister on drop
pub mod binding;

/// Store configuration
pub mod config;

/// Diagnostic middleware/listener registered in debug mode
pub mod debug;

/// Bounded log of actions whose queued reduce cycle failed
pub mod dead_letter;

/// FIFO action queue with a single background worker
pub mod dispatcher;

/// Prometheus metrics for observability
pub mod metrics;

/// Error observers
pub mod observer;

/// Lock-guarded collaborator registries
pub mod registry;

/// The Store and its reduce pipeline
pub mod store;

mod fanout;

/// Error types for the Store runtime
pub mod error {
    use statecraft_core::{MiddlewareError, Phase, ReducerError};
    use thiserror::Error;

    /// Errors that can occur during Store operations
    ///
    /// Reducer failures abort the reduce cycle and leave the previous state
    /// published. Middleware and listener failures are isolated to the
    /// participant that raised them and never stop the cycle.
    #[derive(Error, Debug)]
    pub enum StoreError {
        /// A reducer returned an error; state was not published
        #[error("Reducer failed on action '{action}': {source}")]
        Reducer {
            /// Name of the action being reduced
            action: String,
            /// The reducer's error
            #[source]
            source: ReducerError,
        },

        /// A reducer panicked; state was not published
        #[error("Reducer panicked on action '{action}': {message}")]
        ReducerPanicked {
            /// Name of the action being reduced
            action: String,
            /// Panic payload, when it was a string
            message: String,
        },

        /// A middleware hook returned an error
        #[error("Middleware '{middleware}' failed in {phase} hook on action '{action}': {source}")]
        Middleware {
            /// Name of the action being reduced
            action: String,
            /// Hook that failed
            phase: Phase,
            /// Name of the failing middleware
            middleware: String,
            /// The middleware's error
            #[source]
            source: MiddlewareError,
        },

        /// A middleware hook panicked
        #[error("Middleware '{middleware}' panicked in {phase} hook on action '{action}': {message}")]
        MiddlewarePanicked {
            /// Name of the action being reduced
            action: String,
            /// Hook that panicked
            phase: Phase,
            /// Name of the panicking middleware
            middleware: String,
            /// Panic payload, when it was a string
            message: String,
        },

        /// A listener panicked while evaluating or handling a change
        #[error("Listener '{listener}' panicked on action '{action}': {message}")]
        ListenerPanicked {
            /// Name of the action whose transition was being notified
            action: String,
            /// Name of the panicking listener
            listener: String,
            /// Panic payload, when it was a string
            message: String,
        },

        /// Dispatch was attempted before the store's worker was started
        #[error("Store has not been started")]
        NotStarted,

        /// The worker could not be started because no Tokio runtime is running
        #[error("Store worker requires a running Tokio runtime")]
        NoRuntime,

        /// Dispatch was attempted after `stop()`
        #[error("Store has been stopped")]
        Stopped,

        /// The bounded action queue is full
        #[error("Action queue is full (capacity {capacity})")]
        QueueFull {
            /// Configured queue capacity
            capacity: usize,
        },
    }

    impl StoreError {
        /// Whether this error aborted a reduce cycle (state left unpublished)
        #[must_use]
        pub const fn is_fatal_to_cycle(&self) -> bool {
            matches!(self, Self::Reducer { .. } | Self::ReducerPanicked { .. })
        }

        /// Whether this error reports misuse of the store lifecycle or queue
        #[must_use]
        pub const fn is_configuration(&self) -> bool {
            matches!(
                self,
                Self::NotStarted | Self::NoRuntime | Self::Stopped | Self::QueueFull { .. }
            )
        }

        /// Name of the action involved, if any
        #[must_use]
        pub fn action(&self) -> Option<&str> {
            match self {
                Self::Reducer { action, .. }
                | Self::ReducerPanicked { action, .. }
                | Self::Middleware { action, .. }
                | Self::MiddlewarePanicked { action, .. }
                | Self::ListenerPanicked { action, .. } => Some(action),
                Self::NotStarted | Self::NoRuntime | Self::Stopped | Self::QueueFull { .. } => {
                    None
                },
            }
        }

        /// Short, stable label used for metrics
        #[must_use]
        pub const fn kind(&self) -> &'static str {
            match self {
                Self::Reducer { .. } => "reducer",
                Self::ReducerPanicked { .. } => "reducer_panic",
                Self::Middleware { .. } => "middleware",
                Self::MiddlewarePanicked { .. } => "middleware_panic",
                Self::ListenerPanicked { .. } => "listener_panic",
                Self::NotStarted => "not_started",
                Self::NoRuntime => "no_runtime",
                Self::Stopped => "stopped",
                Self::QueueFull { .. } => "queue_full",
            }
        }
    }
}

pub use binding::ListenerBinding;
pub use config::{ConfigError, StoreConfig};
pub use dead_letter::{FailedAction, FailedActionLog};
pub use debug::DebugObserver;
pub use dispatcher::{Dispatcher, WorkerState};
pub use error::StoreError;
pub use observer::ErrorObserver;
pub use registry::Registry;
pub use store::{DispatchMode, Store};
