//! # Statecraft Testing
//!
//! Testing utilities and helpers for Statecraft stores.
//!
//! This crate provides:
//! - Recording listeners and middlewares that capture what a store did
//! - Middlewares that fail or panic on demand
//! - An error observer that collects reported errors
//! - A Given-When-Then harness for reducers
//! - Property-based testing strategies
//! - An in-memory capture for `tracing` output
//!
//! ## Example
//!
//! ```ignore
//! use statecraft_testing::{ErrorCollector, RecordingListener};
//! use statecraft_runtime::Store;
//!
//! #[tokio::test]
//! async fn test_counter() {
//!     let store = Store::new(0_i64);
//!     store.add_reducer(Arc::new(reducer_fn(|s: &i64, a: &Action<i64>| s + a.payload())));
//!
//!     let recorder = Arc::new(RecordingListener::when_changed());
//!     store.add_listener(recorder.clone());
//!
//!     store.enqueue(Action::new("add", 1))?;
//!     store.flush().await;
//!
//!     assert_eq!(recorder.states(), vec![1]);
//! }
//! ```

/// Recording and failing collaborators
pub mod mocks;


/// Property-based testing utilities using proptest.
pub mod properties {
    use proptest::collection::vec;
    use proptest::prelude::*;
    use statecraft_core::Action;

    /// A sequence of `add` actions with small payloads
    pub fn add_actions(max_len: usize) -> impl Strategy<Value = Vec<Action<i64>>> {
        vec(-1_000_i64..1_000, 0..max_len)
            .prop_map(|payloads| payloads.into_iter().map(|p| Action::new("add", p)).collect())
    }

    /// A sequence of distinct, tagged actions: payload `i` at position `i`
    pub fn tagged_actions(max_len: usize) -> impl Strategy<Value = Vec<Action<usize>>> {
        (0..max_len).prop_map(|len| (0..len).map(|i| Action::new("tag", i)).collect())
    }
}

/// Test helpers and utilities.
pub mod helpers {
    use std::io;
    use std::sync::{Arc, Mutex, Once, PoisonError};
    use tracing_subscriber::fmt::MakeWriter;
    use tracing_subscriber::util::SubscriberInitExt;

    static TRACING: Once = Once::new();

    /// Install a `tracing` subscriber that writes through the test harness
    ///
    /// Honors `RUST_LOG`; defaults to `warn`. Safe to call from every test.
    pub fn init_test_tracing() {
        TRACING.call_once(|| {
            let filter = tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_test_writer()
                .try_init();
        });
    }

    /// In-memory sink for formatted `tracing` output
    ///
    /// # Example
    ///
    /// ```ignore
    /// let logs = LogCapture::new();
    /// let _guard = logs.install();
    /// store.dispatch_now(Action::new("add", 1)).await?;
    /// assert_eq!(logs.lines_containing("Reduce cycle completed").len(), 1);
    /// ```
    #[derive(Debug, Clone, Default)]
    pub struct LogCapture {
        buffer: Arc<Mutex<Vec<u8>>>,
    }

    impl LogCapture {
        /// Create an empty capture
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Route `info` and above on this thread into the capture
        ///
        /// Events are captured until the returned guard is dropped. Use it
        /// with a current-thread runtime so spawned tasks log here too.
        #[must_use]
        pub fn install(&self) -> tracing::subscriber::DefaultGuard {
            tracing_subscriber::fmt()
                .with_writer(self.clone())
                .with_max_level(tracing::Level::INFO)
                .with_ansi(false)
                .without_time()
                .set_default()
        }

        /// Everything captured so far
        #[must_use]
        pub fn contents(&self) -> String {
            let buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
            String::from_utf8_lossy(&buffer).into_owned()
        }

        /// Captured lines that contain `needle`
        #[must_use]
        pub fn lines_containing(&self, needle: &str) -> Vec<String> {
            self.contents()
                .lines()
                .filter(|line| line.contains(needle))
                .map(str::to_string)
                .collect()
        }
    }

    impl io::Write for LogCapture {
        fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
            self.buffer
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .extend_from_slice(bytes);
            Ok(bytes.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for LogCapture {
        type Writer = Self;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }
}

// Re-export commonly used items
pub use helpers::{LogCapture, init_test_tracing};
pub use mocks::{
    CollectedError, ErrorCollector, FailingMiddleware, Failure, HookCall, RecordingListener,
    RecordingMiddleware,
};
pub use reducer_test::ReducerTest;

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn tagged_actions_are_numbered_in_order(actions in properties::tagged_actions(32)) {
            for (i, action) in actions.iter().enumerate() {
                prop_assert_eq!(*action.payload(), i);
            }
        }
    }

    #[test]
    fn test_log_capture_collects_events_while_installed() {
        let logs = LogCapture::new();
        {
            let _guard = logs.install();
            tracing::info!(answer = 42, "captured event");
            tracing::debug!("below the capture level");
        }
        tracing::info!("after the guard");

        let lines = logs.lines_containing("captured event");
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("answer=42"));
        assert!(logs.lines_containing("below the capture level").is_empty());
        assert!(logs.lines_containing("after the guard").is_empty());
    }

    #[test]
    fn test_init_test_tracing_is_idempotent() {
        init_test_tracing();
        init_test_tracing();
    }
}
