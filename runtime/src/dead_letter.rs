//! Bounded log of failed queued actions.
//!
//! When a queued action's reduce cycle fails there is no caller to return
//! the error to. Besides notifying error observers, the store records the
//! failure here so it can be inspected later. Actions themselves are not
//! retained; only their name and the error text.

use crate::StoreError;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

/// One failed reduce cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedAction {
    /// Name of the action
    pub action: String,
    /// Rendered error
    pub error: String,
    /// Metrics label of the error kind
    pub kind: &'static str,
    /// When the failure was recorded
    pub failed_at: DateTime<Utc>,
}

/// Bounded FIFO of failed actions; the oldest entry is dropped when full
///
/// Cloning yields another handle to the same log.
///
/// # Example
///
/// ```
/// use statecraft_runtime::{FailedActionLog, StoreError};
///
/// let log = FailedActionLog::new(2);
/// log.push("a", &StoreError::Stopped);
/// log.push("b", &StoreError::Stopped);
/// log.push("c", &StoreError::Stopped);
///
/// let names: Vec<_> = log.drain().into_iter().map(|f| f.action).collect();
/// assert_eq!(names, ["b", "c"]);
/// ```
#[derive(Debug, Clone)]
pub struct FailedActionLog {
    entries: Arc<Mutex<VecDeque<FailedAction>>>,
    max_size: usize,
}

impl FailedActionLog {
    /// Create a log keeping at most `max_size` entries
    ///
    /// # Arguments
    ///
    /// - `max_size`: Maximum number of entries to keep; 0 disables the log
    ///
    /// # Returns
    ///
    /// A new empty `FailedActionLog`
    #[must_use]
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: Arc::new(Mutex::new(VecDeque::new())),
            max_size,
        }
    }

    /// Record a failure
    ///
    /// If the log is full, the oldest entry is dropped.
    ///
    /// # Arguments
    ///
    /// - `action`: Name of the action whose cycle failed
    /// - `error`: The error reported for that cycle
    pub fn push(&self, action: &str, error: &StoreError) {
        if self.max_size == 0 {
            return;
        }

        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if entries.len() >= self.max_size {
            entries.pop_front();
            metrics::counter!("statecraft_failed_actions_dropped_total").increment(1);
            tracing::warn!(
                max_size = self.max_size,
                "Failed-action log at capacity, dropping oldest entry"
            );
        }

        entries.push_back(FailedAction {
            action: action.to_string(),
            error: error.to_string(),
            kind: error.kind(),
            failed_at: Utc::now(),
        });
    }

    /// Number of recorded failures
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether nothing has failed (or everything was drained)
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Most recent failure
    #[must_use]
    pub fn latest(&self) -> Option<FailedAction> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .back()
            .cloned()
    }

    /// Remove and return all entries, oldest first
    pub fn drain(&self) -> Vec<FailedAction> {
        let entries: Vec<_> = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();

        tracing::debug!(count = entries.len(), "Drained failed-action log");
        entries
    }

    /// Maximum number of entries kept
    #[must_use]
    pub const fn max_size(&self) -> usize {
        self.max_size
    }
}

impl Default for FailedActionLog {
    fn default() -> Self {
        Self::new(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use statecraft_core::ReducerError;

    #[test]
    fn test_records_error_details() {
        let log = FailedActionLog::default();
        log.push(
            "withdraw",
            &StoreError::Reducer {
                action: "withdraw".into(),
                source: ReducerError::new("insufficient funds"),
            },
        );

        let latest = log.latest();
        assert_eq!(latest.as_ref().map(|f| f.kind), Some("reducer"));
        assert_eq!(
            latest.map(|f| f.error),
            Some("Reducer failed on action 'withdraw': insufficient funds".to_string())
        );
    }

    #[test]
    fn test_zero_capacity_records_nothing() {
        let log = FailedActionLog::new(0);
        log.push("a", &StoreError::Stopped);
        assert!(log.is_empty());
    }

    #[test]
    fn test_clones_share_entries() {
        let log = FailedActionLog::new(4);
        let other = log.clone();
        log.push("a", &StoreError::Stopped);
        assert_eq!(other.len(), 1);
        assert_eq!(other.drain().len(), 1);
        assert!(log.is_empty());
    }
}
