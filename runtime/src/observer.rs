//! Error observers.
//!
//! Failures that do not reach a caller - reducer errors on the queued path,
//! and every middleware or listener failure - are delivered to the store's
//! registered [`ErrorObserver`]s. Observers run synchronously on the thread
//! that detected the failure and should return quickly.

use crate::StoreError;

/// Receives errors that the store could not return to a caller
pub trait ErrorObserver: Send + Sync {
    /// Called once per reported error
    fn on_error(&self, error: &StoreError);
}

impl<F> ErrorObserver for F
where
    F: Fn(&StoreError) + Send + Sync,
{
    fn on_error(&self, error: &StoreError) {
        self(error);
    }
}
