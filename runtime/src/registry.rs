//! Lock-guarded collaborator registries.
//!
//! Every collaborator set a store owns (reducers, middlewares, listeners,
//! error observers) is a [`Registry`]. Membership is keyed on `Arc`
//! identity, so adding the same `Arc` twice is a no-op and removal needs the
//! exact handle that was added.
//!
//! Iteration never happens under the lock: callers take a [`snapshot`]
//! and work on that, which lets a participant add or remove entries (even
//! itself) while it is being invoked.
//!
//! [`snapshot`]: Registry::snapshot

use std::sync::{Arc, PoisonError, RwLock};

/// Insertion-ordered set of shared collaborators
pub struct Registry<T: ?Sized> {
    entries: RwLock<Vec<Arc<T>>>,
}

impl<T: ?Sized> Registry<T> {
    /// Create an empty registry
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Add an entry; returns `false` if this exact `Arc` is already registered
    pub fn add(&self, entry: Arc<T>) -> bool {
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        if entries.iter().any(|existing| same(existing, &entry)) {
            return false;
        }
        entries.push(entry);
        true
    }

    /// Remove an entry; returns `false` if it was not registered
    pub fn remove(&self, entry: &Arc<T>) -> bool {
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        let before = entries.len();
        entries.retain(|existing| !same(existing, entry));
        entries.len() != before
    }

    /// Copy of the current entries, in registration order
    #[must_use]
    pub fn snapshot(&self) -> Vec<Arc<T>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of registered entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether the registry is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: ?Sized> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> std::fmt::Debug for Registry<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry").field("len", &self.len()).finish()
    }
}

// Data-pointer comparison; vtable pointers of the same type may differ
// between codegen units.
fn same<T: ?Sized>(a: &Arc<T>, b: &Arc<T>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}
