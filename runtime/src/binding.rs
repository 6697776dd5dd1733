//! Listener bindings.
//!
//! A [`ListenerBinding`] registers a listener, hands it the current state
//! right away, and removes it again when the binding is dropped. Use it
//! when a listener's lifetime is tied to some other object (a view, a
//! connection, a test) rather than to the store.

use crate::Store;
use statecraft_core::StateListener;
use std::sync::Arc;

/// Keeps a listener registered for as long as the binding lives
///
/// # Example
///
/// ```ignore
/// let binding = ListenerBinding::bind(&store, Arc::new(on_change(render)));
/// // render() has already been called with the current state
/// drop(binding); // listener removed
/// ```
#[must_use = "dropping the binding removes the listener immediately"]
pub struct ListenerBinding<S, P>
where
    S: Send + Sync + 'static,
    P: Send + Sync + 'static,
{
    store: Store<S, P>,
    listener: Arc<dyn StateListener<S>>,
    bound: bool,
}

impl<S, P> ListenerBinding<S, P>
where
    S: Send + Sync + 'static,
    P: Send + Sync + 'static,
{
    /// Register `listener` and deliver the current state to it
    ///
    /// The initial delivery bypasses `has_changed`; it runs on the calling
    /// thread.
    pub fn bind(store: &Store<S, P>, listener: Arc<dyn StateListener<S>>) -> Self {
        store.add_listener(Arc::clone(&listener));
        listener.on_changed(&store.state());
        tracing::debug!(listener = listener.name(), "Listener bound");

        Self {
            store: store.clone(),
            listener,
            bound: true,
        }
    }

    /// The bound listener
    #[must_use]
    pub fn listener(&self) -> &Arc<dyn StateListener<S>> {
        &self.listener
    }

    /// Remove the listener now; returns `false` if it was already removed
    pub fn unbind(&mut self) -> bool {
        if !self.bound {
            return false;
        }
        self.bound = false;
        self.store.remove_listener(&self.listener)
    }
}

impl<S, P> Drop for ListenerBinding<S, P>
where
    S: Send + Sync + 'static,
    P: Send + Sync + 'static,
{
    fn drop(&mut self) {
        if self.unbind() {
            tracing::debug!(listener = self.listener.name(), "Listener unbound");
        }
    }
}
