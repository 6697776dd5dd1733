//! State listeners - change-detecting observers of published state.

/// Observer notified when a reduce cycle publishes a changed state
///
/// For every transition the store evaluates `has_changed(new, old)`; only
/// when it returns `true` is `on_changed(new)` invoked. Listeners run
/// concurrently with each other and must not assume any particular thread.
pub trait StateListener<S>: Send + Sync {
    /// Name used in diagnostics
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Decide whether this transition is relevant to the listener
    fn has_changed(&self, new_state: &S, old_state: &S) -> bool;

    /// React to a relevant transition
    fn on_changed(&self, state: &S);
}

/// Listener backed by a closure, notified whenever the state is unequal to
/// the previous one.
///
/// Created by [`on_change`].
pub struct ListenerFn<F> {
    on_changed: F,
}

/// Build an equality-based listener from a callback
///
/// ```
/// use statecraft_core::{on_change, StateListener};
///
/// let listener = on_change(|count: &u32| println!("count is now {count}"));
/// assert!(listener.has_changed(&2, &1));
/// assert!(!listener.has_changed(&2, &2));
/// ```
#[must_use]
pub const fn on_change<S, F>(on_changed: F) -> ListenerFn<F>
where
    S: PartialEq,
    F: Fn(&S),
{
    ListenerFn { on_changed }
}

impl<S, F> StateListener<S> for ListenerFn<F>
where
    S: PartialEq,
    F: Fn(&S) + Send + Sync,
{
    fn has_changed(&self, new_state: &S, old_state: &S) -> bool {
        new_state != old_state
    }

    fn on_changed(&self, state: &S) {
        (self.on_changed)(state);
    }
}

/// Listener with a custom change predicate.
///
/// Created by [`on_change_when`]. Useful to watch a single field of a larger
/// state, or for states that do not implement `PartialEq`.
pub struct PredicateListener<C, F> {
    predicate: C,
    on_changed: F,
}

/// Build a listener that fires when `predicate(new, old)` holds
///
/// ```
/// use statecraft_core::{on_change_when, StateListener};
///
/// struct Profile { name: String, visits: u64 }
///
/// let listener = on_change_when(
///     |new: &Profile, old: &Profile| new.name != old.name,
///     |profile: &Profile| println!("renamed to {}", profile.name),
/// );
///
/// let before = Profile { name: "a".into(), visits: 1 };
/// let after = Profile { name: "a".into(), visits: 2 };
/// assert!(!listener.has_changed(&after, &before));
/// ```
#[must_use]
pub const fn on_change_when<S, C, F>(predicate: C, on_changed: F) -> PredicateListener<C, F>
where
    C: Fn(&S, &S) -> bool,
    F: Fn(&S),
{
    PredicateListener {
        predicate,
        on_changed,
    }
}

impl<S, C, F> StateListener<S> for PredicateListener<C, F>
where
    C: Fn(&S, &S) -> bool + Send + Sync,
    F: Fn(&S) + Send + Sync,
{
    fn has_changed(&self, new_state: &S, old_state: &S) -> bool {
        (self.predicate)(new_state, old_state)
    }

    fn on_changed(&self, state: &S) {
        (self.on_changed)(state);
    }
}
