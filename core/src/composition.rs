//! Reducer composition utilities
//!
//! - **[`fold_reducers`]**: thread one action through an ordered sequence of reducers
//! - **[`combine_reducers`]**: bundle several reducers into a single one
//! - **[`scope_reducer`]**: focus a reducer on a subset of state
//!
//! # Examples
//!
//! ```
//! use statecraft_core::composition::combine_reducers;
//! use statecraft_core::{reducer_fn, Action, Reducer};
//! use std::sync::Arc;
//!
//! let reducers: Vec<Arc<dyn Reducer<i64, i64>>> = vec![
//!     Arc::new(reducer_fn(|s: &i64, a: &Action<i64>| s + a.payload())),
//!     Arc::new(reducer_fn(|s: &i64, _: &Action<i64>| s * 2)),
//! ];
//! let combined = combine_reducers(reducers);
//!
//! // (1 + 3) * 2, in registration order
//! assert_eq!(combined.reduce(&1, &Action::new("add", 3)).ok(), Some(8));
//! ```

use crate::action::Action;
use crate::error::ReducerError;
use crate::reducer::Reducer;
use std::sync::Arc;

/// Fold an action through `reducers` in iteration order.
///
/// Each reducer receives the output of the previous one. Returns `Ok(None)`
/// when the sequence is empty, meaning "state unchanged"; this lets callers
/// skip cloning the state for an empty fold.
///
/// # Errors
///
/// Stops at the first reducer that fails and returns its error; the partial
/// result is discarded.
pub fn fold_reducers<'a, S, P, I>(
    reducers: I,
    state: &S,
    action: &Action<P>,
) -> Result<Option<S>, ReducerError>
where
    I: IntoIterator<Item = &'a Arc<dyn Reducer<S, P>>>,
    S: 'a,
    P: 'a,
{
    let mut folded: Option<S> = None;
    for reducer in reducers {
        let next = reducer.reduce(folded.as_ref().unwrap_or(state), action)?;
        folded = Some(next);
    }
    Ok(folded)
}

/// Combines multiple reducers that operate on the same state and payload types.
///
/// The reducers run in the order given. Useful to split transition logic
/// across several implementations and register them as one.
#[must_use]
pub fn combine_reducers<S, P>(reducers: Vec<Arc<dyn Reducer<S, P>>>) -> CombinedReducer<S, P> {
    CombinedReducer { reducers }
}

/// A combined reducer that runs multiple reducers in sequence.
///
/// Created by [`combine_reducers`].
pub struct CombinedReducer<S, P> {
    reducers: Vec<Arc<dyn Reducer<S, P>>>,
}

impl<S, P> CombinedReducer<S, P> {
    /// Number of reducers in the chain
    #[must_use]
    pub fn len(&self) -> usize {
        self.reducers.len()
    }

    /// Whether the chain is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.reducers.is_empty()
    }
}

impl<S, P> Reducer<S, P> for CombinedReducer<S, P>
where
    S: Clone,
{
    fn reduce(&self, state: &S, action: &Action<P>) -> Result<S, ReducerError> {
        Ok(fold_reducers(&self.reducers, state, action)?.unwrap_or_else(|| state.clone()))
    }
}

/// Scopes a reducer to operate on a subset of a larger state.
///
/// # Examples
///
/// ```
/// use statecraft_core::composition::scope_reducer;
/// use statecraft_core::{reducer_fn, Action, Reducer};
///
/// #[derive(Clone, Default)]
/// struct AppState {
///     counter: i64,
///     title: String,
/// }
///
/// let scoped = scope_reducer(
///     reducer_fn(|count: &i64, a: &Action<i64>| count + a.payload()),
///     |app: &AppState| &app.counter,
///     |app: &mut AppState, counter: i64| app.counter = counter,
/// );
///
/// let next = scoped.reduce(&AppState::default(), &Action::new("add", 5));
/// assert_eq!(next.ok().map(|s| s.counter), Some(5));
/// ```
pub fn scope_reducer<S, SubS, P, R>(
    reducer: R,
    get_state: fn(&S) -> &SubS,
    set_state: fn(&mut S, SubS),
) -> ScopedReducer<S, SubS, R>
where
    R: Reducer<SubS, P>,
{
    ScopedReducer {
        reducer,
        get_state,
        set_state,
    }
}

/// A scoped reducer that operates on a subset of state.
///
/// Created by [`scope_reducer`].
pub struct ScopedReducer<S, SubS, R> {
    reducer: R,
    get_state: fn(&S) -> &SubS,
    set_state: fn(&mut S, SubS),
}

impl<S, SubS, P, R> Reducer<S, P> for ScopedReducer<S, SubS, R>
where
    S: Clone,
    R: Reducer<SubS, P>,
{
    fn reduce(&self, state: &S, action: &Action<P>) -> Result<S, ReducerError> {
        let sub_state = self.reducer.reduce((self.get_state)(state), action)?;

        let mut next = state.clone();
        (self.set_state)(&mut next, sub_state);
        Ok(next)
    }
}
