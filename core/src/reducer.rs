//! Reducers - pure transition functions `(state, action) -> state`.

use crate::action::Action;
use crate::error::ReducerError;

/// The Reducer trait - the only way state changes
///
/// A reducer computes the next state from the current state and an action.
/// Implementations must be total, deterministic and free of side effects,
/// and must not keep a reference to the state beyond the call.
///
/// # Example
///
/// ```
/// use statecraft_core::{Action, Reducer, ReducerError};
///
/// struct Adder;
///
/// impl Reducer<i64, i64> for Adder {
///     fn reduce(&self, state: &i64, action: &Action<i64>) -> Result<i64, ReducerError> {
///         state
///             .checked_add(*action.payload())
///             .ok_or_else(|| ReducerError::new("counter overflow"))
///     }
/// }
///
/// let next = Adder.reduce(&40, &Action::new("add", 2));
/// assert_eq!(next.ok(), Some(42));
/// ```
pub trait Reducer<S, P>: Send + Sync {
    /// Reduce an action into the next state
    ///
    /// # Errors
    ///
    /// Returns [`ReducerError`] when the action cannot be applied. The store
    /// then keeps the previous state.
    fn reduce(&self, state: &S, action: &Action<P>) -> Result<S, ReducerError>;
}

/// Reducer backed by an infallible closure.
///
/// Created by [`reducer_fn`].
pub struct FnReducer<F> {
    f: F,
}

/// Wrap an infallible closure as a [`Reducer`]
///
/// ```
/// use statecraft_core::{reducer_fn, Action, Reducer};
///
/// let sum = reducer_fn(|state: &i64, action: &Action<i64>| state + action.payload());
/// assert_eq!(sum.reduce(&1, &Action::new("add", 2)).ok(), Some(3));
/// ```
#[must_use]
pub const fn reducer_fn<S, P, F>(f: F) -> FnReducer<F>
where
    F: Fn(&S, &Action<P>) -> S,
{
    FnReducer { f }
}

impl<S, P, F> Reducer<S, P> for FnReducer<F>
where
    F: Fn(&S, &Action<P>) -> S + Send + Sync,
{
    fn reduce(&self, state: &S, action: &Action<P>) -> Result<S, ReducerError> {
        Ok((self.f)(state, action))
    }
}

/// Reducer backed by a fallible closure.
///
/// Created by [`try_reducer_fn`].
pub struct TryFnReducer<F> {
    f: F,
}

/// Wrap a fallible closure as a [`Reducer`]
#[must_use]
pub const fn try_reducer_fn<S, P, F>(f: F) -> TryFnReducer<F>
where
    F: Fn(&S, &Action<P>) -> Result<S, ReducerError>,
{
    TryFnReducer { f }
}

impl<S, P, F> Reducer<S, P> for TryFnReducer<F>
where
    F: Fn(&S, &Action<P>) -> Result<S, ReducerError> + Send + Sync,
{
    fn reduce(&self, state: &S, action: &Action<P>) -> Result<S, ReducerError> {
        (self.f)(state, action)
    }
}
