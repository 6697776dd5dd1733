//! # Statecraft Core
//!
//! Core contracts for the Statecraft state container.
//!
//! A store holds one current state value. It changes only when an
//! [`Action`] is folded through the registered [`Reducer`]s; [`Middleware`]
//! hooks run around each fold and [`StateListener`]s are told about
//! published changes. This crate defines those contracts and nothing else;
//! the store, dispatcher and concurrency discipline live in
//! `statecraft-runtime`.
//!
//! ## Core Concepts
//!
//! - **State**: any `Send + Sync` value; the store hands out immutable snapshots
//! - **Action**: an immutable command with a name and an opaque payload
//! - **Reducer**: pure function `(&State, &Action) → Result<State, ReducerError>`
//! - **Middleware**: `before`/`after` side-effect hooks around the fold
//! - **`StateListener`**: change predicate plus notification callback
//!
//! ## Example
//!
//! ```
//! use statecraft_core::{on_change, reducer_fn, Action, Reducer, StateListener};
//!
//! let add = reducer_fn(|count: &i64, action: &Action<i64>| count + action.payload());
//! let printer = on_change(|count: &i64| println!("count = {count}"));
//!
//! let old = 0;
//! let new = add.reduce(&old, &Action::new("add", 5)).unwrap_or(old);
//! if printer.has_changed(&new, &old) {
//!     printer.on_changed(&new);
//! }
//! ```

/// Actions - immutable commands naming an intended state transition
pub mod action;

/// Reducer composition utilities
pub mod composition;

/// Errors raised by reducers and middlewares
pub mod error;

/// State listeners
pub mod listener;

/// Middleware hooks
pub mod middleware;

/// The Reducer trait and closure adapters
pub mod reducer;

pub use action::Action;
pub use error::{BoxError, MiddlewareError, ReducerError};
pub use listener::{on_change, on_change_when, ListenerFn, PredicateListener, StateListener};
pub use middleware::{Middleware, Phase};
pub use reducer::{reducer_fn, try_reducer_fn, FnReducer, Reducer, TryFnReducer};
