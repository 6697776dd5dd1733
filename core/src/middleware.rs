//! Middlewares - side-effect hooks around each reduce cycle.

use crate::action::Action;
use crate::error::MiddlewareError;

/// A pair of side-effecting hooks invoked around the reduce step
///
/// `before` sees the state the action is about to be applied to; `after`
/// sees the state that was published. Hooks of the same phase run
/// concurrently with each other, on an unspecified thread, so an
/// implementation must be internally synchronized if it holds mutable data.
///
/// Both hooks default to doing nothing.
pub trait Middleware<S, P>: Send + Sync {
    /// Name used in diagnostics and error reports
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Called before the reducers run
    ///
    /// # Errors
    ///
    /// A returned [`MiddlewareError`] is reported to the store's error
    /// observers; it does not stop the reduce cycle.
    fn before(&self, _state: &S, _action: &Action<P>) -> Result<(), MiddlewareError> {
        Ok(())
    }

    /// Called after the new state has been published and listeners notified
    ///
    /// # Errors
    ///
    /// A returned [`MiddlewareError`] is reported to the store's error
    /// observers; it does not stop the reduce cycle.
    fn after(&self, _state: &S, _action: &Action<P>) -> Result<(), MiddlewareError> {
        Ok(())
    }
}

/// Which side of the reduce step a middleware hook belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Before the reducer fold
    Before,
    /// After publish and listener notification
    After,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Before => write!(f, "before"),
            Self::After => write!(f, "after"),
        }
    }
}

impl Phase {
    /// Invoke this phase's hook on a middleware
    ///
    /// # Errors
    ///
    /// Returns whatever the hook returns.
    pub fn invoke<S, P, M>(self, middleware: &M, state: &S, action: &Action<P>) -> Result<(), MiddlewareError>
    where
        M: Middleware<S, P> + ?Sized,
    {
        match self {
            Self::Before => middleware.before(state, action),
            Self::After => middleware.after(state, action),
        }
    }
}
