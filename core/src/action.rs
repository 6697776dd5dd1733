//! Actions - immutable commands naming an intended state transition.

use std::borrow::Cow;
use std::fmt;

/// An immutable command value submitted to a store.
///
/// The `name` identifies the action in diagnostics (logs, metrics, error
/// reports). The payload is opaque to the store; only reducers and
/// middlewares interpret it.
///
/// # Example
///
/// ```
/// use statecraft_core::Action;
///
/// let action = Action::new("add", 3_i64);
/// assert_eq!(action.name(), "add");
/// assert_eq!(*action.payload(), 3);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Action<P = ()> {
    name: Cow<'static, str>,
    payload: P,
}

impl<P> Action<P> {
    /// Create an action with a name and payload
    #[must_use]
    pub fn new(name: impl Into<Cow<'static, str>>, payload: P) -> Self {
        Self {
            name: name.into(),
            payload,
        }
    }

    /// The identifying name of this action
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Borrow the payload
    #[must_use]
    pub const fn payload(&self) -> &P {
        &self.payload
    }

    /// Consume the action, returning its payload
    #[must_use]
    pub fn into_payload(self) -> P {
        self.payload
    }
}

impl Action<()> {
    /// Create a payload-less action
    #[must_use]
    pub fn named(name: impl Into<Cow<'static, str>>) -> Self {
        Self::new(name, ())
    }
}

impl<P> fmt::Display for Action<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
