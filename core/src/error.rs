//! Errors raised by reducers and middlewares.

use thiserror::Error;

/// Boxed error used as the optional cause of a contract error
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A reducer failed while folding an action into state.
///
/// Returning this from [`Reducer::reduce`](crate::Reducer::reduce) aborts the
/// fold for the current action; the store keeps its previous state.
#[derive(Error, Debug)]
#[error("{message}")]
pub struct ReducerError {
    message: String,
    source: Option<BoxError>,
}

impl ReducerError {
    /// Create an error with a message
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Create an error with a message and an underlying cause
    #[must_use]
    pub fn with_source(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// The error message
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// A middleware hook failed.
///
/// Middleware failures are isolated: sibling hooks in the same phase still
/// run, and the reduce cycle continues.
#[derive(Error, Debug)]
#[error("{message}")]
pub struct MiddlewareError {
    message: String,
    source: Option<BoxError>,
}

impl MiddlewareError {
    /// Create an error with a message
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Create an error with a message and an underlying cause
    #[must_use]
    pub fn with_source(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// The error message
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_reducer_error_keeps_source() {
        let cause = std::io::Error::other("disk on fire");
        let err = ReducerError::with_source("could not apply", cause);

        assert_eq!(err.to_string(), "could not apply");
        assert_eq!(
            err.source().map(ToString::to_string).as_deref(),
            Some("disk on fire")
        );
    }

    #[test]
    fn test_middleware_error_without_source() {
        let err = MiddlewareError::new("audit sink unavailable");
        assert_eq!(err.message(), "audit sink unavailable");
        assert!(err.source().is_none());
    }
}
