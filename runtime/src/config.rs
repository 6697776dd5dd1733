//! Store configuration.
//!
//! Configuration is plain data: build it with the `with_*` methods,
//! deserialize it with serde, or read it from the process environment.
//!
//! # Example
//!
//! ```
//! use statecraft_runtime::StoreConfig;
//!
//! let config = StoreConfig::default()
//!     .with_debug(true)
//!     .with_queue_capacity(1024)
//!     .with_fan_out_width(4);
//!
//! assert_eq!(config.queue_capacity, Some(1024));
//! ```

use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use thiserror::Error;

/// Environment variable enabling debug diagnostics
pub const ENV_DEBUG: &str = "STATECRAFT_DEBUG";
/// Environment variable bounding the action queue
pub const ENV_QUEUE_CAPACITY: &str = "STATECRAFT_QUEUE_CAPACITY";
/// Environment variable setting the fan-out width
pub const ENV_FAN_OUT_WIDTH: &str = "STATECRAFT_FAN_OUT_WIDTH";

/// Errors produced while reading configuration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A variable was set to a value that could not be parsed
    #[error("Invalid value '{value}' for {key}")]
    InvalidValue {
        /// Variable name
        key: &'static str,
        /// The rejected value
        value: String,
    },
}

/// Configuration for Store instances
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Emit one timing line per reduce cycle and register a [`DebugObserver`](crate::DebugObserver)
    pub debug: bool,
    /// Maximum number of queued actions; `None` means unbounded
    ///
    /// With a bound, [`Store::enqueue`](crate::Store::enqueue) fails with
    /// [`StoreError::QueueFull`](crate::StoreError::QueueFull) instead of blocking.
    pub queue_capacity: Option<usize>,
    /// Maximum number of blocking-pool tasks used for one fan-out phase
    pub fan_out_width: usize,
    /// How many failed queued actions to remember
    pub failed_action_capacity: usize,
}

impl StoreConfig {
    /// Enable or disable debug diagnostics
    #[must_use]
    pub const fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Bound the action queue (at least 1)
    #[must_use]
    pub const fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = Some(if capacity == 0 { 1 } else { capacity });
        self
    }

    /// Remove the bound on the action queue
    #[must_use]
    pub const fn unbounded(mut self) -> Self {
        self.queue_capacity = None;
        self
    }

    /// Set the fan-out width (at least 1)
    #[must_use]
    pub fn with_fan_out_width(mut self, width: usize) -> Self {
        self.fan_out_width = width.max(1);
        self
    }

    /// Set how many failed actions are remembered
    #[must_use]
    pub const fn with_failed_action_capacity(mut self, capacity: usize) -> Self {
        self.failed_action_capacity = capacity;
        self
    }

    /// Read configuration from the process environment
    ///
    /// Unset variables keep their defaults. See [`ENV_DEBUG`],
    /// [`ENV_QUEUE_CAPACITY`] and [`ENV_FAN_OUT_WIDTH`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if a variable is set but malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary key lookup
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if a value is present but malformed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup(ENV_DEBUG) {
            config.debug = parse_flag(ENV_DEBUG, &value)?;
        }

        if let Some(value) = lookup(ENV_QUEUE_CAPACITY) {
            config.queue_capacity = match value.trim() {
                "" | "unbounded" => None,
                raw => Some(parse_count(ENV_QUEUE_CAPACITY, raw)?.get()),
            };
        }

        if let Some(value) = lookup(ENV_FAN_OUT_WIDTH) {
            config.fan_out_width = parse_count(ENV_FAN_OUT_WIDTH, value.trim())?.get();
        }

        Ok(config)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            debug: false,
            queue_capacity: None,
            fan_out_width: std::thread::available_parallelism().map_or(4, NonZeroUsize::get),
            failed_action_capacity: 100,
        }
    }
}

fn parse_flag(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "" | "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: value.to_string(),
        }),
    }
}

fn parse_count(key: &'static str, value: &str) -> Result<NonZeroUsize, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = StoreConfig::default();
        assert!(!config.debug);
        assert_eq!(config.queue_capacity, None);
        assert!(config.fan_out_width >= 1);
        assert_eq!(config.failed_action_capacity, 100);
    }

    #[test]
    fn test_builder_clamps_fan_out_width() {
        let config = StoreConfig::default().with_fan_out_width(0);
        assert_eq!(config.fan_out_width, 1);
    }

    #[test]
    fn test_from_lookup() -> Result<(), ConfigError> {
        let config = StoreConfig::from_lookup(lookup(&[
            (ENV_DEBUG, "TRUE"),
            (ENV_QUEUE_CAPACITY, "256"),
            (ENV_FAN_OUT_WIDTH, " 3 "),
        ]))?;

        assert!(config.debug);
        assert_eq!(config.queue_capacity, Some(256));
        assert_eq!(config.fan_out_width, 3);
        Ok(())
    }

    #[test]
    fn test_from_lookup_unbounded_queue() -> Result<(), ConfigError> {
        let config = StoreConfig::from_lookup(lookup(&[(ENV_QUEUE_CAPACITY, "unbounded")]))?;
        assert_eq!(config.queue_capacity, None);
        Ok(())
    }

    #[test]
    fn test_from_lookup_rejects_garbage() {
        let err = StoreConfig::from_lookup(lookup(&[(ENV_DEBUG, "maybe")]));
        assert_eq!(
            err,
            Err(ConfigError::InvalidValue {
                key: ENV_DEBUG,
                value: "maybe".into(),
            })
        );

        let err = StoreConfig::from_lookup(lookup(&[(ENV_FAN_OUT_WIDTH, "0")]));
        assert!(matches!(err, Err(ConfigError::InvalidValue { key, .. }) if key == ENV_FAN_OUT_WIDTH));
    }

    #[test]
    fn test_serde_defaults_missing_fields() -> Result<(), serde_json::Error> {
        let config: StoreConfig = serde_json::from_str(r#"{ "debug": true, "queue_capacity": 16 }"#)?;
        assert!(config.debug);
        assert_eq!(config.queue_capacity, Some(16));
        assert_eq!(config.failed_action_capacity, 100);
        Ok(())
    }
}
