//! Runtime limits for actors.

use serde::{Deserialize, Serialize};

/// Limits applied to every macro-step of an actor.
///
/// Children inherit the configuration of the actor that spawns them.
///
/// # Example
///
/// ```rust
/// use statecraft::runtime::RuntimeConfig;
///
/// let config: RuntimeConfig = serde_json::from_str(r#"{ "max_microsteps": 50 }"#).unwrap();
/// assert_eq!(config.max_microsteps, 50);
/// assert_eq!(config.history_limit, RuntimeConfig::default().history_limit);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Micro-steps one event may cause before the macro-step is aborted
    pub max_microsteps: usize,
    /// Macro-steps kept in the transition history
    pub history_limit: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_microsteps: 1000,
            history_limit: 64,
        }
    }
}

impl RuntimeConfig {
    pub fn max_microsteps(mut self, limit: usize) -> Self {
        self.max_microsteps = limit;
        self
    }

    pub fn history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }
}
