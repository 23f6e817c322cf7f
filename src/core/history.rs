//! Macro-step history tracking.
//!
//! Provides a bounded, immutable record of configuration changes over time.

use super::value::StateValue;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;

/// Record of a single processed event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StateTransition {
    /// Configuration before the macro-step
    pub from: StateValue,
    /// Configuration after the macro-step
    pub to: StateValue,
    /// Name of the event that started the macro-step
    pub event: String,
    /// When the macro-step completed
    pub timestamp: DateTime<Utc>,
    /// Number of micro-steps taken, including completion and eventless steps
    pub microsteps: usize,
}

/// Ordered, bounded history of macro-steps.
///
/// History is immutable - `record` returns a new history with the entry
/// added, dropping the oldest entry once the limit is reached.
///
/// # Example
///
/// ```rust
/// use statecraft::core::{StateHistory, StateTransition, StateValue};
/// use chrono::Utc;
///
/// let history = StateHistory::with_limit(8);
/// let history = history.record(StateTransition {
///     from: StateValue::Leaf("unlocked".into()),
///     to: StateValue::Leaf("locked".into()),
///     event: "lock".into(),
///     timestamp: Utc::now(),
///     microsteps: 1,
/// });
///
/// let path = history.get_path();
/// assert_eq!(path.len(), 2);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StateHistory {
    transitions: VecDeque<StateTransition>,
    limit: usize,
}

impl Default for StateHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl StateHistory {
    /// Default number of retained entries.
    pub const DEFAULT_LIMIT: usize = 64;

    /// Create a new empty history with the default limit.
    pub fn new() -> Self {
        Self::with_limit(Self::DEFAULT_LIMIT)
    }

    /// Create a new empty history retaining at most `limit` entries.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            transitions: VecDeque::new(),
            limit,
        }
    }

    /// Record a macro-step, returning a new history.
    pub fn record(&self, transition: StateTransition) -> Self {
        let mut next = self.clone();
        next.push(transition);
        next
    }

    pub(crate) fn push(&mut self, transition: StateTransition) {
        if self.limit == 0 {
            return;
        }
        while self.transitions.len() >= self.limit {
            self.transitions.pop_front();
        }
        self.transitions.push_back(transition);
    }

    /// Get the path of configurations traversed.
    ///
    /// Returns the `from` value of the oldest retained entry followed by the
    /// `to` value of every entry.
    pub fn get_path(&self) -> Vec<&StateValue> {
        let mut path = Vec::new();
        if let Some(first) = self.transitions.front() {
            path.push(&first.from);
        }
        for transition in &self.transitions {
            path.push(&transition.to);
        }
        path
    }

    /// Calculate total duration from first to last retained entry.
    pub fn duration(&self) -> Option<Duration> {
        if let (Some(first), Some(last)) = (self.transitions.front(), self.transitions.back()) {
            let duration = last.timestamp.signed_duration_since(first.timestamp);
            duration.to_std().ok()
        } else {
            None
        }
    }

    /// Iterate retained entries, oldest first.
    pub fn transitions(&self) -> impl Iterator<Item = &StateTransition> {
        self.transitions.iter()
    }

    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }
}
