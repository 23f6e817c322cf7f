//! Generation bookkeeping for invocations.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Tracks which invocation generation is current for each invoking state.
///
/// The table is plain data so the interpreter can copy it into a macro-step
/// and commit it only when the step succeeds.
///
/// # Example
///
/// ```rust
/// use statecraft::invoke::InvocationTable;
///
/// let mut table = InvocationTable::default();
/// let first = table.begin("closed.opening");
/// table.cancel("closed.opening");
/// let second = table.begin("closed.opening");
///
/// assert!(second > first);
/// assert!(!table.accept("closed.opening", first));
/// assert!(table.accept("closed.opening", second));
/// // accepted at most once
/// assert!(!table.accept("closed.opening", second));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationTable {
    active: BTreeMap<String, u64>,
    next_generation: u64,
}

impl InvocationTable {
    /// Record a new activation of `state`, returning its generation.
    pub fn begin(&mut self, state: &str) -> u64 {
        self.next_generation += 1;
        let generation = self.next_generation;
        self.active.insert(state.to_string(), generation);
        generation
    }

    /// Forget the running invocation of `state`, returning its generation if
    /// one was still pending.
    pub fn cancel(&mut self, state: &str) -> Option<u64> {
        self.active.remove(state)
    }

    /// Accept an outcome if `generation` is current for `state`.
    ///
    /// Accepting consumes the entry, so duplicates are rejected.
    pub fn accept(&mut self, state: &str, generation: u64) -> bool {
        if self.active.get(state) == Some(&generation) {
            self.active.remove(state);
            true
        } else {
            false
        }
    }

    /// Generation currently pending for `state`.
    pub fn current(&self, state: &str) -> Option<u64> {
        self.active.get(state).copied()
    }

    /// States with a pending invocation, with their generations.
    pub fn pending(&self) -> impl Iterator<Item = (&str, u64)> {
        self.active.iter().map(|(state, gen)| (state.as_str(), *gen))
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}
