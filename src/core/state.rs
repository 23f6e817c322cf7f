//! Context and state-kind types shared by definitions and running actors.
//!
//! The context is the only mutable data an actor owns. It must be
//! serializable so snapshots can carry it across process restarts.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Trait for machine contexts.
///
/// Any type that is cloneable, debuggable and serde round-trippable can be a
/// context; the blanket implementation means there is nothing to implement.
///
/// # Required Traits
///
/// - `Clone`: a macro-step works on a copy and commits it only on success
/// - `Debug`: contexts show up in diagnostics
/// - `Default`: the starting context unless a definition provides one
/// - `Serialize` + `Deserialize`: contexts are part of every snapshot
///
/// # Example
///
/// ```rust
/// use statecraft::core::Context;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Clone, Debug, Default, Serialize, Deserialize)]
/// struct DoorContext {
///     password: Option<String>,
///     error: Option<String>,
/// }
///
/// fn assert_context<C: Context>() {}
/// assert_context::<DoorContext>();
/// ```
pub trait Context:
    Clone + Debug + Default + Serialize + DeserializeOwned + Send + Sync + 'static
{
}

impl<T> Context for T where
    T: Clone + Debug + Default + Serialize + DeserializeOwned + Send + Sync + 'static
{
}

/// Structural kind of a state node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateKind {
    /// Leaf state without children
    Atomic,
    /// Exactly one child is active at a time
    Compound,
    /// Every child region is active at the same time
    Parallel,
    /// Leaf that signals completion of its parent
    Final,
}

impl StateKind {
    /// Check if nodes of this kind have children.
    pub fn is_composite(self) -> bool {
        matches!(self, Self::Compound | Self::Parallel)
    }

    /// Check if nodes of this kind are leaves of the configuration.
    pub fn is_leaf(self) -> bool {
        !self.is_composite()
    }
}

/// Lifecycle status of an actor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Processing events
    #[default]
    Running,
    /// The root reached a final configuration
    Done,
    /// A fire-and-forget event failed; the actor no longer processes events
    Error,
}

impl Status {
    /// Check if the actor still accepts events.
    pub fn is_running(self) -> bool {
        matches!(self, Self::Running)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composite_kinds_have_children() {
        assert!(StateKind::Compound.is_composite());
        assert!(StateKind::Parallel.is_composite());
        assert!(!StateKind::Atomic.is_composite());
        assert!(!StateKind::Final.is_composite());
    }

    #[test]
    fn leaf_kinds_are_atomic_or_final() {
        assert!(StateKind::Atomic.is_leaf());
        assert!(StateKind::Final.is_leaf());
        assert!(!StateKind::Parallel.is_leaf());
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&Status::Running).unwrap();
        assert_eq!(json, "\"running\"");

        let status: Status = serde_json::from_str("\"done\"").unwrap();
        assert_eq!(status, Status::Done);
    }

    #[test]
    fn only_running_status_accepts_events() {
        assert!(Status::Running.is_running());
        assert!(!Status::Done.is_running());
        assert!(!Status::Error.is_running());
    }
}
