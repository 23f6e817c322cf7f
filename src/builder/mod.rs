//! Builder API for ergonomic machine definitions.
//!
//! This module provides fluent builders for states, transitions and
//! invocations. Nothing is validated until [`MachineBuilder::build`], which
//! hands the tree to the definition loader and reports every problem at once.

pub mod error;
pub mod machine;
pub mod state;
pub mod transition;

pub use error::{BuildError, DefinitionError};
pub use machine::MachineBuilder;
pub use state::{InvokeBuilder, StateBuilder};
pub use transition::{ActionSpec, GuardSpec, TransitionBuilder};

use crate::definition::Machine;

/// Create an unconditional transition.
///
/// # Example
///
/// ```
/// use statecraft::builder::simple_transition;
/// # use statecraft::{definition::{Machine, Never}, core::*, invoke::Service};
/// # struct Light;
/// # impl Machine for Light {
/// #     type Context = (); type Guard = Never; type Action = Never; type Service = Never; type Env = ();
/// #     fn guard(g: Never) -> Guard<()> { match g {} }
/// #     fn action(a: Never) -> Action<()> { match a {} }
/// #     fn service(s: Never) -> Service<(), ()> { match s {} }
/// # }
///
/// let next = simple_transition::<Light>("timer", "green");
/// ```
pub fn simple_transition<M: Machine>(
    event: impl Into<String>,
    target: impl Into<String>,
) -> TransitionBuilder<M> {
    TransitionBuilder::on(event).to(target)
}

/// Create a transition with a guard.
pub fn guarded_transition<M: Machine>(
    event: impl Into<String>,
    target: impl Into<String>,
    guard: M::Guard,
) -> TransitionBuilder<M> {
    TransitionBuilder::on(event).to(target).guard(guard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Flag, Toggle};

    #[test]
    fn simple_transition_builds() {
        let transition = simple_transition::<Toggle>("flip", "on");

        assert_eq!(transition.target.as_deref(), Some("on"));
        assert!(transition.guard.is_none());
    }

    #[test]
    fn guarded_transition_keeps_guard() {
        let transition = guarded_transition::<Toggle>("flip", "on", Flag::Enabled);

        assert!(matches!(transition.guard, Some(GuardSpec::Named(Flag::Enabled))));
    }
}
