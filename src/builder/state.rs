//! Builders for state nodes and their invocations.

use super::transition::{ActionSpec, TransitionBuilder, Trigger};
use crate::core::StateKind;
use crate::definition::Machine;

/// Binds a service to a state's activation.
pub struct InvokeBuilder<M: Machine> {
    pub(crate) service: M::Service,
    pub(crate) transitions: Vec<TransitionBuilder<M>>,
}

impl<M: Machine> InvokeBuilder<M> {
    pub fn new(service: M::Service) -> Self {
        Self {
            service,
            transitions: Vec::new(),
        }
    }

    /// Transition taken when the service succeeds; the event payload is the
    /// service output.
    pub fn on_done(mut self, transition: TransitionBuilder<M>) -> Self {
        self.transitions
            .push(transition.with_trigger(Trigger::InvokeDone));
        self
    }

    /// Transition taken when the service fails; the event payload is the
    /// error description.
    pub fn on_error(mut self, transition: TransitionBuilder<M>) -> Self {
        self.transitions
            .push(transition.with_trigger(Trigger::InvokeError));
        self
    }
}

/// Builder for a state node and its subtree.
///
/// # Example
///
/// ```rust
/// use statecraft::builder::{StateBuilder, TransitionBuilder};
/// # use statecraft::{definition::{Machine, Never}, core::*, invoke::Service};
/// # struct Door;
/// # impl Machine for Door {
/// #     type Context = (); type Guard = Never; type Action = Never; type Service = Never; type Env = ();
/// #     fn guard(g: Never) -> Guard<()> { match g {} }
/// #     fn action(a: Never) -> Action<()> { match a {} }
/// #     fn service(s: Never) -> Service<(), ()> { match s {} }
/// # }
///
/// let closed = StateBuilder::<Door>::compound("closed")
///     .initial("idle")
///     .state(StateBuilder::atomic("idle").on(TransitionBuilder::on("door.open").to("opening")))
///     .state(StateBuilder::atomic("opening"));
/// ```
pub struct StateBuilder<M: Machine> {
    pub(crate) key: String,
    pub(crate) kind: StateKind,
    pub(crate) initial: Option<String>,
    pub(crate) children: Vec<StateBuilder<M>>,
    pub(crate) entry: Vec<ActionSpec<M>>,
    pub(crate) exit: Vec<ActionSpec<M>>,
    pub(crate) transitions: Vec<TransitionBuilder<M>>,
    pub(crate) invoke: Option<InvokeBuilder<M>>,
}

impl<M: Machine> StateBuilder<M> {
    pub fn new(key: impl Into<String>, kind: StateKind) -> Self {
        Self {
            key: key.into(),
            kind,
            initial: None,
            children: Vec::new(),
            entry: Vec::new(),
            exit: Vec::new(),
            transitions: Vec::new(),
            invoke: None,
        }
    }

    pub fn atomic(key: impl Into<String>) -> Self {
        Self::new(key, StateKind::Atomic)
    }

    pub fn compound(key: impl Into<String>) -> Self {
        Self::new(key, StateKind::Compound)
    }

    pub fn parallel(key: impl Into<String>) -> Self {
        Self::new(key, StateKind::Parallel)
    }

    pub fn final_state(key: impl Into<String>) -> Self {
        Self::new(key, StateKind::Final)
    }

    /// Set the initial child key (compound states only).
    pub fn initial(mut self, key: impl Into<String>) -> Self {
        self.initial = Some(key.into());
        self
    }

    /// Add a child state.
    pub fn state(mut self, child: StateBuilder<M>) -> Self {
        self.children.push(child);
        self
    }

    /// Add multiple child states at once.
    pub fn states(mut self, children: Vec<StateBuilder<M>>) -> Self {
        self.children.extend(children);
        self
    }

    pub fn entry(mut self, action: ActionSpec<M>) -> Self {
        self.entry.push(action);
        self
    }

    pub fn exit(mut self, action: ActionSpec<M>) -> Self {
        self.exit.push(action);
        self
    }

    /// Add a transition; declaration order is evaluation order.
    pub fn on(mut self, transition: TransitionBuilder<M>) -> Self {
        self.transitions.push(transition);
        self
    }

    /// Add an eventless transition.
    pub fn always(mut self, transition: TransitionBuilder<M>) -> Self {
        self.transitions.push(transition.with_trigger(Trigger::Always));
        self
    }

    /// Transition taken when this compound or parallel state completes.
    pub fn on_done(mut self, transition: TransitionBuilder<M>) -> Self {
        self.transitions
            .push(transition.with_trigger(Trigger::StateDone));
        self
    }

    /// Bind an invocation to every activation of this state.
    pub fn invoke(mut self, invoke: InvokeBuilder<M>) -> Self {
        self.invoke = Some(invoke);
        self
    }
}
