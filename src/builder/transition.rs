//! Builders for transitions, guards and actions.

use crate::core::{Event, EventBuilder};
use crate::definition::Machine;
use crate::runtime::SpawnOptions;

/// What a transition reacts to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Trigger {
    /// Event name or pattern (`"door.open"`, `"snapshot.*"`, `"*"`)
    Event(String),
    /// The owning compound/parallel state completed
    StateDone,
    /// The owning state's invocation succeeded
    InvokeDone,
    /// The owning state's invocation failed
    InvokeError,
    /// Eventless; checked after every micro-step
    Always,
}

/// Guard reference, resolved when the definition is loaded.
pub enum GuardSpec<M: Machine> {
    /// A guard of the machine, resolved through [`Machine::guard`]
    Named(M::Guard),
    /// True while the referenced state is active
    InState(String),
    /// Negation of another guard
    Not(Box<GuardSpec<M>>),
}

/// Action reference, resolved when the definition is loaded.
pub enum ActionSpec<M: Machine> {
    /// A context action of the machine, resolved through [`Machine::action`]
    Run(M::Action),
    /// Queue an event for this actor, processed in the same macro-step
    Raise(EventBuilder<M::Context>),
    /// Send an event to an owned child
    SendTo {
        child: String,
        event: EventBuilder<M::Context>,
    },
    /// Send an event to the parent actor
    SendToParent(EventBuilder<M::Context>),
    /// Spawn a child from the registered child machine with this id
    Spawn {
        machine: String,
        options: SpawnOptions,
    },
    /// Stop and remove an owned child
    Stop(String),
}

impl<M: Machine> ActionSpec<M> {
    pub fn run(action: M::Action) -> Self {
        Self::Run(action)
    }

    pub fn raise(event: impl Into<Event>) -> Self {
        Self::Raise(EventBuilder::constant(event.into()))
    }

    pub fn send_to(child: impl Into<String>, event: EventBuilder<M::Context>) -> Self {
        Self::SendTo {
            child: child.into(),
            event,
        }
    }

    pub fn send_to_parent(event: EventBuilder<M::Context>) -> Self {
        Self::SendToParent(event)
    }

    pub fn spawn(machine: impl Into<String>, options: SpawnOptions) -> Self {
        Self::Spawn {
            machine: machine.into(),
            options,
        }
    }

    pub fn stop(child: impl Into<String>) -> Self {
        Self::Stop(child.into())
    }
}

/// Builder for constructing transitions with a fluent API.
///
/// # Example
///
/// ```rust
/// use statecraft::builder::TransitionBuilder;
/// # use statecraft::{definition::{Machine, Never}, core::*, invoke::Service};
/// # #[derive(Clone, Copy, Debug, PartialEq, Eq)] enum G { PasswordMatches }
/// # #[derive(Clone, Copy, Debug, PartialEq, Eq)] enum A { ClearPassword }
/// # struct Lock;
/// # impl Machine for Lock {
/// #     type Context = (); type Guard = G; type Action = A; type Service = Never; type Env = ();
/// #     fn guard(_: G) -> Guard<()> { Guard::new(|_, _| true) }
/// #     fn action(_: A) -> Action<()> { Action::assign(|_, _| {}) }
/// #     fn service(s: Never) -> Service<(), ()> { match s {} }
/// # }
///
/// let unlock = TransitionBuilder::<Lock>::on("unlock")
///     .to("unlocked")
///     .guard(G::PasswordMatches)
///     .action(A::ClearPassword);
/// ```
pub struct TransitionBuilder<M: Machine> {
    pub(crate) trigger: Option<Trigger>,
    pub(crate) target: Option<String>,
    pub(crate) guard: Option<GuardSpec<M>>,
    pub(crate) actions: Vec<ActionSpec<M>>,
}

impl<M: Machine> TransitionBuilder<M> {
    /// Create a transition without trigger; the owning builder sets it
    /// (`on_done`, `on_error`) or [`TransitionBuilder::event`] must be called.
    pub fn new() -> Self {
        Self {
            trigger: None,
            target: None,
            guard: None,
            actions: Vec::new(),
        }
    }

    /// Transition triggered by an event name or pattern.
    pub fn on(event: impl Into<String>) -> Self {
        Self::new().event(event)
    }

    /// Eventless transition, taken as soon as its guard holds.
    pub fn always() -> Self {
        let mut builder = Self::new();
        builder.trigger = Some(Trigger::Always);
        builder
    }

    /// Set the triggering event name or pattern.
    pub fn event(mut self, event: impl Into<String>) -> Self {
        self.trigger = Some(Trigger::Event(event.into()));
        self
    }

    /// Set the target state.
    ///
    /// Targets are looked up among the siblings of the source first, then
    /// further up the tree; `#a.b` addresses a state by its full id.
    /// Without a target the transition only runs its actions.
    pub fn to(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Guard the transition with a machine guard.
    pub fn guard(mut self, guard: M::Guard) -> Self {
        self.guard = Some(GuardSpec::Named(guard));
        self
    }

    /// Take the transition only when the guard does not hold.
    pub fn unless(mut self, guard: M::Guard) -> Self {
        self.guard = Some(GuardSpec::Not(Box::new(GuardSpec::Named(guard))));
        self
    }

    /// Take the transition only while `state` is active.
    pub fn when_in(mut self, state: impl Into<String>) -> Self {
        self.guard = Some(GuardSpec::InState(state.into()));
        self
    }

    /// Take the transition only while `state` is not active.
    pub fn unless_in(mut self, state: impl Into<String>) -> Self {
        self.guard = Some(GuardSpec::Not(Box::new(GuardSpec::InState(state.into()))));
        self
    }

    /// Append a machine action.
    pub fn action(mut self, action: M::Action) -> Self {
        self.actions.push(ActionSpec::Run(action));
        self
    }

    /// Append any action.
    pub fn then(mut self, action: ActionSpec<M>) -> Self {
        self.actions.push(action);
        self
    }

    pub(crate) fn with_trigger(mut self, trigger: Trigger) -> Self {
        self.trigger = Some(trigger);
        self
    }
}

impl<M: Machine> Default for TransitionBuilder<M> {
    fn default() -> Self {
        Self::new()
    }
}
