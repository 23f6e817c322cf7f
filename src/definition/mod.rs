//! Loaded, validated machine definitions.
//!
//! A [`Definition`] is an arena of state nodes in document order (pre-order,
//! root first). Targets and the other references a builder made by name are
//! resolved to an index or a function reference while loading, so nothing is
//! looked up by string once an actor runs.

mod configuration;
pub(crate) mod loader;
mod validation;

pub use configuration::Configuration;

use crate::core::{Action, Context, Event, EventBuilder, EventPattern, Guard, StateKind};
use crate::invoke::Service;
use crate::runtime::{SpawnChild, SpawnOptions};
use std::collections::{BTreeMap, HashMap};
use std::fmt::Debug;
use std::sync::Arc;

/// Index of a node inside its definition.
pub(crate) type NodeId = usize;

/// The root node is always the first one.
pub(crate) const ROOT: NodeId = 0;

/// Ties a context type to the guards, actions and services that act on it.
///
/// Guards, actions and services are named by enumerated identifiers. The
/// `match` inside each resolver function is checked for exhaustiveness by
/// the compiler, and every identifier a definition uses is resolved exactly
/// once, when the definition is loaded.
///
/// # Example
///
/// ```rust
/// use statecraft::core::{Action, Event, Guard};
/// use statecraft::definition::{Machine, Never};
/// use statecraft::invoke::Service;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Clone, Debug, Default, Serialize, Deserialize)]
/// struct LockContext {
///     password: Option<String>,
/// }
///
/// #[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// enum LockGuard { PasswordMatches }
///
/// #[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// enum LockAction { StorePassword, ClearPassword }
///
/// struct Lock;
///
/// impl Machine for Lock {
///     type Context = LockContext;
///     type Guard = LockGuard;
///     type Action = LockAction;
///     type Service = Never;
///     type Env = ();
///
///     fn guard(guard: LockGuard) -> Guard<LockContext> {
///         match guard {
///             LockGuard::PasswordMatches => Guard::new(|ctx: &LockContext, event: &Event| {
///                 ctx.password.as_deref() == event.payload_str("password")
///             }),
///         }
///     }
///
///     fn action(action: LockAction) -> Action<LockContext> {
///         match action {
///             LockAction::StorePassword => Action::assign(|ctx: &mut LockContext, event: &Event| {
///                 ctx.password = event.payload_str("password").map(String::from);
///             }),
///             LockAction::ClearPassword => Action::assign(|ctx: &mut LockContext, _: &Event| {
///                 ctx.password = None;
///             }),
///         }
///     }
///
///     fn service(service: Never) -> Service<LockContext, ()> {
///         match service {}
///     }
/// }
/// ```
pub trait Machine: Send + Sync + Sized + 'static {
    type Context: Context;
    type Guard: Copy + Eq + Debug + Send + Sync + 'static;
    type Action: Copy + Eq + Debug + Send + Sync + 'static;
    type Service: Copy + Eq + Debug + Send + Sync + 'static;
    /// Environment handed to every invoked effect.
    type Env: Clone + Send + Sync + 'static;

    fn guard(guard: Self::Guard) -> Guard<Self::Context>;
    fn action(action: Self::Action) -> Action<Self::Context>;
    fn service(service: Self::Service) -> Service<Self::Context, Self::Env>;
}

/// Uninhabited identifier for machines without guards, actions or services.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Never {}

/// Resolved transition guard.
pub(crate) enum Condition<C> {
    Guard { label: String, guard: Guard<C> },
    InState(NodeId),
    Not(Box<Condition<C>>),
}

/// Resolved action.
pub(crate) enum Op<C> {
    Run { label: String, action: Action<C> },
    Raise(EventBuilder<C>),
    SendTo { child: String, event: EventBuilder<C> },
    SendToParent(EventBuilder<C>),
    Spawn { machine: String, options: SpawnOptions },
    Stop(String),
}

pub(crate) enum TransitionTrigger {
    Event(EventPattern),
    Always,
}

pub(crate) struct TransitionDef<C> {
    pub source: NodeId,
    pub trigger: TransitionTrigger,
    pub condition: Option<Condition<C>>,
    pub target: Option<NodeId>,
    pub actions: Vec<Op<C>>,
}

impl<C> TransitionDef<C> {
    pub fn listens_to(&self, event: &Event) -> bool {
        match &self.trigger {
            TransitionTrigger::Event(pattern) => pattern.matches(event.name()),
            TransitionTrigger::Always => false,
        }
    }

    pub fn is_eventless(&self) -> bool {
        matches!(self.trigger, TransitionTrigger::Always)
    }
}

pub(crate) struct InvokeDef<C, Env> {
    pub label: String,
    pub service: Service<C, Env>,
}

pub(crate) struct Node<M: Machine> {
    pub id: String,
    pub key: String,
    pub kind: StateKind,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub initial: Option<NodeId>,
    pub entry: Vec<Op<M::Context>>,
    pub exit: Vec<Op<M::Context>>,
    pub transitions: Vec<TransitionDef<M::Context>>,
    pub invoke: Option<InvokeDef<M::Context, M::Env>>,
}

impl<M: Machine> Node<M> {
    pub fn has_eventless(&self) -> bool {
        self.transitions.iter().any(TransitionDef::is_eventless)
    }
}

/// A validated machine definition, shared by every actor running it.
pub struct Definition<M: Machine> {
    pub(crate) id: String,
    pub(crate) version: u32,
    pub(crate) context: M::Context,
    pub(crate) nodes: Vec<Node<M>>,
    pub(crate) index: HashMap<String, NodeId>,
    pub(crate) child_machines: BTreeMap<String, Arc<dyn SpawnChild>>,
}

impl<M: Machine> Definition<M> {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// Context new actors start with.
    pub fn initial_context(&self) -> &M::Context {
        &self.context
    }

    /// Full ids of every state below the root, in document order.
    pub fn state_ids(&self) -> Vec<&str> {
        self.nodes.iter().skip(1).map(|node| node.id.as_str()).collect()
    }

    /// Kind of the state with this full id.
    pub fn kind_of(&self, id: &str) -> Option<StateKind> {
        self.index.get(id).map(|&n| self.nodes[n].kind)
    }

    /// Ids of registered child machines.
    pub fn child_machine_ids(&self) -> Vec<&str> {
        self.child_machines.keys().map(String::as_str).collect()
    }

    pub(crate) fn node(&self, id: NodeId) -> &Node<M> {
        &self.nodes[id]
    }

    pub(crate) fn lookup(&self, id: &str) -> Option<NodeId> {
        self.index.get(id).copied()
    }

    pub(crate) fn child_by_key(&self, parent: NodeId, key: &str) -> Option<NodeId> {
        self.nodes[parent]
            .children
            .iter()
            .copied()
            .find(|&child| self.nodes[child].key == key)
    }

    /// Proper ancestors of `id`, nearest first.
    pub(crate) fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.nodes[id].parent, move |&n| self.nodes[n].parent)
    }

    /// Check if `id` is a proper descendant of `ancestor`.
    pub(crate) fn is_descendant(&self, id: NodeId, ancestor: NodeId) -> bool {
        self.ancestors(id).any(|n| n == ancestor)
    }

    pub(crate) fn child_machine(&self, id: &str) -> Option<&Arc<dyn SpawnChild>> {
        self.child_machines.get(id)
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }
}

impl<M: Machine> Debug for Definition<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Definition")
            .field("id", &self.id)
            .field("version", &self.version)
            .field("states", &self.state_ids())
            .finish()
    }
}
