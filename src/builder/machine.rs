//! Builder for constructing machine definitions.

use super::error::BuildError;
use super::state::StateBuilder;
use super::transition::{ActionSpec, TransitionBuilder};
use crate::core::StateKind;
use crate::definition::{loader, Definition, Machine};
use crate::runtime::{ChildMachine, SpawnChild};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Builder for constructing machine definitions with a fluent API.
///
/// The root is a compound state by default; call [`MachineBuilder::parallel`]
/// to make every top-level state an independent region.
pub struct MachineBuilder<M: Machine> {
    pub(crate) id: String,
    pub(crate) version: u32,
    pub(crate) root_kind: StateKind,
    pub(crate) initial: Option<String>,
    pub(crate) context: M::Context,
    pub(crate) states: Vec<StateBuilder<M>>,
    pub(crate) transitions: Vec<TransitionBuilder<M>>,
    pub(crate) entry: Vec<ActionSpec<M>>,
    pub(crate) child_machines: BTreeMap<String, Arc<dyn SpawnChild>>,
}

impl<M: Machine> MachineBuilder<M> {
    /// Create a new builder for the machine with this id.
    ///
    /// The id and version are recorded in snapshots and checked on restore.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: 1,
            root_kind: StateKind::Compound,
            initial: None,
            context: M::Context::default(),
            states: Vec::new(),
            transitions: Vec::new(),
            entry: Vec::new(),
            child_machines: BTreeMap::new(),
        }
    }

    pub fn version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    /// Set the initial top-level state (required unless parallel).
    pub fn initial(mut self, key: impl Into<String>) -> Self {
        self.initial = Some(key.into());
        self
    }

    /// Set the context new actors start with (`Default` otherwise).
    pub fn context(mut self, context: M::Context) -> Self {
        self.context = context;
        self
    }

    /// Activate every top-level state at once.
    pub fn parallel(mut self) -> Self {
        self.root_kind = StateKind::Parallel;
        self
    }

    /// Add a top-level state.
    pub fn state(mut self, state: StateBuilder<M>) -> Self {
        self.states.push(state);
        self
    }

    /// Add multiple top-level states at once.
    pub fn states(mut self, states: Vec<StateBuilder<M>>) -> Self {
        self.states.extend(states);
        self
    }

    /// Add a machine-wide transition, consulted after every state.
    pub fn on(mut self, transition: TransitionBuilder<M>) -> Self {
        self.transitions.push(transition);
        self
    }

    /// Add an action run when the actor starts.
    pub fn entry(mut self, action: ActionSpec<M>) -> Self {
        self.entry.push(action);
        self
    }

    /// Register a machine that `spawn` actions may instantiate.
    ///
    /// Children are registered under their own definition id.
    pub fn child_machine<C: Machine>(mut self, definition: Arc<Definition<C>>, env: C::Env) -> Self {
        let id = definition.id().to_string();
        self.child_machines
            .insert(id, Arc::new(ChildMachine::new(definition, env)));
        self
    }

    /// Validate and load the definition.
    ///
    /// Every structural problem is reported at once in
    /// [`BuildError::Invalid`].
    pub fn build(self) -> Result<Arc<Definition<M>>, BuildError> {
        if self.states.is_empty() {
            return Err(BuildError::NoStates);
        }
        if self.root_kind == StateKind::Compound && self.initial.is_none() {
            return Err(BuildError::MissingInitialState);
        }

        loader::load(self).map(Arc::new)
    }
}
