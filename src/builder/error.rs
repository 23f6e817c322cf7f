//! Build errors for machine definitions.

use thiserror::Error;

/// Errors that can occur when building a machine definition.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Initial state not specified. Call .initial(key) before .build()")]
    MissingInitialState,

    #[error("No states defined. Add at least one state")]
    NoStates,

    #[error("Machine definition is invalid: {}", describe(.0))]
    Invalid(Vec<DefinitionError>),
}

impl BuildError {
    /// All definition problems found, empty for the fail-fast variants.
    pub fn problems(&self) -> &[DefinitionError] {
        match self {
            Self::Invalid(errors) => errors,
            _ => &[],
        }
    }
}

fn describe(errors: &[DefinitionError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// A single structural problem in a machine definition.
///
/// The loader reports every problem it finds, not just the first one.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DefinitionError {
    #[error("State key '{key}' is invalid: keys must be non-empty and must not contain '.' or '#'")]
    InvalidKey { key: String },

    #[error("Duplicate state id '{id}'")]
    DuplicateId { id: String },

    #[error("Compound state '{state}' has no initial child")]
    MissingInitial { state: String },

    #[error("Initial child '{initial}' of state '{state}' does not exist")]
    UnknownInitial { state: String, initial: String },

    #[error("State '{state}' is not compound and cannot declare an initial child")]
    InitialOnNonCompound { state: String },

    #[error("Composite state '{state}' has no children")]
    EmptyComposite { state: String },

    #[error("Leaf state '{state}' cannot have children")]
    LeafWithChildren { state: String },

    #[error("Final state '{state}' cannot have transitions or invocations")]
    FinalWithTransitions { state: String },

    #[error("A transition of state '{state}' has no trigger")]
    MissingTrigger { state: String },

    #[error("A transition of state '{state}' listens to an empty event name")]
    EmptyEvent { state: String },

    #[error("Transition target '{target}' of state '{state}' does not exist")]
    UnknownTarget { state: String, target: String },

    #[error("Guard of state '{state}' refers to unknown state '{reference}'")]
    UnknownStateReference { state: String, reference: String },

    #[error("State '{state}' spawns unregistered child machine '{machine}'")]
    UnknownChildMachine { state: String, machine: String },
}

/// Render a state id for messages; the root has an empty id.
pub(crate) fn display_id(id: &str) -> String {
    if id.is_empty() {
        "(root)".to_string()
    } else {
        id.to_string()
    }
}
