//! Runtime error types.

use crate::checkpoint::CheckpointError;
use crate::core::{ActionError, Status};
use thiserror::Error;

/// Errors that abort a macro-step.
///
/// A failed macro-step is rolled back: configuration, context and pending
/// invocations stay as they were before the event.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum ExecutionError {
    #[error(transparent)]
    Action(#[from] ActionError),

    #[error("Macro-step exceeded {limit} micro-steps")]
    MicrostepLimit { limit: usize },

    #[error("Context could not be serialized: {0}")]
    Snapshot(String),

    #[error("Actor is not running (status: {status:?})")]
    NotRunning { status: Status },
}

/// Errors reported by actor handles.
#[derive(Debug, Error)]
pub enum ActorError {
    #[error("Actor has stopped")]
    Stopped,

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
}

impl ActorError {
    /// The execution error behind this failure, if any.
    pub fn execution(&self) -> Option<&ExecutionError> {
        match self {
            Self::Execution(err) => Some(err),
            _ => None,
        }
    }
}
