//! Checkpoint error types.

use thiserror::Error;

/// Errors that can occur while encoding, decoding or restoring snapshots
#[derive(Debug, Error)]
pub enum CheckpointError {
    /// Serialization to JSON or binary format failed
    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    /// Deserialization from JSON or binary format failed
    #[error("Deserialization failed: {0}")]
    DeserializationFailed(String),

    /// Checkpoint version is not supported by this version
    #[error("Unsupported checkpoint version {found}, supported: {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },

    /// Snapshot was taken from another machine or another definition version
    #[error("Snapshot belongs to {found}, expected {expected}")]
    IncompatibleDefinition { expected: String, found: String },

    /// Snapshot value names unknown states or an impossible configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Snapshot context does not deserialize into the machine's context type
    #[error("Incompatible context: {0}")]
    IncompatibleContext(String),

    /// Snapshot contains a child whose machine is not registered
    #[error("Unknown child machine '{0}'")]
    UnknownChildMachine(String),

    /// Restoring the actor failed for another reason
    #[error("Checkpoint validation failed: {0}")]
    ValidationFailed(String),
}
