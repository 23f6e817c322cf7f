//! Checkpoint and resume for live actors.
//!
//! A [`Snapshot`] is the logical state of an actor tree: configuration,
//! context, status and children. [`encode`] turns it into an opaque blob
//! (JSON or compact binary) and [`decode`] reverses it; [`serialize`] and
//! [`deserialize`] do the same at the level of running actors. Where the
//! blobs are stored is up to the caller.

use crate::core::{StateValue, Status};
use crate::definition::{Definition, Machine};
use crate::runtime::{self, ActorError, ActorRef};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

pub mod error;
mod wire;

pub use error::CheckpointError;

use wire::{WireCheckpoint, WireSnapshot};

/// Version identifier for checkpoint format
pub const CHECKPOINT_VERSION: u32 = 1;

/// Serializable state of an actor and its children.
///
/// Does NOT include pending invocations; they are restarted on restore.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Id of the machine definition
    pub machine: String,
    /// Version of the machine definition
    pub version: u32,
    pub status: Status,
    /// Active configuration as a nested value
    pub value: StateValue,
    pub context: Value,
    /// Spawned children by id
    #[serde(default)]
    pub children: BTreeMap<String, Snapshot>,
    /// Set on a child that mirrors its snapshot to its parent
    #[serde(default, skip_serializing_if = "is_false")]
    pub synced: bool,
}

fn is_false(flag: &bool) -> bool {
    !*flag
}

impl Snapshot {
    /// Check if the dotted state path is active.
    pub fn matches(&self, path: &str) -> bool {
        self.value.matches(path)
    }
}

/// Blob encodings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SnapshotFormat {
    /// Human readable JSON
    Json,
    /// Compact bincode
    Binary,
}

/// Versioned envelope written by the JSON format.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Checkpoint format version
    pub version: u32,
    pub snapshot: Snapshot,
}

#[derive(Deserialize)]
struct VersionProbe {
    version: u32,
}

/// Encode a snapshot into an opaque blob.
pub fn encode(snapshot: &Snapshot, format: SnapshotFormat) -> Result<Vec<u8>, CheckpointError> {
    match format {
        SnapshotFormat::Json => {
            let checkpoint = Checkpoint {
                version: CHECKPOINT_VERSION,
                snapshot: snapshot.clone(),
            };
            serde_json::to_vec(&checkpoint)
                .map_err(|err| CheckpointError::SerializationFailed(err.to_string()))
        }
        SnapshotFormat::Binary => {
            let checkpoint = WireCheckpoint {
                version: CHECKPOINT_VERSION,
                snapshot: WireSnapshot::from_snapshot(snapshot)?,
            };
            bincode::serialize(&checkpoint)
                .map_err(|err| CheckpointError::SerializationFailed(err.to_string()))
        }
    }
}

/// Decode a blob produced by [`encode`].
///
/// The format version is checked before the rest of the blob is read.
pub fn decode(bytes: &[u8], format: SnapshotFormat) -> Result<Snapshot, CheckpointError> {
    let malformed = |err: &dyn std::fmt::Display| CheckpointError::DeserializationFailed(err.to_string());

    match format {
        SnapshotFormat::Json => {
            let probe: VersionProbe = serde_json::from_slice(bytes).map_err(|err| malformed(&err))?;
            check_version(probe.version)?;
            let checkpoint: Checkpoint =
                serde_json::from_slice(bytes).map_err(|err| malformed(&err))?;
            Ok(checkpoint.snapshot)
        }
        SnapshotFormat::Binary => {
            let version: u32 = bincode::deserialize(bytes).map_err(|err| malformed(&err))?;
            check_version(version)?;
            let checkpoint: WireCheckpoint =
                bincode::deserialize(bytes).map_err(|err| malformed(&err))?;
            checkpoint.snapshot.into_snapshot()
        }
    }
}

fn check_version(found: u32) -> Result<(), CheckpointError> {
    if found == CHECKPOINT_VERSION {
        Ok(())
    } else {
        Err(CheckpointError::UnsupportedVersion {
            found,
            supported: CHECKPOINT_VERSION,
        })
    }
}

/// Encode the current snapshot of an actor tree.
pub fn serialize(actor: &ActorRef, format: SnapshotFormat) -> Result<Vec<u8>, CheckpointError> {
    encode(&actor.get_snapshot(), format)
}

/// Decode a blob and restore the actor tree it describes.
///
/// Must be called from within a tokio runtime.
pub fn deserialize<M: Machine>(
    bytes: &[u8],
    format: SnapshotFormat,
    definition: Arc<Definition<M>>,
    env: M::Env,
) -> Result<ActorRef, CheckpointError> {
    let snapshot = decode(bytes, format)?;
    runtime::restore(definition, env, snapshot).map_err(|err| match err {
        ActorError::Checkpoint(err) => err,
        other => CheckpointError::ValidationFailed(other.to_string()),
    })
}
