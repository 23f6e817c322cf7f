//! Binary layout of checkpoints.
//!
//! bincode is not self-describing, so the untagged state value and the
//! free-form context travel as embedded JSON text.

use super::{CheckpointError, Snapshot};
use crate::core::Status;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize)]
pub(crate) struct WireCheckpoint {
    pub version: u32,
    pub snapshot: WireSnapshot,
}

#[derive(Serialize, Deserialize)]
pub(crate) struct WireSnapshot {
    machine: String,
    version: u32,
    status: Status,
    value: String,
    context: String,
    children: Vec<(String, WireSnapshot)>,
    synced: bool,
}

impl WireSnapshot {
    pub fn from_snapshot(snapshot: &Snapshot) -> Result<Self, CheckpointError> {
        Ok(Self {
            machine: snapshot.machine.clone(),
            version: snapshot.version,
            status: snapshot.status,
            value: to_json(&snapshot.value)?,
            context: to_json(&snapshot.context)?,
            children: snapshot
                .children
                .iter()
                .map(|(id, child)| Ok((id.clone(), Self::from_snapshot(child)?)))
                .collect::<Result<_, CheckpointError>>()?,
            synced: snapshot.synced,
        })
    }

    pub fn into_snapshot(self) -> Result<Snapshot, CheckpointError> {
        let malformed = |err: serde_json::Error| CheckpointError::DeserializationFailed(err.to_string());

        Ok(Snapshot {
            machine: self.machine,
            version: self.version,
            status: self.status,
            value: serde_json::from_str(&self.value).map_err(malformed)?,
            context: serde_json::from_str(&self.context).map_err(malformed)?,
            children: self
                .children
                .into_iter()
                .map(|(id, child)| Ok((id, child.into_snapshot()?)))
                .collect::<Result<_, CheckpointError>>()?,
            synced: self.synced,
        })
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<String, CheckpointError> {
    serde_json::to_string(value).map_err(|err| CheckpointError::SerializationFailed(err.to_string()))
}
