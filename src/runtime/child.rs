//! Child machines and the links between parents and children.

use super::actor::{ActorBuilder, ActorRef};
use super::config::RuntimeConfig;
use super::error::ActorError;
use super::mailbox::WeakMailbox;
use crate::checkpoint::Snapshot;
use crate::definition::{Definition, Machine};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// How a spawned child is addressed and whether it mirrors its snapshot.
///
/// # Example
///
/// ```rust
/// use statecraft::runtime::SpawnOptions;
///
/// let options = SpawnOptions::new("lock").sync();
/// assert_eq!(options.id, "lock");
/// assert!(options.sync_snapshot);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnOptions {
    /// Id the parent addresses the child by; unique among its children
    pub id: String,
    /// Send `snapshot.<id>` to the parent after every child macro-step
    pub sync_snapshot: bool,
}

impl SpawnOptions {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            sync_snapshot: false,
        }
    }

    /// Mirror every child snapshot into the parent's mailbox.
    pub fn sync(mut self) -> Self {
        self.sync_snapshot = true;
        self
    }
}

/// Non-owning reference from a child to its parent.
#[derive(Clone)]
pub(crate) struct ParentLink {
    pub mailbox: WeakMailbox,
    pub child_id: String,
    pub sync_snapshot: bool,
}

/// A registered child machine, erased over its machine type.
pub(crate) trait SpawnChild: Send + Sync {
    fn machine_id(&self) -> &str;

    /// Start a child, fresh or restored from `snapshot`.
    fn spawn(
        &self,
        link: ParentLink,
        snapshot: Option<Snapshot>,
        config: &RuntimeConfig,
    ) -> Result<ActorRef, ActorError>;
}

pub(crate) struct ChildMachine<M: Machine> {
    definition: Arc<Definition<M>>,
    env: M::Env,
}

impl<M: Machine> ChildMachine<M> {
    pub fn new(definition: Arc<Definition<M>>, env: M::Env) -> Self {
        Self { definition, env }
    }
}

impl<M: Machine> SpawnChild for ChildMachine<M> {
    fn machine_id(&self) -> &str {
        self.definition.id()
    }

    fn spawn(
        &self,
        link: ParentLink,
        snapshot: Option<Snapshot>,
        config: &RuntimeConfig,
    ) -> Result<ActorRef, ActorError> {
        let builder = ActorBuilder::new(Arc::clone(&self.definition), self.env.clone())
            .config(config.clone())
            .parent(link);
        match snapshot {
            Some(snapshot) => builder.snapshot(snapshot).spawn(),
            None => builder.spawn(),
        }
    }
}
