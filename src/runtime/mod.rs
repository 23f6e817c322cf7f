//! Running machines as actors.
//!
//! - [`Interpreter`]: synchronous, transactional macro-step core
//! - [`ActorRef`] / [`ActorBuilder`]: tokio-backed shell around it
//! - [`SpawnOptions`]: how a parent addresses the children it spawns

mod actor;
mod child;
mod config;
mod error;
mod interpreter;
pub(crate) mod mailbox;

pub use actor::{create, restore, ActorBuilder, ActorRef, Subscription};
pub use child::SpawnOptions;
pub(crate) use child::{ChildMachine, SpawnChild};
pub use config::RuntimeConfig;
pub use error::{ActorError, ExecutionError};
pub use interpreter::{Command, Interpreter, MacroStep};
