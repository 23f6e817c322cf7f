//! Statecraft: hierarchical statecharts with an actor runtime
//!
//! Statecraft is built on Stillwater's "pure core, imperative shell" philosophy.
//! Deciding what happens on an event is a pure, synchronous computation over a
//! validated definition; tokio-backed actors only move messages around and run
//! the asynchronous work bound to states.
//!
//! # Core Concepts
//!
//! - **Definitions**: compound, parallel and final states built with fluent
//!   builders and validated once, reporting every problem together
//! - **Machines**: guards, actions and services named by enumerated identifiers
//!   and resolved at load time
//! - **Invocations**: stillwater effects started on state entry, cancelled on
//!   exit, with stale outcomes discarded by generation
//! - **Actors**: one mailbox and one macro-step at a time, with subscriptions,
//!   children and parent messaging
//! - **Checkpoints**: JSON or binary snapshots of a whole actor tree
//!
//! # Example
//!
//! ```rust
//! use statecraft::builder::{MachineBuilder, StateBuilder, TransitionBuilder};
//! use statecraft::core::{Action, Event, Guard};
//! use statecraft::definition::{Machine, Never};
//! use statecraft::invoke::Service;
//! use statecraft::runtime::{Interpreter, RuntimeConfig};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Clone, Debug, Default, Serialize, Deserialize)]
//! struct Presses {
//!     count: u32,
//! }
//!
//! #[derive(Clone, Copy, Debug, PartialEq, Eq)]
//! enum Count { Press }
//!
//! struct Switch;
//!
//! impl Machine for Switch {
//!     type Context = Presses;
//!     type Guard = Never;
//!     type Action = Count;
//!     type Service = Never;
//!     type Env = ();
//!
//!     fn guard(guard: Never) -> Guard<Presses> {
//!         match guard {}
//!     }
//!
//!     fn action(action: Count) -> Action<Presses> {
//!         match action {
//!             Count::Press => Action::assign(|ctx: &mut Presses, _: &Event| ctx.count += 1),
//!         }
//!     }
//!
//!     fn service(service: Never) -> Service<Presses, ()> {
//!         match service {}
//!     }
//! }
//!
//! let switch = MachineBuilder::<Switch>::new("switch")
//!     .initial("off")
//!     .state(StateBuilder::atomic("off").on(TransitionBuilder::on("press").to("on").action(Count::Press)))
//!     .state(StateBuilder::atomic("on").on(TransitionBuilder::on("press").to("off").action(Count::Press)))
//!     .build()
//!     .unwrap();
//!
//! let (mut interpreter, _) =
//!     Interpreter::start(switch, Presses::default(), RuntimeConfig::default()).unwrap();
//! interpreter.send(Event::new("press")).unwrap();
//!
//! assert!(interpreter.matches("on"));
//! assert_eq!(interpreter.context().count, 1);
//! ```

pub mod builder;
pub mod checkpoint;
pub mod core;
pub mod definition;
pub mod invoke;
pub(crate) mod resolver;
pub mod runtime;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use builder::{ActionSpec, InvokeBuilder, MachineBuilder, StateBuilder, TransitionBuilder};
pub use checkpoint::{CheckpointError, Snapshot, SnapshotFormat};
pub use core::{Event, StateHistory, StateTransition, StateValue, Status};
pub use definition::{Definition, Machine};
pub use runtime::{create, restore, ActorBuilder, ActorError, ActorRef, RuntimeConfig};
