//! Core statechart types.
//!
//! This module contains the pure building blocks shared by definitions,
//! the resolver and running actors:
//! - Contexts via the `Context` trait
//! - Events and event patterns
//! - Guards and actions over context and event
//! - Nested state values and bounded history
//!
//! Nothing in this module performs I/O or spawns tasks.

mod action;
mod event;
mod guard;
mod history;
mod state;
mod value;

pub use action::{Action, ActionError, EventBuilder};
pub(crate) use event::{invoke_done_name, invoke_error_name, state_done_name};
pub use event::{Event, EventPattern};
pub use guard::Guard;
pub use history::{StateHistory, StateTransition};
pub use state::{Context, StateKind, Status};
pub use value::StateValue;
