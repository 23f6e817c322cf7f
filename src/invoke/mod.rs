//! Asynchronous invocations bound to state activations.
//!
//! An invocation is started when its state is entered and cancelled when the
//! state is exited. Outcomes come back as ordinary events, and only if the
//! generation they were started with is still the current one.
//!
//! - [`Service`]: effect factory resolved from a machine's service identifier
//! - [`InvocationTable`]: pure generation bookkeeping used by the interpreter
//! - `InvocationManager`: runs effects as tokio tasks for a live actor

mod manager;
mod table;

pub(crate) use manager::InvocationManager;
pub use table::InvocationTable;

use crate::core::Event;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use stillwater::effect::BoxedEffect;
use thiserror::Error;

/// Failure reported by an invoked service.
///
/// The description is delivered verbatim as the payload of the
/// `error.invoke.<state>` event.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct InvocationError(pub String);

impl InvocationError {
    pub fn new(description: impl Into<String>) -> Self {
        Self(description.into())
    }
}

/// Type alias for service effect factories.
/// These functions create a fresh effect for every activation.
type ServiceFactory<C, Env> =
    dyn Fn(&C, &Event) -> BoxedEffect<Value, InvocationError, Env> + Send + Sync;

/// An asynchronous operation that can be bound to a state.
///
/// The factory receives the context as it was right after the state's entry
/// actions ran, plus the event that caused the entry.
///
/// # Example
///
/// ```rust
/// use statecraft::invoke::{InvocationError, Service};
/// use stillwater::prelude::*;
///
/// #[derive(Clone, Debug)]
/// struct Door { jammed: bool }
///
/// let open_door: Service<Door, ()> = Service::new(|ctx: &Door, _event| {
///     if ctx.jammed {
///         fail(InvocationError::new("door is jammed")).boxed()
///     } else {
///         pure(serde_json::json!({ "opened": true })).boxed()
///     }
/// });
/// ```
pub struct Service<C, Env> {
    factory: Arc<ServiceFactory<C, Env>>,
}

impl<C, Env> Service<C, Env> {
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn(&C, &Event) -> BoxedEffect<Value, InvocationError, Env> + Send + Sync + 'static,
    {
        Self {
            factory: Arc::new(factory),
        }
    }

    /// Create the effect for one activation.
    pub fn effect(&self, ctx: &C, event: &Event) -> BoxedEffect<Value, InvocationError, Env> {
        (self.factory)(ctx, event)
    }
}

impl<C, Env> Clone for Service<C, Env> {
    fn clone(&self) -> Self {
        Self {
            factory: Arc::clone(&self.factory),
        }
    }
}

impl<C, Env> fmt::Debug for Service<C, Env> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Service")
    }
}

/// Outcome of an invocation as delivered back to its actor.
#[derive(Clone, Debug, PartialEq)]
pub struct InvocationOutcome {
    /// Id of the state that started the invocation
    pub state: String,
    /// Generation the invocation was started with
    pub generation: u64,
    /// Service output or failure description
    pub result: Result<Value, String>,
}
