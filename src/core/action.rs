//! Context actions and event builders.

use super::event::Event;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised by actions and guards while a macro-step runs.
///
/// Any of these aborts the macro-step; nothing it did is committed.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum ActionError {
    #[error("Action failed: {0}")]
    Failed(String),

    #[error("Guard could not be evaluated: {0}")]
    Guard(String),

    #[error("Invalid event payload: {0}")]
    Payload(String),
}

impl ActionError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    pub fn guard(message: impl Into<String>) -> Self {
        Self::Guard(message.into())
    }

    pub fn payload(message: impl Into<String>) -> Self {
        Self::Payload(message.into())
    }
}

type ActionFn<C> = dyn Fn(&mut C, &Event) -> Result<(), ActionError> + Send + Sync;

/// A resolved context action.
///
/// Actions are the only code allowed to mutate an actor's context.
pub struct Action<C> {
    run: Arc<ActionFn<C>>,
}

impl<C> Action<C> {
    /// Create an action that can fail.
    pub fn new<F>(run: F) -> Self
    where
        F: Fn(&mut C, &Event) -> Result<(), ActionError> + Send + Sync + 'static,
    {
        Self { run: Arc::new(run) }
    }

    /// Create an action that always succeeds.
    pub fn assign<F>(assign: F) -> Self
    where
        F: Fn(&mut C, &Event) + Send + Sync + 'static,
    {
        Self::new(move |ctx, event| {
            assign(ctx, event);
            Ok(())
        })
    }

    pub fn run(&self, ctx: &mut C, event: &Event) -> Result<(), ActionError> {
        (self.run)(ctx, event)
    }
}

impl<C> Clone for Action<C> {
    fn clone(&self) -> Self {
        Self {
            run: Arc::clone(&self.run),
        }
    }
}

impl<C> fmt::Debug for Action<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Action")
    }
}

/// Builds the event sent by `raise`, `send_to` and `send_to_parent` actions.
pub struct EventBuilder<C> {
    build: Arc<dyn Fn(&C, &Event) -> Event + Send + Sync>,
}

impl<C> EventBuilder<C> {
    pub fn new<F>(build: F) -> Self
    where
        F: Fn(&C, &Event) -> Event + Send + Sync + 'static,
    {
        Self {
            build: Arc::new(build),
        }
    }

    /// Always produce the same event.
    pub fn constant(event: Event) -> Self {
        Self::new(move |_, _| event.clone())
    }

    /// Re-send the triggering event under a new name, keeping its payload.
    pub fn forward(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::new(move |_, event| Event::new(name.clone()).with_payload(event.payload().clone()))
    }

    pub fn build(&self, ctx: &C, event: &Event) -> Event {
        (self.build)(ctx, event)
    }
}

impl<C> Clone for EventBuilder<C> {
    fn clone(&self) -> Self {
        Self {
            build: Arc::clone(&self.build),
        }
    }
}

impl<C> fmt::Debug for EventBuilder<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EventBuilder")
    }
}
