//! Guard predicates for controlling transitions.
//!
//! Guards are pure boolean functions over the context and the triggering
//! event. They never mutate anything and must not block.

use super::action::ActionError;
use super::event::Event;
use std::fmt;
use std::sync::Arc;

type Predicate<C> = dyn Fn(&C, &Event) -> Result<bool, ActionError> + Send + Sync;

/// Pure predicate that determines if a transition can be taken.
///
/// # Example
///
/// ```rust
/// use statecraft::core::{Event, Guard};
/// use serde_json::json;
///
/// #[derive(Clone, Debug)]
/// struct Lock {
///     password: Option<String>,
/// }
///
/// let password_matches = Guard::new(|ctx: &Lock, event: &Event| {
///     ctx.password.as_deref() == event.payload_str("password")
/// });
///
/// let ctx = Lock { password: Some("1234".into()) };
/// let right = Event::new("unlock").with_payload(json!({ "password": "1234" }));
/// let wrong = Event::new("unlock").with_payload(json!({ "password": "4321" }));
///
/// assert!(password_matches.check(&ctx, &right).unwrap());
/// assert!(!password_matches.check(&ctx, &wrong).unwrap());
/// ```
pub struct Guard<C> {
    predicate: Arc<Predicate<C>>,
}

impl<C> Guard<C> {
    /// Create a guard from a pure predicate function.
    ///
    /// The predicate must be deterministic, side-effect free and thread-safe.
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&C, &Event) -> bool + Send + Sync + 'static,
    {
        Self {
            predicate: Arc::new(move |ctx, event| Ok(predicate(ctx, event))),
        }
    }

    /// Create a guard that can fail to evaluate, e.g. on a malformed payload.
    ///
    /// An evaluation error aborts the whole macro-step.
    pub fn fallible<F>(predicate: F) -> Self
    where
        F: Fn(&C, &Event) -> Result<bool, ActionError> + Send + Sync + 'static,
    {
        Self {
            predicate: Arc::new(predicate),
        }
    }

    /// Evaluate the guard.
    pub fn check(&self, ctx: &C, event: &Event) -> Result<bool, ActionError> {
        (self.predicate)(ctx, event)
    }
}

impl<C> Clone for Guard<C> {
    fn clone(&self) -> Self {
        Self {
            predicate: Arc::clone(&self.predicate),
        }
    }
}

impl<C> fmt::Debug for Guard<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Guard")
    }
}
