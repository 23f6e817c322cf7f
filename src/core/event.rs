//! Events and event patterns.
//!
//! Events are plain values: a dotted name plus an arbitrary JSON payload.
//! The engine reserves a few name prefixes for the events it generates
//! itself (state completion, invocation outcomes, child notifications).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

const DONE_STATE: &str = "done.state.";
const DONE_INVOKE: &str = "done.invoke.";
const ERROR_INVOKE: &str = "error.invoke.";
const DONE_ACTOR: &str = "done.actor.";
const ERROR_SPAWN: &str = "error.spawn.";
const SNAPSHOT: &str = "snapshot.";

/// An event delivered to an actor.
///
/// # Example
///
/// ```rust
/// use statecraft::core::Event;
/// use serde_json::json;
///
/// let event = Event::new("lock.unlock").with_payload(json!({ "password": "1234" }));
/// assert_eq!(event.name(), "lock.unlock");
/// assert_eq!(event.payload_str("password"), Some("1234"));
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    name: String,
    #[serde(default)]
    payload: Value,
}

impl Event {
    /// Create an event without payload.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            payload: Value::Null,
        }
    }

    /// Attach a payload, replacing any previous one.
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// Read a string field of an object payload.
    pub fn payload_str(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(Value::as_str)
    }

    /// Error description carried by `error.invoke.*` and `error.spawn.*` events.
    pub fn error_message(&self) -> Option<&str> {
        self.payload.as_str()
    }

    pub(crate) fn state_done(state_id: &str) -> Self {
        Self::new(state_done_name(state_id))
    }

    pub(crate) fn invoke_done(state_id: &str, output: Value) -> Self {
        Self::new(invoke_done_name(state_id)).with_payload(output)
    }

    pub(crate) fn invoke_error(state_id: &str, description: String) -> Self {
        Self::new(invoke_error_name(state_id)).with_payload(Value::String(description))
    }

    pub(crate) fn actor_done(child_id: &str, context: Value) -> Self {
        Self::new(format!("{DONE_ACTOR}{child_id}")).with_payload(context)
    }

    pub(crate) fn spawn_error(child_id: &str, description: String) -> Self {
        Self::new(format!("{ERROR_SPAWN}{child_id}")).with_payload(Value::String(description))
    }

    pub(crate) fn snapshot_changed(child_id: &str, snapshot: Value) -> Self {
        Self::new(format!("{SNAPSHOT}{child_id}")).with_payload(serde_json::json!({
            "id": child_id,
            "snapshot": snapshot,
        }))
    }

    /// Check if this event was generated by the engine rather than a caller.
    pub fn is_internal(&self) -> bool {
        [DONE_STATE, DONE_INVOKE, ERROR_INVOKE, DONE_ACTOR, ERROR_SPAWN, SNAPSHOT]
            .iter()
            .any(|prefix| self.name.starts_with(prefix))
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl From<&str> for Event {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

pub(crate) fn state_done_name(state_id: &str) -> String {
    format!("{DONE_STATE}{state_id}")
}

pub(crate) fn invoke_done_name(state_id: &str) -> String {
    format!("{DONE_INVOKE}{state_id}")
}

pub(crate) fn invoke_error_name(state_id: &str) -> String {
    format!("{ERROR_INVOKE}{state_id}")
}

/// Pattern an event name is matched against.
///
/// `"*"` matches everything, `"prefix.*"` matches any name below the prefix,
/// anything else must match exactly.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum EventPattern {
    Exact(String),
    Prefix(String),
    Any,
}

impl EventPattern {
    pub fn parse(pattern: &str) -> Self {
        if pattern == "*" {
            Self::Any
        } else if let Some(prefix) = pattern.strip_suffix(".*") {
            Self::Prefix(format!("{prefix}."))
        } else {
            Self::Exact(pattern.to_string())
        }
    }

    pub fn matches(&self, name: &str) -> bool {
        match self {
            Self::Exact(exact) => exact == name,
            Self::Prefix(prefix) => name.starts_with(prefix.as_str()),
            Self::Any => true,
        }
    }
}

impl fmt::Display for EventPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(exact) => f.write_str(exact),
            Self::Prefix(prefix) => write!(f, "{prefix}*"),
            Self::Any => f.write_str("*"),
        }
    }
}
