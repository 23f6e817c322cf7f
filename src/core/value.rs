//! Nested representation of an active configuration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The active configuration as a nested path.
///
/// A compound state whose active child is a leaf is written as the child's
/// key; composite children nest; a parallel state maps every region key to
/// that region's value.
///
/// # Example
///
/// ```rust
/// use statecraft::core::StateValue;
///
/// let value: StateValue = serde_json::from_str(r#"{"closed":"idle"}"#).unwrap();
/// assert!(value.matches("closed"));
/// assert!(value.matches("closed.idle"));
/// assert!(!value.matches("open"));
/// assert_eq!(value.to_string(), "closed.idle");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StateValue {
    Leaf(String),
    Branch(BTreeMap<String, StateValue>),
}

impl StateValue {
    /// Check whether the dotted path is active in this value.
    pub fn matches(&self, path: &str) -> bool {
        let segments: Vec<&str> = path.split('.').filter(|s| !s.is_empty()).collect();
        self.matches_segments(&segments)
    }

    fn matches_segments(&self, segments: &[&str]) -> bool {
        let Some((first, rest)) = segments.split_first() else {
            return true;
        };
        match self {
            Self::Leaf(key) => rest.is_empty() && key == first,
            Self::Branch(children) => children
                .get(*first)
                .is_some_and(|child| child.matches_segments(rest)),
        }
    }

    /// Dotted paths of every active leaf, in key order.
    pub fn leaf_paths(&self) -> Vec<String> {
        let mut paths = Vec::new();
        self.collect_leaves(String::new(), &mut paths);
        paths
    }

    fn collect_leaves(&self, prefix: String, paths: &mut Vec<String>) {
        let join = |key: &str| {
            if prefix.is_empty() {
                key.to_string()
            } else {
                format!("{prefix}.{key}")
            }
        };
        match self {
            Self::Leaf(key) => paths.push(join(key)),
            Self::Branch(children) if children.is_empty() => {
                if !prefix.is_empty() {
                    paths.push(prefix);
                }
            }
            Self::Branch(children) => {
                for (key, child) in children {
                    child.collect_leaves(join(key), paths);
                }
            }
        }
    }
}

impl fmt::Display for StateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.leaf_paths().join(", "))
    }
}
