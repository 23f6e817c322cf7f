//! Active configurations and their nested [`StateValue`] form.

use super::{Definition, Machine, NodeId, ROOT};
use crate::core::{StateKind, StateValue};
use std::collections::{BTreeMap, BTreeSet};

/// The set of active states of an actor.
///
/// Node indices are in document order, so iterating a configuration visits
/// ancestors before descendants. The root is always active.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Configuration(BTreeSet<NodeId>);

impl Configuration {
    pub(crate) fn from_nodes(nodes: impl IntoIterator<Item = NodeId>) -> Self {
        let mut set: BTreeSet<NodeId> = nodes.into_iter().collect();
        set.insert(ROOT);
        Self(set)
    }

    pub(crate) fn contains(&self, node: NodeId) -> bool {
        self.0.contains(&node)
    }

    pub(crate) fn iter(&self) -> impl DoubleEndedIterator<Item = NodeId> + '_ {
        self.0.iter().copied()
    }

    pub(crate) fn insert(&mut self, node: NodeId) {
        self.0.insert(node);
    }

    pub(crate) fn remove(&mut self, node: NodeId) {
        self.0.remove(&node);
    }

    /// Active atomic and final states, in document order.
    pub(crate) fn leaves<'a, M: Machine>(
        &'a self,
        definition: &'a Definition<M>,
    ) -> impl Iterator<Item = NodeId> + 'a {
        self.iter()
            .filter(move |&n| definition.node(n).kind.is_leaf())
    }

    /// Full ids of the active states, in document order.
    pub fn state_ids<'a, M: Machine>(&'a self, definition: &'a Definition<M>) -> Vec<&'a str> {
        self.iter()
            .filter(|&n| n != ROOT)
            .map(|n| definition.node(n).id.as_str())
            .collect()
    }

    /// Check if `node` has completed: a final state, a compound whose active
    /// child is final, or a parallel state whose regions have all completed.
    pub(crate) fn is_in_final<M: Machine>(&self, definition: &Definition<M>, node: NodeId) -> bool {
        let state = definition.node(node);
        match state.kind {
            StateKind::Final => true,
            StateKind::Atomic => false,
            StateKind::Compound => state
                .children
                .iter()
                .any(|&child| self.contains(child) && definition.node(child).kind == StateKind::Final),
            StateKind::Parallel => state
                .children
                .iter()
                .all(|&region| self.is_in_final(definition, region)),
        }
    }

    /// Check that exactly one child of every active compound and every
    /// child of every active parallel state is active.
    pub fn is_valid<M: Machine>(&self, definition: &Definition<M>) -> bool {
        if !self.contains(ROOT) {
            return false;
        }
        self.iter().all(|n| {
            if n >= definition.len() {
                return false;
            }
            let state = definition.node(n);
            let parent_active = state.parent.map_or(true, |p| self.contains(p));
            let active_children = state.children.iter().filter(|&&c| self.contains(c)).count();
            parent_active
                && match state.kind {
                    StateKind::Compound => active_children == 1,
                    StateKind::Parallel => active_children == state.children.len(),
                    StateKind::Atomic | StateKind::Final => true,
                }
        })
    }

    /// Nested value of this configuration.
    pub fn value<M: Machine>(&self, definition: &Definition<M>) -> StateValue {
        self.value_of(definition, ROOT)
    }

    fn value_of<M: Machine>(&self, definition: &Definition<M>, node: NodeId) -> StateValue {
        let state = definition.node(node);
        match state.kind {
            StateKind::Compound => {
                let active = state.children.iter().copied().find(|&c| self.contains(c));
                match active {
                    Some(child) if definition.node(child).kind.is_leaf() => {
                        StateValue::Leaf(definition.node(child).key.clone())
                    }
                    Some(child) => StateValue::Branch(BTreeMap::from([(
                        definition.node(child).key.clone(),
                        self.value_of(definition, child),
                    )])),
                    None => StateValue::Branch(BTreeMap::new()),
                }
            }
            StateKind::Parallel => StateValue::Branch(
                state
                    .children
                    .iter()
                    .map(|&region| {
                        (
                            definition.node(region).key.clone(),
                            self.value_of(definition, region),
                        )
                    })
                    .collect(),
            ),
            StateKind::Atomic | StateKind::Final => StateValue::Branch(BTreeMap::new()),
        }
    }

    /// Rebuild a configuration from its nested value.
    ///
    /// Fails on unknown keys and on values that do not describe a valid
    /// configuration of this definition.
    pub fn from_value<M: Machine>(
        definition: &Definition<M>,
        value: &StateValue,
    ) -> Result<Self, String> {
        let mut configuration = Self::from_nodes([]);
        configuration.fill(definition, ROOT, value)?;
        Ok(configuration)
    }

    fn fill<M: Machine>(
        &mut self,
        definition: &Definition<M>,
        node: NodeId,
        value: &StateValue,
    ) -> Result<(), String> {
        let state = definition.node(node);
        let child = |key: &str| {
            definition
                .child_by_key(node, key)
                .ok_or_else(|| format!("state '{}' has no child '{key}'", describe(&state.id)))
        };

        match (state.kind, value) {
            (StateKind::Compound, StateValue::Leaf(key)) => {
                let active = child(key.as_str())?;
                if !definition.node(active).kind.is_leaf() {
                    return Err(format!(
                        "state '{}' is composite and needs a nested value",
                        definition.node(active).id
                    ));
                }
                self.insert(active);
                Ok(())
            }
            (StateKind::Compound, StateValue::Branch(children)) if children.len() == 1 => {
                let (key, nested) = children
                    .iter()
                    .next()
                    .ok_or_else(|| format!("state '{}' has no active child", describe(&state.id)))?;
                let active = child(key.as_str())?;
                if definition.node(active).kind.is_leaf() {
                    return Err(format!(
                        "state '{}' is a leaf and cannot nest",
                        definition.node(active).id
                    ));
                }
                self.insert(active);
                self.fill(definition, active, nested)
            }
            (StateKind::Compound, _) => Err(format!(
                "compound state '{}' must have exactly one active child",
                describe(&state.id)
            )),
            (StateKind::Parallel, StateValue::Branch(regions)) => {
                if regions.len() != state.children.len() {
                    return Err(format!(
                        "parallel state '{}' must list all of its regions",
                        describe(&state.id)
                    ));
                }
                for (key, nested) in regions {
                    let region = child(key.as_str())?;
                    self.insert(region);
                    self.fill(definition, region, nested)?;
                }
                Ok(())
            }
            (StateKind::Parallel, StateValue::Leaf(_)) => Err(format!(
                "parallel state '{}' needs a value per region",
                describe(&state.id)
            )),
            (StateKind::Atomic | StateKind::Final, StateValue::Branch(children))
                if children.is_empty() =>
            {
                Ok(())
            }
            (StateKind::Atomic | StateKind::Final, _) => Err(format!(
                "leaf state '{}' cannot have active children",
                state.id
            )),
        }
    }
}

fn describe(id: &str) -> &str {
    if id.is_empty() {
        "(root)"
    } else {
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{MachineBuilder, StateBuilder};
    use crate::testing::Toggle;
    use serde_json::json;
    use std::sync::Arc;

    fn door() -> Arc<Definition<Toggle>> {
        MachineBuilder::new("door")
            .parallel()
            .state(
                StateBuilder::compound("door")
                    .initial("closed")
                    .state(
                        StateBuilder::compound("closed")
                            .initial("idle")
                            .state(StateBuilder::atomic("idle"))
                            .state(StateBuilder::atomic("opening")),
                    )
                    .state(StateBuilder::atomic("open")),
            )
            .state(
                StateBuilder::compound("lock")
                    .initial("unlocked")
                    .state(StateBuilder::atomic("unlocked"))
                    .state(StateBuilder::atomic("locked")),
            )
            .state(StateBuilder::atomic("light"))
            .build()
            .unwrap()
    }

    fn ids(definition: &Definition<Toggle>, ids: &[&str]) -> Configuration {
        Configuration::from_nodes(ids.iter().map(|id| definition.lookup(id).unwrap()))
    }

    #[test]
    fn value_nests_compound_and_parallel_states() {
        let definition = door();
        let configuration = ids(
            &definition,
            &["door", "door.closed", "door.closed.idle", "lock", "lock.locked", "light"],
        );

        let value = configuration.value(&definition);
        assert_eq!(
            serde_json::to_value(&value).unwrap(),
            json!({ "door": { "closed": "idle" }, "lock": "locked", "light": {} })
        );
        assert!(value.matches("door.closed.idle"));
        assert!(value.matches("lock.locked"));
    }

    #[test]
    fn from_value_inverts_value() {
        let definition = door();
        let configuration = ids(
            &definition,
            &["door", "door.open", "lock", "lock.unlocked", "light"],
        );

        let value = configuration.value(&definition);
        let rebuilt = Configuration::from_value(&definition, &value).unwrap();
        assert_eq!(rebuilt, configuration);
        assert!(rebuilt.is_valid(&definition));
    }

    #[test]
    fn from_value_rejects_unknown_and_partial_values() {
        let definition = door();

        let unknown: StateValue =
            serde_json::from_value(json!({ "door": "ajar", "lock": "locked", "light": {} })).unwrap();
        assert!(Configuration::from_value(&definition, &unknown).is_err());

        let missing_region: StateValue =
            serde_json::from_value(json!({ "door": "open", "lock": "locked" })).unwrap();
        assert!(Configuration::from_value(&definition, &missing_region).is_err());

        let composite_as_leaf: StateValue =
            serde_json::from_value(json!({ "door": "closed", "lock": "locked", "light": {} }))
                .unwrap();
        assert!(Configuration::from_value(&definition, &composite_as_leaf).is_err());
    }

    #[test]
    fn validity_requires_one_child_per_compound() {
        let definition = door();
        let both = ids(
            &definition,
            &["door", "door.open", "lock", "lock.locked", "lock.unlocked", "light"],
        );
        let orphan = ids(&definition, &["door.open", "lock", "lock.locked", "light"]);

        assert!(!both.is_valid(&definition));
        assert!(!orphan.is_valid(&definition));
    }

    #[test]
    fn completion_follows_final_children() {
        let definition = MachineBuilder::<Toggle>::new("job")
            .initial("running")
            .state(StateBuilder::atomic("running"))
            .state(StateBuilder::final_state("finished"))
            .build()
            .unwrap();

        let running = ids(&definition, &["running"]);
        let finished = ids(&definition, &["finished"]);

        assert!(!running.is_in_final(&definition, ROOT));
        assert!(finished.is_in_final(&definition, ROOT));
        assert_eq!(finished.leaves(&definition).count(), 1);
    }
}
