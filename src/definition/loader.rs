//! Turns a `MachineBuilder` tree into a validated [`Definition`].
//!
//! Loading runs in three passes: flatten the builder tree into document
//! order, check its structure, then resolve every name (targets, state
//! references, child machines) against the flattened index. Problems from
//! all passes are accumulated and reported together.

use super::validation::{self, Check};
use super::{
    Condition, Definition, InvokeDef, Machine, Node, NodeId, Op, TransitionDef, TransitionTrigger,
    ROOT,
};
use crate::builder::error::display_id;
use crate::builder::transition::Trigger;
use crate::builder::{
    ActionSpec, BuildError, DefinitionError, GuardSpec, InvokeBuilder, MachineBuilder,
    StateBuilder, TransitionBuilder,
};
use crate::core::{invoke_done_name, invoke_error_name, state_done_name, EventPattern, StateKind};
use crate::runtime::SpawnChild;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use stillwater::validation::Validation;

/// A state node before its names are resolved.
pub(crate) struct Draft<M: Machine> {
    pub id: String,
    pub key: String,
    pub kind: StateKind,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub initial: Option<String>,
    pub entry: Vec<ActionSpec<M>>,
    pub exit: Vec<ActionSpec<M>>,
    pub transitions: Vec<TransitionBuilder<M>>,
    pub invoke: Option<InvokeBuilder<M>>,
}

/// Load and validate a machine definition.
pub(crate) fn load<M: Machine>(builder: MachineBuilder<M>) -> Result<Definition<M>, BuildError> {
    let MachineBuilder {
        id,
        version,
        root_kind,
        initial,
        context,
        states,
        transitions,
        entry,
        child_machines,
    } = builder;

    let mut drafts = vec![Draft {
        id: String::new(),
        key: String::new(),
        kind: root_kind,
        parent: None,
        children: Vec::new(),
        initial,
        entry,
        exit: Vec::new(),
        transitions,
        invoke: None,
    }];
    for state in states {
        flatten(&mut drafts, ROOT, state);
    }

    let mut checks = validation::structure(&drafts);

    let mut index = HashMap::new();
    for (n, draft) in drafts.iter().enumerate() {
        index.entry(draft.id.clone()).or_insert(n);
    }

    let resolver = Names {
        drafts: &drafts,
        index: &index,
        child_machines: &child_machines,
    };
    let resolved: Vec<_> = (0..drafts.len())
        .map(|n| resolver.node(n, &mut checks))
        .collect();

    if let Validation::Failure(errors) = Validation::all_vec(checks).map(|_| ()) {
        return Err(BuildError::Invalid(errors.iter().cloned().collect()));
    }

    let initials: Vec<Option<NodeId>> = drafts
        .iter()
        .map(|draft| {
            let key = draft.initial.as_deref()?;
            draft
                .children
                .iter()
                .copied()
                .find(|&child| drafts[child].key == key)
        })
        .collect();

    let nodes = drafts
        .into_iter()
        .zip(resolved)
        .zip(initials)
        .map(|((draft, parts), initial)| Node {
            initial,
            id: draft.id,
            key: draft.key,
            kind: draft.kind,
            parent: draft.parent,
            children: draft.children,
            entry: parts.entry,
            exit: parts.exit,
            transitions: parts.transitions,
            invoke: parts.invoke,
        })
        .collect();

    Ok(Definition {
        id,
        version,
        context,
        nodes,
        index,
        child_machines,
    })
}

/// Append `state` and its subtree below `parent`, pre-order.
fn flatten<M: Machine>(drafts: &mut Vec<Draft<M>>, parent: NodeId, state: StateBuilder<M>) {
    let StateBuilder {
        key,
        kind,
        initial,
        children,
        entry,
        exit,
        transitions,
        invoke,
    } = state;

    let id = join(&drafts[parent].id, &key);
    let n = drafts.len();
    drafts[parent].children.push(n);
    drafts.push(Draft {
        id,
        key,
        kind,
        parent: Some(parent),
        children: Vec::new(),
        initial,
        entry,
        exit,
        transitions,
        invoke,
    });

    for child in children {
        flatten(drafts, n, child);
    }
}

fn join(scope: &str, key: &str) -> String {
    if scope.is_empty() {
        key.to_string()
    } else {
        format!("{scope}.{key}")
    }
}

/// Resolved parts of one node; failures are pushed to the check list.
struct Parts<M: Machine> {
    entry: Vec<Op<M::Context>>,
    exit: Vec<Op<M::Context>>,
    transitions: Vec<TransitionDef<M::Context>>,
    invoke: Option<InvokeDef<M::Context, M::Env>>,
}

struct Names<'a, M: Machine> {
    drafts: &'a [Draft<M>],
    index: &'a HashMap<String, NodeId>,
    child_machines: &'a BTreeMap<String, Arc<dyn SpawnChild>>,
}

impl<M: Machine> Names<'_, M> {
    fn node(&self, n: NodeId, checks: &mut Vec<Check>) -> Parts<M> {
        let draft = &self.drafts[n];

        let entry = self.ops(n, &draft.entry, checks);
        let exit = self.ops(n, &draft.exit, checks);

        let mut transitions: Vec<_> = draft
            .transitions
            .iter()
            .filter_map(|t| self.transition(n, t, checks))
            .collect();

        let invoke = draft.invoke.as_ref().map(|invoke| {
            transitions.extend(
                invoke
                    .transitions
                    .iter()
                    .filter_map(|t| self.transition(n, t, checks)),
            );
            InvokeDef {
                label: format!("{:?}", invoke.service),
                service: M::service(invoke.service),
            }
        });

        Parts {
            entry,
            exit,
            transitions,
            invoke,
        }
    }

    fn transition(
        &self,
        source: NodeId,
        transition: &TransitionBuilder<M>,
        checks: &mut Vec<Check>,
    ) -> Option<TransitionDef<M::Context>> {
        let id = &self.drafts[source].id;
        // Missing and empty triggers are reported by the structural pass.
        let trigger = match transition.trigger.as_ref()? {
            Trigger::Event(name) if name.is_empty() => return None,
            Trigger::Event(name) => TransitionTrigger::Event(EventPattern::parse(name)),
            Trigger::StateDone => TransitionTrigger::Event(EventPattern::Exact(state_done_name(id))),
            Trigger::InvokeDone => {
                TransitionTrigger::Event(EventPattern::Exact(invoke_done_name(id)))
            }
            Trigger::InvokeError => {
                TransitionTrigger::Event(EventPattern::Exact(invoke_error_name(id)))
            }
            Trigger::Always => TransitionTrigger::Always,
        };

        let target = match transition.target.as_deref() {
            None => None,
            Some(target) => match self.lookup(source, target) {
                Some(n) => Some(n),
                None => {
                    checks.push(Validation::fail(DefinitionError::UnknownTarget {
                        state: display_id(id),
                        target: target.to_string(),
                    }));
                    return None;
                }
            },
        };

        let condition = match transition.guard.as_ref() {
            None => None,
            Some(guard) => match self.condition(source, guard) {
                Ok(condition) => Some(condition),
                Err(error) => {
                    checks.push(Validation::fail(error));
                    return None;
                }
            },
        };

        Some(TransitionDef {
            source,
            trigger,
            condition,
            target,
            actions: self.ops(source, &transition.actions, checks),
        })
    }

    fn condition(
        &self,
        source: NodeId,
        guard: &GuardSpec<M>,
    ) -> Result<Condition<M::Context>, DefinitionError> {
        match guard {
            GuardSpec::Named(guard) => Ok(Condition::Guard {
                label: format!("{guard:?}"),
                guard: M::guard(*guard),
            }),
            GuardSpec::InState(reference) => self
                .lookup(source, reference)
                .map(Condition::InState)
                .ok_or_else(|| DefinitionError::UnknownStateReference {
                    state: display_id(&self.drafts[source].id),
                    reference: reference.clone(),
                }),
            GuardSpec::Not(inner) => Ok(Condition::Not(Box::new(self.condition(source, inner)?))),
        }
    }

    fn ops(
        &self,
        source: NodeId,
        actions: &[ActionSpec<M>],
        checks: &mut Vec<Check>,
    ) -> Vec<Op<M::Context>> {
        actions
            .iter()
            .filter_map(|action| match action {
                ActionSpec::Run(action) => Some(Op::Run {
                    label: format!("{action:?}"),
                    action: M::action(*action),
                }),
                ActionSpec::Raise(event) => Some(Op::Raise(event.clone())),
                ActionSpec::SendTo { child, event } => Some(Op::SendTo {
                    child: child.clone(),
                    event: event.clone(),
                }),
                ActionSpec::SendToParent(event) => Some(Op::SendToParent(event.clone())),
                ActionSpec::Spawn { machine, options } => {
                    if self.child_machines.contains_key(machine) {
                        Some(Op::Spawn {
                            machine: machine.clone(),
                            options: options.clone(),
                        })
                    } else {
                        checks.push(Validation::fail(DefinitionError::UnknownChildMachine {
                            state: display_id(&self.drafts[source].id),
                            machine: machine.clone(),
                        }));
                        None
                    }
                }
                ActionSpec::Stop(child) => Some(Op::Stop(child.clone())),
            })
            .collect()
    }

    /// Find the state a transition or guard of `source` refers to.
    ///
    /// `#a.b` is an absolute id. Otherwise the reference is tried relative
    /// to the source's parent, then each further ancestor, then the source
    /// itself.
    fn lookup(&self, source: NodeId, reference: &str) -> Option<NodeId> {
        if let Some(absolute) = reference.strip_prefix('#') {
            return self.index.get(absolute).copied();
        }

        let scopes = std::iter::successors(self.drafts[source].parent, |&n| self.drafts[n].parent)
            .chain(std::iter::once(source));
        for scope in scopes {
            if let Some(&n) = self.index.get(&join(&self.drafts[scope].id, reference)) {
                return Some(n);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use crate::builder::{
        ActionSpec, BuildError, DefinitionError, MachineBuilder, StateBuilder, TransitionBuilder,
    };
    use crate::core::StateKind;
    use crate::runtime::SpawnOptions;
    use crate::testing::Toggle;

    #[test]
    fn ids_are_dotted_paths_in_document_order() {
        let definition = MachineBuilder::<Toggle>::new("door")
            .initial("closed")
            .state(
                StateBuilder::compound("closed")
                    .initial("idle")
                    .state(StateBuilder::atomic("idle"))
                    .state(StateBuilder::atomic("opening")),
            )
            .state(StateBuilder::atomic("open"))
            .build()
            .unwrap();

        assert_eq!(
            definition.state_ids(),
            vec!["closed", "closed.idle", "closed.opening", "open"]
        );
        assert_eq!(definition.kind_of("closed"), Some(StateKind::Compound));
        assert_eq!(definition.kind_of("closed.idle"), Some(StateKind::Atomic));
    }

    #[test]
    fn targets_resolve_against_enclosing_scopes() {
        let definition = MachineBuilder::<Toggle>::new("door")
            .initial("closed")
            .state(
                StateBuilder::compound("closed")
                    .initial("idle")
                    .state(StateBuilder::atomic("idle").on(TransitionBuilder::on("go").to("opening")))
                    .state(StateBuilder::atomic("opening").on(TransitionBuilder::on("go").to("open")))
                    .on(TransitionBuilder::on("reset").to("#closed.idle")),
            )
            .state(StateBuilder::atomic("open").on(TransitionBuilder::on("go").to("closed")))
            .build()
            .unwrap();

        let idle = definition.lookup("closed.idle").unwrap();
        let opening = definition.lookup("closed.opening").unwrap();
        let open = definition.lookup("open").unwrap();
        let closed = definition.lookup("closed").unwrap();

        assert_eq!(definition.node(idle).transitions[0].target, Some(opening));
        assert_eq!(definition.node(opening).transitions[0].target, Some(open));
        assert_eq!(definition.node(open).transitions[0].target, Some(closed));
        assert_eq!(definition.node(closed).transitions[0].target, Some(idle));
    }

    #[test]
    fn child_targets_resolve_from_the_source() {
        let definition = MachineBuilder::<Toggle>::new("door")
            .initial("closed")
            .state(
                StateBuilder::compound("closed")
                    .initial("idle")
                    .state(StateBuilder::atomic("idle"))
                    .state(StateBuilder::atomic("opening"))
                    .on(TransitionBuilder::on("go").to("opening")),
            )
            .build()
            .unwrap();

        let closed = definition.lookup("closed").unwrap();
        let opening = definition.lookup("closed.opening").unwrap();
        assert_eq!(definition.node(closed).transitions[0].target, Some(opening));
        assert_eq!(definition.node(closed).initial, definition.lookup("closed.idle"));
    }

    #[test]
    fn name_errors_are_accumulated() {
        let result = MachineBuilder::<Toggle>::new("door")
            .initial("a")
            .state(
                StateBuilder::atomic("a")
                    .on(TransitionBuilder::on("x").to("nowhere"))
                    .on(TransitionBuilder::on("y").when_in("ghost"))
                    .entry(ActionSpec::spawn("unregistered", SpawnOptions::new("kid"))),
            )
            .build();

        let Err(BuildError::Invalid(problems)) = result else {
            panic!("definition should be invalid");
        };
        assert_eq!(
            problems,
            vec![
                DefinitionError::UnknownChildMachine {
                    state: "a".into(),
                    machine: "unregistered".into(),
                },
                DefinitionError::UnknownTarget {
                    state: "a".into(),
                    target: "nowhere".into(),
                },
                DefinitionError::UnknownStateReference {
                    state: "a".into(),
                    reference: "ghost".into(),
                },
            ]
        );
    }
}
