//! Structural checks over a flattened definition.
//!
//! Every check returns a `Validation` so the loader can report all problems
//! in one pass instead of stopping at the first.

use super::loader::Draft;
use super::{Machine, NodeId};
use crate::builder::error::display_id;
use crate::builder::transition::Trigger;
use crate::builder::DefinitionError;
use crate::core::StateKind;
use std::collections::HashSet;
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;

pub(crate) type Check = Validation<(), NonEmptyVec<DefinitionError>>;

fn check(ok: bool, error: impl FnOnce() -> DefinitionError) -> Check {
    if ok {
        Validation::success(())
    } else {
        Validation::fail(error())
    }
}

/// Run every structural check, collecting one result per check.
pub(crate) fn structure<M: Machine>(drafts: &[Draft<M>]) -> Vec<Check> {
    let mut checks = Vec::new();
    let mut seen = HashSet::new();

    for (index, draft) in drafts.iter().enumerate() {
        if index != super::ROOT {
            checks.push(check(is_valid_key(&draft.key), || DefinitionError::InvalidKey {
                key: draft.key.clone(),
            }));
        }
        checks.push(check(seen.insert(draft.id.as_str()), || {
            DefinitionError::DuplicateId {
                id: draft.id.clone(),
            }
        }));
        checks.extend(shape(drafts, index));
        checks.extend(triggers(draft));
    }

    checks
}

fn is_valid_key(key: &str) -> bool {
    !key.is_empty() && !key.contains('.') && !key.contains('#')
}

/// Children, initial child and final-state rules for one node.
fn shape<M: Machine>(drafts: &[Draft<M>], index: NodeId) -> Vec<Check> {
    let draft = &drafts[index];
    let state = display_id(&draft.id);
    let mut checks = Vec::new();

    match draft.kind {
        StateKind::Compound | StateKind::Parallel => {
            checks.push(check(!draft.children.is_empty(), || {
                DefinitionError::EmptyComposite {
                    state: state.clone(),
                }
            }));
        }
        StateKind::Atomic | StateKind::Final => {
            checks.push(check(draft.children.is_empty(), || {
                DefinitionError::LeafWithChildren {
                    state: state.clone(),
                }
            }));
        }
    }

    match (draft.kind, draft.initial.as_deref()) {
        (StateKind::Compound, None) => {
            checks.push(Validation::fail(DefinitionError::MissingInitial {
                state: state.clone(),
            }));
        }
        (StateKind::Compound, Some(initial)) => {
            let known = draft
                .children
                .iter()
                .any(|&child| drafts[child].key == initial);
            checks.push(check(known, || DefinitionError::UnknownInitial {
                state: state.clone(),
                initial: initial.to_string(),
            }));
        }
        (_, Some(_)) => {
            checks.push(Validation::fail(DefinitionError::InitialOnNonCompound {
                state: state.clone(),
            }));
        }
        (_, None) => {}
    }

    if draft.kind == StateKind::Final {
        let reacts = !draft.transitions.is_empty() || draft.invoke.is_some();
        checks.push(check(!reacts, || DefinitionError::FinalWithTransitions {
            state: state.clone(),
        }));
    }

    checks
}

fn triggers<M: Machine>(draft: &Draft<M>) -> Vec<Check> {
    let state = display_id(&draft.id);
    draft
        .transitions
        .iter()
        .map(|transition| match &transition.trigger {
            None => Validation::fail(DefinitionError::MissingTrigger {
                state: state.clone(),
            }),
            Some(Trigger::Event(name)) if name.is_empty() => {
                Validation::fail(DefinitionError::EmptyEvent {
                    state: state.clone(),
                })
            }
            Some(_) => Validation::success(()),
        })
        .collect()
}
