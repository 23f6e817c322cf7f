//! Pure transition resolution.
//!
//! Given a definition, the active configuration, the context and an event,
//! the resolver selects the enabled transitions and computes the ordered
//! micro-operations of one micro-step plus the configuration it leads to.
//! It never runs actions and never mutates anything; the interpreter
//! executes what it returns.
//!
//! Selection rules:
//! - every active leaf walks towards the root and stops at the first state
//!   with a transition listening to the event; guards of that state are tried
//!   in declaration order and the first passing one is selected
//! - if none passes, the leaf contributes nothing (ancestors are not asked)
//! - eventless transitions are the exception: they keep walking up until an
//!   enabled one is found
//! - transitions with overlapping exit sets conflict; a transition from a
//!   descendant preempts one from its ancestor, otherwise the earlier wins

use crate::core::{ActionError, Event, StateKind};
use crate::definition::{Condition, Configuration, Definition, Machine, NodeId, ROOT};
use std::collections::BTreeSet;

/// A transition, addressed by source state and position in its table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Selected {
    pub source: NodeId,
    pub index: usize,
}

/// One operation of a micro-step, in execution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum MicroOp {
    Exit(NodeId),
    Transition(Selected),
    Enter(NodeId),
}

/// Outcome of resolving one micro-step.
#[derive(Debug)]
pub(crate) struct Resolution {
    pub next: Configuration,
    pub ops: Vec<MicroOp>,
    /// `done.state.*` events raised by entering final states
    pub completions: Vec<Event>,
}

impl Resolution {
    pub fn transitions(&self) -> impl Iterator<Item = Selected> + '_ {
        self.ops.iter().filter_map(|op| match op {
            MicroOp::Transition(selected) => Some(*selected),
            _ => None,
        })
    }
}

/// Resolve the micro-step `event` triggers, if any transition is enabled.
pub(crate) fn resolve<M: Machine>(
    definition: &Definition<M>,
    configuration: &Configuration,
    context: &M::Context,
    event: &Event,
) -> Result<Option<Resolution>, ActionError> {
    let selected = select(definition, configuration, context, event, false)?;
    Ok(microstep(definition, configuration, selected))
}

/// Resolve the micro-step taken by eventless transitions.
///
/// Guards see `event`, the event of the current macro-step.
pub(crate) fn resolve_eventless<M: Machine>(
    definition: &Definition<M>,
    configuration: &Configuration,
    context: &M::Context,
    event: &Event,
) -> Result<Option<Resolution>, ActionError> {
    let selected = select(definition, configuration, context, event, true)?;
    Ok(microstep(definition, configuration, selected))
}

/// Entry of the initial configuration, root included.
pub(crate) fn initial<M: Machine>(definition: &Definition<M>) -> Resolution {
    let mut entries = BTreeSet::new();
    enter_descendants(definition, ROOT, &mut entries);
    let next = Configuration::from_nodes(entries.iter().copied());
    let completions = completions(definition, &next, &entries);

    Resolution {
        next,
        ops: entries.into_iter().map(MicroOp::Enter).collect(),
        completions,
    }
}

/// Evaluate a transition guard against the configuration at selection time.
pub(crate) fn holds<C>(
    condition: &Condition<C>,
    configuration: &Configuration,
    context: &C,
    event: &Event,
) -> Result<bool, ActionError> {
    match condition {
        Condition::Guard { guard, .. } => guard.check(context, event),
        Condition::InState(state) => Ok(configuration.contains(*state)),
        Condition::Not(inner) => Ok(!holds(inner, configuration, context, event)?),
    }
}

fn select<M: Machine>(
    definition: &Definition<M>,
    configuration: &Configuration,
    context: &M::Context,
    event: &Event,
    eventless: bool,
) -> Result<Vec<Selected>, ActionError> {
    let mut selected: Vec<Selected> = Vec::new();

    for leaf in configuration.leaves(definition) {
        let chain = std::iter::once(leaf).chain(definition.ancestors(leaf));
        let choice = if eventless {
            first_eventless(definition, configuration, context, event, chain)?
        } else {
            first_listening(definition, configuration, context, event, chain)?
        };

        if let Some(choice) = choice {
            if !selected.contains(&choice) {
                selected.push(choice);
            }
        }
    }

    Ok(remove_conflicts(definition, configuration, selected))
}

fn first_listening<M: Machine>(
    definition: &Definition<M>,
    configuration: &Configuration,
    context: &M::Context,
    event: &Event,
    chain: impl Iterator<Item = NodeId>,
) -> Result<Option<Selected>, ActionError> {
    for source in chain {
        let mut listening = definition
            .node(source)
            .transitions
            .iter()
            .enumerate()
            .filter(|(_, t)| t.listens_to(event))
            .peekable();
        if listening.peek().is_none() {
            continue;
        }
        for (index, transition) in listening {
            if passes(&transition.condition, configuration, context, event)? {
                return Ok(Some(Selected { source, index }));
            }
        }
        return Ok(None);
    }
    Ok(None)
}

fn first_eventless<M: Machine>(
    definition: &Definition<M>,
    configuration: &Configuration,
    context: &M::Context,
    event: &Event,
    chain: impl Iterator<Item = NodeId>,
) -> Result<Option<Selected>, ActionError> {
    for source in chain {
        let node = definition.node(source);
        if !node.has_eventless() {
            continue;
        }
        for (index, transition) in node.transitions.iter().enumerate() {
            if transition.is_eventless()
                && passes(&transition.condition, configuration, context, event)?
            {
                return Ok(Some(Selected { source, index }));
            }
        }
    }
    Ok(None)
}

fn passes<C>(
    condition: &Option<Condition<C>>,
    configuration: &Configuration,
    context: &C,
    event: &Event,
) -> Result<bool, ActionError> {
    match condition {
        None => Ok(true),
        Some(condition) => holds(condition, configuration, context, event),
    }
}

fn remove_conflicts<M: Machine>(
    definition: &Definition<M>,
    configuration: &Configuration,
    selected: Vec<Selected>,
) -> Vec<Selected> {
    let mut kept: Vec<(Selected, BTreeSet<NodeId>)> = Vec::new();

    for candidate in selected {
        let exits = exit_set(definition, configuration, candidate);
        let mut preempted = false;
        let mut replaced = Vec::new();

        for (i, (other, other_exits)) in kept.iter().enumerate() {
            if exits.is_disjoint(other_exits) {
                continue;
            }
            if definition.is_descendant(candidate.source, other.source) {
                replaced.push(i);
            } else {
                preempted = true;
                break;
            }
        }

        if !preempted {
            for i in replaced.into_iter().rev() {
                kept.remove(i);
            }
            kept.push((candidate, exits));
        }
    }

    kept.into_iter().map(|(selected, _)| selected).collect()
}

/// The state whose descendants a transition exits and enters.
///
/// Targetless transitions have no domain. A target inside a compound source
/// keeps the source active; anything else uses the nearest compound
/// ancestor containing both ends, so a self-transition re-enters its source.
pub(crate) fn domain<M: Machine>(definition: &Definition<M>, selected: Selected) -> Option<NodeId> {
    let transition = &definition.node(selected.source).transitions[selected.index];
    let target = transition.target?;
    let source = selected.source;

    if definition.node(source).kind == StateKind::Compound && definition.is_descendant(target, source)
    {
        return Some(source);
    }

    definition
        .ancestors(source)
        .find(|&a| {
            (a == ROOT || definition.node(a).kind == StateKind::Compound)
                && definition.is_descendant(target, a)
        })
        .or(Some(ROOT))
}

fn exit_set<M: Machine>(
    definition: &Definition<M>,
    configuration: &Configuration,
    selected: Selected,
) -> BTreeSet<NodeId> {
    match domain(definition, selected) {
        None => BTreeSet::new(),
        Some(domain) => configuration
            .iter()
            .filter(|&n| definition.is_descendant(n, domain))
            .collect(),
    }
}

fn microstep<M: Machine>(
    definition: &Definition<M>,
    configuration: &Configuration,
    selected: Vec<Selected>,
) -> Option<Resolution> {
    if selected.is_empty() {
        return None;
    }

    let mut exits = BTreeSet::new();
    let mut entries = BTreeSet::new();
    for &transition in &selected {
        exits.extend(exit_set(definition, configuration, transition));

        let target = definition.node(transition.source).transitions[transition.index].target;
        if let (Some(target), Some(domain)) = (target, domain(definition, transition)) {
            enter_descendants(definition, target, &mut entries);
            enter_ancestors(definition, target, domain, &mut entries);
            // a parallel domain (only ever the root) had every region exited
            if definition.node(domain).kind == StateKind::Parallel {
                enter_regions(definition, domain, &mut entries);
            }
        }
    }

    let mut next = configuration.clone();
    for &n in &exits {
        next.remove(n);
    }
    for &n in &entries {
        next.insert(n);
    }

    let completions = completions(definition, &next, &entries);

    // Exits run innermost first; node ids are in document order.
    let ops = exits
        .iter()
        .rev()
        .map(|&n| MicroOp::Exit(n))
        .chain(selected.into_iter().map(MicroOp::Transition))
        .chain(entries.iter().map(|&n| MicroOp::Enter(n)))
        .collect();

    Some(Resolution {
        next,
        ops,
        completions,
    })
}

fn enter_descendants<M: Machine>(
    definition: &Definition<M>,
    state: NodeId,
    entries: &mut BTreeSet<NodeId>,
) {
    entries.insert(state);
    let node = definition.node(state);
    match node.kind {
        StateKind::Compound => {
            if let Some(initial) = node.initial {
                enter_descendants(definition, initial, entries);
            }
        }
        StateKind::Parallel => enter_regions(definition, state, entries),
        StateKind::Atomic | StateKind::Final => {}
    }
}

/// Enter the default configuration of every region of `parallel` that has
/// nothing entered yet.
fn enter_regions<M: Machine>(
    definition: &Definition<M>,
    parallel: NodeId,
    entries: &mut BTreeSet<NodeId>,
) {
    for &region in &definition.node(parallel).children {
        if !has_entered_descendant(definition, region, entries) {
            enter_descendants(definition, region, entries);
        }
    }
}

/// Enter the ancestors of `state` below `domain`, filling in the other
/// regions of any parallel ancestor.
fn enter_ancestors<M: Machine>(
    definition: &Definition<M>,
    state: NodeId,
    domain: NodeId,
    entries: &mut BTreeSet<NodeId>,
) {
    let ancestors: Vec<NodeId> = definition
        .ancestors(state)
        .take_while(|&a| a != domain)
        .collect();

    for ancestor in ancestors {
        entries.insert(ancestor);
        if definition.node(ancestor).kind == StateKind::Parallel {
            enter_regions(definition, ancestor, entries);
        }
    }
}

fn has_entered_descendant<M: Machine>(
    definition: &Definition<M>,
    state: NodeId,
    entries: &BTreeSet<NodeId>,
) -> bool {
    entries
        .iter()
        .any(|&n| n == state || definition.is_descendant(n, state))
}

/// Completion events caused by entering final states.
///
/// The root's own completion is not an event; the interpreter checks the
/// configuration for it.
fn completions<M: Machine>(
    definition: &Definition<M>,
    next: &Configuration,
    entries: &BTreeSet<NodeId>,
) -> Vec<Event> {
    fn push(state: NodeId, done: &mut Vec<NodeId>) {
        if state != ROOT && !done.contains(&state) {
            done.push(state);
        }
    }

    let mut done: Vec<NodeId> = Vec::new();

    for &state in entries {
        if definition.node(state).kind != StateKind::Final {
            continue;
        }
        let Some(parent) = definition.node(state).parent else {
            continue;
        };

        match definition.node(parent).kind {
            StateKind::Compound => {
                push(parent, &mut done);
                if let Some(grandparent) = definition.node(parent).parent {
                    if definition.node(grandparent).kind == StateKind::Parallel
                        && next.is_in_final(definition, grandparent)
                    {
                        push(grandparent, &mut done);
                    }
                }
            }
            StateKind::Parallel if next.is_in_final(definition, parent) => {
                push(parent, &mut done);
            }
            _ => {}
        }
    }

    done.into_iter()
        .map(|state| Event::state_done(&definition.node(state).id))
        .collect()
}
