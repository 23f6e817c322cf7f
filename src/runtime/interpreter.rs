//! The synchronous core of an actor.
//!
//! An [`Interpreter`] owns a configuration, a context and the invocation
//! table, and turns one input into one macro-step. It performs no I/O:
//! everything the outside world has to do (start or cancel invocations,
//! message children or the parent, spawn or stop children) comes back as
//! [`Command`]s for the actor shell to execute.
//!
//! Macro-steps are transactional. The interpreter works on a copy of its
//! state and commits only when every guard and action succeeded.

use super::child::SpawnOptions;
use super::config::RuntimeConfig;
use super::error::ExecutionError;
use crate::checkpoint::{CheckpointError, Snapshot};
use crate::core::{Event, StateHistory, StateTransition, StateValue, Status};
use crate::definition::{Configuration, Definition, Machine, NodeId, Op, ROOT};
use crate::invoke::{InvocationError, InvocationOutcome, InvocationTable};
use crate::resolver::{self, MicroOp, Resolution};
use chrono::Utc;
use serde_json::Value;
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use stillwater::effect::BoxedEffect;
use tracing::{debug, trace, warn};

/// Event seen by entry actions of the initial configuration.
const INIT_EVENT: &str = "actor.init";

/// Event handed to services restarted after a restore.
const RESTORE_EVENT: &str = "actor.restore";

/// Work the actor shell performs after a committed macro-step.
pub enum Command<M: Machine> {
    StartInvocation {
        state: String,
        generation: u64,
        effect: BoxedEffect<Value, InvocationError, M::Env>,
    },
    CancelInvocation {
        state: String,
        generation: u64,
    },
    SendTo {
        child: String,
        event: Event,
    },
    SendToParent(Event),
    Spawn {
        machine: String,
        options: SpawnOptions,
    },
    Stop(String),
}

impl<M: Machine> fmt::Debug for Command<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StartInvocation {
                state, generation, ..
            } => f
                .debug_struct("StartInvocation")
                .field("state", state)
                .field("generation", generation)
                .finish(),
            Self::CancelInvocation { state, generation } => f
                .debug_struct("CancelInvocation")
                .field("state", state)
                .field("generation", generation)
                .finish(),
            Self::SendTo { child, event } => f
                .debug_struct("SendTo")
                .field("child", child)
                .field("event", event)
                .finish(),
            Self::SendToParent(event) => f.debug_tuple("SendToParent").field(event).finish(),
            Self::Spawn { machine, options } => f
                .debug_struct("Spawn")
                .field("machine", machine)
                .field("options", options)
                .finish(),
            Self::Stop(child) => f.debug_tuple("Stop").field(child).finish(),
        }
    }
}

/// Result of one processed input.
pub struct MacroStep<M: Machine> {
    pub commands: Vec<Command<M>>,
    /// Micro-steps taken, including completion and eventless steps
    pub microsteps: usize,
    /// False when the input was discarded (stale invocation outcome)
    pub processed: bool,
}

impl<M: Machine> fmt::Debug for MacroStep<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MacroStep")
            .field("commands", &self.commands)
            .field("microsteps", &self.microsteps)
            .field("processed", &self.processed)
            .finish()
    }
}

impl<M: Machine> MacroStep<M> {
    fn discarded() -> Self {
        Self {
            commands: Vec::new(),
            microsteps: 0,
            processed: false,
        }
    }
}

/// Pure statechart interpreter.
///
/// # Example
///
/// ```rust
/// # use statecraft::{definition::{Machine, Never}, core::*, invoke::Service};
/// # struct Light;
/// # impl Machine for Light {
/// #     type Context = (); type Guard = Never; type Action = Never; type Service = Never; type Env = ();
/// #     fn guard(g: Never) -> Guard<()> { match g {} }
/// #     fn action(a: Never) -> Action<()> { match a {} }
/// #     fn service(s: Never) -> Service<(), ()> { match s {} }
/// # }
/// use statecraft::builder::{MachineBuilder, StateBuilder, TransitionBuilder};
/// use statecraft::runtime::{Interpreter, RuntimeConfig};
///
/// let light = MachineBuilder::<Light>::new("light")
///     .initial("off")
///     .state(StateBuilder::atomic("off").on(TransitionBuilder::on("flip").to("on")))
///     .state(StateBuilder::atomic("on").on(TransitionBuilder::on("flip").to("off")))
///     .build()
///     .unwrap();
///
/// let (mut interpreter, _) = Interpreter::start(light, (), RuntimeConfig::default()).unwrap();
/// interpreter.send(Event::new("flip")).unwrap();
/// assert!(interpreter.matches("on"));
/// ```
pub struct Interpreter<M: Machine> {
    definition: Arc<Definition<M>>,
    configuration: Configuration,
    context: M::Context,
    context_value: Value,
    status: Status,
    invocations: InvocationTable,
    history: StateHistory,
    config: RuntimeConfig,
}

impl<M: Machine> Interpreter<M> {
    /// Enter the initial configuration, running entry actions.
    pub fn start(
        definition: Arc<Definition<M>>,
        context: M::Context,
        config: RuntimeConfig,
    ) -> Result<(Self, MacroStep<M>), ExecutionError> {
        let mut interpreter = Self {
            configuration: Configuration::from_nodes([]),
            context_value: Value::Null,
            context,
            status: Status::Running,
            invocations: InvocationTable::default(),
            history: StateHistory::with_limit(config.history_limit),
            definition,
            config,
        };

        let event = Event::new(INIT_EVENT);
        let mut tx = interpreter.transaction();
        tx.apply(resolver::initial(&interpreter.definition), &event)?;
        tx.settle(event)?;
        let (step, _) = interpreter.commit(tx)?;

        debug!(
            machine = interpreter.definition.id(),
            value = %interpreter.value(),
            "actor started"
        );
        Ok((interpreter, step))
    }

    /// Rebuild an interpreter from a snapshot without running any action.
    ///
    /// Invocations of the restored states are not running yet; call
    /// [`Interpreter::resume`] to restart them.
    pub fn restore(
        definition: Arc<Definition<M>>,
        snapshot: &Snapshot,
        config: RuntimeConfig,
    ) -> Result<Self, CheckpointError> {
        if snapshot.machine != definition.id() || snapshot.version != definition.version() {
            return Err(CheckpointError::IncompatibleDefinition {
                expected: format!("{}@{}", definition.id(), definition.version()),
                found: format!("{}@{}", snapshot.machine, snapshot.version),
            });
        }

        let configuration = Configuration::from_value(&definition, &snapshot.value)
            .map_err(CheckpointError::InvalidConfiguration)?;

        let finished = configuration.is_in_final(&definition, ROOT);
        let consistent = match snapshot.status {
            Status::Running => !finished,
            Status::Done => finished,
            Status::Error => true,
        };
        if !consistent {
            return Err(CheckpointError::InvalidConfiguration(format!(
                "status {:?} does not match configuration {}",
                snapshot.status, snapshot.value
            )));
        }

        let context: M::Context = serde_json::from_value(snapshot.context.clone())
            .map_err(|err| CheckpointError::IncompatibleContext(err.to_string()))?;

        Ok(Self {
            configuration,
            context,
            context_value: snapshot.context.clone(),
            status: snapshot.status,
            invocations: InvocationTable::default(),
            history: StateHistory::with_limit(config.history_limit),
            definition,
            config,
        })
    }

    /// Restart the invocations of every active invoking state with fresh
    /// generations.
    pub fn resume(&mut self) -> Vec<Command<M>> {
        if !self.status.is_running() {
            return Vec::new();
        }

        let event = Event::new(RESTORE_EVENT);
        let invoking: Vec<NodeId> = self
            .configuration
            .iter()
            .filter(|&n| {
                self.definition.node(n).invoke.is_some()
                    && self.invocations.current(&self.definition.node(n).id).is_none()
            })
            .collect();

        invoking
            .into_iter()
            .filter_map(|n| {
                let node = self.definition.node(n);
                let invoke = node.invoke.as_ref()?;
                let generation = self.invocations.begin(&node.id);
                debug!(state = %node.id, generation, "restarting invocation");
                Some(Command::StartInvocation {
                    state: node.id.clone(),
                    generation,
                    effect: invoke.service.effect(&self.context, &event),
                })
            })
            .collect()
    }

    /// Process an event to quiescence.
    pub fn send(&mut self, event: Event) -> Result<MacroStep<M>, ExecutionError> {
        if !self.status.is_running() {
            return Err(ExecutionError::NotRunning {
                status: self.status,
            });
        }

        let tx = self.transaction();
        self.process(tx, event)
    }

    /// Apply an invocation outcome if its generation is still current.
    ///
    /// Stale outcomes are discarded without touching anything.
    pub fn deliver(&mut self, outcome: InvocationOutcome) -> Result<MacroStep<M>, ExecutionError> {
        if !self.status.is_running() {
            trace!(state = %outcome.state, "actor not running, outcome discarded");
            return Ok(MacroStep::discarded());
        }

        let mut tx = self.transaction();
        if !tx.invocations.accept(&outcome.state, outcome.generation) {
            debug!(
                state = %outcome.state,
                generation = outcome.generation,
                current = ?self.invocations.current(&outcome.state),
                "stale invocation outcome discarded"
            );
            return Ok(MacroStep::discarded());
        }

        let event = match outcome.result {
            Ok(output) => Event::invoke_done(&outcome.state, output),
            Err(description) => Event::invoke_error(&outcome.state, description),
        };
        self.process(tx, event)
    }

    /// Mark the actor as failed after an unrecoverable error.
    ///
    /// Pending invocations are forgotten so late outcomes are discarded.
    pub fn fail(&mut self) {
        self.status = Status::Error;
        self.invocations = InvocationTable::default();
    }

    fn process(
        &mut self,
        mut tx: Transaction<M>,
        event: Event,
    ) -> Result<MacroStep<M>, ExecutionError> {
        let from = self.value();

        match resolver::resolve(&self.definition, &tx.configuration, &tx.context, &event)? {
            Some(resolution) => tx.apply(resolution, &event)?,
            None if event.name().starts_with("error.") => {
                warn!(event = %event, "error event not handled by any state");
            }
            None => trace!(event = %event, "no transition enabled"),
        }
        let name = event.name().to_string();
        tx.settle(event)?;

        let (step, changed) = self.commit(tx)?;
        if changed {
            debug!(event = %name, from = %from, to = %self.value(), "macro-step");
        }
        if step.microsteps > 0 {
            self.history.push(StateTransition {
                from,
                to: self.value(),
                event: name,
                timestamp: Utc::now(),
                microsteps: step.microsteps,
            });
        }
        Ok(step)
    }

    fn transaction(&self) -> Transaction<M> {
        Transaction {
            definition: Arc::clone(&self.definition),
            configuration: self.configuration.clone(),
            context: self.context.clone(),
            invocations: self.invocations.clone(),
            commands: Vec::new(),
            internal: VecDeque::new(),
            microsteps: 0,
            limit: self.config.max_microsteps,
        }
    }

    /// Commit a finished transaction; returns whether the configuration
    /// changed.
    fn commit(&mut self, mut tx: Transaction<M>) -> Result<(MacroStep<M>, bool), ExecutionError> {
        let context_value = serde_json::to_value(&tx.context)
            .map_err(|err| ExecutionError::Snapshot(err.to_string()))?;

        if tx.configuration.is_in_final(&self.definition, ROOT) {
            self.status = Status::Done;
            let pending: Vec<(String, u64)> = tx
                .invocations
                .pending()
                .map(|(state, generation)| (state.to_string(), generation))
                .collect();
            for (state, generation) in pending {
                tx.invocations.cancel(&state);
                tx.cancel_invocation(state, generation);
            }
            debug!(machine = self.definition.id(), "actor reached a final configuration");
        }

        let changed = tx.configuration != self.configuration;
        self.configuration = tx.configuration;
        self.context = tx.context;
        self.context_value = context_value;
        self.invocations = tx.invocations;

        Ok((
            MacroStep {
                commands: tx.commands,
                microsteps: tx.microsteps,
                processed: true,
            },
            changed,
        ))
    }

    pub fn definition(&self) -> &Arc<Definition<M>> {
        &self.definition
    }

    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    pub fn context(&self) -> &M::Context {
        &self.context
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn invocations(&self) -> &InvocationTable {
        &self.invocations
    }

    pub fn history(&self) -> &StateHistory {
        &self.history
    }

    /// Nested value of the active configuration.
    pub fn value(&self) -> StateValue {
        self.configuration.value(&self.definition)
    }

    /// Check if the dotted state path is active.
    pub fn matches(&self, path: &str) -> bool {
        self.value().matches(path)
    }

    /// Snapshot of this actor alone, without children.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            machine: self.definition.id().to_string(),
            version: self.definition.version(),
            status: self.status,
            value: self.value(),
            context: self.context_value.clone(),
            children: BTreeMap::new(),
            synced: false,
        }
    }
}

impl<M: Machine> fmt::Debug for Interpreter<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interpreter")
            .field("machine", &self.definition.id())
            .field("value", &self.value().to_string())
            .field("status", &self.status)
            .field("context", &self.context)
            .finish()
    }
}

/// Working copy of an interpreter's state during one macro-step.
struct Transaction<M: Machine> {
    definition: Arc<Definition<M>>,
    configuration: Configuration,
    context: M::Context,
    invocations: InvocationTable,
    commands: Vec<Command<M>>,
    internal: VecDeque<Event>,
    microsteps: usize,
    limit: usize,
}

impl<M: Machine> Transaction<M> {
    /// Run eventless transitions and internal events until nothing is
    /// enabled.
    fn settle(&mut self, mut event: Event) -> Result<(), ExecutionError> {
        loop {
            if self.configuration.is_in_final(&self.definition, ROOT) {
                return Ok(());
            }

            let eventless = resolver::resolve_eventless(
                &self.definition,
                &self.configuration,
                &self.context,
                &event,
            )?;
            if let Some(resolution) = eventless {
                self.apply(resolution, &event)?;
                continue;
            }

            let Some(next) = self.internal.pop_front() else {
                return Ok(());
            };
            event = next;
            trace!(event = %event, "internal event");
            if let Some(resolution) =
                resolver::resolve(&self.definition, &self.configuration, &self.context, &event)?
            {
                self.apply(resolution, &event)?;
            }
        }
    }

    fn apply(&mut self, resolution: Resolution, event: &Event) -> Result<(), ExecutionError> {
        self.microsteps += 1;
        if self.microsteps > self.limit {
            return Err(ExecutionError::MicrostepLimit { limit: self.limit });
        }

        let definition = Arc::clone(&self.definition);
        for op in &resolution.ops {
            match *op {
                MicroOp::Exit(n) => {
                    let node = definition.node(n);
                    trace!(state = %node.id, "exit");
                    self.run_all(&node.exit, event)?;
                    if node.invoke.is_some() {
                        if let Some(generation) = self.invocations.cancel(&node.id) {
                            self.cancel_invocation(node.id.clone(), generation);
                        }
                    }
                }
                MicroOp::Transition(selected) => {
                    let transition = &definition.node(selected.source).transitions[selected.index];
                    self.run_all(&transition.actions, event)?;
                }
                MicroOp::Enter(n) => {
                    let node = definition.node(n);
                    trace!(state = %node.id, "enter");
                    self.run_all(&node.entry, event)?;
                    if let Some(invoke) = &node.invoke {
                        let generation = self.invocations.begin(&node.id);
                        trace!(state = %node.id, service = %invoke.label, generation, "invoke");
                        self.commands.push(Command::StartInvocation {
                            state: node.id.clone(),
                            generation,
                            effect: invoke.service.effect(&self.context, event),
                        });
                    }
                }
            }
        }

        self.configuration = resolution.next;
        self.internal.extend(resolution.completions);
        Ok(())
    }

    /// Cancel an invocation, dropping its start if it never left this step.
    fn cancel_invocation(&mut self, state: String, generation: u64) {
        let started_here = self.commands.iter().position(|command| {
            matches!(
                command,
                Command::StartInvocation { state: s, generation: g, .. }
                    if *s == state && *g == generation
            )
        });
        match started_here {
            Some(index) => {
                self.commands.remove(index);
            }
            None => self
                .commands
                .push(Command::CancelInvocation { state, generation }),
        }
    }

    fn run_all(&mut self, ops: &[Op<M::Context>], event: &Event) -> Result<(), ExecutionError> {
        for op in ops {
            match op {
                Op::Run { label, action } => {
                    trace!(action = %label, "run action");
                    action.run(&mut self.context, event).map_err(|err| {
                        debug!(action = %label, error = %err, "action failed");
                        err
                    })?;
                }
                Op::Raise(builder) => {
                    self.internal.push_back(builder.build(&self.context, event));
                }
                Op::SendTo { child, event: builder } => self.commands.push(Command::SendTo {
                    child: child.clone(),
                    event: builder.build(&self.context, event),
                }),
                Op::SendToParent(builder) => self
                    .commands
                    .push(Command::SendToParent(builder.build(&self.context, event))),
                Op::Spawn { machine, options } => self.commands.push(Command::Spawn {
                    machine: machine.clone(),
                    options: options.clone(),
                }),
                Op::Stop(child) => self.commands.push(Command::Stop(child.clone())),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{ActionSpec, InvokeBuilder, MachineBuilder, StateBuilder, TransitionBuilder};
    use crate::testing::{Flag, Job, Noop, Toggle, ToggleContext};

    fn start(definition: Arc<Definition<Toggle>>) -> (Interpreter<Toggle>, MacroStep<Toggle>) {
        Interpreter::start(definition, ToggleContext::default(), RuntimeConfig::default()).unwrap()
    }

    fn worker() -> Arc<Definition<Toggle>> {
        MachineBuilder::new("worker")
            .initial("idle")
            .state(StateBuilder::atomic("idle").on(TransitionBuilder::on("go").to("busy")))
            .state(
                StateBuilder::atomic("busy")
                    .invoke(
                        InvokeBuilder::new(Job::Work)
                            .on_done(TransitionBuilder::new().to("idle").action(Noop::Count))
                            .on_error(TransitionBuilder::new().to("idle").action(Noop::Remember)),
                    )
                    .on(TransitionBuilder::on("abort").to("idle")),
            )
            .build()
            .unwrap()
    }

    fn started(step: &MacroStep<Toggle>) -> Option<(String, u64)> {
        step.commands.iter().find_map(|command| match command {
            Command::StartInvocation {
                state, generation, ..
            } => Some((state.clone(), *generation)),
            _ => None,
        })
    }

    #[test]
    fn start_runs_entry_actions() {
        let definition = MachineBuilder::<Toggle>::new("counter")
            .initial("a")
            .entry(ActionSpec::run(Noop::Count))
            .state(StateBuilder::atomic("a").entry(ActionSpec::run(Noop::Count)))
            .build()
            .unwrap();

        let (interpreter, step) = start(definition);
        assert_eq!(interpreter.context().count, 2);
        assert_eq!(step.microsteps, 1);
        assert!(interpreter.history().is_empty());
    }

    #[test]
    fn macro_steps_debug_without_debug_machine() {
        let (mut interpreter, _) = start(worker());

        let step = interpreter.send(Event::new("go")).unwrap();
        let debug = format!("{step:?}");

        assert!(debug.starts_with("MacroStep"));
        assert!(debug.contains("StartInvocation"));
        assert!(debug.contains("processed: true"));
    }

    #[test]
    fn entering_invoking_state_starts_invocation() {
        let (mut interpreter, _) = start(worker());

        let step = interpreter.send(Event::new("go")).unwrap();
        let (state, generation) = started(&step).unwrap();

        assert_eq!(state, "busy");
        assert_eq!(interpreter.invocations().current("busy"), Some(generation));
    }

    #[test]
    fn accepted_outcome_takes_done_transition() {
        let (mut interpreter, _) = start(worker());
        let (state, generation) = started(&interpreter.send(Event::new("go")).unwrap()).unwrap();

        let step = interpreter
            .deliver(InvocationOutcome {
                state,
                generation,
                result: Ok(Value::Null),
            })
            .unwrap();

        assert!(step.processed);
        assert!(interpreter.matches("idle"));
        assert_eq!(interpreter.context().count, 1);
        // the accepted invocation needs no cancel on exit
        assert!(step.commands.is_empty());
    }

    #[test]
    fn failed_outcome_takes_error_transition() {
        let (mut interpreter, _) = start(worker());
        let (state, generation) = started(&interpreter.send(Event::new("go")).unwrap()).unwrap();

        interpreter
            .deliver(InvocationOutcome {
                state,
                generation,
                result: Err("boom".into()),
            })
            .unwrap();

        assert!(interpreter.matches("idle"));
        assert_eq!(interpreter.context().last.as_deref(), Some("error.invoke.busy"));
    }

    #[test]
    fn leaving_state_cancels_and_discards_late_outcome() {
        let (mut interpreter, _) = start(worker());
        let (state, generation) = started(&interpreter.send(Event::new("go")).unwrap()).unwrap();

        let step = interpreter.send(Event::new("abort")).unwrap();
        assert!(matches!(
            step.commands.as_slice(),
            [Command::CancelInvocation { generation: g, .. }] if *g == generation
        ));

        let before = interpreter.context().clone();
        let late = interpreter
            .deliver(InvocationOutcome {
                state,
                generation,
                result: Ok(Value::Null),
            })
            .unwrap();

        assert!(!late.processed);
        assert!(interpreter.matches("idle"));
        assert_eq!(interpreter.context(), &before);
    }

    #[test]
    fn reentry_gets_fresh_generation() {
        let (mut interpreter, _) = start(worker());
        let (_, first) = started(&interpreter.send(Event::new("go")).unwrap()).unwrap();
        interpreter.send(Event::new("abort")).unwrap();
        let (_, second) = started(&interpreter.send(Event::new("go")).unwrap()).unwrap();

        assert!(second > first);
        let stale = interpreter
            .deliver(InvocationOutcome {
                state: "busy".into(),
                generation: first,
                result: Ok(Value::Null),
            })
            .unwrap();
        assert!(!stale.processed);
        assert!(interpreter.matches("busy"));
    }

    #[test]
    fn failing_action_rolls_back() {
        let definition = MachineBuilder::<Toggle>::new("fragile")
            .initial("a")
            .state(
                StateBuilder::atomic("a")
                    .on(TransitionBuilder::on("go").to("b").action(Noop::Count).action(Noop::Fail)),
            )
            .state(StateBuilder::atomic("b"))
            .build()
            .unwrap();
        let (mut interpreter, _) = start(definition);

        let err = interpreter.send(Event::new("go")).unwrap_err();

        assert!(matches!(err, ExecutionError::Action(_)));
        assert!(interpreter.matches("a"));
        assert_eq!(interpreter.context().count, 0);
        assert!(interpreter.status().is_running());
    }

    #[test]
    fn raised_events_run_in_same_macro_step() {
        let definition = MachineBuilder::<Toggle>::new("chain")
            .initial("a")
            .state(
                StateBuilder::atomic("a")
                    .on(TransitionBuilder::on("go").to("b").then(ActionSpec::raise("next"))),
            )
            .state(StateBuilder::atomic("b").on(TransitionBuilder::on("next").to("c")))
            .state(StateBuilder::atomic("c"))
            .build()
            .unwrap();
        let (mut interpreter, _) = start(definition);

        let step = interpreter.send(Event::new("go")).unwrap();

        assert!(interpreter.matches("c"));
        assert_eq!(step.microsteps, 2);
        assert_eq!(interpreter.history().len(), 1);
    }

    #[test]
    fn eventless_loop_hits_microstep_limit() {
        let definition = MachineBuilder::<Toggle>::new("spin")
            .initial("a")
            .state(StateBuilder::atomic("a").on(TransitionBuilder::on("go").to("b")))
            .state(StateBuilder::atomic("b").always(TransitionBuilder::new().to("c")))
            .state(StateBuilder::atomic("c").always(TransitionBuilder::new().to("b")))
            .build()
            .unwrap();
        let (mut interpreter, _) = Interpreter::start(
            definition,
            ToggleContext::default(),
            RuntimeConfig::default().max_microsteps(20),
        )
        .unwrap();

        let err = interpreter.send(Event::new("go")).unwrap_err();

        assert_eq!(err, ExecutionError::MicrostepLimit { limit: 20 });
        assert!(interpreter.matches("a"));
    }

    #[test]
    fn final_configuration_marks_done() {
        let definition = MachineBuilder::<Toggle>::new("job")
            .initial("running")
            .state(StateBuilder::atomic("running").on(TransitionBuilder::on("finish").to("finished")))
            .state(StateBuilder::final_state("finished"))
            .build()
            .unwrap();
        let (mut interpreter, _) = start(definition);

        interpreter.send(Event::new("finish")).unwrap();
        assert_eq!(interpreter.status(), Status::Done);

        let err = interpreter.send(Event::new("finish")).unwrap_err();
        assert_eq!(err, ExecutionError::NotRunning { status: Status::Done });
    }

    #[test]
    fn state_done_event_drives_on_done() {
        let definition = MachineBuilder::<Toggle>::new("outer")
            .initial("work")
            .state(
                StateBuilder::compound("work")
                    .initial("step")
                    .state(StateBuilder::atomic("step").on(TransitionBuilder::on("next").to("end")))
                    .state(StateBuilder::final_state("end"))
                    .on_done(TransitionBuilder::new().to("rest").action(Noop::Count)),
            )
            .state(StateBuilder::atomic("rest"))
            .build()
            .unwrap();
        let (mut interpreter, _) = start(definition);

        interpreter.send(Event::new("next")).unwrap();

        assert!(interpreter.matches("rest"));
        assert_eq!(interpreter.context().count, 1);
        assert!(interpreter.status().is_running());
    }

    #[test]
    fn guards_see_context_changes_of_earlier_steps() {
        let definition = MachineBuilder::<Toggle>::new("gate")
            .initial("closed")
            .state(
                StateBuilder::atomic("closed")
                    .on(TransitionBuilder::on("open").to("open").guard(Flag::Enabled))
                    .on(TransitionBuilder::on("enable").action(Noop::Enable)),
            )
            .state(StateBuilder::atomic("open"))
            .build()
            .unwrap();
        let (mut interpreter, _) = start(definition);

        interpreter.send(Event::new("open")).unwrap();
        assert!(interpreter.matches("closed"));

        interpreter.send(Event::new("enable")).unwrap();
        interpreter.send(Event::new("open")).unwrap();
        assert!(interpreter.matches("open"));
    }

    #[test]
    fn restore_rejects_other_machines() {
        let (interpreter, _) = start(worker());
        let mut snapshot = interpreter.snapshot();
        snapshot.machine = "other".into();

        let err = Interpreter::restore(worker(), &snapshot, RuntimeConfig::default()).unwrap_err();
        assert!(matches!(err, CheckpointError::IncompatibleDefinition { .. }));
    }

    #[test]
    fn restore_then_resume_restarts_invocations() {
        let (mut interpreter, _) = start(worker());
        interpreter.send(Event::new("go")).unwrap();
        let snapshot = interpreter.snapshot();

        let mut restored = Interpreter::restore(worker(), &snapshot, RuntimeConfig::default()).unwrap();
        assert!(restored.matches("busy"));
        assert!(restored.invocations().is_empty());

        let commands = restored.resume();
        assert!(matches!(
            commands.as_slice(),
            [Command::StartInvocation { state, .. }] if state == "busy"
        ));
        assert!(restored.invocations().current("busy").is_some());
    }
}
