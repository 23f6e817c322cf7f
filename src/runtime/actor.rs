//! Live actors: a tokio task per actor draining its mailbox.
//!
//! The loop is the only writer of an actor's state. Handles read the last
//! published snapshot through a watch channel and talk to the loop through
//! the mailbox.

use super::child::{ParentLink, SpawnOptions};
use super::config::RuntimeConfig;
use super::error::{ActorError, ExecutionError};
use super::interpreter::{Command, Interpreter, MacroStep};
use super::mailbox::{Envelope, Mailbox, WeakMailbox};
use crate::checkpoint::{CheckpointError, Snapshot};
use crate::core::{Event, StateHistory, StateValue, Status};
use crate::definition::{Definition, Machine};
use crate::invoke::{InvocationManager, InvocationOutcome};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, debug_span, error, trace, warn, Instrument};
use uuid::Uuid;

/// What an actor publishes after every macro-step.
struct Published {
    snapshot: Snapshot,
    children: BTreeMap<String, ActorRef>,
    history: StateHistory,
}

impl Published {
    /// Own snapshot with the children's current snapshots folded in.
    fn compose(&self) -> Snapshot {
        let mut snapshot = self.snapshot.clone();
        snapshot.children = self
            .children
            .iter()
            .map(|(id, child)| (id.clone(), child.get_snapshot()))
            .collect();
        snapshot
    }
}

/// Handle to a running actor.
///
/// Handles are cheap to clone. The actor stops when [`ActorRef::stop`] is
/// called or when its last handle is dropped.
#[derive(Clone)]
pub struct ActorRef {
    id: Uuid,
    mailbox: Mailbox,
    published: watch::Receiver<Arc<Published>>,
}

impl ActorRef {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Enqueue an event without waiting for it to be processed.
    pub fn send(&self, event: impl Into<Event>) -> Result<(), ActorError> {
        if self.mailbox.send(Envelope::Event(event.into())) {
            Ok(())
        } else {
            Err(ActorError::Stopped)
        }
    }

    /// Enqueue an event and wait for the snapshot after its macro-step.
    ///
    /// A failed macro-step is rolled back and its error returned here; the
    /// actor keeps running.
    pub async fn dispatch(&self, event: impl Into<Event>) -> Result<Snapshot, ActorError> {
        let (reply, result) = oneshot::channel();
        if !self.mailbox.send(Envelope::Dispatch(event.into(), reply)) {
            return Err(ActorError::Stopped);
        }
        result.await.map_err(|_| ActorError::Stopped)?
    }

    /// Last published snapshot, children included.
    pub fn get_snapshot(&self) -> Snapshot {
        self.current().compose()
    }

    pub fn status(&self) -> Status {
        self.current().snapshot.status
    }

    pub fn value(&self) -> StateValue {
        self.current().snapshot.value.clone()
    }

    /// Check if the dotted state path is active.
    pub fn matches(&self, path: &str) -> bool {
        self.current().snapshot.value.matches(path)
    }

    /// Recent macro-steps, oldest first.
    pub fn history(&self) -> StateHistory {
        self.current().history.clone()
    }

    /// Handle to a spawned child.
    pub fn child(&self, id: &str) -> Option<ActorRef> {
        self.current().children.get(id).cloned()
    }

    /// Receive one snapshot per event processed from now on.
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        if !self.mailbox.send(Envelope::Subscribe(tx)) {
            trace!(actor = %self.id, "subscribing to a stopped actor");
        }
        Subscription { rx }
    }

    /// Wait until a published snapshot satisfies `predicate`.
    ///
    /// Only this actor's own macro-steps wake the wait; children are
    /// composed in but do not trigger a re-check.
    pub async fn wait_for<F>(&self, predicate: F) -> Result<Snapshot, ActorError>
    where
        F: Fn(&Snapshot) -> bool,
    {
        let mut published = self.published.clone();
        loop {
            let current = Arc::clone(&published.borrow_and_update());
            let snapshot = current.compose();
            if predicate(&snapshot) {
                return Ok(snapshot);
            }
            published.changed().await.map_err(|_| ActorError::Stopped)?;
        }
    }

    /// Stop the actor and its children, cancelling every invocation.
    pub async fn stop(&self) {
        let (ack, stopped) = oneshot::channel();
        if self.mailbox.send(Envelope::Stop(ack)) {
            // an Err means the loop is already gone
            let _ = stopped.await;
        }
    }

    /// Ask the actor to stop without waiting for it.
    pub(crate) fn request_stop(&self) {
        let (ack, _) = oneshot::channel();
        self.mailbox.send(Envelope::Stop(ack));
    }

    fn current(&self) -> Arc<Published> {
        Arc::clone(&self.published.borrow())
    }
}

impl fmt::Debug for ActorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let current = self.current();
        f.debug_struct("ActorRef")
            .field("id", &self.id)
            .field("machine", &current.snapshot.machine)
            .field("status", &current.snapshot.status)
            .finish()
    }
}

/// Stream of snapshots published by an actor.
#[derive(Debug)]
pub struct Subscription {
    rx: mpsc::UnboundedReceiver<Snapshot>,
}

impl Subscription {
    /// Next snapshot; `None` once the actor has stopped.
    pub async fn next(&mut self) -> Option<Snapshot> {
        self.rx.recv().await
    }

    pub fn unsubscribe(self) {}
}

/// Configures and starts an actor.
///
/// # Example
///
/// ```rust,no_run
/// # use statecraft::{definition::{Machine, Never}, core::*, invoke::Service};
/// # struct Light;
/// # impl Machine for Light {
/// #     type Context = (); type Guard = Never; type Action = Never; type Service = Never; type Env = ();
/// #     fn guard(g: Never) -> Guard<()> { match g {} }
/// #     fn action(a: Never) -> Action<()> { match a {} }
/// #     fn service(s: Never) -> Service<(), ()> { match s {} }
/// # }
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// use statecraft::builder::{MachineBuilder, StateBuilder, TransitionBuilder};
/// use statecraft::runtime::{ActorBuilder, RuntimeConfig};
///
/// let light = MachineBuilder::<Light>::new("light")
///     .initial("off")
///     .state(StateBuilder::atomic("off").on(TransitionBuilder::on("flip").to("on")))
///     .state(StateBuilder::atomic("on").on(TransitionBuilder::on("flip").to("off")))
///     .build()?;
///
/// let actor = ActorBuilder::new(light, ())
///     .config(RuntimeConfig::default().max_microsteps(100))
///     .spawn()?;
/// let snapshot = actor.dispatch("flip").await?;
/// assert!(snapshot.value.matches("on"));
/// # Ok(())
/// # }
/// ```
pub struct ActorBuilder<M: Machine> {
    definition: Arc<Definition<M>>,
    env: M::Env,
    context: Option<M::Context>,
    config: RuntimeConfig,
    snapshot: Option<Snapshot>,
    parent: Option<ParentLink>,
}

impl<M: Machine> ActorBuilder<M> {
    pub fn new(definition: Arc<Definition<M>>, env: M::Env) -> Self {
        Self {
            definition,
            env,
            context: None,
            config: RuntimeConfig::default(),
            snapshot: None,
            parent: None,
        }
    }

    /// Start with this context instead of the definition's.
    pub fn context(mut self, context: M::Context) -> Self {
        self.context = Some(context);
        self
    }

    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Rehydrate from a snapshot instead of entering the initial states.
    pub fn snapshot(mut self, snapshot: Snapshot) -> Self {
        self.snapshot = Some(snapshot);
        self
    }

    pub(crate) fn parent(mut self, parent: ParentLink) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Start the actor on the current tokio runtime.
    ///
    /// A fresh actor runs the entry actions of its initial configuration
    /// before this returns, and a child that starts out final reports its
    /// completion right away. A restored actor runs no actions and reports
    /// nothing; its children are restored and its invocations restarted.
    pub fn spawn(self) -> Result<ActorRef, ActorError> {
        let Self {
            definition,
            env,
            context,
            config,
            snapshot,
            parent,
        } = self;

        let id = Uuid::new_v4();
        let (mailbox, rx) = Mailbox::channel();
        let mut children = BTreeMap::new();

        let (interpreter, commands, finished) = match snapshot {
            Some(snapshot) => {
                let mut interpreter =
                    Interpreter::restore(Arc::clone(&definition), &snapshot, config.clone())?;
                for (child_id, child) in snapshot.children {
                    let factory = definition.child_machine(&child.machine).ok_or_else(|| {
                        CheckpointError::UnknownChildMachine(child.machine.clone())
                    })?;
                    let link = ParentLink {
                        mailbox: mailbox.downgrade(),
                        child_id: child_id.clone(),
                        sync_snapshot: child.synced,
                    };
                    let restored = factory.spawn(link, Some(child), &config)?;
                    children.insert(child_id, restored);
                }
                let commands = interpreter.resume();
                (interpreter, commands, false)
            }
            None => {
                let context = context.unwrap_or_else(|| definition.initial_context().clone());
                let (interpreter, step) =
                    Interpreter::start(Arc::clone(&definition), context, config.clone())?;
                let finished = interpreter.status() == Status::Done;
                (interpreter, step.commands, finished)
            }
        };

        let initial = Published {
            snapshot: interpreter.snapshot(),
            children: BTreeMap::new(),
            history: StateHistory::new(),
        };
        let (published, receiver) = watch::channel(Arc::new(initial));

        let mut actor = ActorLoop {
            id,
            interpreter,
            manager: InvocationManager::new(env),
            children,
            subscribers: Vec::new(),
            parent,
            mailbox: mailbox.downgrade(),
            published,
            config,
        };
        actor.execute(commands);
        actor.publish();
        if finished {
            let snapshot = actor.composed();
            actor.notify(&snapshot, true);
        }

        let span = debug_span!("actor", id = %id, machine = definition.id());
        tokio::spawn(actor.run(rx).instrument(span));

        Ok(ActorRef {
            id,
            mailbox,
            published: receiver,
        })
    }
}

/// Start a fresh actor with the definition's initial context.
pub fn create<M: Machine>(
    definition: Arc<Definition<M>>,
    env: M::Env,
) -> Result<ActorRef, ActorError> {
    ActorBuilder::new(definition, env).spawn()
}

/// Rehydrate an actor, and its children, from a snapshot.
pub fn restore<M: Machine>(
    definition: Arc<Definition<M>>,
    env: M::Env,
    snapshot: Snapshot,
) -> Result<ActorRef, ActorError> {
    ActorBuilder::new(definition, env).snapshot(snapshot).spawn()
}

type Reply = oneshot::Sender<Result<Snapshot, ActorError>>;

struct ActorLoop<M: Machine> {
    id: Uuid,
    interpreter: Interpreter<M>,
    manager: InvocationManager<M::Env>,
    children: BTreeMap<String, ActorRef>,
    subscribers: Vec<mpsc::UnboundedSender<Snapshot>>,
    parent: Option<ParentLink>,
    /// Weak so that the loop alone never keeps its own queue open
    mailbox: WeakMailbox,
    published: watch::Sender<Arc<Published>>,
    config: RuntimeConfig,
}

impl<M: Machine> ActorLoop<M> {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Envelope>) {
        debug!("actor loop started");
        while let Some(envelope) = rx.recv().await {
            match envelope {
                Envelope::Event(event) => self.on_event(event, None),
                Envelope::Dispatch(event, reply) => self.on_event(event, Some(reply)),
                Envelope::Invocation(outcome) => self.on_outcome(outcome),
                Envelope::Subscribe(subscriber) => self.subscribers.push(subscriber),
                Envelope::Stop(ack) => {
                    self.shutdown().await;
                    let _ = ack.send(());
                    return;
                }
            }
        }
        debug!("last handle dropped");
        self.shutdown().await;
    }

    fn on_event(&mut self, event: Event, reply: Option<Reply>) {
        let status = self.interpreter.status();
        if !status.is_running() {
            match reply {
                Some(reply) => {
                    let _ = reply.send(Err(ExecutionError::NotRunning { status }.into()));
                }
                None => debug!(event = %event, ?status, "actor not running, event ignored"),
            }
            return;
        }

        match self.interpreter.send(event) {
            Ok(step) => {
                let snapshot = self.complete(step);
                if let Some(reply) = reply {
                    let _ = reply.send(Ok(snapshot));
                }
            }
            Err(err) => match reply {
                Some(reply) => {
                    debug!(error = %err, "dispatched event rolled back");
                    let _ = reply.send(Err(err.into()));
                }
                None => self.fail(err),
            },
        }
    }

    fn on_outcome(&mut self, outcome: InvocationOutcome) {
        let (state, generation) = (outcome.state.clone(), outcome.generation);
        match self.interpreter.deliver(outcome) {
            Ok(step) if step.processed => {
                self.manager.finished(&state, generation);
                self.complete(step);
            }
            Ok(_) => {}
            Err(err) => self.fail(err),
        }
    }

    /// Execute, publish and notify after a committed macro-step.
    fn complete(&mut self, step: MacroStep<M>) -> Snapshot {
        let finished = self.interpreter.status() == Status::Done;
        self.execute(step.commands);
        self.publish();
        let snapshot = self.composed();
        self.notify(&snapshot, finished);
        snapshot
    }

    fn fail(&mut self, err: ExecutionError) {
        error!(error = %err, value = %self.interpreter.value(), "macro-step failed, actor stopped processing");
        self.interpreter.fail();
        self.manager.cancel_all();
        self.publish();
        let snapshot = self.composed();
        self.notify(&snapshot, false);
    }

    fn execute(&mut self, commands: Vec<Command<M>>) {
        for command in commands {
            match command {
                Command::StartInvocation {
                    state,
                    generation,
                    effect,
                } => self
                    .manager
                    .start(&state, generation, effect, self.mailbox.clone()),
                Command::CancelInvocation { state, generation } => {
                    self.manager.cancel(&state, generation)
                }
                Command::SendTo { child, event } => match self.children.get(&child) {
                    Some(actor) => {
                        if actor.send(event).is_err() {
                            warn!(child = %child, "child has stopped, event dropped");
                        }
                    }
                    None => warn!(child = %child, event = %event, "no such child, event dropped"),
                },
                Command::SendToParent(event) => match &self.parent {
                    Some(parent) => {
                        if !parent.mailbox.send(Envelope::Event(event)) {
                            warn!("parent has stopped, event dropped");
                        }
                    }
                    None => warn!(event = %event, "actor has no parent, event dropped"),
                },
                Command::Spawn { machine, options } => self.spawn_child(&machine, options),
                Command::Stop(child) => match self.children.remove(&child) {
                    Some(actor) => {
                        debug!(child = %child, "stopping child");
                        actor.request_stop();
                    }
                    None => warn!(child = %child, "no such child to stop"),
                },
            }
        }
    }

    fn spawn_child(&mut self, machine: &str, options: SpawnOptions) {
        let result = if self.children.contains_key(&options.id) {
            Err(format!("child '{}' already exists", options.id))
        } else {
            match self.interpreter.definition().child_machine(machine) {
                Some(factory) => {
                    let link = ParentLink {
                        mailbox: self.mailbox.clone(),
                        child_id: options.id.clone(),
                        sync_snapshot: options.sync_snapshot,
                    };
                    factory
                        .spawn(link, None, &self.config)
                        .map_err(|err| err.to_string())
                }
                None => Err(format!("unknown child machine '{machine}'")),
            }
        };

        match result {
            Ok(child) => {
                debug!(child = %options.id, machine, child_actor = %child.id(), "spawned child");
                self.children.insert(options.id, child);
            }
            Err(description) => {
                warn!(child = %options.id, machine, error = %description, "spawn failed");
                self.mailbox
                    .send(Envelope::Event(Event::spawn_error(&options.id, description)));
            }
        }
    }

    fn publish(&self) {
        let mut snapshot = self.interpreter.snapshot();
        snapshot.synced = self.parent.as_ref().is_some_and(|link| link.sync_snapshot);
        self.published.send_replace(Arc::new(Published {
            snapshot,
            children: self.children.clone(),
            history: self.interpreter.history().clone(),
        }));
    }

    fn composed(&self) -> Snapshot {
        self.published.borrow().compose()
    }

    /// Tell subscribers and the parent about the macro-step just published.
    fn notify(&mut self, snapshot: &Snapshot, finished: bool) {
        self.subscribers
            .retain(|subscriber| subscriber.send(snapshot.clone()).is_ok());

        let Some(parent) = &self.parent else {
            return;
        };
        if parent.sync_snapshot {
            match serde_json::to_value(snapshot) {
                Ok(value) => {
                    parent
                        .mailbox
                        .send(Envelope::Event(Event::snapshot_changed(&parent.child_id, value)));
                }
                Err(err) => warn!(error = %err, "snapshot could not be mirrored to parent"),
            }
        }
        if finished {
            trace!(child = %parent.child_id, "reporting completion to parent");
            parent.mailbox.send(Envelope::Event(Event::actor_done(
                &parent.child_id,
                snapshot.context.clone(),
            )));
        }
    }

    async fn shutdown(&mut self) {
        self.manager.cancel_all();
        for (id, child) in std::mem::take(&mut self.children) {
            trace!(child = %id, "stopping child");
            child.stop().await;
        }
        self.publish();
        debug!(actor = %self.id, "actor stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{ActionSpec, InvokeBuilder, MachineBuilder, StateBuilder, TransitionBuilder};
    use crate::testing::{Job, Noop, Toggle};

    fn counter() -> Arc<Definition<Toggle>> {
        MachineBuilder::new("counter")
            .initial("idle")
            .state(
                StateBuilder::atomic("idle")
                    .on(TransitionBuilder::on("inc").action(Noop::Count))
                    .on(TransitionBuilder::on("break").action(Noop::Fail))
                    .on(TransitionBuilder::on("finish").to("done")),
            )
            .state(StateBuilder::final_state("done"))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn dispatch_returns_snapshot_after_step() {
        let actor = create(counter(), ()).unwrap();

        let snapshot = actor.dispatch("inc").await.unwrap();

        assert_eq!(snapshot.context["count"], 1);
        assert_eq!(actor.get_snapshot(), snapshot);
        assert_eq!(actor.history().len(), 1);
    }

    #[tokio::test]
    async fn dispatch_error_keeps_actor_running() {
        let actor = create(counter(), ()).unwrap();

        let err = actor.dispatch("break").await.unwrap_err();

        assert!(matches!(err.execution(), Some(ExecutionError::Action(_))));
        assert_eq!(actor.status(), Status::Running);
        assert_eq!(actor.dispatch("inc").await.unwrap().context["count"], 1);
    }

    #[tokio::test]
    async fn failed_send_moves_actor_to_error() {
        let actor = create(counter(), ()).unwrap();
        let mut updates = actor.subscribe();

        actor.send("break").unwrap();
        let snapshot = updates.next().await.unwrap();

        assert_eq!(snapshot.status, Status::Error);
        let err = actor.dispatch("inc").await.unwrap_err();
        assert!(matches!(
            err.execution(),
            Some(ExecutionError::NotRunning { status: Status::Error })
        ));
    }

    #[tokio::test]
    async fn subscribers_get_one_snapshot_per_event() {
        let actor = create(counter(), ()).unwrap();
        let mut updates = actor.subscribe();

        actor.send("inc").unwrap();
        actor.send("ignored").unwrap();
        actor.dispatch("inc").await.unwrap();

        let counts: Vec<_> = [
            updates.next().await.unwrap(),
            updates.next().await.unwrap(),
            updates.next().await.unwrap(),
        ]
        .iter()
        .map(|snapshot| snapshot.context["count"].as_u64().unwrap())
        .collect();
        assert_eq!(counts, vec![1, 1, 2]);
    }

    #[tokio::test]
    async fn wait_for_sees_final_status() {
        let actor = create(counter(), ()).unwrap();

        actor.send("finish").unwrap();
        let snapshot = actor
            .wait_for(|snapshot| snapshot.status == Status::Done)
            .await
            .unwrap();

        assert!(snapshot.value.matches("done"));
    }

    #[tokio::test]
    async fn stopped_actor_rejects_events() {
        let actor = create(counter(), ()).unwrap();

        actor.stop().await;

        assert!(matches!(actor.send("inc"), Err(ActorError::Stopped)));
        assert!(matches!(actor.dispatch("inc").await, Err(ActorError::Stopped)));
    }

    #[tokio::test]
    async fn invocation_outcome_drives_transition() {
        let definition = MachineBuilder::<Toggle>::new("worker")
            .initial("busy")
            .state(
                StateBuilder::atomic("busy").invoke(
                    InvokeBuilder::new(Job::Work)
                        .on_done(TransitionBuilder::new().to("idle").action(Noop::Remember)),
                ),
            )
            .state(StateBuilder::atomic("idle"))
            .build()
            .unwrap();

        let actor = create(definition, ()).unwrap();
        let snapshot = actor.wait_for(|s| s.value.matches("idle")).await.unwrap();

        assert_eq!(snapshot.context["last"], "done.invoke.busy");
    }

    #[tokio::test]
    async fn spawned_child_reports_back() {
        let child = MachineBuilder::<Toggle>::new("child")
            .initial("waiting")
            .state(
                StateBuilder::atomic("waiting").on(
                    TransitionBuilder::on("ping")
                        .then(ActionSpec::send_to_parent(crate::core::EventBuilder::forward("pong"))),
                ),
            )
            .build()
            .unwrap();
        let parent = MachineBuilder::<Toggle>::new("parent")
            .child_machine(child, ())
            .initial("running")
            .entry(ActionSpec::spawn("child", SpawnOptions::new("kid")))
            .state(
                StateBuilder::atomic("running")
                    .on(TransitionBuilder::on("poke").then(ActionSpec::send_to(
                        "kid",
                        crate::core::EventBuilder::forward("ping"),
                    )))
                    .on(TransitionBuilder::on("pong").action(Noop::Count)),
            )
            .build()
            .unwrap();

        let actor = create(parent, ()).unwrap();
        assert!(actor.child("kid").is_some());

        actor.send("poke").unwrap();
        let snapshot = actor
            .wait_for(|s| s.context["count"] == 1)
            .await
            .unwrap();

        assert!(snapshot.children.contains_key("kid"));
    }

    #[tokio::test]
    async fn child_final_at_start_reports_done() {
        let child = MachineBuilder::<Toggle>::new("oneshot")
            .initial("finished")
            .state(StateBuilder::final_state("finished"))
            .build()
            .unwrap();
        let parent = MachineBuilder::<Toggle>::new("parent")
            .child_machine(child, ())
            .initial("running")
            .entry(ActionSpec::spawn("oneshot", SpawnOptions::new("kid").sync()))
            .state(
                StateBuilder::atomic("running")
                    .on(TransitionBuilder::on("snapshot.kid").action(Noop::Count))
                    .on(TransitionBuilder::on("done.actor.kid").action(Noop::Remember)),
            )
            .build()
            .unwrap();

        let actor = create(parent, ()).unwrap();
        let snapshot = actor
            .wait_for(|s| s.context["last"] == "done.actor.kid")
            .await
            .unwrap();

        assert_eq!(snapshot.context["count"], 1);
        assert_eq!(snapshot.children["kid"].status, Status::Done);
    }

    #[tokio::test]
    async fn restored_finished_child_stays_quiet() {
        let child = MachineBuilder::<Toggle>::new("oneshot")
            .initial("finished")
            .state(StateBuilder::final_state("finished"))
            .build()
            .unwrap();
        let parent = MachineBuilder::<Toggle>::new("parent")
            .child_machine(child, ())
            .initial("running")
            .entry(ActionSpec::spawn("oneshot", SpawnOptions::new("kid")))
            .state(
                StateBuilder::atomic("running")
                    .on(TransitionBuilder::on("done.actor.kid").action(Noop::Count)),
            )
            .build()
            .unwrap();

        let actor = create(Arc::clone(&parent), ()).unwrap();
        actor.wait_for(|s| s.context["count"] == 1).await.unwrap();
        let snapshot = actor.get_snapshot();

        let restored = restore(parent, (), snapshot).unwrap();
        let after = restored.dispatch("noop").await.unwrap();

        assert_eq!(after.context["count"], 1);
        assert_eq!(after.children["kid"].status, Status::Done);
    }
}
