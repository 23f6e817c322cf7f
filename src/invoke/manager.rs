//! Runs invocation effects as independent tokio tasks.

use super::{InvocationError, InvocationOutcome};
use crate::runtime::mailbox::{Envelope, WeakMailbox};
use serde_json::Value;
use std::collections::BTreeMap;
use stillwater::effect::{BoxedEffect, Effect};
use tokio::task::JoinHandle;
use tracing::{debug, trace, Instrument};

struct Running {
    generation: u64,
    task: JoinHandle<()>,
}

/// Owns the tasks of an actor's in-flight invocations.
///
/// Only the actor loop talks to the manager, so it needs no locking. Tasks
/// report back through a weak mailbox handle and never keep their actor
/// alive.
pub struct InvocationManager<Env> {
    env: Env,
    running: BTreeMap<String, Running>,
}

impl<Env: Clone + Send + Sync + 'static> InvocationManager<Env> {
    pub fn new(env: Env) -> Self {
        Self {
            env,
            running: BTreeMap::new(),
        }
    }

    /// Spawn the effect for `state` at `generation`.
    ///
    /// A task still running for the same state is aborted first.
    pub fn start(
        &mut self,
        state: &str,
        generation: u64,
        effect: BoxedEffect<Value, InvocationError, Env>,
        reply: WeakMailbox,
    ) {
        if let Some(previous) = self.running.remove(state) {
            previous.task.abort();
        }

        let env = self.env.clone();
        let owner = state.to_string();
        let span = tracing::debug_span!("invocation", state = %owner, generation);
        let task = tokio::spawn(
            async move {
                let result = effect.run(&env).await.map_err(|err| err.to_string());
                trace!(ok = result.is_ok(), "invocation finished");
                let outcome = InvocationOutcome {
                    state: owner,
                    generation,
                    result,
                };
                if !reply.send(Envelope::Invocation(outcome)) {
                    trace!("owning actor is gone, dropping outcome");
                }
            }
            .instrument(span),
        );

        debug!(state, generation, "invocation started");
        self.running
            .insert(state.to_string(), Running { generation, task });
    }

    /// Abort the task for `state` if it is still the given generation.
    pub fn cancel(&mut self, state: &str, generation: u64) {
        if self
            .running
            .get(state)
            .is_some_and(|running| running.generation == generation)
        {
            if let Some(running) = self.running.remove(state) {
                running.task.abort();
                debug!(state, generation, "invocation cancelled");
            }
        }
    }

    /// Drop bookkeeping for an invocation whose outcome was accepted.
    pub fn finished(&mut self, state: &str, generation: u64) {
        if self
            .running
            .get(state)
            .is_some_and(|running| running.generation == generation)
        {
            self.running.remove(state);
        }
    }

    /// Abort every running invocation.
    pub fn cancel_all(&mut self) {
        for (state, running) in std::mem::take(&mut self.running) {
            running.task.abort();
            debug!(state = %state, generation = running.generation, "invocation cancelled");
        }
    }

    pub fn running(&self) -> usize {
        self.running.len()
    }
}

impl<Env> Drop for InvocationManager<Env> {
    fn drop(&mut self) {
        for running in self.running.values() {
            running.task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::mailbox::Mailbox;
    use stillwater::prelude::*;

    #[tokio::test]
    async fn outcome_is_delivered_to_mailbox() {
        let (mailbox, mut rx) = Mailbox::channel();
        let mut manager = InvocationManager::new(());

        manager.start(
            "opening",
            1,
            pure(serde_json::json!({ "ok": true })).boxed(),
            mailbox.downgrade(),
        );

        match rx.recv().await {
            Some(Envelope::Invocation(outcome)) => {
                assert_eq!(outcome.state, "opening");
                assert_eq!(outcome.generation, 1);
                assert_eq!(outcome.result, Ok(serde_json::json!({ "ok": true })));
            }
            _ => panic!("expected invocation outcome"),
        }
    }

    #[tokio::test]
    async fn failure_is_delivered_as_description() {
        let (mailbox, mut rx) = Mailbox::channel();
        let mut manager = InvocationManager::new(());

        manager.start(
            "opening",
            3,
            fail(InvocationError::new("jammed")).boxed(),
            mailbox.downgrade(),
        );

        match rx.recv().await {
            Some(Envelope::Invocation(outcome)) => {
                assert_eq!(outcome.result, Err("jammed".to_string()));
            }
            _ => panic!("expected invocation outcome"),
        }
    }

    #[tokio::test]
    async fn cancel_ignores_other_generations() {
        let (mailbox, _rx) = Mailbox::channel();
        let mut manager = InvocationManager::new(());

        manager.start("opening", 2, pure(Value::Null).boxed(), mailbox.downgrade());
        manager.cancel("opening", 1);
        assert_eq!(manager.running(), 1);

        manager.cancel("opening", 2);
        assert_eq!(manager.running(), 0);
    }

    #[tokio::test]
    async fn cancel_all_clears_tasks() {
        let (mailbox, _rx) = Mailbox::channel();
        let mut manager = InvocationManager::new(());

        manager.start("a", 1, pure(Value::Null).boxed(), mailbox.downgrade());
        manager.start("b", 2, pure(Value::Null).boxed(), mailbox.downgrade());
        manager.cancel_all();

        assert_eq!(manager.running(), 0);
    }
}
