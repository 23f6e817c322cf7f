//! Actor mailboxes.
//!
//! Every actor drains one unbounded FIFO queue. Strong handles keep an actor
//! alive; invocation tasks and children only hold weak handles.

use super::error::ActorError;
use crate::checkpoint::Snapshot;
use crate::core::Event;
use crate::invoke::InvocationOutcome;
use tokio::sync::{mpsc, oneshot};
use tracing::trace;

/// A message for an actor loop.
pub(crate) enum Envelope {
    /// Fire-and-forget event
    Event(Event),
    /// Event whose macro-step result is reported back
    Dispatch(Event, oneshot::Sender<Result<Snapshot, ActorError>>),
    /// Outcome of an invocation, tagged with state and generation
    Invocation(InvocationOutcome),
    /// Register a subscriber for snapshots after every macro-step
    Subscribe(mpsc::UnboundedSender<Snapshot>),
    /// Stop the actor and its children, then acknowledge
    Stop(oneshot::Sender<()>),
}

impl Envelope {
    fn kind(&self) -> &'static str {
        match self {
            Self::Event(_) => "event",
            Self::Dispatch(..) => "dispatch",
            Self::Invocation(_) => "invocation",
            Self::Subscribe(_) => "subscribe",
            Self::Stop(_) => "stop",
        }
    }
}

/// Owning handle to an actor's queue.
#[derive(Clone)]
pub(crate) struct Mailbox(mpsc::UnboundedSender<Envelope>);

impl Mailbox {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Envelope>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self(tx), rx)
    }

    /// Enqueue without waiting; false once the actor has stopped.
    pub fn send(&self, envelope: Envelope) -> bool {
        trace!(kind = envelope.kind(), "enqueue");
        self.0.send(envelope).is_ok()
    }

    pub fn downgrade(&self) -> WeakMailbox {
        WeakMailbox(self.0.downgrade())
    }
}

/// Non-owning handle to an actor's queue.
#[derive(Clone)]
pub(crate) struct WeakMailbox(mpsc::WeakUnboundedSender<Envelope>);

impl WeakMailbox {
    /// Enqueue if the actor is still alive.
    pub fn send(&self, envelope: Envelope) -> bool {
        match self.0.upgrade() {
            Some(tx) => {
                trace!(kind = envelope.kind(), "enqueue");
                tx.send(envelope).is_ok()
            }
            None => false,
        }
    }
}
