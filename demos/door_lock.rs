//! Door and Lock
//!
//! This example runs a door and its lock as parallel regions of one actor.
//!
//! Key concepts:
//! - Parallel regions kept consistent with `in_state` guards
//! - An invocation bound to the `opening` state, with success and failure paths
//! - Subscribing to snapshots
//! - Checkpointing the actor and restoring it
//!
//! Run with: cargo run --example door_lock

use serde::{Deserialize, Serialize};
use serde_json::json;
use statecraft::builder::{InvokeBuilder, MachineBuilder, StateBuilder, TransitionBuilder};
use statecraft::checkpoint::{self, SnapshotFormat};
use statecraft::core::{Action, Event, Guard};
use statecraft::definition::{Definition, Machine};
use statecraft::invoke::{InvocationError, Service};
use statecraft::runtime::create;
use std::sync::Arc;
use stillwater::prelude::*;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct Door {
    password: Option<String>,
    error: Option<String>,
}

#[derive(Clone)]
struct Motor {
    jammed: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Check {
    PasswordMatches,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Update {
    StorePassword,
    ClearPassword,
    RecordError,
    ClearError,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Task {
    Open,
}

struct DoorLock;

impl Machine for DoorLock {
    type Context = Door;
    type Guard = Check;
    type Action = Update;
    type Service = Task;
    type Env = Motor;

    fn guard(guard: Check) -> Guard<Door> {
        match guard {
            Check::PasswordMatches => Guard::new(|door: &Door, event: &Event| {
                door.password.as_deref() == event.payload_str("password")
            }),
        }
    }

    fn action(action: Update) -> Action<Door> {
        match action {
            Update::StorePassword => Action::assign(|door: &mut Door, event: &Event| {
                door.password = event.payload_str("password").map(String::from);
            }),
            Update::ClearPassword => Action::assign(|door: &mut Door, _: &Event| door.password = None),
            Update::RecordError => Action::assign(|door: &mut Door, event: &Event| {
                door.error = event.error_message().map(String::from);
            }),
            Update::ClearError => Action::assign(|door: &mut Door, _: &Event| door.error = None),
        }
    }

    fn service(service: Task) -> Service<Door, Motor> {
        match service {
            Task::Open => Service::new(|_: &Door, _: &Event| {
                from_fn(|motor: &Motor| {
                    if motor.jammed {
                        Err(InvocationError::new("motor jammed"))
                    } else {
                        Ok(json!({ "opened": true }))
                    }
                })
                .boxed()
            }),
        }
    }
}

fn definition() -> Result<Arc<Definition<DoorLock>>, Box<dyn std::error::Error>> {
    let closed = StateBuilder::compound("closed")
        .initial("idle")
        .state(
            StateBuilder::atomic("idle").on(TransitionBuilder::on("open")
                .to("opening")
                .unless_in("lock.locked")
                .action(Update::ClearError)),
        )
        .state(
            StateBuilder::atomic("opening").invoke(
                InvokeBuilder::new(Task::Open)
                    .on_done(TransitionBuilder::new().to("open"))
                    .on_error(TransitionBuilder::new().to("idle").action(Update::RecordError)),
            ),
        );

    let machine = MachineBuilder::new("door_lock")
        .parallel()
        .state(
            StateBuilder::compound("door")
                .initial("closed")
                .state(closed)
                .state(StateBuilder::atomic("open").on(TransitionBuilder::on("close").to("closed"))),
        )
        .state(
            StateBuilder::compound("lock")
                .initial("unlocked")
                .state(
                    StateBuilder::atomic("unlocked").on(TransitionBuilder::on("lock")
                        .to("locked")
                        .when_in("door.closed.idle")
                        .action(Update::StorePassword)),
                )
                .state(
                    StateBuilder::atomic("locked").on(TransitionBuilder::on("unlock")
                        .to("unlocked")
                        .guard(Check::PasswordMatches)
                        .action(Update::ClearPassword)),
                ),
        )
        .build()?;
    Ok(machine)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    println!("=== Door and Lock ===\n");
    let machine = definition()?;

    let actor = create(Arc::clone(&machine), Motor { jammed: false })?;
    let mut updates = actor.subscribe();
    println!("Started in {}", actor.value());

    let password = json!({ "password": "1234" });
    actor.dispatch(Event::new("lock").with_payload(password.clone())).await?;
    let snapshot = actor.dispatch("open").await?;
    println!("Open while locked: still {}", snapshot.value);

    let snapshot = actor
        .dispatch(Event::new("unlock").with_payload(json!({ "password": "0000" })))
        .await?;
    println!("Wrong password: still {}", snapshot.value);

    actor.dispatch(Event::new("unlock").with_payload(password)).await?;
    actor.send("open")?;
    let snapshot = actor.wait_for(|s| s.matches("door.open")).await?;
    println!("Opened: {}", snapshot.value);

    while let Ok(Some(update)) =
        tokio::time::timeout(std::time::Duration::from_millis(10), updates.next()).await
    {
        println!("  [Update] {}", update.value);
    }

    println!("\n=== Checkpoint ===\n");
    let blob = checkpoint::serialize(&actor, SnapshotFormat::Json)?;
    println!("{}", String::from_utf8_lossy(&blob));
    actor.stop().await;

    let restored =
        checkpoint::deserialize(&blob, SnapshotFormat::Json, machine, Motor { jammed: true })?;
    restored.dispatch("close").await?;
    restored.send("open")?;
    let snapshot = restored.wait_for(|s| s.context["error"].is_string()).await?;
    println!("Jammed motor: {} ({})", snapshot.value, snapshot.context["error"]);

    Ok(())
}
