//! Machines shared by the integration tests.

#![allow(dead_code)]

use serde::{Deserialize, Serialize};
use serde_json::json;
use statecraft::builder::{ActionSpec, InvokeBuilder, MachineBuilder, StateBuilder, TransitionBuilder};
use statecraft::core::{Action, Event, EventBuilder, Guard};
use statecraft::definition::{Definition, Machine, Never};
use statecraft::invoke::{InvocationError, Service};
use statecraft::runtime::SpawnOptions;
use std::sync::Arc;
use stillwater::prelude::*;

pub const PASSWORD: &str = "1234";

pub fn with_password(name: &str, password: &str) -> Event {
    Event::new(name).with_payload(json!({ "password": password }))
}

// Door and lock as parallel regions of one actor.

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DoorContext {
    pub password: Option<String>,
    pub error: Option<String>,
    pub failed_unlocks: u32,
}

#[derive(Clone, Debug, Default)]
pub struct DoorEnv {
    pub jammed: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DoorGuard {
    PasswordMatches,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DoorAction {
    StorePassword,
    ClearPassword,
    CountFailedUnlock,
    RecordError,
    ClearError,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DoorService {
    OpenDoor,
}

pub struct DoorLock;

impl Machine for DoorLock {
    type Context = DoorContext;
    type Guard = DoorGuard;
    type Action = DoorAction;
    type Service = DoorService;
    type Env = DoorEnv;

    fn guard(guard: DoorGuard) -> Guard<DoorContext> {
        match guard {
            DoorGuard::PasswordMatches => Guard::new(|ctx: &DoorContext, event: &Event| {
                ctx.password.is_some() && ctx.password.as_deref() == event.payload_str("password")
            }),
        }
    }

    fn action(action: DoorAction) -> Action<DoorContext> {
        match action {
            DoorAction::StorePassword => Action::assign(|ctx: &mut DoorContext, event: &Event| {
                ctx.password = event.payload_str("password").map(String::from);
            }),
            DoorAction::ClearPassword => Action::assign(|ctx: &mut DoorContext, _: &Event| {
                ctx.password = None;
            }),
            DoorAction::CountFailedUnlock => {
                Action::assign(|ctx: &mut DoorContext, _: &Event| ctx.failed_unlocks += 1)
            }
            DoorAction::RecordError => Action::assign(|ctx: &mut DoorContext, event: &Event| {
                ctx.error = event.error_message().map(String::from);
            }),
            DoorAction::ClearError => Action::assign(|ctx: &mut DoorContext, _: &Event| {
                ctx.error = None;
            }),
        }
    }

    fn service(service: DoorService) -> Service<DoorContext, DoorEnv> {
        match service {
            DoorService::OpenDoor => Service::new(|_: &DoorContext, _: &Event| {
                from_fn(|env: &DoorEnv| {
                    if env.jammed {
                        Err(InvocationError::new("door is jammed"))
                    } else {
                        Ok(json!({ "opened": true }))
                    }
                })
                .boxed()
            }),
        }
    }
}

pub fn door_lock() -> Arc<Definition<DoorLock>> {
    MachineBuilder::new("door_lock")
        .parallel()
        .state(
            StateBuilder::compound("door")
                .initial("closed")
                .state(
                    StateBuilder::compound("closed")
                        .initial("idle")
                        .state(
                            StateBuilder::atomic("idle").on(TransitionBuilder::on("door.open")
                                .to("opening")
                                .unless_in("lock.locked")
                                .action(DoorAction::ClearError)),
                        )
                        .state(
                            StateBuilder::atomic("opening")
                                .invoke(
                                    InvokeBuilder::new(DoorService::OpenDoor)
                                        .on_done(TransitionBuilder::new().to("open"))
                                        .on_error(
                                            TransitionBuilder::new()
                                                .to("idle")
                                                .action(DoorAction::RecordError),
                                        ),
                                )
                                .on(TransitionBuilder::on("door.cancel").to("idle")),
                        ),
                )
                .state(StateBuilder::atomic("open").on(TransitionBuilder::on("door.close").to("closed"))),
        )
        .state(
            StateBuilder::compound("lock")
                .initial("unlocked")
                .state(
                    StateBuilder::atomic("unlocked").on(TransitionBuilder::on("lock.lock")
                        .to("locked")
                        .when_in("door.closed.idle")
                        .action(DoorAction::StorePassword)),
                )
                .state(
                    StateBuilder::atomic("locked")
                        .on(TransitionBuilder::on("lock.unlock")
                            .to("unlocked")
                            .guard(DoorGuard::PasswordMatches)
                            .action(DoorAction::ClearPassword))
                        .on(TransitionBuilder::on("lock.unlock").action(DoorAction::CountFailedUnlock)),
                ),
        )
        .build()
        .expect("door lock definition is valid")
}

// A standalone lock spawned as a child of a house.

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LockContext {
    pub password: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LockGuard {
    PasswordMatches,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LockAction {
    StorePassword,
    ClearPassword,
}

pub struct Lock;

impl Machine for Lock {
    type Context = LockContext;
    type Guard = LockGuard;
    type Action = LockAction;
    type Service = Never;
    type Env = ();

    fn guard(guard: LockGuard) -> Guard<LockContext> {
        match guard {
            LockGuard::PasswordMatches => Guard::new(|ctx: &LockContext, event: &Event| {
                ctx.password.as_deref() == event.payload_str("password")
            }),
        }
    }

    fn action(action: LockAction) -> Action<LockContext> {
        match action {
            LockAction::StorePassword => Action::assign(|ctx: &mut LockContext, event: &Event| {
                ctx.password = event.payload_str("password").map(String::from);
            }),
            LockAction::ClearPassword => Action::assign(|ctx: &mut LockContext, _: &Event| {
                ctx.password = None;
            }),
        }
    }

    fn service(service: Never) -> Service<LockContext, ()> {
        match service {}
    }
}

pub fn lock() -> Arc<Definition<Lock>> {
    MachineBuilder::new("lock")
        .initial("unlocked")
        .state(
            StateBuilder::atomic("unlocked")
                .on(TransitionBuilder::on("lock.lock").to("locked").action(LockAction::StorePassword))
                .on(TransitionBuilder::on("lock.retire").to("retired")),
        )
        .state(
            StateBuilder::atomic("locked").on(TransitionBuilder::on("lock.unlock")
                .to("unlocked")
                .guard(LockGuard::PasswordMatches)
                .action(LockAction::ClearPassword)),
        )
        .state(StateBuilder::final_state("retired"))
        .build()
        .expect("lock definition is valid")
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct HouseContext {
    pub front_locked: bool,
    pub updates: u32,
    pub retired: bool,
    pub error: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HouseAction {
    MirrorLock,
    MarkRetired,
    RecordError,
}

pub struct House;

impl Machine for House {
    type Context = HouseContext;
    type Guard = Never;
    type Action = HouseAction;
    type Service = Never;
    type Env = ();

    fn guard(guard: Never) -> Guard<HouseContext> {
        match guard {}
    }

    fn action(action: HouseAction) -> Action<HouseContext> {
        match action {
            HouseAction::MirrorLock => Action::assign(|ctx: &mut HouseContext, event: &Event| {
                ctx.updates += 1;
                ctx.front_locked = event.payload()["snapshot"]["value"] == "locked";
            }),
            HouseAction::MarkRetired => {
                Action::assign(|ctx: &mut HouseContext, _: &Event| ctx.retired = true)
            }
            HouseAction::RecordError => Action::assign(|ctx: &mut HouseContext, event: &Event| {
                ctx.error = event.error_message().map(String::from);
            }),
        }
    }

    fn service(service: Never) -> Service<HouseContext, ()> {
        match service {}
    }
}

pub fn house() -> Arc<Definition<House>> {
    MachineBuilder::new("house")
        .child_machine(lock(), ())
        .initial("home")
        .entry(ActionSpec::spawn("lock", SpawnOptions::new("front").sync()))
        .state(
            StateBuilder::atomic("home")
                .on(TransitionBuilder::on("snapshot.front").action(HouseAction::MirrorLock))
                .on(TransitionBuilder::on("done.actor.front").action(HouseAction::MarkRetired))
                .on(TransitionBuilder::on("error.spawn.*").action(HouseAction::RecordError))
                .on(TransitionBuilder::on("lock")
                    .then(ActionSpec::send_to("front", EventBuilder::forward("lock.lock"))))
                .on(TransitionBuilder::on("unlock")
                    .then(ActionSpec::send_to("front", EventBuilder::forward("lock.unlock"))))
                .on(TransitionBuilder::on("retire")
                    .then(ActionSpec::send_to("front", EventBuilder::forward("lock.retire"))))
                .on(TransitionBuilder::on("respawn")
                    .then(ActionSpec::spawn("lock", SpawnOptions::new("front"))))
                .on(TransitionBuilder::on("release").then(ActionSpec::stop("front"))),
        )
        .build()
        .expect("house definition is valid")
}
