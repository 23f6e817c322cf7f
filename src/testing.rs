//! Small machine used by unit tests across the crate.

use crate::core::{Action, ActionError, Event, Guard};
use crate::definition::Machine;
use crate::invoke::{InvocationError, Service};
use serde::{Deserialize, Serialize};
use serde_json::json;
use stillwater::prelude::*;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ToggleContext {
    pub enabled: bool,
    pub count: u32,
    pub last: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flag {
    Enabled,
    Disabled,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Noop {
    Count,
    Enable,
    Remember,
    Fail,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Job {
    Work,
    Fail,
}

pub struct Toggle;

impl Machine for Toggle {
    type Context = ToggleContext;
    type Guard = Flag;
    type Action = Noop;
    type Service = Job;
    type Env = ();

    fn guard(guard: Flag) -> Guard<ToggleContext> {
        match guard {
            Flag::Enabled => Guard::new(|ctx: &ToggleContext, _: &Event| ctx.enabled),
            Flag::Disabled => Guard::new(|ctx: &ToggleContext, _: &Event| !ctx.enabled),
        }
    }

    fn action(action: Noop) -> Action<ToggleContext> {
        match action {
            Noop::Count => Action::assign(|ctx: &mut ToggleContext, _: &Event| ctx.count += 1),
            Noop::Enable => Action::assign(|ctx: &mut ToggleContext, _: &Event| ctx.enabled = true),
            Noop::Remember => Action::assign(|ctx: &mut ToggleContext, event: &Event| {
                ctx.last = Some(event.name().to_string());
            }),
            Noop::Fail => Action::new(|_: &mut ToggleContext, _: &Event| {
                Err(ActionError::failed("refused"))
            }),
        }
    }

    fn service(service: Job) -> Service<ToggleContext, ()> {
        match service {
            Job::Work => Service::new(|ctx: &ToggleContext, _: &Event| {
                pure(json!({ "count": ctx.count })).boxed()
            }),
            Job::Fail => Service::new(|_: &ToggleContext, _: &Event| {
                fail(InvocationError::new("job failed")).boxed()
            }),
        }
    }
}
