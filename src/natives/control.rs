//! Definitional control natives and the generic throw/catch/trap natives.

use std::rc::Rc;

use crate::action::{Action, Args, ControlKind, Native, Param};
use crate::binding::Env;
use crate::bounce::{Bounce, Unwind};
use crate::error::EvalError;
use crate::eval::spawn_bound_block;
use crate::executor::Executor;
use crate::ids::{Coupling, LevelId};
use crate::level::{Event, LevelFlags};
use crate::value::{Block, Symbol, Value};
use crate::vm::Vm;

use super::define;

pub(crate) fn register(lib: &Env) {
    // Fallbacks for code outside any loop or function. Their couplings are
    // never carried by a level, so invoking them reports no target.
    for kind in [
        ControlKind::Break,
        ControlKind::Continue,
        ControlKind::Stop,
        ControlKind::Return,
    ] {
        define(lib, Action::definitional(kind, Coupling::fresh()));
    }

    define(
        lib,
        Action::native(
            "throw",
            vec![
                Param::normal("value"),
                Param::flag("name"),
                Param::normal("label").under("name"),
            ],
            Native::Stateful(ThrowExecutor::build),
        ),
    );
    define(
        lib,
        Action::native(
            "catch",
            vec![
                Param::normal("body"),
                Param::flag("name"),
                Param::normal("label").under("name"),
            ],
            Native::Stateful(CatchExecutor::build),
        ),
    );
    define(
        lib,
        Action::native("trap", vec![Param::normal("body")], Native::Stateful(TrapExecutor::build)),
    );
    define(
        lib,
        Action::native("fail", vec![Param::normal("reason")], Native::Plain(native_fail)),
    );
}

/// Bind BREAK and CONTINUE (and STOP when `with_stop`) in `scope`, coupled
/// to the loop activation identified by `coupling`.
pub fn add_definitional_break_continue(scope: &Env, coupling: Coupling, with_stop: bool) {
    let mut kinds = vec![ControlKind::Break, ControlKind::Continue];
    if with_stop {
        kinds.push(ControlKind::Stop);
    }
    for kind in kinds {
        scope.bind(
            Symbol::new(kind.name()),
            Value::Action(Rc::new(Action::definitional(kind, coupling))),
        );
    }
}

/// Invoke a definitional control native.
///
/// The coupled activation must still be on the stack; a handle that outlived
/// its loop or function fails here instead of unwinding toward an unrelated
/// level.
pub fn throw_definitional(vm: &Vm, kind: ControlKind, coupling: Coupling, args: &Args) -> Bounce {
    if !vm.is_coupling_live(coupling) {
        return Bounce::error(EvalError::no_matching_target(kind.name()));
    }
    let with = args.flag("with");
    let unwind = match kind {
        ControlKind::Break => Unwind::Break(coupling),
        ControlKind::Continue => Unwind::Continue(coupling, with.then(|| args.get("value"))),
        ControlKind::Stop => {
            Unwind::Stop(coupling, if with { args.get("value") } else { Value::Void })
        }
        ControlKind::Return => Unwind::Return(coupling, args.get("value")),
    };
    log::trace!("{} toward {}", kind.name(), coupling);
    Bounce::Thrown(unwind)
}

fn native_fail(_vm: &mut Vm, _env: &Env, args: &Args) -> Result<Value, EvalError> {
    match args.get("reason") {
        Value::Text(message) => Err(EvalError::user(message.to_string())),
        Value::Error(e) => Err((*e).clone()),
        other => Err(args.mismatch("reason", "text or error", &other)),
    }
}

/// `throw`: starts an unwind that the nearest matching `catch` receives.
#[derive(Debug)]
pub struct ThrowExecutor {
    name: Option<Value>,
    value: Value,
}

impl ThrowExecutor {
    fn build(_env: &Env, args: Args) -> Result<Box<dyn Executor>, EvalError> {
        Ok(Box::new(ThrowExecutor {
            name: args.flag("name").then(|| args.get("label")),
            value: args.get("value"),
        }))
    }
}

impl Executor for ThrowExecutor {
    fn step(&mut self, _vm: &mut Vm, _id: LevelId, _event: Event) -> Bounce {
        Bounce::Thrown(Unwind::Throw {
            name: self.name.take(),
            value: std::mem::replace(&mut self.value, Value::Void),
        })
    }

    fn name(&self) -> &'static str {
        "throw"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GuardState {
    Initial,
    Running,
}

/// `catch`: intercepts THROW unwinds whose name matches.
#[derive(Debug)]
pub struct CatchExecutor {
    body: Block,
    env: Env,
    name: Option<Value>,
    state: GuardState,
}

impl CatchExecutor {
    fn build(env: &Env, args: Args) -> Result<Box<dyn Executor>, EvalError> {
        let body = args.block("body")?;
        let name = args.flag("name").then(|| args.get("label"));
        Ok(Box::new(CatchExecutor {
            body,
            env: env.clone(),
            name,
            state: GuardState::Initial,
        }))
    }

    fn matches(&self, name: &Option<Value>) -> bool {
        match (&self.name, name) {
            (None, None) => true,
            (Some(mine), Some(theirs)) => mine.equals(theirs),
            _ => false,
        }
    }
}

impl Executor for CatchExecutor {
    fn step(&mut self, vm: &mut Vm, id: LevelId, event: Event) -> Bounce {
        match (self.state, event) {
            (GuardState::Initial, Event::Start) => {
                vm.set_flags(id, LevelFlags::CATCHES);
                self.state = GuardState::Running;
                Bounce::Continue(spawn_bound_block(vm, &self.body, &self.env))
            }
            (GuardState::Running, Event::Resumed(value)) => Bounce::Done(value),
            (GuardState::Running, Event::Thrown(Unwind::Throw { name, value }))
                if self.matches(&name) =>
            {
                Bounce::Done(value)
            }
            (_, Event::Thrown(unwind)) => Bounce::Thrown(unwind),
            (state, _) => Bounce::error(EvalError::internal(format!(
                "catch re-entered in state {:?}",
                state
            ))),
        }
    }

    fn name(&self) -> &'static str {
        "catch"
    }
}

/// `trap`: turns an error raised by its body into an error value.
///
/// Finishing normally yields null.
#[derive(Debug)]
pub struct TrapExecutor {
    body: Block,
    env: Env,
    state: GuardState,
}

impl TrapExecutor {
    fn build(env: &Env, args: Args) -> Result<Box<dyn Executor>, EvalError> {
        Ok(Box::new(TrapExecutor {
            body: args.block("body")?,
            env: env.clone(),
            state: GuardState::Initial,
        }))
    }
}

impl Executor for TrapExecutor {
    fn step(&mut self, vm: &mut Vm, id: LevelId, event: Event) -> Bounce {
        match (self.state, event) {
            (GuardState::Initial, Event::Start) => {
                vm.set_flags(id, LevelFlags::TRAPS);
                self.state = GuardState::Running;
                Bounce::Continue(spawn_bound_block(vm, &self.body, &self.env))
            }
            (GuardState::Running, Event::Resumed(_)) => Bounce::Done(Value::Null),
            (GuardState::Running, Event::Thrown(Unwind::Error(e))) => {
                log::debug!("trapped: {}", e);
                Bounce::Done(Value::Error(Rc::new(e)))
            }
            (_, Event::Thrown(unwind)) => Bounce::Thrown(unwind),
            (state, _) => Bounce::error(EvalError::internal(format!(
                "trap re-entered in state {:?}",
                state
            ))),
        }
    }

    fn name(&self) -> &'static str {
        "trap"
    }
}
