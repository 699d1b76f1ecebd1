//! Evaluator executors.
//!
//! Every part of evaluation that can suspend is a level running one of these
//! state machines: a [`Stepper`] evaluates one expression from a feed, a
//! [`BlockExecutor`] runs a block to its end, an [`ActionExecutor`] gathers
//! arguments and invokes an action, a [`FunctionExecutor`] runs a user
//! function body, and a [`Destructure`] performs a SET-BLOCK assignment.

mod action;
mod block;
mod destructure;
mod function;
mod stepper;

pub use action::ActionExecutor;
pub use block::BlockExecutor;
pub use destructure::{Destructure, Target};
pub use function::FunctionExecutor;
pub use stepper::Stepper;

use crate::binding::Env;
use crate::bounce::Bounce;
use crate::executor::Executor;
use crate::ids::LevelId;
use crate::level::{Event, Level};
use crate::value::{Block, Value};
use crate::vm::Vm;

/// Finishes immediately with a fixed value.
///
/// Used by natives that choose between running a branch and producing a
/// value outright.
#[derive(Debug)]
pub struct Constant(pub Value);

impl Executor for Constant {
    fn step(&mut self, _vm: &mut Vm, _id: LevelId, _event: Event) -> Bounce {
        Bounce::Done(std::mem::replace(&mut self.0, Value::Void))
    }

    fn name(&self) -> &'static str {
        "constant"
    }
}

/// Spawn a level running `block` with its words resolved in `env`.
pub fn spawn_block(vm: &mut Vm, block: &Block, env: &Env) -> LevelId {
    let executor = BlockExecutor::with_env(block, env.clone());
    vm.spawn(Level::new(Box::new(executor), env.clone()))
}

/// Spawn a level running `block` in its own binding, or `fallback` if unbound.
pub fn spawn_bound_block(vm: &mut Vm, block: &Block, fallback: &Env) -> LevelId {
    let env = block.binding.clone().unwrap_or_else(|| fallback.clone());
    spawn_block(vm, block, &env)
}
