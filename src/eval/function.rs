use std::rc::Rc;

use crate::action::{Action, Args, ControlKind};
use crate::binding::Scope;
use crate::bounce::{Bounce, Unwind};
use crate::error::EvalError;
use crate::executor::Executor;
use crate::ids::{Coupling, LevelId};
use crate::level::{Event, LevelFlags};
use crate::value::{Block, Symbol, Value};
use crate::vm::Vm;

use super::spawn_block;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FunctionState {
    Initial,
    Running,
}

/// Runs a user function body in a fresh scope holding its arguments and a
/// RETURN coupled to this activation.
#[derive(Debug)]
pub struct FunctionExecutor {
    action: Rc<Action>,
    body: Block,
    args: Option<Args>,
    coupling: Option<Coupling>,
    state: FunctionState,
}

impl FunctionExecutor {
    pub fn new(action: Rc<Action>, body: Block, args: Args) -> Self {
        FunctionExecutor {
            action,
            body,
            args: Some(args),
            coupling: None,
            state: FunctionState::Initial,
        }
    }

    fn begin(&mut self, vm: &mut Vm, id: LevelId) -> Bounce {
        let coupling = vm.coupling_of(id);
        self.coupling = Some(coupling);
        vm.set_flags(id, LevelFlags::CATCHES);

        let parent = self.body.binding.clone().unwrap_or_else(|| vm.env_of(id));
        let scope = Scope::extend(&parent);
        if let Some(args) = self.args.take() {
            for (param, value) in self.action.params.iter().zip(args.into_values()) {
                scope.bind(param.name.clone(), value);
            }
        }
        scope.bind(
            Symbol::new("return"),
            Value::Action(Rc::new(Action::definitional(ControlKind::Return, coupling))),
        );

        self.state = FunctionState::Running;
        Bounce::Continue(spawn_block(vm, &self.body, &scope))
    }
}

impl Executor for FunctionExecutor {
    fn step(&mut self, vm: &mut Vm, id: LevelId, event: Event) -> Bounce {
        match (self.state, event) {
            (FunctionState::Initial, Event::Start) => self.begin(vm, id),
            (FunctionState::Running, Event::Resumed(value)) => Bounce::Done(value),
            (FunctionState::Running, Event::Thrown(Unwind::Return(target, value)))
                if Some(target) == self.coupling =>
            {
                Bounce::Done(value)
            }
            (_, Event::Thrown(unwind)) => Bounce::Thrown(unwind),
            (state, _) => Bounce::error(EvalError::internal(format!(
                "function {} re-entered in state {:?}",
                self.action.name, state
            ))),
        }
    }

    fn name(&self) -> &'static str {
        "function"
    }

    fn state(&self) -> &'static str {
        match self.state {
            FunctionState::Initial => "initial",
            FunctionState::Running => "running",
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::error::EvalError;
    use crate::vm::Vm;

    #[test]
    fn test_function_binds_arguments() {
        let mut vm = Vm::new();
        let value = vm.eval_str("add3: func [a b c] [a + b + c] add3 1 2 3").unwrap();
        assert_eq!(value.as_int(), Some(6));
    }

    #[test]
    fn test_return_exits_from_nested_loop() {
        let mut vm = Vm::new();
        let value = vm
            .eval_str("find-3: func [] [for-each x [1 2 3 4] [if x = 3 [return x * 10]] 0] find-3")
            .unwrap();
        assert_eq!(value.as_int(), Some(30));
    }

    #[test]
    fn test_return_only_targets_its_own_activation() {
        let mut vm = Vm::new();
        let value = vm
            .eval_str(
                "inner: func [] [return 1] \
                 outer: func [] [x: inner x + 10] \
                 outer",
            )
            .unwrap();
        assert_eq!(value.as_int(), Some(11));
    }

    #[test]
    fn test_stale_return_has_no_target() {
        let mut vm = Vm::new();
        let err = vm.eval_str("leak: func [] [:return] r: leak r 5").unwrap_err();
        assert!(err.is_no_matching_target());
    }
}
