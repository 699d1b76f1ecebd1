use crate::action::Args;
use crate::binding::Env;
use crate::bounce::{Bounce, Unwind};
use crate::error::EvalError;
use crate::eval::spawn_bound_block;
use crate::executor::Executor;
use crate::ids::LevelId;
use crate::level::Event;
use crate::value::{Block, Value};
use crate::vm::Vm;

use super::{exit_bounce, state_error, LoopFrame, PassOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WhileState {
    Initial,
    TestingCondition,
    RunningBody,
}

/// `while condition body`
///
/// The condition block runs in its own binding, so BREAK and CONTINUE inside
/// it belong to an enclosing loop, not this one.
#[derive(Debug)]
pub struct WhileLoop {
    condition: Block,
    env: Env,
    body: Option<Block>,
    frame: Option<LoopFrame>,
    state: WhileState,
}

impl WhileLoop {
    pub(crate) fn build(env: &Env, args: Args) -> Result<Box<dyn Executor>, EvalError> {
        Ok(Box::new(WhileLoop {
            condition: args.block("condition")?,
            env: env.clone(),
            body: Some(args.block("body")?),
            frame: None,
            state: WhileState::Initial,
        }))
    }

    fn test_condition(&mut self, vm: &mut Vm) -> Bounce {
        self.state = WhileState::TestingCondition;
        Bounce::Continue(spawn_bound_block(vm, &self.condition, &self.env))
    }

    fn finish(&mut self) -> Value {
        self.frame
            .as_mut()
            .map(|f| f.passes.finish())
            .unwrap_or(Value::Void)
    }
}

impl Executor for WhileLoop {
    fn step(&mut self, vm: &mut Vm, id: LevelId, event: Event) -> Bounce {
        match (self.state, event) {
            (WhileState::Initial, Event::Start) => {
                let Some(body) = self.body.take() else {
                    return state_error("while", self.state);
                };
                self.frame = Some(LoopFrame::enter(vm, id, body, false));
                self.test_condition(vm)
            }
            (WhileState::TestingCondition, Event::Resumed(value)) => match value.is_truthy() {
                Ok(true) => {
                    self.state = WhileState::RunningBody;
                    match self.frame.as_ref() {
                        Some(frame) => frame.run_body(vm),
                        None => state_error("while", self.state),
                    }
                }
                Ok(false) => Bounce::Done(self.finish()),
                Err(e) => Bounce::error(e),
            },
            (WhileState::TestingCondition, Event::Thrown(unwind)) => Bounce::Thrown(unwind),
            (WhileState::RunningBody, event) => {
                let Some(frame) = self.frame.as_mut() else {
                    return state_error("while", self.state);
                };
                match frame.outcome(event) {
                    PassOutcome::Completed(value) => {
                        frame.passes.record(value);
                        self.test_condition(vm)
                    }
                    other => exit_bounce(other),
                }
            }
            (state, _) => state_error("while", state),
        }
    }

    fn name(&self) -> &'static str {
        "while"
    }

    fn state(&self) -> &'static str {
        match self.state {
            WhileState::Initial => "initial",
            WhileState::TestingCondition => "testing-condition",
            WhileState::RunningBody => "running-body",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UntilState {
    Initial,
    RunningBody,
}

/// `until body`: runs the body until it produces a truthy value, which is
/// the result. A void pass counts as falsey.
#[derive(Debug)]
pub struct UntilLoop {
    body: Option<Block>,
    frame: Option<LoopFrame>,
    state: UntilState,
}

impl UntilLoop {
    pub(crate) fn build(_env: &Env, args: Args) -> Result<Box<dyn Executor>, EvalError> {
        Ok(Box::new(UntilLoop {
            body: Some(args.block("body")?),
            frame: None,
            state: UntilState::Initial,
        }))
    }
}

impl Executor for UntilLoop {
    fn step(&mut self, vm: &mut Vm, id: LevelId, event: Event) -> Bounce {
        match (self.state, event) {
            (UntilState::Initial, Event::Start) => {
                let Some(body) = self.body.take() else {
                    return state_error("until", self.state);
                };
                let frame = LoopFrame::enter(vm, id, body, false);
                let bounce = frame.run_body(vm);
                self.frame = Some(frame);
                self.state = UntilState::RunningBody;
                bounce
            }
            (UntilState::RunningBody, event) => {
                let Some(frame) = self.frame.as_mut() else {
                    return state_error("until", self.state);
                };
                match frame.outcome(event) {
                    PassOutcome::Completed(value) => {
                        let done = match value.clone().decay() {
                            Value::Void => false,
                            other => match other.is_truthy() {
                                Ok(truthy) => truthy,
                                Err(e) => return Bounce::Thrown(Unwind::Error(e)),
                            },
                        };
                        if done {
                            Bounce::Done(value)
                        } else {
                            frame.passes.record(value);
                            frame.run_body(vm)
                        }
                    }
                    other => exit_bounce(other),
                }
            }
            (state, _) => state_error("until", state),
        }
    }

    fn name(&self) -> &'static str {
        "until"
    }

    fn state(&self) -> &'static str {
        match self.state {
            UntilState::Initial => "initial",
            UntilState::RunningBody => "running-body",
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::vm::Vm;

    #[test]
    fn test_while_counts() {
        let mut vm = Vm::new();
        let value = vm.eval_str("n: 0 while [n < 5] [n: n + 1]").unwrap();
        assert_eq!(value.as_int(), Some(5));
    }

    #[test]
    fn test_while_false_never_runs() {
        let mut vm = Vm::new();
        assert!(vm.eval_str("while [false] [1]").unwrap().is_void());
    }

    #[test]
    fn test_void_condition_is_error() {
        let mut vm = Vm::new();
        assert!(vm.eval_str("while [] [1]").is_err());
    }

    #[test]
    fn test_until_returns_truthy_value() {
        let mut vm = Vm::new();
        let value = vm.eval_str("n: 0 until [n: n + 1 if n = 4 [n * 100]]").unwrap();
        assert_eq!(value.as_int(), Some(400));
    }

    #[test]
    fn test_until_continue_without_value_keeps_going() {
        let mut vm = Vm::new();
        let value = vm
            .eval_str("n: 0 until [n: n + 1 if n < 3 [continue] n = 3]")
            .unwrap();
        assert_eq!(value.to_string(), "true");
    }
}
