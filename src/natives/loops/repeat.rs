use crate::action::Args;
use crate::binding::Env;
use crate::bounce::Bounce;
use crate::error::EvalError;
use crate::executor::Executor;
use crate::ids::LevelId;
use crate::level::Event;
use crate::value::{Block, Value};
use crate::vm::Vm;

use super::{exit_bounce, state_error, LoopFrame, PassOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RepeatState {
    Initial,
    RunningBody,
}

/// `repeat count body`
#[derive(Debug)]
pub struct RepeatLoop {
    count: i64,
    body: Option<Block>,
    frame: Option<LoopFrame>,
    state: RepeatState,
}

impl RepeatLoop {
    pub(crate) fn build(_env: &Env, args: Args) -> Result<Box<dyn Executor>, EvalError> {
        let count = match args.get("count") {
            Value::Integer(n) => n,
            Value::Null | Value::Blank => 0,
            other => return Err(args.mismatch("count", "integer", &other)),
        };
        Ok(Box::new(RepeatLoop {
            count,
            body: Some(args.block("body")?),
            frame: None,
            state: RepeatState::Initial,
        }))
    }
}

impl Executor for RepeatLoop {
    fn step(&mut self, vm: &mut Vm, id: LevelId, event: Event) -> Bounce {
        match (self.state, event) {
            (RepeatState::Initial, Event::Start) => {
                if self.count <= 0 {
                    return Bounce::Done(Value::Void);
                }
                let Some(body) = self.body.take() else {
                    return state_error("repeat", self.state);
                };
                let frame = LoopFrame::enter(vm, id, body, false);
                let bounce = frame.run_body(vm);
                self.frame = Some(frame);
                self.state = RepeatState::RunningBody;
                bounce
            }
            (RepeatState::RunningBody, event) => {
                let Some(frame) = self.frame.as_mut() else {
                    return state_error("repeat", self.state);
                };
                match frame.outcome(event) {
                    PassOutcome::Completed(value) => {
                        frame.passes.record(value);
                        if frame.passes.count >= self.count as u64 {
                            Bounce::Done(frame.passes.finish())
                        } else {
                            frame.run_body(vm)
                        }
                    }
                    other => exit_bounce(other),
                }
            }
            (state, _) => state_error("repeat", state),
        }
    }

    fn name(&self) -> &'static str {
        "repeat"
    }

    fn state(&self) -> &'static str {
        match self.state {
            RepeatState::Initial => "initial",
            RepeatState::RunningBody => "running-body",
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::value::Value;
    use crate::vm::Vm;

    #[test]
    fn test_repeat_counts_passes() {
        let mut vm = Vm::new();
        let value = vm.eval_str("n: 0 repeat 5 [n: n + 1]").unwrap();
        assert_eq!(value.as_int(), Some(5));
    }

    #[test]
    fn test_repeat_zero_never_runs() {
        let mut vm = Vm::new();
        assert!(vm.eval_str("repeat 0 [1]").unwrap().is_void());
        assert!(vm.eval_str("repeat -3 [1]").unwrap().is_void());
    }

    #[test]
    fn test_repeat_null_body_result_is_heavy() {
        let mut vm = Vm::new();
        let value = vm.eval_str("repeat 2 [null]").unwrap();
        assert!(matches!(value, Value::Pack(items) if items.len() == 1 && items[0].is_null()));
    }
}
