use crate::action::Args;
use crate::binding::Env;
use crate::bounce::Bounce;
use crate::error::EvalError;
use crate::executor::Executor;
use crate::ids::LevelId;
use crate::level::Event;
use crate::value::{Block, Symbol, Value};
use crate::vm::Vm;

use super::{exit_bounce, state_error, LoopFrame, PassOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CountedState {
    Initial,
    RunningBody,
}

/// `cfor word start end bump body` and `count-up word limit body`.
///
/// The variable is read back after every pass, so the body may move it; a
/// body that stores a non-integer there is an error.
#[derive(Debug)]
pub struct CountedLoop {
    name: &'static str,
    word: Symbol,
    start: i64,
    end: i64,
    bump: i64,
    body: Option<Block>,
    frame: Option<LoopFrame>,
    state: CountedState,
}

impl CountedLoop {
    pub(crate) fn build_cfor(_env: &Env, args: Args) -> Result<Box<dyn Executor>, EvalError> {
        let bump = args.int("bump")?;
        if bump == 0 {
            return Err(args.mismatch("bump", "non-zero integer", &Value::Integer(0)));
        }
        Ok(Box::new(CountedLoop {
            name: "cfor",
            word: args.word("word")?,
            start: args.int("start")?,
            end: args.int("end")?,
            bump,
            body: Some(args.block("body")?),
            frame: None,
            state: CountedState::Initial,
        }))
    }

    pub(crate) fn build_count_up(_env: &Env, args: Args) -> Result<Box<dyn Executor>, EvalError> {
        Ok(Box::new(CountedLoop {
            name: "count-up",
            word: args.word("word")?,
            start: 1,
            end: args.int("limit")?,
            bump: 1,
            body: Some(args.block("body")?),
            frame: None,
            state: CountedState::Initial,
        }))
    }

    fn in_range(&self, i: i64) -> bool {
        in_range(self.bump, self.end, i)
    }

    fn after_pass(&mut self, vm: &mut Vm) -> Bounce {
        let Some(frame) = self.frame.as_mut() else {
            return state_error(self.name, self.state);
        };
        let current = match frame.read(&self.word) {
            Value::Integer(i) => i,
            other => {
                return Bounce::error(EvalError::LoopVariableChanged {
                    word: self.word.clone(),
                    actual: other.type_name().to_string(),
                })
            }
        };
        // Stepping past i64 bounds ends the loop like reaching the end does.
        match current.checked_add(self.bump) {
            Some(next) if in_range(self.bump, self.end, next) => {
                frame.bind(&self.word, Value::Integer(next));
                frame.run_body(vm)
            }
            _ => Bounce::Done(frame.passes.finish()),
        }
    }
}

fn in_range(bump: i64, end: i64, i: i64) -> bool {
    if bump > 0 {
        i <= end
    } else {
        i >= end
    }
}

impl Executor for CountedLoop {
    fn step(&mut self, vm: &mut Vm, id: LevelId, event: Event) -> Bounce {
        match (self.state, event) {
            (CountedState::Initial, Event::Start) => {
                if !self.in_range(self.start) {
                    return Bounce::Done(Value::Void);
                }
                let Some(body) = self.body.take() else {
                    return state_error(self.name, self.state);
                };
                let frame = LoopFrame::enter(vm, id, body, false);
                frame.bind(&self.word, Value::Integer(self.start));
                let bounce = frame.run_body(vm);
                self.frame = Some(frame);
                self.state = CountedState::RunningBody;
                bounce
            }
            (CountedState::RunningBody, event) => {
                let Some(frame) = self.frame.as_mut() else {
                    return state_error(self.name, self.state);
                };
                match frame.outcome(event) {
                    PassOutcome::Completed(value) => {
                        frame.passes.record(value);
                        self.after_pass(vm)
                    }
                    other => exit_bounce(other),
                }
            }
            (state, _) => state_error(self.name, state),
        }
    }

    fn name(&self) -> &'static str {
        self.name
    }

    fn state(&self) -> &'static str {
        match self.state {
            CountedState::Initial => "initial",
            CountedState::RunningBody => "running-body",
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::error::EvalError;
    use crate::vm::Vm;

    #[test]
    fn test_cfor_sums_range() {
        let mut vm = Vm::new();
        let value = vm.eval_str("sum: 0 cfor i 1 10 1 [sum: sum + i] sum").unwrap();
        assert_eq!(value.as_int(), Some(55));
    }

    #[test]
    fn test_cfor_counts_down() {
        let mut vm = Vm::new();
        let value = vm.eval_str("out: copy [] cfor i 3 1 -1 [append out i] out").unwrap();
        assert_eq!(value.to_string(), "[3 2 1]");
    }

    #[test]
    fn test_body_may_move_the_variable() {
        let mut vm = Vm::new();
        let value = vm.eval_str("n: 0 count-up i 10 [n: n + 1 i: i + 1] n").unwrap();
        assert_eq!(value.as_int(), Some(5));
    }

    #[test]
    fn test_changed_variable_type_is_error() {
        let mut vm = Vm::new();
        let err = vm.eval_str("count-up i 3 [i: \"text\"]").unwrap_err();
        assert!(matches!(err, EvalError::LoopVariableChanged { .. }));
    }

    #[test]
    fn test_zero_bump_is_error() {
        let mut vm = Vm::new();
        assert!(matches!(
            vm.eval_str("cfor i 1 3 0 [i]"),
            Err(EvalError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_empty_range_never_runs() {
        let mut vm = Vm::new();
        assert!(vm.eval_str("count-up i 0 [i]").unwrap().is_void());
    }
}
