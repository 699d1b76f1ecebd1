use crate::action::Args;
use crate::binding::Env;
use crate::bounce::Bounce;
use crate::error::EvalError;
use crate::executor::Executor;
use crate::ids::LevelId;
use crate::level::Event;
use crate::value::{Block, Series, Symbol, Value};
use crate::vm::Vm;

use super::{exit_bounce, loop_words, state_error, LoopFrame, PassOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EachMode {
    /// Result is the last pass's value.
    ForEach,
    /// Null if any pass produced a falsey value, else the last value.
    Every,
    /// Collects each pass's value into a new block, skipping null and void.
    MapEach,
}

impl EachMode {
    fn name(&self) -> &'static str {
        match self {
            EachMode::ForEach => "for-each",
            EachMode::Every => "every",
            EachMode::MapEach => "map-each",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EachState {
    Initial,
    RunningBody,
}

/// Walks a series, binding one or more words per pass.
///
/// The series length is re-read before every pass, so a body that appends
/// to the series being walked extends the walk.
#[derive(Debug)]
pub struct ForEachLoop {
    mode: EachMode,
    words: Vec<Symbol>,
    series: Option<Series>,
    index: usize,
    body: Option<Block>,
    frame: Option<LoopFrame>,
    collected: Vec<Value>,
    any_falsey: bool,
    state: EachState,
}

impl ForEachLoop {
    fn build(args: Args, mode: EachMode) -> Result<Box<dyn Executor>, EvalError> {
        let words = loop_words(&args)?;
        let series = match args.get("data") {
            Value::Block(block) => Some(block.series),
            Value::Null | Value::Blank => None,
            other => return Err(args.mismatch("data", "block", &other)),
        };
        Ok(Box::new(ForEachLoop {
            mode,
            words,
            index: series.as_ref().map(Series::index).unwrap_or(0),
            series,
            body: Some(args.block("body")?),
            frame: None,
            collected: Vec::new(),
            any_falsey: false,
            state: EachState::Initial,
        }))
    }

    pub(crate) fn build_for_each(_env: &Env, args: Args) -> Result<Box<dyn Executor>, EvalError> {
        Self::build(args, EachMode::ForEach)
    }

    pub(crate) fn build_every(_env: &Env, args: Args) -> Result<Box<dyn Executor>, EvalError> {
        Self::build(args, EachMode::Every)
    }

    pub(crate) fn build_map_each(_env: &Env, args: Args) -> Result<Box<dyn Executor>, EvalError> {
        Self::build(args, EachMode::MapEach)
    }

    fn exhausted(&self) -> bool {
        match &self.series {
            Some(series) => self.index >= series.total_len(),
            None => true,
        }
    }

    /// Bind the loop words to the next items and advance.
    fn bind_next(&mut self, frame: &LoopFrame) {
        for (offset, word) in self.words.iter().enumerate() {
            let item = self
                .series
                .as_ref()
                .and_then(|s| s.get_absolute(self.index + offset))
                .unwrap_or(Value::Null);
            frame.bind(word, item);
        }
        self.index += self.words.len();
    }

    fn observe(&mut self, value: &Value) {
        match self.mode {
            EachMode::ForEach => {}
            EachMode::Every => match value.clone().decay() {
                Value::Void => {}
                other => {
                    if !other.is_truthy().unwrap_or(false) {
                        self.any_falsey = true;
                    }
                }
            },
            EachMode::MapEach => match value.clone().decay() {
                Value::Void | Value::Null => {}
                other => self.collected.push(other),
            },
        }
    }

    fn finish(&mut self) -> Value {
        let last = self.frame.as_mut().map(|f| f.passes.finish()).unwrap_or(Value::Void);
        match self.mode {
            EachMode::ForEach => last,
            EachMode::Every if self.any_falsey => Value::Null,
            EachMode::Every => last,
            EachMode::MapEach => Value::block(std::mem::take(&mut self.collected)),
        }
    }

    fn next_pass(&mut self, vm: &mut Vm) -> Bounce {
        if self.exhausted() {
            return Bounce::Done(self.finish());
        }
        let Some(frame) = self.frame.take() else {
            return state_error(self.mode.name(), self.state);
        };
        self.bind_next(&frame);
        let bounce = frame.run_body(vm);
        self.frame = Some(frame);
        bounce
    }
}

impl Executor for ForEachLoop {
    fn step(&mut self, vm: &mut Vm, id: LevelId, event: Event) -> Bounce {
        match (self.state, event) {
            (EachState::Initial, Event::Start) => {
                if self.exhausted() {
                    return Bounce::Done(self.finish());
                }
                let Some(body) = self.body.take() else {
                    return state_error(self.mode.name(), self.state);
                };
                self.frame = Some(LoopFrame::enter(vm, id, body, false));
                self.state = EachState::RunningBody;
                self.next_pass(vm)
            }
            (EachState::RunningBody, event) => {
                let outcome = match self.frame.as_ref() {
                    Some(frame) => frame.outcome(event),
                    None => return state_error(self.mode.name(), self.state),
                };
                match outcome {
                    PassOutcome::Completed(value) => {
                        self.observe(&value);
                        if let Some(frame) = self.frame.as_mut() {
                            frame.passes.record(value);
                        }
                        self.next_pass(vm)
                    }
                    other => exit_bounce(other),
                }
            }
            (state, _) => state_error(self.mode.name(), state),
        }
    }

    fn name(&self) -> &'static str {
        self.mode.name()
    }

    fn state(&self) -> &'static str {
        match self.state {
            EachState::Initial => "initial",
            EachState::RunningBody => "running-body",
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::value::Value;
    use crate::vm::Vm;

    #[test]
    fn test_for_each_binds_multiple_words() {
        let mut vm = Vm::new();
        let value = vm
            .eval_str("out: copy [] for-each [a b] [1 2 3 4] [append out b] out")
            .unwrap();
        assert_eq!(value.to_string(), "[2 4]");
    }

    #[test]
    fn test_for_each_sees_growth() {
        let mut vm = Vm::new();
        let value = vm
            .eval_str("data: copy [1] n: 0 for-each x data [n: n + 1 if x < 3 [append data x + 1]] n")
            .unwrap();
        assert_eq!(value.as_int(), Some(3));
    }

    #[test]
    fn test_empty_series_never_runs() {
        let mut vm = Vm::new();
        assert!(vm.eval_str("for-each x [] [x]").unwrap().is_void());
        assert!(vm.eval_str("every x [] [x]").unwrap().is_void());
        assert_eq!(vm.eval_str("map-each x [] [x]").unwrap().to_string(), "[]");
    }

    #[test]
    fn test_every() {
        let mut vm = Vm::new();
        assert_eq!(vm.eval_str("every x [2 4 6] [even? x]").unwrap().to_string(), "true");
        assert!(vm.eval_str("every x [2 3 6] [even? x]").unwrap().is_null());
    }

    #[test]
    fn test_map_each_skips_null() {
        let mut vm = Vm::new();
        let value = vm.eval_str("map-each x [1 2 3 4] [if even? x [x * 10]]").unwrap();
        assert_eq!(value.to_string(), "[20 40]");
    }

    #[test]
    fn test_map_each_break_is_null() {
        let mut vm = Vm::new();
        let value = vm.eval_str("map-each x [1 2 3] [if x = 2 [break] x]").unwrap();
        assert!(matches!(value, Value::Null));
    }
}
