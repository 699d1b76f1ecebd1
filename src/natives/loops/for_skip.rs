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
enum SkipState {
    Initial,
    RunningBody,
}

/// `for-skip word series skip body`
///
/// The word holds the series at successive positions. It is read back after
/// each pass; the body may reposition it within the same series.
#[derive(Debug)]
pub struct ForSkipLoop {
    word: Symbol,
    block: Block,
    skip: usize,
    body: Option<Block>,
    frame: Option<LoopFrame>,
    state: SkipState,
}

impl ForSkipLoop {
    pub(crate) fn build(_env: &Env, args: Args) -> Result<Box<dyn Executor>, EvalError> {
        let skip = args.int("skip")?;
        if skip <= 0 {
            return Err(args.mismatch("skip", "positive integer", &Value::Integer(skip)));
        }
        Ok(Box::new(ForSkipLoop {
            word: args.word("word")?,
            block: args.block("series")?,
            skip: skip as usize,
            body: Some(args.block("body")?),
            frame: None,
            state: SkipState::Initial,
        }))
    }

    fn position(&self, index: usize) -> Value {
        Value::Block(Block {
            series: self.block.series.at(index),
            binding: self.block.binding.clone(),
        })
    }

    fn after_pass(&mut self, vm: &mut Vm) -> Bounce {
        let Some(frame) = self.frame.as_mut() else {
            return state_error("for-skip", self.state);
        };
        let index = match frame.read(&self.word) {
            Value::Block(b) if b.series.same_series(&self.block.series) => b.series.index(),
            other => {
                return Bounce::error(EvalError::LoopVariableChanged {
                    word: self.word.clone(),
                    actual: other.type_name().to_string(),
                })
            }
        };
        let next = index.saturating_add(self.skip);
        if next >= self.block.series.total_len() {
            return Bounce::Done(frame.passes.finish());
        }
        let position = self.position(next);
        let Some(frame) = self.frame.as_ref() else {
            return state_error("for-skip", self.state);
        };
        frame.bind(&self.word, position);
        frame.run_body(vm)
    }
}

impl Executor for ForSkipLoop {
    fn step(&mut self, vm: &mut Vm, id: LevelId, event: Event) -> Bounce {
        match (self.state, event) {
            (SkipState::Initial, Event::Start) => {
                if self.block.series.is_empty() {
                    return Bounce::Done(Value::Void);
                }
                let Some(body) = self.body.take() else {
                    return state_error("for-skip", self.state);
                };
                let frame = LoopFrame::enter(vm, id, body, false);
                frame.bind(&self.word, self.position(self.block.series.index()));
                let bounce = frame.run_body(vm);
                self.frame = Some(frame);
                self.state = SkipState::RunningBody;
                bounce
            }
            (SkipState::RunningBody, event) => {
                let Some(frame) = self.frame.as_mut() else {
                    return state_error("for-skip", self.state);
                };
                match frame.outcome(event) {
                    PassOutcome::Completed(value) => {
                        frame.passes.record(value);
                        self.after_pass(vm)
                    }
                    other => exit_bounce(other),
                }
            }
            (state, _) => state_error("for-skip", state),
        }
    }

    fn name(&self) -> &'static str {
        "for-skip"
    }

    fn state(&self) -> &'static str {
        match self.state {
            SkipState::Initial => "initial",
            SkipState::RunningBody => "running-body",
        }
    }
}
