use crate::action::Args;
use crate::binding::Env;
use crate::bounce::Bounce;
use crate::error::EvalError;
use crate::executor::Executor;
use crate::ids::LevelId;
use crate::level::Event;
use crate::value::{Block, Series, Symbol, Value};
use crate::vm::Vm;

use super::{loop_words, state_error, LoopFrame, PassOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RemoveState {
    Initial,
    RunningBody,
    Finished,
}

/// `remove-each vars series body`
///
/// Holds the series for the whole walk so the body cannot change it
/// structurally. A series some other walker already holds is refused. A truthy pass stages the items it was given for removal;
/// staged removals are applied in one go when the walk ends or breaks, and
/// dropped if an error or foreign unwind passes through.
#[derive(Debug)]
pub struct RemoveEachLoop {
    words: Vec<Symbol>,
    series: Series,
    index: usize,
    pass_start: usize,
    marks: Vec<bool>,
    body: Option<Block>,
    frame: Option<LoopFrame>,
    state: RemoveState,
}

impl RemoveEachLoop {
    pub(crate) fn build(_env: &Env, args: Args) -> Result<Box<dyn Executor>, EvalError> {
        let words = loop_words(&args)?;
        let series = match args.get("data") {
            Value::Block(block) => block.series,
            other => return Err(args.mismatch("data", "block", &other)),
        };
        Ok(Box::new(RemoveEachLoop {
            words,
            index: series.index(),
            pass_start: series.index(),
            series,
            marks: Vec::new(),
            body: Some(args.block("body")?),
            frame: None,
            state: RemoveState::Initial,
        }))
    }

    fn release(&mut self) {
        if self.state != RemoveState::Finished {
            self.series.release();
            self.state = RemoveState::Finished;
        }
    }

    /// Release the hold and apply staged removals; returns the count.
    fn commit(&mut self) -> Result<usize, EvalError> {
        self.release();
        let removed = self.series.remove_marked(&self.marks)?;
        log::trace!("remove-each removed {} item(s)", removed);
        Ok(removed)
    }

    fn next_pass(&mut self, vm: &mut Vm) -> Bounce {
        if self.index >= self.series.total_len() {
            return match self.commit() {
                Ok(removed) => Bounce::Done(Value::Integer(removed as i64)),
                Err(e) => Bounce::error(e),
            };
        }
        let Some(frame) = self.frame.as_ref() else {
            return state_error("remove-each", self.state);
        };
        self.pass_start = self.index;
        for (offset, word) in self.words.iter().enumerate() {
            let item = self
                .series
                .get_absolute(self.index + offset)
                .unwrap_or(Value::Null);
            frame.bind(word, item);
        }
        self.index += self.words.len();
        frame.run_body(vm)
    }

    fn stage(&mut self, value: &Value) -> Result<(), EvalError> {
        let remove = match value.clone().decay() {
            Value::Void => false,
            other => other.is_truthy()?,
        };
        if remove {
            let end = self.index.min(self.marks.len());
            for mark in &mut self.marks[self.pass_start.min(end)..end] {
                *mark = true;
            }
        }
        Ok(())
    }
}

impl Executor for RemoveEachLoop {
    fn step(&mut self, vm: &mut Vm, id: LevelId, event: Event) -> Bounce {
        match (self.state, event) {
            (RemoveState::Initial, Event::Start) => {
                if self.series.is_held() {
                    self.state = RemoveState::Finished;
                    return Bounce::error(EvalError::SeriesHeld);
                }
                if self.index >= self.series.total_len() {
                    self.state = RemoveState::Finished;
                    return Bounce::Done(Value::Void);
                }
                let Some(body) = self.body.take() else {
                    return state_error("remove-each", self.state);
                };
                self.series.hold();
                self.marks = vec![false; self.series.total_len()];
                self.frame = Some(LoopFrame::enter(vm, id, body, false));
                self.state = RemoveState::RunningBody;
                self.next_pass(vm)
            }
            (RemoveState::RunningBody, event) => {
                let outcome = match self.frame.as_ref() {
                    Some(frame) => frame.outcome(event),
                    None => return state_error("remove-each", self.state),
                };
                match outcome {
                    PassOutcome::Completed(value) => {
                        if let Err(e) = self.stage(&value) {
                            self.release();
                            return Bounce::error(e);
                        }
                        if let Some(frame) = self.frame.as_mut() {
                            frame.passes.record(value);
                        }
                        self.next_pass(vm)
                    }
                    PassOutcome::Break => match self.commit() {
                        Ok(_) => Bounce::Done(Value::Null),
                        Err(e) => Bounce::error(e),
                    },
                    PassOutcome::Stop(value) => match self.commit() {
                        Ok(_) => Bounce::Done(value),
                        Err(e) => Bounce::error(e),
                    },
                    PassOutcome::Foreign(unwind) => {
                        self.release();
                        Bounce::Thrown(unwind)
                    }
                }
            }
            (state, _) => state_error("remove-each", state),
        }
    }

    fn name(&self) -> &'static str {
        "remove-each"
    }

    fn state(&self) -> &'static str {
        match self.state {
            RemoveState::Initial => "initial",
            RemoveState::RunningBody => "running-body",
            RemoveState::Finished => "finished",
        }
    }

    fn abort(&mut self, _vm: &mut Vm, _id: LevelId) {
        if self.state == RemoveState::RunningBody {
            log::debug!("remove-each aborted; staged removals dropped");
            self.release();
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::error::EvalError;
    use crate::value::Value;
    use crate::vm::Vm;

    #[test]
    fn test_removes_truthy_passes() {
        let mut vm = Vm::new();
        let value = vm
            .eval_str("data: copy [1 2 3 4 5 6] n: remove-each x data [even? x] reduce [n data]")
            .unwrap();
        assert_eq!(value.to_string(), "[3 [1 3 5]]");
    }

    #[test]
    fn test_series_is_held_during_walk() {
        let mut vm = Vm::new();
        let err = vm
            .eval_str("data: copy [1 2] remove-each x data [append data 3]")
            .unwrap_err();
        assert!(matches!(err, EvalError::SeriesHeld));
        // The hold is released once the error has unwound through the loop.
        let value = vm.eval_str("append data 3 length-of data").unwrap();
        assert_eq!(value.as_int(), Some(3));
    }

    #[test]
    fn test_nested_walk_over_held_series_is_refused() {
        let mut vm = Vm::new();
        let err = vm
            .eval_str("data: copy [1 2 3 4] remove-each x data [remove-each y data [y = 1] x = 4]")
            .unwrap_err();
        assert!(matches!(err, EvalError::SeriesHeld));
        assert_eq!(vm.eval_str("data").unwrap().to_string(), "[1 2 3 4]");

        // Both holds are gone once the error has unwound.
        let value = vm.eval_str("remove-each x data [x > 2] data").unwrap();
        assert_eq!(value.to_string(), "[1 2]");
    }

    #[test]
    fn test_break_applies_staged_removals() {
        let mut vm = Vm::new();
        let value = vm
            .eval_str("data: copy [1 2 3 4] r: remove-each x data [if x = 3 [break] true] reduce [r data]")
            .unwrap();
        assert_eq!(value.to_string(), "[~null~ [3 4]]");
    }

    #[test]
    fn test_error_discards_staged_removals() {
        let mut vm = Vm::new();
        let value = vm
            .eval_str("data: copy [1 2 3] trap [remove-each x data [if x = 3 [fail \"stop\"] true]] data")
            .unwrap();
        assert_eq!(value.to_string(), "[1 2 3]");
    }

    #[test]
    fn test_multiple_words_remove_whole_group() {
        let mut vm = Vm::new();
        let value = vm
            .eval_str("data: copy [1 2 3 4] remove-each [a b] data [a = 3] data")
            .unwrap();
        assert!(matches!(value, Value::Block(_)));
        assert_eq!(value.to_string(), "[1 2]");
    }
}
