use std::rc::Rc;

use crate::action::Action;
use crate::binding::Env;
use crate::bounce::Bounce;
use crate::error::EvalError;
use crate::executor::Executor;
use crate::feed::FeedRef;
use crate::ids::LevelId;
use crate::level::{Event, Level};
use crate::value::{Symbol, Value};
use crate::vm::Vm;

use super::{spawn_block, ActionExecutor, Destructure};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StepperState {
    Initial,
    /// Waiting on a group, action or destructuring sub-level.
    AwaitingValue,
    /// Waiting on the right-hand side of a SET-WORD.
    AwaitingAssignment,
}

/// Evaluates exactly one expression from a feed.
///
/// With `lookahead` set, an infix action following the value consumes it as
/// its left argument. Right-hand arguments of infix actions are gathered
/// without lookahead so `1 + 2 * 3` evaluates left to right.
#[derive(Debug)]
pub struct Stepper {
    feed: FeedRef,
    lookahead: bool,
    target: Option<Symbol>,
    state: StepperState,
}

impl Stepper {
    pub fn new(feed: FeedRef, lookahead: bool) -> Self {
        Stepper {
            feed,
            lookahead,
            target: None,
            state: StepperState::Initial,
        }
    }

    fn env(&self) -> Env {
        self.feed.borrow().env().clone()
    }

    fn fetch(&mut self, vm: &mut Vm) -> Bounce {
        let env = self.env();
        let next = self.feed.borrow_mut().next_value();
        let Some(value) = next else {
            return Bounce::Done(Value::Void);
        };

        match value {
            Value::Block(block) => self.finish_value(vm, Value::Block(block.bound(&env))),
            Value::Group(group) => {
                let group = group.bound(&env);
                self.state = StepperState::AwaitingValue;
                Bounce::Continue(spawn_block(vm, &group, &env))
            }
            Value::LitWord(symbol) => self.finish_value(vm, Value::Word(symbol)),
            Value::GetWord(symbol) => match env.lookup(&symbol) {
                Some(found) => self.finish_value(vm, found),
                None => Bounce::error(EvalError::Unbound { word: symbol }),
            },
            Value::Word(symbol) => match env.lookup(&symbol) {
                Some(Value::Action(action)) => self.invoke(vm, action, Vec::new(), &env),
                Some(found) => self.finish_value(vm, found),
                None => Bounce::error(EvalError::Unbound { word: symbol }),
            },
            Value::Path(parts) => {
                let Some((head, refinements)) = parts.split_first() else {
                    return Bounce::error(EvalError::internal("empty path"));
                };
                match env.lookup(head) {
                    Some(Value::Action(action)) => self.invoke(vm, action, refinements.to_vec(), &env),
                    Some(other) => Bounce::error(EvalError::type_mismatch(
                        format!("path {}", Value::Path(parts.clone())),
                        "action",
                        other.type_name(),
                    )),
                    None => Bounce::error(EvalError::Unbound { word: head.clone() }),
                }
            }
            Value::Action(action) => self.invoke(vm, action, Vec::new(), &env),
            Value::SetWord(symbol) => {
                if self.feed.borrow().is_at_end() {
                    return Bounce::error(EvalError::type_mismatch(
                        format!("{}:", symbol),
                        "value",
                        "end of block",
                    ));
                }
                self.target = Some(symbol);
                self.state = StepperState::AwaitingAssignment;
                let rhs = Stepper::new(self.feed.clone(), true);
                Bounce::Continue(vm.spawn(Level::new(Box::new(rhs), env)))
            }
            Value::SetBlock(targets) => {
                self.state = StepperState::AwaitingValue;
                let destructure = Destructure::new(&targets, self.feed.clone());
                Bounce::Continue(vm.spawn(Level::new(Box::new(destructure), env)))
            }
            other => self.finish_value(vm, other),
        }
    }

    fn invoke(&mut self, vm: &mut Vm, action: Rc<Action>, refinements: Vec<Symbol>, env: &Env) -> Bounce {
        if action.infix {
            return Bounce::error(EvalError::ArgumentMissing {
                action: action.name.clone(),
                param: Symbol::new("left"),
            });
        }
        self.state = StepperState::AwaitingValue;
        let executor = ActionExecutor::new(action, self.feed.clone(), refinements);
        Bounce::Continue(vm.spawn(Level::new(Box::new(executor), env.clone())))
    }

    /// Hand `value` to a following infix action, or finish with it.
    fn finish_value(&mut self, vm: &mut Vm, value: Value) -> Bounce {
        if !self.lookahead {
            return Bounce::Done(value);
        }
        let env = self.env();
        let infix = match self.feed.borrow().peek() {
            Some(Value::Word(symbol)) => match env.lookup(&symbol) {
                Some(Value::Action(action)) if action.infix => Some(action),
                _ => None,
            },
            _ => None,
        };
        let Some(action) = infix else {
            return Bounce::Done(value);
        };

        self.feed.borrow_mut().next_value();
        self.state = StepperState::AwaitingValue;
        let executor = ActionExecutor::new(action, self.feed.clone(), Vec::new());
        let mut level = Level::new(Box::new(executor), env);
        level.scratch = value;
        Bounce::Continue(vm.spawn(level))
    }
}

impl Executor for Stepper {
    fn step(&mut self, vm: &mut Vm, _id: LevelId, event: Event) -> Bounce {
        match (self.state, event) {
            (StepperState::Initial, Event::Start) => self.fetch(vm),
            (StepperState::AwaitingValue, Event::Resumed(value)) => self.finish_value(vm, value),
            (StepperState::AwaitingAssignment, Event::Resumed(value)) => {
                let value = value.decay();
                if let Some(symbol) = self.target.take() {
                    self.env().assign(symbol, value.clone());
                }
                Bounce::Done(value)
            }
            (_, Event::Thrown(unwind)) => Bounce::Thrown(unwind),
            (state, _) => Bounce::error(EvalError::internal(format!(
                "stepper re-entered in state {:?}",
                state
            ))),
        }
    }

    fn name(&self) -> &'static str {
        "stepper"
    }

    fn state(&self) -> &'static str {
        match self.state {
            StepperState::Initial => "initial",
            StepperState::AwaitingValue => "awaiting-value",
            StepperState::AwaitingAssignment => "awaiting-assignment",
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::error::EvalError;
    use crate::value::Value;
    use crate::vm::Vm;

    #[test]
    fn test_infix_evaluates_left_to_right() {
        let mut vm = Vm::new();
        assert_eq!(vm.eval_str("1 + 2 * 3").unwrap().as_int(), Some(9));
    }

    #[test]
    fn test_set_word_takes_whole_infix_chain() {
        let mut vm = Vm::new();
        assert_eq!(vm.eval_str("x: 10 - 4 x").unwrap().as_int(), Some(6));
    }

    #[test]
    fn test_lit_and_get_words() {
        let mut vm = Vm::new();
        assert!(matches!(vm.eval_str("'foo").unwrap(), Value::Word(s) if s.as_str() == "foo"));
        assert!(matches!(vm.eval_str(":print").unwrap(), Value::Action(_)));
    }

    #[test]
    fn test_unbound_word_is_error() {
        let mut vm = Vm::new();
        assert!(matches!(vm.eval_str("nowhere"), Err(EvalError::Unbound { .. })));
    }

    #[test]
    fn test_infix_without_left_is_error() {
        let mut vm = Vm::new();
        assert!(matches!(vm.eval_str("+ 1"), Err(EvalError::ArgumentMissing { .. })));
    }

    #[test]
    fn test_group_result_feeds_infix() {
        let mut vm = Vm::new();
        assert_eq!(vm.eval_str("(2 * 3) + 1").unwrap().as_int(), Some(7));
    }
}
