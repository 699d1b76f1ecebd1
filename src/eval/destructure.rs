//! SET-BLOCK assignment: `[a /b _ (computed)]: expression`.
//!
//! Every target is resolved before the right-hand side runs. Group targets
//! are evaluated in sub-levels, so resolution may suspend any number of
//! times; the index of the next unresolved target is part of the state.

use crate::binding::Env;
use crate::bounce::Bounce;
use crate::error::EvalError;
use crate::executor::Executor;
use crate::feed::FeedRef;
use crate::ids::LevelId;
use crate::level::{Event, Level};
use crate::value::{Block, Symbol, Value};
use crate::vm::Vm;

use super::{spawn_block, Stepper};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// A value must be supplied.
    Required(Symbol),
    /// Assigned null when the pack runs out.
    Optional(Symbol),
    /// Consumes a position without assigning.
    Skip,
}

impl Target {
    fn from_value(value: &Value) -> Result<Target, EvalError> {
        match value {
            Value::Word(s) | Value::LitWord(s) => Ok(Target::Required(s.clone())),
            Value::Refinement(s) => Ok(Target::Optional(s.clone())),
            Value::Blank => Ok(Target::Skip),
            other => Err(EvalError::BadTarget {
                target: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DestructureState {
    ResolvingTargets,
    AwaitingGroup,
    AwaitingValue,
}

#[derive(Debug)]
pub struct Destructure {
    pattern: Vec<Value>,
    feed: FeedRef,
    targets: Vec<Target>,
    state: DestructureState,
}

impl Destructure {
    pub fn new(pattern: &Block, feed: FeedRef) -> Self {
        Destructure {
            pattern: pattern.series.to_vec(),
            feed,
            targets: Vec::new(),
            state: DestructureState::ResolvingTargets,
        }
    }

    fn env(&self) -> Env {
        self.feed.borrow().env().clone()
    }

    fn resolve(&mut self, vm: &mut Vm) -> Bounce {
        while let Some(item) = self.pattern.get(self.targets.len()) {
            if let Value::Group(group) = item {
                let env = self.env();
                let group = group.bound(&env);
                self.state = DestructureState::AwaitingGroup;
                return Bounce::Continue(spawn_block(vm, &group, &env));
            }
            match Target::from_value(item) {
                Ok(target) => self.targets.push(target),
                Err(e) => return Bounce::error(e),
            }
        }

        if self.feed.borrow().is_at_end() {
            return Bounce::error(EvalError::type_mismatch(
                "multi-return",
                "value",
                "end of block",
            ));
        }
        self.state = DestructureState::AwaitingValue;
        let stepper = Stepper::new(self.feed.clone(), true);
        Bounce::Continue(vm.spawn(Level::new(Box::new(stepper), self.env())))
    }

    fn assign(&self, value: Value) -> Result<Value, EvalError> {
        let values: Vec<Value> = match value {
            Value::Pack(items) => items.to_vec(),
            other => vec![other],
        };
        let env = self.env();
        for (position, target) in self.targets.iter().enumerate() {
            let supplied = values.get(position).cloned().map(Value::decay);
            match (target, supplied) {
                (Target::Skip, _) => {}
                (Target::Required(word), Some(v)) | (Target::Optional(word), Some(v)) => {
                    env.assign(word.clone(), v)
                }
                (Target::Optional(word), None) => env.assign(word.clone(), Value::Null),
                (Target::Required(word), None) => {
                    return Err(EvalError::PackTooShort {
                        available: values.len(),
                        target: word.clone(),
                    })
                }
            }
        }
        Ok(values.into_iter().next().map(Value::decay).unwrap_or(Value::Void))
    }
}

impl Executor for Destructure {
    fn step(&mut self, vm: &mut Vm, _id: LevelId, event: Event) -> Bounce {
        match (self.state, event) {
            (DestructureState::ResolvingTargets, Event::Start) => self.resolve(vm),
            (DestructureState::AwaitingGroup, Event::Resumed(value)) => {
                match Target::from_value(&value.decay()) {
                    Ok(target) => self.targets.push(target),
                    Err(e) => return Bounce::error(e),
                }
                self.resolve(vm)
            }
            (DestructureState::AwaitingValue, Event::Resumed(value)) => {
                Bounce::from_result(self.assign(value))
            }
            (_, Event::Thrown(unwind)) => Bounce::Thrown(unwind),
            (state, _) => Bounce::error(EvalError::internal(format!(
                "destructure re-entered in state {:?}",
                state
            ))),
        }
    }

    fn name(&self) -> &'static str {
        "destructure"
    }

    fn state(&self) -> &'static str {
        match self.state {
            DestructureState::ResolvingTargets => "resolving",
            DestructureState::AwaitingGroup => "awaiting-group",
            DestructureState::AwaitingValue => "awaiting-value",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_kinds() {
        assert_eq!(
            Target::from_value(&Value::word("a")).unwrap(),
            Target::Required(Symbol::new("a"))
        );
        assert_eq!(
            Target::from_value(&Value::Refinement(Symbol::new("b"))).unwrap(),
            Target::Optional(Symbol::new("b"))
        );
        assert_eq!(Target::from_value(&Value::Blank).unwrap(), Target::Skip);
        assert!(matches!(
            Target::from_value(&Value::Integer(1)),
            Err(EvalError::BadTarget { .. })
        ));
    }

    #[test]
    fn test_computed_target_suspends_and_resumes() {
        let mut vm = Vm::new();
        let value = vm
            .eval_str("name: 'second [a (name)]: pack [1 2] reduce [a second]")
            .unwrap();
        assert_eq!(value.to_string(), "[1 2]");
    }
}
