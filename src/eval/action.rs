use std::rc::Rc;

use crate::action::{Action, ActionBody, Args, Native, ParamClass};
use crate::bounce::Bounce;
use crate::error::EvalError;
use crate::executor::Executor;
use crate::feed::FeedRef;
use crate::ids::LevelId;
use crate::level::{Event, Level};
use crate::natives::control;
use crate::value::{Symbol, Value};
use crate::vm::Vm;

use super::{FunctionExecutor, Stepper};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ActionState {
    Initial,
    Gathering,
}

/// Fulfills an action's parameters from the feed, then invokes it.
///
/// An infix action finds its left argument in the level's scratch slot.
/// Stateful natives and user functions replace this level by delegation.
#[derive(Debug)]
pub struct ActionExecutor {
    action: Rc<Action>,
    feed: FeedRef,
    refinements: Vec<Symbol>,
    args: Args,
    index: usize,
    state: ActionState,
}

impl ActionExecutor {
    pub fn new(action: Rc<Action>, feed: FeedRef, refinements: Vec<Symbol>) -> Self {
        let args = Args::new(action.name.clone(), &action.params);
        ActionExecutor {
            action,
            feed,
            refinements,
            args,
            index: 0,
            state: ActionState::Initial,
        }
    }

    fn begin(&mut self, vm: &mut Vm, id: LevelId) -> Bounce {
        for refinement in std::mem::take(&mut self.refinements) {
            let slot = self
                .action
                .params
                .iter()
                .position(|p| p.class == ParamClass::Flag && p.name == refinement);
            match slot {
                Some(index) => self.args.set_index(index, Value::Logic(true)),
                None => {
                    return Bounce::error(EvalError::BadRefinement {
                        action: self.action.name.clone(),
                        refinement,
                    })
                }
            }
        }

        if self.action.infix {
            let left = vm
                .level_mut(id)
                .map(|level| std::mem::replace(&mut level.scratch, Value::Void))
                .unwrap_or(Value::Void);
            self.args.set_index(0, left.decay());
            self.index = 1;
        }
        self.gather(vm)
    }

    fn gather(&mut self, vm: &mut Vm) -> Bounce {
        let action = Rc::clone(&self.action);
        while let Some(param) = action.params.get(self.index) {
            if let Some(refinement) = &param.refinement {
                if !self.args.flag(refinement.as_str()) {
                    self.index += 1;
                    continue;
                }
            }

            match param.class {
                ParamClass::Flag => {
                    if !self.args.flag(param.name.as_str()) {
                        self.args.set_index(self.index, Value::Logic(false));
                    }
                }
                ParamClass::Literal => {
                    let next = self.feed.borrow_mut().next_value();
                    match next {
                        Some(value) => self.args.set_index(self.index, value),
                        None => return self.missing(&param.name),
                    }
                }
                ParamClass::Normal => {
                    if self.feed.borrow().is_at_end() {
                        return self.missing(&param.name);
                    }
                    let env = self.feed.borrow().env().clone();
                    let stepper = Stepper::new(self.feed.clone(), !action.infix);
                    self.state = ActionState::Gathering;
                    return Bounce::Continue(vm.spawn(Level::new(Box::new(stepper), env)));
                }
            }
            self.index += 1;
        }
        self.invoke(vm)
    }

    fn missing(&self, param: &Symbol) -> Bounce {
        Bounce::error(EvalError::ArgumentMissing {
            action: self.action.name.clone(),
            param: param.clone(),
        })
    }

    fn invoke(&mut self, vm: &mut Vm) -> Bounce {
        let env = self.feed.borrow().env().clone();
        let args = std::mem::replace(
            &mut self.args,
            Args::new(self.action.name.clone(), &[]),
        );
        log::trace!("invoke {} ({} args)", self.action.name, args.len());

        match &self.action.body {
            ActionBody::Native(Native::Plain(f)) => Bounce::from_result(f(vm, &env, &args)),
            ActionBody::Native(Native::Stateful(f)) => match f(&env, args) {
                Ok(executor) => Bounce::Delegate(Level::new(executor, env)),
                Err(e) => Bounce::error(e),
            },
            ActionBody::Function { body } => {
                let executor = FunctionExecutor::new(Rc::clone(&self.action), body.clone(), args);
                Bounce::Delegate(Level::new(Box::new(executor), env))
            }
            ActionBody::Definitional { kind, coupling } => {
                control::throw_definitional(vm, *kind, *coupling, &args)
            }
        }
    }
}

impl Executor for ActionExecutor {
    fn step(&mut self, vm: &mut Vm, id: LevelId, event: Event) -> Bounce {
        match (self.state, event) {
            (ActionState::Initial, Event::Start) => self.begin(vm, id),
            (ActionState::Gathering, Event::Resumed(value)) => {
                self.args.set_index(self.index, value.decay());
                self.index += 1;
                self.gather(vm)
            }
            (_, Event::Thrown(unwind)) => Bounce::Thrown(unwind),
            (state, _) => Bounce::error(EvalError::internal(format!(
                "action {} re-entered in state {:?}",
                self.action.name, state
            ))),
        }
    }

    fn name(&self) -> &'static str {
        "action"
    }

    fn state(&self) -> &'static str {
        match self.state {
            ActionState::Initial => "initial",
            ActionState::Gathering => "gathering",
        }
    }
}
