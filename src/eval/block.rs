use crate::binding::Env;
use crate::bounce::Bounce;
use crate::error::EvalError;
use crate::executor::Executor;
use crate::feed::{Feed, FeedRef};
use crate::ids::LevelId;
use crate::level::{Event, Level, LevelFlags};
use crate::value::{Block, Value};
use crate::vm::Vm;

use super::Stepper;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockState {
    Initial,
    Stepping,
}

/// Evaluates every expression of a block; the result is the last one's.
///
/// A single kept-alive stepper level is relaunched for each expression
/// instead of allocating a new level per step.
#[derive(Debug)]
pub struct BlockExecutor {
    feed: FeedRef,
    stepper: Option<LevelId>,
    last: Value,
    state: BlockState,
}

impl BlockExecutor {
    pub fn new(block: &Block, fallback: &Env) -> Self {
        Self::from_feed(Feed::new(block, fallback))
    }

    pub fn with_env(block: &Block, env: Env) -> Self {
        Self::from_feed(Feed::with_env(block, env))
    }

    fn from_feed(feed: FeedRef) -> Self {
        BlockExecutor {
            feed,
            stepper: None,
            last: Value::Void,
            state: BlockState::Initial,
        }
    }

    fn next_expression(&mut self, vm: &mut Vm) -> Bounce {
        if self.feed.borrow().is_at_end() {
            if let Some(stepper) = self.stepper.take() {
                vm.drop_level(stepper);
            }
            return Bounce::Done(std::mem::replace(&mut self.last, Value::Void));
        }

        let env = self.feed.borrow().env().clone();
        let level = Level::new(Box::new(Stepper::new(self.feed.clone(), true)), env)
            .with_flags(LevelFlags::KEEPALIVE);
        let id = match self.stepper {
            Some(existing) => vm.relaunch(existing, level),
            None => vm.spawn(level),
        };
        self.stepper = Some(id);
        self.state = BlockState::Stepping;
        Bounce::Continue(id)
    }
}

impl Executor for BlockExecutor {
    fn step(&mut self, vm: &mut Vm, _id: LevelId, event: Event) -> Bounce {
        match (self.state, event) {
            (BlockState::Initial, Event::Start) => self.next_expression(vm),
            (BlockState::Stepping, Event::Resumed(value)) => {
                self.last = value;
                self.next_expression(vm)
            }
            (_, Event::Thrown(unwind)) => Bounce::Thrown(unwind),
            (state, _) => Bounce::error(EvalError::internal(format!(
                "block executor re-entered in state {:?}",
                state
            ))),
        }
    }

    fn name(&self) -> &'static str {
        "block"
    }

    fn state(&self) -> &'static str {
        match self.state {
            BlockState::Initial => "initial",
            BlockState::Stepping => "stepping",
        }
    }

    fn abort(&mut self, vm: &mut Vm, _id: LevelId) {
        if let Some(stepper) = self.stepper.take() {
            vm.drop_level(stepper);
        }
    }
}
