//! Loop natives.
//!
//! Every loop follows the same skeleton: on entry it marks its level
//! CATCHES, creates a scope extending the body's binding and binds BREAK and
//! CONTINUE there, coupled to its own activation. Each pass runs the body in
//! a sub-level; when the pass ends the loop classifies the outcome with
//! [`pass_outcome`] and either runs another pass, finishes, or re-emits an
//! unwind aimed at someone else.
//!
//! Results:
//! - no pass ran: void
//! - BREAK: null
//! - STOP: its value (void for a bare `stop`)
//! - otherwise the last pass's value, with null and void wrapped in a pack
//!   so they stay distinguishable from the two cases above

mod cfor;
mod conditional;
mod cycle;
mod for_each;
mod for_skip;
mod remove_each;
mod repeat;

pub use cfor::CountedLoop;
pub use conditional::{UntilLoop, WhileLoop};
pub use cycle::CycleLoop;
pub use for_each::{EachMode, ForEachLoop};
pub use for_skip::ForSkipLoop;
pub use remove_each::RemoveEachLoop;
pub use repeat::RepeatLoop;

use crate::action::{Action, Args, Native, Param};
use crate::binding::{Env, Scope};
use crate::bounce::{Bounce, Unwind};
use crate::error::EvalError;
use crate::eval::spawn_block;
use crate::ids::{Coupling, LevelId};
use crate::level::{Event, LevelFlags};
use crate::natives::control::add_definitional_break_continue;
use crate::value::{Block, Symbol, Value};
use crate::vm::Vm;

use super::define;

pub(crate) fn register(lib: &Env) {
    define(
        lib,
        Action::native(
            "repeat",
            vec![Param::normal("count"), Param::normal("body")],
            Native::Stateful(RepeatLoop::build),
        ),
    );
    define(
        lib,
        Action::native(
            "cfor",
            vec![
                Param::literal("word"),
                Param::normal("start"),
                Param::normal("end"),
                Param::normal("bump"),
                Param::normal("body"),
            ],
            Native::Stateful(CountedLoop::build_cfor),
        ),
    );
    define(
        lib,
        Action::native(
            "count-up",
            vec![Param::literal("word"), Param::normal("limit"), Param::normal("body")],
            Native::Stateful(CountedLoop::build_count_up),
        ),
    );
    for (name, build) in [
        ("for-each", ForEachLoop::build_for_each as crate::action::StatefulFn),
        ("every", ForEachLoop::build_every),
        ("map-each", ForEachLoop::build_map_each),
        ("remove-each", RemoveEachLoop::build),
    ] {
        define(
            lib,
            Action::native(
                name,
                vec![Param::literal("vars"), Param::normal("data"), Param::normal("body")],
                Native::Stateful(build),
            ),
        );
    }
    define(
        lib,
        Action::native(
            "for-skip",
            vec![
                Param::literal("word"),
                Param::normal("series"),
                Param::normal("skip"),
                Param::normal("body"),
            ],
            Native::Stateful(ForSkipLoop::build),
        ),
    );
    define(
        lib,
        Action::native(
            "while",
            vec![Param::normal("condition"), Param::normal("body")],
            Native::Stateful(WhileLoop::build),
        ),
    );
    define(
        lib,
        Action::native("until", vec![Param::normal("body")], Native::Stateful(UntilLoop::build)),
    );
    define(
        lib,
        Action::native("cycle", vec![Param::normal("body")], Native::Stateful(CycleLoop::build)),
    );
}

/// Per-activation loop bookkeeping shared by every loop executor.
#[derive(Debug)]
pub struct LoopFrame {
    pub body: Block,
    pub scope: Env,
    pub coupling: Coupling,
    pub passes: Passes,
}

impl LoopFrame {
    /// Mark the level as a catcher and introduce its definitional natives.
    pub fn enter(vm: &mut Vm, id: LevelId, body: Block, with_stop: bool) -> Self {
        let coupling = vm.coupling_of(id);
        vm.set_flags(id, LevelFlags::CATCHES);
        let parent = body.binding.clone().unwrap_or_else(|| vm.env_of(id));
        let scope = Scope::extend(&parent);
        add_definitional_break_continue(&scope, coupling, with_stop);
        LoopFrame {
            body,
            scope,
            coupling,
            passes: Passes::default(),
        }
    }

    /// Run one pass of the body.
    pub fn run_body(&self, vm: &mut Vm) -> Bounce {
        Bounce::Continue(spawn_block(vm, &self.body, &self.scope))
    }

    pub fn bind(&self, word: &Symbol, value: Value) {
        self.scope.bind(word.clone(), value);
    }

    pub fn read(&self, word: &Symbol) -> Value {
        self.scope.lookup(word).unwrap_or(Value::Null)
    }

    pub fn outcome(&self, event: Event) -> PassOutcome {
        pass_outcome(event, self.coupling)
    }
}

/// How a pass of a loop body ended, from the loop's point of view.
#[derive(Debug)]
pub enum PassOutcome {
    /// Finished normally or by this loop's CONTINUE; carries the pass value.
    Completed(Value),
    Break,
    Stop(Value),
    /// Not aimed at this loop; re-emit unchanged.
    Foreign(Unwind),
}

/// Classify the event a loop is resumed with after running its body.
pub fn pass_outcome(event: Event, coupling: Coupling) -> PassOutcome {
    match event {
        Event::Resumed(value) => PassOutcome::Completed(value),
        Event::Thrown(unwind) if unwind.target() == Some(coupling) => match unwind {
            Unwind::Break(_) => PassOutcome::Break,
            Unwind::Continue(_, value) => PassOutcome::Completed(value.unwrap_or(Value::Void)),
            Unwind::Stop(_, value) => PassOutcome::Stop(value),
            other => PassOutcome::Foreign(other),
        },
        Event::Thrown(unwind) => PassOutcome::Foreign(unwind),
        Event::Start => PassOutcome::Foreign(Unwind::Error(EvalError::internal(
            "loop restarted while a pass was running",
        ))),
    }
}

/// Pass counter plus the value of the most recent pass.
#[derive(Debug, Default)]
pub struct Passes {
    pub count: u64,
    last: Option<Value>,
}

impl Passes {
    pub fn record(&mut self, value: Value) {
        self.count += 1;
        self.last = Some(value);
    }

    pub fn ran(&self) -> bool {
        self.count > 0
    }

    /// Loop result after exhaustion.
    pub fn finish(&mut self) -> Value {
        match self.last.take() {
            Some(value) => value.heavy(),
            None => Value::Void,
        }
    }
}

/// Result bounce for a pass that did not simply complete.
pub fn exit_bounce(outcome: PassOutcome) -> Bounce {
    match outcome {
        PassOutcome::Break => Bounce::Done(Value::Null),
        PassOutcome::Stop(value) => Bounce::Done(value),
        PassOutcome::Foreign(unwind) => Bounce::Thrown(unwind),
        PassOutcome::Completed(value) => Bounce::Done(value),
    }
}

/// The words a `vars` argument names: one word or a block of words.
pub fn loop_words(args: &Args) -> Result<Vec<Symbol>, EvalError> {
    match args.get("vars") {
        Value::Word(s) | Value::LitWord(s) => Ok(vec![s]),
        Value::Block(block) => {
            let items = block.series.to_vec();
            if items.is_empty() {
                return Err(args.mismatch("vars", "at least one word", &Value::Block(block)));
            }
            items
                .into_iter()
                .map(|item| match item {
                    Value::Word(s) | Value::LitWord(s) => Ok(s),
                    other => Err(args.mismatch("vars", "word", &other)),
                })
                .collect()
        }
        other => Err(args.mismatch("vars", "word or block", &other)),
    }
}

pub(crate) fn state_error(name: &str, state: impl std::fmt::Debug) -> Bounce {
    Bounce::error(EvalError::internal(format!(
        "{} re-entered in state {:?}",
        name, state
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pass_outcome_matches_only_own_coupling() {
        let mine = Coupling::fresh();
        let other = Coupling::fresh();
        assert!(matches!(
            pass_outcome(Event::Thrown(Unwind::Break(mine)), mine),
            PassOutcome::Break
        ));
        assert!(matches!(
            pass_outcome(Event::Thrown(Unwind::Break(other)), mine),
            PassOutcome::Foreign(Unwind::Break(c)) if c == other
        ));
        assert!(matches!(
            pass_outcome(Event::Thrown(Unwind::Continue(mine, None)), mine),
            PassOutcome::Completed(Value::Void)
        ));
        assert!(matches!(
            pass_outcome(Event::Thrown(Unwind::Return(mine, Value::Integer(1))), mine),
            PassOutcome::Foreign(Unwind::Return(..))
        ));
    }

    #[test]
    fn test_passes_finish() {
        let mut passes = Passes::default();
        assert!(passes.finish().is_void());
        passes.record(Value::Null);
        assert!(!passes.finish().is_null());
        passes.record(Value::Integer(3));
        assert_eq!(passes.finish().as_int(), Some(3));
    }
}
