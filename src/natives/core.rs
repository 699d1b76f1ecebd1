//! Evaluation, branching, reduction and introspection natives.

use std::rc::Rc;

use crate::action::{Action, ActionBody, Args, Native, Param};
use crate::binding::Env;
use crate::bounce::Bounce;
use crate::error::EvalError;
use crate::eval::{BlockExecutor, Constant, Stepper};
use crate::executor::Executor;
use crate::feed::{Feed, FeedRef};
use crate::ids::LevelId;
use crate::level::{Event, Level};
use crate::value::{Block, Formed, Symbol, Value};
use crate::vm::Vm;

use super::define;

pub(crate) fn register(lib: &Env) {
    define(lib, Action::native("do", vec![Param::normal("source")], Native::Stateful(native_do)));
    define(
        lib,
        Action::native(
            "if",
            vec![Param::normal("condition"), Param::normal("branch")],
            Native::Stateful(native_if),
        ),
    );
    define(
        lib,
        Action::native(
            "either",
            vec![
                Param::normal("condition"),
                Param::normal("true-branch"),
                Param::normal("false-branch"),
            ],
            Native::Stateful(native_either),
        ),
    );
    define(lib, Action::native("not", vec![Param::normal("value")], Native::Plain(native_not)));
    define(
        lib,
        Action::native("reduce", vec![Param::normal("block")], Native::Stateful(native_reduce)),
    );
    define(
        lib,
        Action::native("pack", vec![Param::normal("block")], Native::Stateful(native_pack)),
    );
    define(
        lib,
        Action::native("print", vec![Param::normal("value")], Native::Stateful(native_print)),
    );
    define(lib, Action::native("quote", vec![Param::literal("value")], Native::Plain(native_quote)));
    define(lib, Action::native("null?", vec![Param::normal("value")], Native::Plain(native_is_null)));
    define(lib, Action::native("void?", vec![Param::normal("value")], Native::Plain(native_is_void)));
    define(
        lib,
        Action::native("error?", vec![Param::normal("value")], Native::Plain(native_is_error)),
    );
    define(
        lib,
        Action::native("type-of", vec![Param::normal("value")], Native::Plain(native_type_of)),
    );
    define(lib, Action::native("get", vec![Param::normal("word")], Native::Plain(native_get)));
    define(
        lib,
        Action::native(
            "set",
            vec![Param::normal("word"), Param::normal("value")],
            Native::Plain(native_set),
        ),
    );
    define(
        lib,
        Action::native(
            "func",
            vec![Param::normal("spec"), Param::normal("body")],
            Native::Plain(native_func),
        ),
    );
}

fn run_branch(branch: Value, env: &Env) -> Box<dyn Executor> {
    match branch {
        Value::Block(block) | Value::Group(block) => Box::new(BlockExecutor::new(&block, env)),
        other => Box::new(Constant(other)),
    }
}

fn native_do(env: &Env, args: Args) -> Result<Box<dyn Executor>, EvalError> {
    Ok(run_branch(args.get("source"), env))
}

fn native_if(env: &Env, args: Args) -> Result<Box<dyn Executor>, EvalError> {
    let branch = args.block("branch")?;
    if args.get("condition").is_truthy()? {
        Ok(Box::new(BlockExecutor::new(&branch, env)))
    } else {
        Ok(Box::new(Constant(Value::Null)))
    }
}

fn native_either(env: &Env, args: Args) -> Result<Box<dyn Executor>, EvalError> {
    let chosen = if args.get("condition").is_truthy()? {
        "true-branch"
    } else {
        "false-branch"
    };
    Ok(run_branch(args.get(chosen), env))
}

fn native_not(_vm: &mut Vm, _env: &Env, args: &Args) -> Result<Value, EvalError> {
    Ok(Value::Logic(!args.get("value").is_truthy()?))
}

fn native_quote(_vm: &mut Vm, _env: &Env, args: &Args) -> Result<Value, EvalError> {
    Ok(args.get("value"))
}

fn native_is_null(_vm: &mut Vm, _env: &Env, args: &Args) -> Result<Value, EvalError> {
    Ok(Value::Logic(args.get("value").is_null()))
}

fn native_is_void(_vm: &mut Vm, _env: &Env, args: &Args) -> Result<Value, EvalError> {
    Ok(Value::Logic(args.get("value").is_void()))
}

fn native_is_error(_vm: &mut Vm, _env: &Env, args: &Args) -> Result<Value, EvalError> {
    Ok(Value::Logic(matches!(args.get("value"), Value::Error(_))))
}

fn native_type_of(_vm: &mut Vm, _env: &Env, args: &Args) -> Result<Value, EvalError> {
    Ok(Value::word(args.get("value").type_name()))
}

fn native_get(_vm: &mut Vm, env: &Env, args: &Args) -> Result<Value, EvalError> {
    let word = args.word("word")?;
    env.lookup(&word).ok_or(EvalError::Unbound { word })
}

fn native_set(_vm: &mut Vm, env: &Env, args: &Args) -> Result<Value, EvalError> {
    let word = args.word("word")?;
    let value = args.get("value");
    env.assign(word, value.clone());
    Ok(value)
}

/// `func spec body`: words in the spec are evaluated parameters, lit-words
/// are taken literally, and `/name` introduces a refinement whose following
/// words are only gathered when it is used.
fn native_func(_vm: &mut Vm, env: &Env, args: &Args) -> Result<Value, EvalError> {
    let spec = args.block("spec")?;
    let body = args.block("body")?;
    let mut params = Vec::new();
    let mut refinement: Option<Symbol> = None;

    for item in spec.series.to_vec() {
        let param = match item {
            Value::Word(s) => Param::normal(s.as_str()),
            Value::LitWord(s) => Param::literal(s.as_str()),
            Value::Refinement(s) => {
                refinement = Some(s.clone());
                params.push(Param::flag(s.as_str()));
                continue;
            }
            Value::Text(_) => continue,
            other => return Err(args.mismatch("spec", "word, lit-word or refinement", &other)),
        };
        let param = match &refinement {
            Some(r) => param.under(r.as_str()),
            None => param,
        };
        params.push(param);
    }

    if let Some(duplicate) = params
        .iter()
        .enumerate()
        .find(|(i, p)| params[..*i].iter().any(|q| q.name == p.name))
        .map(|(_, p)| p.name.clone())
    {
        return Err(EvalError::type_mismatch(
            "func spec",
            "unique parameter names",
            format!("duplicate {}", duplicate),
        ));
    }

    Ok(Value::Action(Rc::new(Action {
        name: Symbol::new("function"),
        params,
        infix: false,
        body: ActionBody::Function {
            body: body.bound(env),
        },
    })))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReduceMode {
    /// New block of every non-void value.
    Block,
    /// Pack of every value, void and null included.
    Pack,
    /// Emit the formed values as one output line.
    Print,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReduceState {
    Initial,
    Evaluating,
}

/// Evaluates each expression of a block, collecting the results.
#[derive(Debug)]
pub struct ReduceExecutor {
    mode: ReduceMode,
    feed: FeedRef,
    items: Vec<Value>,
    state: ReduceState,
}

impl ReduceExecutor {
    pub fn new(mode: ReduceMode, block: &Block, env: &Env) -> Self {
        ReduceExecutor {
            mode,
            feed: Feed::new(block, env),
            items: Vec::new(),
            state: ReduceState::Initial,
        }
    }

    /// Executor that only finishes an already-evaluated value.
    fn single(mode: ReduceMode, value: Value, env: &Env) -> Self {
        let mut executor = Self::new(mode, &Block::new(Vec::new()), env);
        executor.items.push(value);
        executor
    }

    fn next(&mut self, vm: &mut Vm) -> Bounce {
        if self.feed.borrow().is_at_end() {
            return self.finish(vm);
        }
        let env = self.feed.borrow().env().clone();
        let stepper = Stepper::new(self.feed.clone(), true);
        self.state = ReduceState::Evaluating;
        Bounce::Continue(vm.spawn(Level::new(Box::new(stepper), env)))
    }

    fn finish(&mut self, vm: &mut Vm) -> Bounce {
        let items = std::mem::take(&mut self.items);
        match self.mode {
            ReduceMode::Block => Bounce::Done(Value::block(items)),
            ReduceMode::Pack => Bounce::Done(Value::pack(items)),
            ReduceMode::Print => {
                let line: Vec<String> = items.iter().map(form).collect();
                vm.emit(line.join(" "));
                Bounce::Done(Value::Void)
            }
        }
    }
}

/// Printed form: text without quotes, everything else molded.
fn form(value: &Value) -> String {
    Formed(value).to_string()
}

impl Executor for ReduceExecutor {
    fn step(&mut self, vm: &mut Vm, _id: LevelId, event: Event) -> Bounce {
        match (self.state, event) {
            (ReduceState::Initial, Event::Start) => self.next(vm),
            (ReduceState::Evaluating, Event::Resumed(value)) => {
                let value = value.decay();
                if self.mode == ReduceMode::Pack || !value.is_void() {
                    self.items.push(value);
                }
                self.next(vm)
            }
            (_, Event::Thrown(unwind)) => Bounce::Thrown(unwind),
            (state, _) => Bounce::error(EvalError::internal(format!(
                "reduce re-entered in state {:?}",
                state
            ))),
        }
    }

    fn name(&self) -> &'static str {
        match self.mode {
            ReduceMode::Block => "reduce",
            ReduceMode::Pack => "pack",
            ReduceMode::Print => "print",
        }
    }
}

fn native_reduce(env: &Env, args: Args) -> Result<Box<dyn Executor>, EvalError> {
    Ok(Box::new(ReduceExecutor::new(ReduceMode::Block, &args.block("block")?, env)))
}

fn native_pack(env: &Env, args: Args) -> Result<Box<dyn Executor>, EvalError> {
    Ok(Box::new(ReduceExecutor::new(ReduceMode::Pack, &args.block("block")?, env)))
}

fn native_print(env: &Env, args: Args) -> Result<Box<dyn Executor>, EvalError> {
    Ok(Box::new(match args.get("value") {
        Value::Block(block) => ReduceExecutor::new(ReduceMode::Print, &block, env),
        other => ReduceExecutor::single(ReduceMode::Print, other, env),
    }))
}
