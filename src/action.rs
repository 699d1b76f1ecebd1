//! Action values: natives, user functions and definitional control natives.

use std::fmt;

use crate::binding::Env;
use crate::error::EvalError;
use crate::executor::Executor;
use crate::ids::Coupling;
use crate::value::{Block, Symbol, Value};
use crate::vm::Vm;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamClass {
    /// Argument is the result of evaluating the next expression.
    Normal,
    /// Argument is the next value in the feed, unevaluated.
    Literal,
    /// Refinement switch, set from a path such as `continue/with`.
    Flag,
}

#[derive(Debug, Clone)]
pub struct Param {
    pub name: Symbol,
    pub class: ParamClass,
    /// Refinement this argument belongs to; it is only gathered when the
    /// refinement is used.
    pub refinement: Option<Symbol>,
}

impl Param {
    pub fn normal(name: &str) -> Self {
        Param {
            name: Symbol::new(name),
            class: ParamClass::Normal,
            refinement: None,
        }
    }

    pub fn literal(name: &str) -> Self {
        Param {
            name: Symbol::new(name),
            class: ParamClass::Literal,
            refinement: None,
        }
    }

    pub fn flag(name: &str) -> Self {
        Param {
            name: Symbol::new(name),
            class: ParamClass::Flag,
            refinement: None,
        }
    }

    pub fn under(mut self, refinement: &str) -> Self {
        self.refinement = Some(Symbol::new(refinement));
        self
    }
}

/// Which definitional control operation a coupled action performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKind {
    Break,
    Continue,
    Stop,
    Return,
}

impl ControlKind {
    pub fn name(&self) -> &'static str {
        match self {
            ControlKind::Break => "break",
            ControlKind::Continue => "continue",
            ControlKind::Stop => "stop",
            ControlKind::Return => "return",
        }
    }
}

pub type PlainFn = fn(&mut Vm, &Env, &Args) -> Result<Value, EvalError>;
pub type StatefulFn = fn(&Env, Args) -> Result<Box<dyn Executor>, EvalError>;

#[derive(Clone, Copy)]
pub enum Native {
    /// Runs to completion in the calling action's level.
    Plain(PlainFn),
    /// Builds an executor that replaces the action's level.
    Stateful(StatefulFn),
}

impl fmt::Debug for Native {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Native::Plain(_) => f.write_str("Native::Plain"),
            Native::Stateful(_) => f.write_str("Native::Stateful"),
        }
    }
}

#[derive(Debug)]
pub enum ActionBody {
    Native(Native),
    Function { body: Block },
    Definitional { kind: ControlKind, coupling: Coupling },
}

#[derive(Debug)]
pub struct Action {
    pub name: Symbol,
    pub params: Vec<Param>,
    pub infix: bool,
    pub body: ActionBody,
}

impl Action {
    pub fn native(name: &str, params: Vec<Param>, native: Native) -> Self {
        Action {
            name: Symbol::new(name),
            params,
            infix: false,
            body: ActionBody::Native(native),
        }
    }

    pub fn infix(name: &str, f: PlainFn) -> Self {
        Action {
            name: Symbol::new(name),
            params: vec![Param::normal("left"), Param::normal("right")],
            infix: true,
            body: ActionBody::Native(Native::Plain(f)),
        }
    }

    pub fn definitional(kind: ControlKind, coupling: Coupling) -> Self {
        let params = match kind {
            ControlKind::Break => vec![],
            ControlKind::Continue | ControlKind::Stop => {
                vec![Param::flag("with"), Param::normal("value").under("with")]
            }
            ControlKind::Return => vec![Param::normal("value")],
        };
        Action {
            name: Symbol::new(kind.name()),
            params,
            infix: false,
            body: ActionBody::Definitional { kind, coupling },
        }
    }

    pub fn coupling(&self) -> Option<Coupling> {
        match self.body {
            ActionBody::Definitional { coupling, .. } => Some(coupling),
            _ => None,
        }
    }
}

/// Gathered arguments, one slot per parameter.
#[derive(Debug, Clone)]
pub struct Args {
    pub action: Symbol,
    names: Vec<Symbol>,
    values: Vec<Value>,
}

impl Args {
    pub fn new(action: Symbol, params: &[Param]) -> Self {
        Args {
            action,
            names: params.iter().map(|p| p.name.clone()).collect(),
            values: vec![Value::Null; params.len()],
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn set_index(&mut self, index: usize, value: Value) {
        if let Some(slot) = self.values.get_mut(index) {
            *slot = value;
        }
    }

    pub fn get_index(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn get(&self, name: &str) -> Value {
        self.names
            .iter()
            .position(|n| n.as_str() == name)
            .and_then(|i| self.values.get(i).cloned())
            .unwrap_or(Value::Null)
    }

    pub fn flag(&self, name: &str) -> bool {
        matches!(self.get(name), Value::Logic(true))
    }

    pub fn int(&self, name: &str) -> Result<i64, EvalError> {
        match self.get(name) {
            Value::Integer(i) => Ok(i),
            other => Err(self.mismatch(name, "integer", &other)),
        }
    }

    pub fn block(&self, name: &str) -> Result<Block, EvalError> {
        match self.get(name) {
            Value::Block(b) => Ok(b),
            other => Err(self.mismatch(name, "block", &other)),
        }
    }

    pub fn word(&self, name: &str) -> Result<Symbol, EvalError> {
        match self.get(name) {
            Value::Word(s) | Value::LitWord(s) | Value::GetWord(s) | Value::SetWord(s) => Ok(s),
            other => Err(self.mismatch(name, "word", &other)),
        }
    }

    pub fn mismatch(&self, name: &str, expected: &str, actual: &Value) -> EvalError {
        EvalError::type_mismatch(
            format!("{} {}", self.action, name),
            expected,
            actual.type_name(),
        )
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_definitional_continue_params() {
        let coupling = Coupling::fresh();
        let action = Action::definitional(ControlKind::Continue, coupling);
        assert_eq!(action.params.len(), 2);
        assert_eq!(action.params[0].class, ParamClass::Flag);
        assert_eq!(action.params[1].refinement, Some(Symbol::new("with")));
        assert_eq!(action.coupling(), Some(coupling));
    }

    #[test]
    fn test_args_accessors() {
        let params = vec![Param::normal("count"), Param::normal("body"), Param::flag("only")];
        let mut args = Args::new(Symbol::new("repeat"), &params);
        args.set_index(0, Value::Integer(3));
        args.set_index(1, Value::block(vec![]));

        assert_eq!(args.int("count").unwrap(), 3);
        assert!(args.block("body").is_ok());
        assert!(!args.flag("only"));
        assert!(matches!(
            args.block("count"),
            Err(EvalError::TypeMismatch { .. })
        ));
        assert!(args.get("missing").is_null());
    }
}
