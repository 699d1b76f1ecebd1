//! Step results a level's executor hands back to the trampoline.

use crate::error::EvalError;
use crate::ids::{Coupling, LevelId};
use crate::level::Level;
use crate::value::Value;

/// Reason an unwind is in progress.
#[derive(Debug, Clone)]
pub enum Unwind {
    Break(Coupling),
    /// `None` means CONTINUE was given no value.
    Continue(Coupling, Option<Value>),
    Stop(Coupling, Value),
    Return(Coupling, Value),
    Throw { name: Option<Value>, value: Value },
    Error(EvalError),
}

impl Unwind {
    /// The activation this unwind is aimed at, for definitional signals.
    pub fn target(&self) -> Option<Coupling> {
        match self {
            Unwind::Break(c) | Unwind::Continue(c, _) | Unwind::Stop(c, _) | Unwind::Return(c, _) => {
                Some(*c)
            }
            Unwind::Throw { .. } | Unwind::Error(_) => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Unwind::Error(_))
    }

    pub fn signal_name(&self) -> &'static str {
        match self {
            Unwind::Break(_) => "break",
            Unwind::Continue(..) => "continue",
            Unwind::Stop(..) => "stop",
            Unwind::Return(..) => "return",
            Unwind::Throw { .. } => "throw",
            Unwind::Error(_) => "error",
        }
    }

    /// Convert an unwind that escaped every catcher into the error reported
    /// to the host.
    pub fn into_escape_error(self) -> EvalError {
        match self {
            Unwind::Error(e) => e,
            Unwind::Throw { name: Some(name), .. } => {
                EvalError::no_matching_target(format!("throw/name {}", name))
            }
            other => EvalError::no_matching_target(other.signal_name()),
        }
    }
}

#[derive(Debug)]
pub enum Bounce {
    /// The level is finished with this value.
    Done(Value),
    /// Begin unwinding from this level.
    Thrown(Unwind),
    /// Run the spawned sub-level, then re-enter this executor.
    Continue(LevelId),
    /// Replace this level's executor; its result becomes this level's result.
    Delegate(Level),
}

impl Bounce {
    pub fn error(err: EvalError) -> Self {
        Bounce::Thrown(Unwind::Error(err))
    }

    pub fn from_result(result: Result<Value, EvalError>) -> Self {
        match result {
            Ok(value) => Bounce::Done(value),
            Err(e) => Bounce::error(e),
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Bounce::Done(_))
    }

    pub fn is_thrown(&self) -> bool {
        matches!(self, Bounce::Thrown(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Bounce::Done(_) => "Done",
            Bounce::Thrown(_) => "Thrown",
            Bounce::Continue(_) => "Continue",
            Bounce::Delegate(_) => "Delegate",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unwind_target() {
        let c = Coupling::fresh();
        assert_eq!(Unwind::Break(c).target(), Some(c));
        assert_eq!(Unwind::Continue(c, None).target(), Some(c));
        assert!(Unwind::Throw { name: None, value: Value::Null }.target().is_none());
        assert!(Unwind::Error(EvalError::DivideByZero).target().is_none());
    }

    #[test]
    fn test_escape_error_for_control_signal() {
        let err = Unwind::Break(Coupling::fresh()).into_escape_error();
        assert!(err.is_no_matching_target());
        let err = Unwind::Error(EvalError::DivideByZero).into_escape_error();
        assert!(matches!(err, EvalError::DivideByZero));
    }

    #[test]
    fn test_bounce_checks() {
        assert!(Bounce::Done(Value::Integer(1)).is_done());
        let thrown = Bounce::error(EvalError::internal("x"));
        assert!(thrown.is_thrown());
        assert_eq!(thrown.kind(), "Thrown");
    }
}
