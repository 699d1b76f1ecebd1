//! Error types for the evaluator.

use thiserror::Error;

use crate::value::Symbol;

#[derive(Debug, Clone, Error)]
pub enum EvalError {
    /// A BREAK/CONTINUE/STOP/RETURN/THROW reached the top of the stack, or was
    /// invoked after the activation it was coupled to had finished.
    #[error("no matching control target for {signal}")]
    NoMatchingTarget { signal: String },

    #[error("{word} has no value")]
    Unbound { word: Symbol },

    #[error("{word} is not an action")]
    NotAnAction { word: Symbol },

    #[error("{context} expected {expected}, got {actual}")]
    TypeMismatch {
        context: String,
        expected: String,
        actual: String,
    },

    #[error("{action} is missing its {param} argument")]
    ArgumentMissing { action: Symbol, param: Symbol },

    #[error("{action} has no refinement /{refinement}")]
    BadRefinement { action: Symbol, refinement: Symbol },

    #[error("loop variable {word} changed to incompatible {actual}")]
    LoopVariableChanged { word: Symbol, actual: String },

    #[error("series is held and cannot be modified")]
    SeriesHeld,

    #[error("pack has {available} value(s) but target {target} requires one")]
    PackTooShort { available: usize, target: Symbol },

    #[error("invalid multi-return target: {target}")]
    BadTarget { target: String },

    #[error("step limit of {limit} exceeded")]
    StepLimit { limit: u64 },

    #[error("level depth limit of {limit} exceeded")]
    DepthLimit { limit: usize },

    #[error("attempt to divide by zero")]
    DivideByZero,

    #[error("integer overflow in {op}")]
    Overflow { op: &'static str },

    #[error("{message}")]
    User { message: String },

    #[error("syntax error at offset {offset}: {message}")]
    Syntax { offset: usize, message: String },

    #[error("configuration error: {message}")]
    Config { message: String },

    #[error("internal error: {message}")]
    Internal { message: String },
}

impl EvalError {
    pub fn no_matching_target(signal: impl Into<String>) -> Self {
        EvalError::NoMatchingTarget {
            signal: signal.into(),
        }
    }

    pub fn type_mismatch(
        context: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        EvalError::TypeMismatch {
            context: context.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub fn user(message: impl Into<String>) -> Self {
        EvalError::User {
            message: message.into(),
        }
    }

    pub fn syntax(offset: usize, message: impl Into<String>) -> Self {
        EvalError::Syntax {
            offset,
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        EvalError::Config {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        EvalError::Internal {
            message: message.into(),
        }
    }

    pub fn is_no_matching_target(&self) -> bool {
        matches!(self, EvalError::NoMatchingTarget { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = EvalError::no_matching_target("break");
        assert_eq!(err.to_string(), "no matching control target for break");
        assert!(err.is_no_matching_target());

        let err = EvalError::type_mismatch("repeat", "integer", "text");
        assert!(err.to_string().contains("expected integer, got text"));
    }
}
