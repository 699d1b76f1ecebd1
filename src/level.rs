//! Levels: the resumable activation records the trampoline drives.

use std::fmt;

use bitflags::bitflags;

use crate::binding::Env;
use crate::bounce::Unwind;
use crate::executor::Executor;
use crate::ids::{Coupling, LevelId};
use crate::value::Value;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct LevelFlags: u8 {
        /// Do not free on completion; the owner inspects `out` and drops it.
        const KEEPALIVE = 1 << 0;
        /// Receive non-error unwinds passing through this level.
        const CATCHES = 1 << 1;
        /// Receive error unwinds passing through this level.
        const TRAPS = 1 << 2;
        /// Executor returned `Done`; only meaningful for kept-alive levels.
        const FINISHED = 1 << 3;
    }
}

/// What the trampoline is re-entering an executor with.
#[derive(Debug)]
pub enum Event {
    /// First entry after push or delegation.
    Start,
    /// The sub-level this executor continued with finished.
    Resumed(Value),
    /// An unwind reached this level (only if it CATCHES or TRAPS).
    Thrown(Unwind),
}

pub struct Level {
    pub(crate) executor: Option<Box<dyn Executor>>,
    pub coupling: Coupling,
    pub flags: LevelFlags,
    pub prior: Option<LevelId>,
    pub env: Env,
    pub out: Value,
    pub spare: Value,
    pub scratch: Value,
}

impl Level {
    pub fn new(executor: Box<dyn Executor>, env: Env) -> Self {
        Level {
            executor: Some(executor),
            coupling: Coupling::fresh(),
            flags: LevelFlags::empty(),
            prior: None,
            env,
            out: Value::Void,
            spare: Value::Void,
            scratch: Value::Void,
        }
    }

    pub fn with_flags(mut self, flags: LevelFlags) -> Self {
        self.flags |= flags;
        self
    }

    pub fn is_keepalive(&self) -> bool {
        self.flags.contains(LevelFlags::KEEPALIVE)
    }

    pub fn is_finished(&self) -> bool {
        self.flags.contains(LevelFlags::FINISHED)
    }

    /// Whether an unwind stops here rather than passing through.
    pub fn intercepts(&self, unwind: &Unwind) -> bool {
        if unwind.is_error() {
            self.flags.contains(LevelFlags::TRAPS)
        } else {
            self.flags.contains(LevelFlags::CATCHES)
        }
    }

    pub fn executor_name(&self) -> &'static str {
        self.executor.as_ref().map(|e| e.name()).unwrap_or("<running>")
    }

    pub fn executor_state(&self) -> &'static str {
        self.executor.as_ref().map(|e| e.state()).unwrap_or("")
    }

    /// Install a new executor in place: fresh activation, same slot and prior.
    pub(crate) fn replace_with(&mut self, other: Level) {
        let keep = self.flags & LevelFlags::KEEPALIVE;
        self.executor = other.executor;
        self.coupling = Coupling::fresh();
        self.flags = (other.flags - LevelFlags::FINISHED) | keep;
        self.env = other.env;
        self.out = Value::Void;
        self.spare = Value::Void;
        self.scratch = Value::Void;
    }
}

impl fmt::Debug for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Level")
            .field("executor", &self.executor_name())
            .field("state", &self.executor_state())
            .field("coupling", &self.coupling)
            .field("flags", &self.flags)
            .field("prior", &self.prior)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::Scope;
    use crate::bounce::Bounce;
    use crate::error::EvalError;
    use crate::vm::Vm;

    #[derive(Debug)]
    struct Idle(&'static str);

    impl Executor for Idle {
        fn step(&mut self, _vm: &mut Vm, _id: LevelId, _event: Event) -> Bounce {
            Bounce::Done(Value::Void)
        }

        fn name(&self) -> &'static str {
            self.0
        }
    }

    #[test]
    fn test_intercepts_by_flag() {
        let env = Scope::root();
        let catcher = Level::new(Box::new(Idle("a")), env.clone()).with_flags(LevelFlags::CATCHES);
        let c = Coupling::fresh();
        assert!(catcher.intercepts(&Unwind::Break(c)));
        assert!(!catcher.intercepts(&Unwind::Error(EvalError::DivideByZero)));

        let trap = Level::new(Box::new(Idle("b")), env).with_flags(LevelFlags::TRAPS);
        assert!(trap.intercepts(&Unwind::Error(EvalError::DivideByZero)));
        assert!(!trap.intercepts(&Unwind::Break(c)));
    }

    #[test]
    fn test_replace_with_mints_fresh_coupling_and_keeps_keepalive() {
        let env = Scope::root();
        let mut level =
            Level::new(Box::new(Idle("old")), env.clone()).with_flags(LevelFlags::KEEPALIVE);
        let before = level.coupling;
        level.replace_with(Level::new(Box::new(Idle("new")), env).with_flags(LevelFlags::CATCHES));

        assert_ne!(level.coupling, before);
        assert!(level.is_keepalive());
        assert!(level.flags.contains(LevelFlags::CATCHES));
        assert_eq!(level.executor_name(), "new");
    }
}
