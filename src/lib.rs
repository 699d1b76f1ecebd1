//! rebound: a stackless trampoline evaluator for a Rebol-family language.
//!
//! # Architecture
//!
//! - **Levels in an arena**: every suspendable activation is a [`Level`]
//!   holding an [`Executor`] state machine, addressed by generational
//!   [`LevelId`]s.
//! - **One trampoline loop**: executors return a [`Bounce`] and never call
//!   into the evaluator recursively, so nesting depth costs heap, not stack.
//! - **Labeled unwinds**: BREAK, CONTINUE, STOP and RETURN carry the
//!   [`Coupling`] of the activation that bound them; only that level
//!   intercepts them.
//! - **Packs**: multi-value results consumed positionally by SET-BLOCK.

pub mod action;
pub mod arena;
pub mod binding;
pub mod bounce;
pub mod config;
pub mod error;
pub mod eval;
pub mod executor;
pub mod feed;
pub mod ids;
pub mod level;
pub mod load;
pub mod natives;
pub mod value;
mod vm;
mod vm_debug;

// Re-exports for convenience
pub use action::{Action, ActionBody, Args, ControlKind, Native, Param, ParamClass};
pub use arena::LevelArena;
pub use binding::{Env, Scope};
pub use bounce::{Bounce, Unwind};
pub use config::{load_config, Config, DebugConfig, DebugLevel, EvalConfig};
pub use error::EvalError;
pub use executor::Executor;
pub use ids::{Coupling, LevelId};
pub use level::{Event, Level, LevelFlags};
pub use load::load;
pub use value::{Block, Series, Symbol, Value};
pub use vm::Vm;
