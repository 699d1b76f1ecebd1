//! The native action table installed into the lib scope.

pub mod control;
mod core;
pub mod loops;
mod math;
mod series;

use std::rc::Rc;

use crate::action::Action;
use crate::binding::Env;
use crate::value::{Symbol, Value};

pub use self::core::{ReduceExecutor, ReduceMode};

/// Install constants and every native into `lib`.
pub fn boot(lib: &Env) {
    lib.bind(Symbol::new("true"), Value::Logic(true));
    lib.bind(Symbol::new("false"), Value::Logic(false));
    lib.bind(Symbol::new("null"), Value::Null);
    lib.bind(Symbol::new("void"), Value::Void);

    control::register(lib);
    loops::register(lib);
    self::core::register(lib);
    math::register(lib);
    series::register(lib);
    log::debug!("booted {} lib words", lib.len());
}

pub(crate) fn define(lib: &Env, action: Action) {
    lib.bind(action.name.clone(), Value::Action(Rc::new(action)));
}
