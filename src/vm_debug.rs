//! Step tracing for the trampoline.
//!
//! Gated by `DebugConfig`; output goes through the `log` facade under the
//! `rebound::step` target so `RUST_LOG=rebound::step=trace` isolates it.

use crate::bounce::{Bounce, Unwind};
use crate::config::DebugLevel;
use crate::ids::LevelId;
use crate::level::Event;
use crate::value::Value;
use crate::vm::Vm;

const MAX_REPR_LEN: usize = 80;

fn truncate_repr(mut text: String) -> String {
    if text.len() > MAX_REPR_LEN {
        let mut cut = MAX_REPR_LEN;
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        text.truncate(cut);
        text.push_str("...");
    }
    text
}

fn value_repr(value: &Value) -> String {
    truncate_repr(value.to_string())
}

fn unwind_repr(unwind: &Unwind) -> String {
    match unwind {
        Unwind::Break(c) => format!("break{}", c),
        Unwind::Continue(c, None) => format!("continue{}", c),
        Unwind::Continue(c, Some(v)) => format!("continue{} with {}", c, value_repr(v)),
        Unwind::Stop(c, v) => format!("stop{} with {}", c, value_repr(v)),
        Unwind::Return(c, v) => format!("return{} {}", c, value_repr(v)),
        Unwind::Throw { name: Some(n), value } => format!("throw/name {} {}", n, value_repr(value)),
        Unwind::Throw { name: None, value } => format!("throw {}", value_repr(value)),
        Unwind::Error(e) => format!("error: {}", e),
    }
}

impl Vm {
    pub(crate) fn debug_step_entry(&self, id: LevelId, event: &Event) {
        let event_kind = match event {
            Event::Start => "Start".to_string(),
            Event::Resumed(v) => format!("Resumed({})", value_repr(v)),
            Event::Thrown(u) => format!("Thrown({})", unwind_repr(u)),
        };
        let (name, state) = self
            .level(id)
            .map(|l| (l.executor_name(), l.executor_state()))
            .unwrap_or(("<freed>", ""));

        log::debug!(
            target: "rebound::step",
            "[step {}] {} {}:{} event={} depth={}",
            self.step_counter,
            id,
            name,
            state,
            event_kind,
            self.depth()
        );

        if self.config.debug.level == DebugLevel::Trace && self.config.debug.show_levels {
            self.debug_dump_levels();
        }
    }

    pub(crate) fn debug_step_exit(&self, id: LevelId, bounce: &Bounce) {
        let detail = match bounce {
            Bounce::Done(v) => format!("Done({})", value_repr(v)),
            Bounce::Thrown(u) => format!("Thrown({})", unwind_repr(u)),
            Bounce::Continue(sub) => format!("Continue({})", sub),
            Bounce::Delegate(level) => format!("Delegate({})", level.executor_name()),
        };
        if self.config.debug.level == DebugLevel::Trace || bounce.is_thrown() {
            log::debug!(target: "rebound::step", "[step {}] {} -> {}", self.step_counter, id, detail);
        }
    }

    /// Log the level stack, innermost first.
    pub fn debug_dump_levels(&self) {
        for (i, id) in self.stack().into_iter().enumerate() {
            if let Some(level) = self.level(id) {
                log::trace!(
                    target: "rebound::step",
                    "  level[{}]: {} {}:{} coupling={} flags={:?}",
                    i,
                    id,
                    level.executor_name(),
                    level.executor_state(),
                    level.coupling,
                    level.flags
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_repr_is_char_safe() {
        let long = "é".repeat(100);
        let cut = truncate_repr(long);
        assert!(cut.ends_with("..."));
        assert!(cut.len() <= MAX_REPR_LEN + 3);
    }

    #[test]
    fn test_unwind_repr() {
        let c = crate::ids::Coupling::fresh();
        let text = unwind_repr(&Unwind::Continue(c, Some(Value::Integer(99))));
        assert!(text.starts_with("continue#"));
        assert!(text.ends_with("with 99"));
    }
}
