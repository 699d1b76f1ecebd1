//! The dispatcher contract every level runs.

use std::fmt;

use crate::bounce::Bounce;
use crate::ids::LevelId;
use crate::level::Event;
use crate::vm::Vm;

/// A resumable state machine.
///
/// The trampoline calls `step` with `Event::Start` once, then again with
/// `Event::Resumed` each time a sub-level it continued with finishes, or
/// `Event::Thrown` when an unwind stops at this level. Implementations keep
/// their resumption point in an explicit state enum and must update it
/// before returning `Bounce::Continue`.
pub trait Executor: fmt::Debug {
    fn step(&mut self, vm: &mut Vm, id: LevelId, event: Event) -> Bounce;

    /// Short name used in traces and errors.
    fn name(&self) -> &'static str;

    /// Current resumption state, for traces.
    fn state(&self) -> &'static str {
        ""
    }

    /// Called when an unwind discards this level without stepping it.
    fn abort(&mut self, _vm: &mut Vm, _id: LevelId) {}
}
