use crate::action::Args;
use crate::binding::Env;
use crate::bounce::Bounce;
use crate::error::EvalError;
use crate::executor::Executor;
use crate::ids::LevelId;
use crate::level::Event;
use crate::value::Block;
use crate::vm::Vm;

use super::{exit_bounce, state_error, LoopFrame, PassOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CycleState {
    Initial,
    RunningBody,
}

/// `cycle body`: runs forever. Exits only through BREAK (null) or STOP,
/// which is bound for this loop alone and supplies the result.
#[derive(Debug)]
pub struct CycleLoop {
    body: Option<Block>,
    frame: Option<LoopFrame>,
    state: CycleState,
}

impl CycleLoop {
    pub(crate) fn build(_env: &Env, args: Args) -> Result<Box<dyn Executor>, EvalError> {
        Ok(Box::new(CycleLoop {
            body: Some(args.block("body")?),
            frame: None,
            state: CycleState::Initial,
        }))
    }
}

impl Executor for CycleLoop {
    fn step(&mut self, vm: &mut Vm, id: LevelId, event: Event) -> Bounce {
        match (self.state, event) {
            (CycleState::Initial, Event::Start) => {
                let Some(body) = self.body.take() else {
                    return state_error("cycle", self.state);
                };
                let frame = LoopFrame::enter(vm, id, body, true);
                let bounce = frame.run_body(vm);
                self.frame = Some(frame);
                self.state = CycleState::RunningBody;
                bounce
            }
            (CycleState::RunningBody, event) => {
                let Some(frame) = self.frame.as_mut() else {
                    return state_error("cycle", self.state);
                };
                match frame.outcome(event) {
                    PassOutcome::Completed(value) => {
                        frame.passes.record(value);
                        frame.run_body(vm)
                    }
                    other => exit_bounce(other),
                }
            }
            (state, _) => state_error("cycle", state),
        }
    }

    fn name(&self) -> &'static str {
        "cycle"
    }

    fn state(&self) -> &'static str {
        match self.state {
            CycleState::Initial => "initial",
            CycleState::RunningBody => "running-body",
        }
    }
}
