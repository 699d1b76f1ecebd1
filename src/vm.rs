//! Core VM struct and the trampoline.

use crate::arena::LevelArena;
use crate::binding::{Env, Scope};
use crate::bounce::{Bounce, Unwind};
use crate::config::{Config, DebugConfig};
use crate::error::EvalError;
use crate::eval::BlockExecutor;
use crate::ids::{Coupling, LevelId};
use crate::level::{Event, Level, LevelFlags};
use crate::load;
use crate::natives;
use crate::value::{Block, Value};

pub struct Vm {
    pub levels: LevelArena,
    pub lib: Env,
    pub user: Env,
    pub config: Config,
    pub step_counter: u64,
    /// Level currently being stepped, or the innermost waiting one.
    top: Option<LevelId>,
    /// Number of levels on the stack (kept-alive finished levels excluded).
    depth: usize,
    output: Vec<String>,
    echo: bool,
}

impl Vm {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        let lib = Scope::root();
        let user = Scope::user(&lib);
        let vm = Vm {
            levels: LevelArena::new(),
            lib,
            user,
            config,
            step_counter: 0,
            top: None,
            depth: 0,
            output: Vec::new(),
            echo: false,
        };
        natives::boot(&vm.lib);
        vm
    }

    pub fn set_debug(&mut self, debug: DebugConfig) {
        self.config.debug = debug;
    }

    /// Also write `print` output to stdout.
    pub fn set_echo(&mut self, echo: bool) {
        self.echo = echo;
    }

    pub fn emit(&mut self, line: String) {
        if self.echo {
            println!("{}", line);
        }
        self.output.push(line);
    }

    pub fn output(&self) -> &[String] {
        &self.output
    }

    pub fn take_output(&mut self) -> Vec<String> {
        std::mem::take(&mut self.output)
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn top(&self) -> Option<LevelId> {
        self.top
    }

    pub fn level(&self, id: LevelId) -> Option<&Level> {
        self.levels.get(id)
    }

    pub fn level_mut(&mut self, id: LevelId) -> Option<&mut Level> {
        self.levels.get_mut(id)
    }

    /// Coupling of a level, or a fresh one nothing will ever match.
    pub fn coupling_of(&self, id: LevelId) -> Coupling {
        self.levels
            .get(id)
            .map(|l| l.coupling)
            .unwrap_or_else(Coupling::fresh)
    }

    pub fn env_of(&self, id: LevelId) -> Env {
        self.levels
            .get(id)
            .map(|l| l.env.clone())
            .unwrap_or_else(|| self.user.clone())
    }

    pub fn set_flags(&mut self, id: LevelId, flags: LevelFlags) {
        if let Some(level) = self.levels.get_mut(id) {
            level.flags |= flags;
        }
    }

    /// Allocate a sub-level; it runs once returned in `Bounce::Continue`.
    pub fn spawn(&mut self, level: Level) -> LevelId {
        self.levels.alloc(level)
    }

    /// Reuse a finished kept-alive level for a new activation, or spawn a
    /// fresh one if the handle no longer resolves.
    pub fn relaunch(&mut self, id: LevelId, level: Level) -> LevelId {
        match self.levels.get_mut(id) {
            Some(existing) if existing.is_finished() => {
                existing.replace_with(level);
                id
            }
            _ => self.spawn(level),
        }
    }

    /// Release a kept-alive level. Stale handles are ignored.
    pub fn drop_level(&mut self, id: LevelId) {
        if self.levels.get(id).map(Level::is_finished).unwrap_or(false) {
            self.levels.free(id);
        }
    }

    /// Whether a level with this coupling is on the current stack.
    pub fn is_coupling_live(&self, coupling: Coupling) -> bool {
        self.stack().iter().any(|id| {
            self.levels
                .get(*id)
                .map(|l| l.coupling == coupling)
                .unwrap_or(false)
        })
    }

    /// Level handles from the innermost outwards.
    pub fn stack(&self) -> Vec<LevelId> {
        let mut ids = Vec::new();
        let mut cursor = self.top;
        while let Some(id) = cursor {
            ids.push(id);
            cursor = self.levels.get(id).and_then(|l| l.prior);
        }
        ids
    }

    /// Load `source`, bind it to the user scope and evaluate it.
    pub fn eval_str(&mut self, source: &str) -> Result<Value, EvalError> {
        let block = load::load(source)?;
        self.eval_block(block)
    }

    pub fn eval_block(&mut self, block: Block) -> Result<Value, EvalError> {
        let env = block.binding.clone().unwrap_or_else(|| self.user.clone());
        let root = Level::new(Box::new(BlockExecutor::new(&block, &env)), env);
        self.run(root)
    }

    /// Drive `root` and everything it spawns to completion.
    pub fn run(&mut self, root: Level) -> Result<Value, EvalError> {
        let saved_top = self.top;
        let saved_depth = self.depth;
        let base = self.levels.alloc(root);
        if let Some(level) = self.levels.get_mut(base) {
            level.prior = saved_top;
        }
        self.top = Some(base);
        self.depth += 1;
        log::debug!("run: base={} depth={}", base, self.depth);

        let result = self.drive(base);

        self.top = saved_top;
        self.depth = saved_depth;
        match &result {
            Ok(value) => log::debug!("run: {} -> {}", base, value),
            Err(e) => log::debug!("run: {} -> error: {}", base, e),
        }
        result
    }

    fn drive(&mut self, base: LevelId) -> Result<Value, EvalError> {
        let mut current = base;
        let mut event = Event::Start;
        let mut steps: u64 = 0;
        // Set once the step limit has been raised; the catcher then gets a
        // fresh budget, and running out of that one ends the run outright.
        let mut limit_raised = false;

        loop {
            steps += 1;
            self.step_counter += 1;
            self.top = Some(current);

            if self.config.debug.is_enabled() {
                self.debug_step_entry(current, &event);
            }

            if let Some(limit) = self.config.eval.max_steps {
                if steps > limit {
                    if limit_raised {
                        self.abandon(current, base);
                        return Err(EvalError::StepLimit { limit });
                    }
                    limit_raised = true;
                    steps = 0;
                    let unwind = Unwind::Error(EvalError::StepLimit { limit });
                    let (catcher, unwind) = self.unwind_from(current, base, unwind, true)?;
                    current = catcher;
                    event = Event::Thrown(unwind);
                    continue;
                }
            }

            let bounce = self.step_level(current, event);

            if self.config.debug.is_enabled() {
                self.debug_step_exit(current, &bounce);
            }

            match bounce {
                Bounce::Done(value) => {
                    let prior = self.complete_level(current, &value);
                    if current == base {
                        return Ok(value);
                    }
                    match prior {
                        Some(p) => {
                            current = p;
                            event = Event::Resumed(value);
                        }
                        None => return Err(EvalError::internal("completed level has no prior")),
                    }
                }
                Bounce::Continue(sub) => {
                    if self.depth >= self.config.eval.max_depth {
                        self.levels.free(sub);
                        let limit = self.config.eval.max_depth;
                        let unwind = Unwind::Error(EvalError::DepthLimit { limit });
                        let (catcher, unwind) = self.unwind_from(current, base, unwind, true)?;
                        current = catcher;
                        event = Event::Thrown(unwind);
                        continue;
                    }
                    match self.levels.get_mut(sub) {
                        Some(level) => {
                            level.prior = Some(current);
                            level.flags.remove(LevelFlags::FINISHED);
                        }
                        None => {
                            let unwind = Unwind::Error(EvalError::internal(format!(
                                "continue with stale level {}",
                                sub
                            )));
                            let (catcher, unwind) = self.unwind_from(current, base, unwind, true)?;
                            current = catcher;
                            event = Event::Thrown(unwind);
                            continue;
                        }
                    }
                    self.depth += 1;
                    current = sub;
                    event = Event::Start;
                }
                Bounce::Delegate(level) => {
                    if let Some(slot) = self.levels.get_mut(current) {
                        slot.replace_with(level);
                    }
                    event = Event::Start;
                }
                Bounce::Thrown(unwind) => {
                    let (catcher, unwind) = self.unwind_from(current, base, unwind, false)?;
                    current = catcher;
                    event = Event::Thrown(unwind);
                }
            }
        }
    }

    fn step_level(&mut self, id: LevelId, event: Event) -> Bounce {
        let mut executor = match self.levels.get_mut(id).and_then(|l| l.executor.take()) {
            Some(executor) => executor,
            None => return Bounce::error(EvalError::internal(format!("level {} has no executor", id))),
        };
        let bounce = executor.step(self, id, event);
        if let Some(level) = self.levels.get_mut(id) {
            if level.executor.is_none() {
                level.executor = Some(executor);
            }
        }
        bounce
    }

    /// Pop a level that finished normally, returning the level to resume.
    fn complete_level(&mut self, id: LevelId, value: &Value) -> Option<LevelId> {
        self.depth = self.depth.saturating_sub(1);
        let level = self.levels.get_mut(id)?;
        let prior = level.prior;
        if level.is_keepalive() {
            level.out = value.clone();
            level.flags |= LevelFlags::FINISHED;
        } else {
            self.levels.free(id);
        }
        prior
    }

    /// Discard levels from `thrower` outwards until one intercepts `unwind`.
    ///
    /// Returns the intercepting level, or the escape error once `base` has
    /// been discarded.
    fn unwind_from(
        &mut self,
        thrower: LevelId,
        base: LevelId,
        unwind: Unwind,
        abort_thrower: bool,
    ) -> Result<(LevelId, Unwind), EvalError> {
        let mut id = thrower;
        let mut abort = abort_thrower;
        loop {
            let prior = self.levels.get(id).and_then(|l| l.prior);
            if abort {
                self.abort_level(id);
            }
            self.levels.free(id);
            self.depth = self.depth.saturating_sub(1);
            log::trace!("unwind: discarded {} ({})", id, unwind.signal_name());

            if id == base {
                return Err(unwind.into_escape_error());
            }
            let Some(next) = prior else {
                return Err(unwind.into_escape_error());
            };
            let intercepts = self
                .levels
                .get(next)
                .map(|l| l.intercepts(&unwind))
                .unwrap_or(false);
            if intercepts {
                self.top = Some(next);
                return Ok((next, unwind));
            }
            id = next;
            abort = true;
        }
    }

    /// Discard every level from `from` down to and including `base`,
    /// without offering the unwind to any of them.
    fn abandon(&mut self, from: LevelId, base: LevelId) {
        let mut cursor = Some(from);
        while let Some(id) = cursor {
            cursor = if id == base {
                None
            } else {
                self.levels.get(id).and_then(|l| l.prior)
            };
            self.abort_level(id);
            self.levels.free(id);
            self.depth = self.depth.saturating_sub(1);
        }
        log::debug!("run: abandoned {} after a second step limit", base);
    }

    fn abort_level(&mut self, id: LevelId) {
        let executor = self.levels.get_mut(id).and_then(|l| l.executor.take());
        if let Some(mut executor) = executor {
            executor.abort(self, id);
        }
    }
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::Constant;

    #[test]
    fn test_empty_source_is_void() {
        let mut vm = Vm::new();
        assert!(vm.eval_str("").unwrap().is_void());
        assert!(vm.eval_str("  ; only a comment").unwrap().is_void());
    }

    #[test]
    fn test_run_leaves_no_levels_behind() {
        let mut vm = Vm::new();
        vm.eval_str("x: 0 repeat 5 [x: x + 1]").unwrap();
        assert_eq!(vm.levels.len(), 0);
        assert_eq!(vm.depth(), 0);
        assert!(vm.top().is_none());
    }

    #[test]
    fn test_error_leaves_no_levels_behind() {
        let mut vm = Vm::new();
        assert!(vm.eval_str("repeat 3 [1 / 0]").is_err());
        assert_eq!(vm.levels.len(), 0);
        assert_eq!(vm.depth(), 0);
    }

    #[test]
    fn test_constant_root() {
        let mut vm = Vm::new();
        let env = vm.user.clone();
        let level = Level::new(Box::new(Constant(Value::Integer(5))), env);
        assert_eq!(vm.run(level).unwrap().as_int(), Some(5));
    }

    #[test]
    fn test_relaunch_reuses_finished_level() {
        let mut vm = Vm::new();
        let env = vm.user.clone();
        let mut level = Level::new(Box::new(Constant(Value::Null)), env.clone());
        level.flags |= LevelFlags::KEEPALIVE | LevelFlags::FINISHED;
        let id = vm.spawn(level);
        let again = vm.relaunch(id, Level::new(Box::new(Constant(Value::Null)), env.clone()));
        assert_eq!(again, id);

        vm.drop_level(id);
        assert!(vm.level(id).is_none());
        let fresh = vm.relaunch(id, Level::new(Box::new(Constant(Value::Null)), env));
        assert_ne!(fresh, id);
    }

    #[test]
    fn test_deep_groups_do_not_overflow() {
        let mut vm = Vm::new();
        let depth = 10_000;
        let source = format!("{}1{}", "(".repeat(depth), ")".repeat(depth));
        assert_eq!(vm.eval_str(&source).unwrap().as_int(), Some(1));
    }

    #[test]
    fn test_depth_limit() {
        let mut config = Config::default();
        config.eval.max_depth = 64;
        let mut vm = Vm::with_config(config);
        let source = format!("{}1{}", "(".repeat(200), ")".repeat(200));
        assert!(matches!(
            vm.eval_str(&source),
            Err(EvalError::DepthLimit { limit: 64 })
        ));
        assert_eq!(vm.depth(), 0);
    }

    #[test]
    fn test_depth_limit_is_trappable() {
        let mut config = Config::default();
        config.eval.max_depth = 64;
        let mut vm = Vm::with_config(config);
        let source = format!("error? trap [{}1{}]", "(".repeat(200), ")".repeat(200));
        assert_eq!(vm.eval_str(&source).unwrap().to_string(), "true");
    }

    #[test]
    fn test_step_limit_is_trappable() {
        let mut config = Config::default();
        config.eval.max_steps = Some(500);
        let mut vm = Vm::with_config(config);
        assert_eq!(vm.eval_str("error? trap [cycle [1]]").unwrap().to_string(), "true");
        assert_eq!(vm.levels.len(), 0);
    }

    #[test]
    fn test_step_limit_after_trap_ends_the_run() {
        let mut config = Config::default();
        config.eval.max_steps = Some(500);
        let mut vm = Vm::with_config(config);
        assert!(matches!(
            vm.eval_str("cycle [trap [cycle [1]]]"),
            Err(EvalError::StepLimit { limit: 500 })
        ));
        assert_eq!(vm.levels.len(), 0);
        assert_eq!(vm.depth(), 0);
        assert!(vm.top().is_none());
    }

    #[test]
    fn test_deep_block_result_molds() {
        let mut vm = Vm::new();
        let depth = 100_000;
        let source = format!("{}1{}", "[".repeat(depth), "]".repeat(depth));
        let value = vm.eval_str(&source).unwrap();
        let molded = value.to_string();
        assert_eq!(molded, source);
        assert!(value.equals(&vm.eval_str(&source).unwrap()));
    }

    #[test]
    fn test_stale_break_is_no_matching_target() {
        let mut vm = Vm::new();
        let err = vm.eval_str("saved: _ repeat 1 [saved: :break] saved").unwrap_err();
        assert!(err.is_no_matching_target());
        assert_eq!(vm.eval_str("n: 0 repeat 3 [n: n + 1] n").unwrap().as_int(), Some(3));
    }

    #[test]
    fn test_print_collects_output() {
        let mut vm = Vm::new();
        vm.eval_str("print \"hi\" print 1").unwrap();
        assert_eq!(vm.take_output(), vec!["hi".to_string(), "1".to_string()]);
        assert!(vm.output().is_empty());
    }
}
