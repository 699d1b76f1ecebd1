//! Level arena with free list and generation-checked handles.

use crate::ids::LevelId;
use crate::level::Level;

struct Slot {
    generation: u32,
    level: Option<Level>,
}

pub struct LevelArena {
    slots: Vec<Slot>,
    free_list: Vec<usize>,
}

impl LevelArena {
    pub fn new() -> Self {
        LevelArena {
            slots: Vec::new(),
            free_list: Vec::new(),
        }
    }

    pub fn alloc(&mut self, level: Level) -> LevelId {
        if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index];
            slot.generation = slot.generation.wrapping_add(1);
            slot.level = Some(level);
            LevelId::new(index, slot.generation)
        } else {
            let index = self.slots.len();
            self.slots.push(Slot {
                generation: 0,
                level: Some(level),
            });
            LevelId::new(index, 0)
        }
    }

    /// Release a level. Stale handles are ignored and yield `None`.
    pub fn free(&mut self, id: LevelId) -> Option<Level> {
        let slot = self.slots.get_mut(id.index())?;
        if slot.generation != id.generation() {
            return None;
        }
        let level = slot.level.take()?;
        self.free_list.push(id.index());
        Some(level)
    }

    pub fn contains(&self, id: LevelId) -> bool {
        self.get(id).is_some()
    }

    pub fn get(&self, id: LevelId) -> Option<&Level> {
        self.slots
            .get(id.index())
            .filter(|slot| slot.generation == id.generation())
            .and_then(|slot| slot.level.as_ref())
    }

    pub fn get_mut(&mut self, id: LevelId) -> Option<&mut Level> {
        self.slots
            .get_mut(id.index())
            .filter(|slot| slot.generation == id.generation())
            .and_then(|slot| slot.level.as_mut())
    }

    pub fn iter(&self) -> impl Iterator<Item = (LevelId, &Level)> {
        self.slots.iter().enumerate().filter_map(|(idx, slot)| {
            slot.level
                .as_ref()
                .map(|level| (LevelId::new(idx, slot.generation), level))
        })
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.level.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}

impl Default for LevelArena {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::Scope;
    use crate::bounce::Bounce;
    use crate::executor::Executor;
    use crate::level::Event;
    use crate::value::Value;
    use crate::vm::Vm;

    #[derive(Debug)]
    struct Idle;

    impl Executor for Idle {
        fn step(&mut self, _vm: &mut Vm, _id: LevelId, _event: Event) -> Bounce {
            Bounce::Done(Value::Void)
        }

        fn name(&self) -> &'static str {
            "idle"
        }
    }

    fn idle_level() -> Level {
        Level::new(Box::new(Idle), Scope::root())
    }

    #[test]
    fn test_arena_alloc_and_get() {
        let mut arena = LevelArena::new();
        let id1 = arena.alloc(idle_level());
        let id2 = arena.alloc(idle_level());

        assert_ne!(id1, id2);
        assert_eq!(arena.len(), 2);
        assert!(arena.get(id1).is_some());
    }

    #[test]
    fn test_arena_free_and_reuse_bumps_generation() {
        let mut arena = LevelArena::new();
        let id1 = arena.alloc(idle_level());
        assert!(arena.free(id1).is_some());
        assert!(arena.is_empty());

        let id2 = arena.alloc(idle_level());
        assert_eq!(id1.index(), id2.index());
        assert_ne!(id1, id2);
        assert!(arena.get(id1).is_none());
        assert!(arena.get(id2).is_some());
        assert_eq!(arena.capacity(), 1);
    }

    #[test]
    fn test_arena_stale_free_is_ignored() {
        let mut arena = LevelArena::new();
        let id1 = arena.alloc(idle_level());
        arena.free(id1);
        let id2 = arena.alloc(idle_level());

        assert!(arena.free(id1).is_none());
        assert!(arena.contains(id2));
    }
}
