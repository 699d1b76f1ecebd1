//! Core identifier types for the evaluator.
//!
//! All IDs are lightweight Copy types using newtype pattern for type safety.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Handle to a level stored in the [`LevelArena`](crate::arena::LevelArena).
///
/// The generation is bumped every time a slot is reused, so a handle kept
/// past its level's lifetime no longer resolves.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct LevelId {
    index: u32,
    generation: u32,
}

/// Identity of one level activation.
///
/// Definitional control natives (BREAK, CONTINUE, STOP, RETURN) carry the
/// coupling of the activation that introduced them. A fresh coupling is
/// minted whenever a level is created or delegated, so two activations
/// never share one even when they reuse the same arena slot.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Coupling(u64);

static COUPLING_COUNTER: AtomicU64 = AtomicU64::new(1);

impl LevelId {
    pub fn new(index: usize, generation: u32) -> Self {
        LevelId {
            index: index as u32,
            generation,
        }
    }

    pub fn index(&self) -> usize {
        self.index as usize
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for LevelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}.{}", self.index, self.generation)
    }
}

impl Coupling {
    /// Create a fresh unique Coupling.
    pub fn fresh() -> Self {
        Coupling(COUPLING_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Coupling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
