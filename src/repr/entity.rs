//! Entity identity and the common footprint interface.

use crate::geometry::{RealSpan, Vec2};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable entity identity. Assigned once at creation and never reused.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct EntityId(pub u32);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Index of a robot in the swarm
pub type RobotId = usize;

/// Monotonic id source.
///
/// One allocator is owned per id space (caches use the one inside the cache
/// manager) and lives for the whole process: ids are handed out in increasing
/// order and never recycled, even across a simulation reset.
#[derive(Debug, Clone, Default)]
pub struct IdAllocator {
    next: u32,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start allocating at `first` (used when ids below it are already taken)
    pub fn starting_at(first: u32) -> Self {
        Self { next: first }
    }

    pub fn allocate(&mut self) -> EntityId {
        let id = EntityId(self.next);
        self.next += 1;
        id
    }

    /// Next id that would be handed out
    pub fn peek(&self) -> EntityId {
        EntityId(self.next)
    }
}

/// Axis-aligned rectangular footprint
pub trait Entity2D {
    fn id(&self) -> EntityId;

    fn xrspan(&self) -> RealSpan;

    fn yrspan(&self) -> RealSpan;

    fn rcenter(&self) -> Vec2 {
        Vec2::new(self.xrspan().center(), self.yrspan().center())
    }

    /// Identity comparison. Never compares location or any other state.
    fn idcmp(&self, other: &dyn Entity2D) -> bool {
        self.id() == other.id()
    }

    fn contains_point(&self, p: Vec2) -> bool {
        self.xrspan().contains(p.x) && self.yrspan().contains(p.y)
    }

    /// Footprints intersect on both axes
    fn overlaps_with(&self, other: &dyn Entity2D) -> bool {
        self.xrspan().overlaps_with(&other.xrspan()) && self.yrspan().overlaps_with(&other.yrspan())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocator_is_monotonic() {
        let mut ids = IdAllocator::new();
        let a = ids.allocate();
        let b = ids.allocate();
        assert!(b > a);
        assert_eq!(ids.peek(), EntityId(2));

        let mut offset = IdAllocator::starting_at(100);
        assert_eq!(offset.allocate(), EntityId(100));
    }
}
