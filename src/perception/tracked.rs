//! Entities as a robot remembers them.

use super::decay::PheromoneDensity;
use crate::repr::{Entity2D, EntityId};
use std::cmp::Ordering;

/// An owned copy of an entity paired with its relevance.
///
/// Equality and ordering go by entity id only: two wrappers around the same
/// entity are equal regardless of content or density.
#[derive(Clone, Debug)]
pub struct Tracked<T> {
    ent: T,
    density: PheromoneDensity,
}

impl<T: Entity2D> Tracked<T> {
    pub fn new(ent: T, density: PheromoneDensity) -> Self {
        Self { ent, density }
    }

    pub fn ent(&self) -> &T {
        &self.ent
    }

    pub fn id(&self) -> EntityId {
        self.ent.id()
    }

    pub fn density(&self) -> &PheromoneDensity {
        &self.density
    }

    pub fn density_mut(&mut self) -> &mut PheromoneDensity {
        &mut self.density
    }

    /// Current relevance
    pub fn relevance(&self) -> f64 {
        self.density.value()
    }

    pub fn into_inner(self) -> T {
        self.ent
    }
}

impl<T: Entity2D> PartialEq for Tracked<T> {
    fn eq(&self, other: &Self) -> bool {
        self.ent.idcmp(&other.ent)
    }
}

impl<T: Entity2D> Eq for Tracked<T> {}

impl<T: Entity2D> PartialOrd for Tracked<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: Entity2D> Ord for Tracked<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id().cmp(&other.id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Coord;
    use crate::repr::Block;

    #[test]
    fn test_equality_ignores_density_and_location() {
        let a = Tracked::new(
            Block::new(EntityId(1), Coord::new(0, 0), 1.0),
            PheromoneDensity::fresh(0.1),
        );
        let b = Tracked::new(
            Block::new(EntityId(1), Coord::new(5, 5), 1.0),
            PheromoneDensity::new(0.1),
        );
        let c = Tracked::new(
            Block::new(EntityId(2), Coord::new(0, 0), 1.0),
            PheromoneDensity::fresh(0.1),
        );
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a < c);
    }
}
