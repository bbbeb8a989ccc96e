//! Block clusters: rectangular regions blocks are distributed into.

use super::entity::{Entity2D, EntityId};
use crate::geometry::{Coord, DiscreteSpan, RealSpan};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockCluster {
    id: EntityId,
    xdspan: DiscreteSpan,
    ydspan: DiscreteSpan,
    resolution: f64,
}

impl BlockCluster {
    pub fn new(id: EntityId, xdspan: DiscreteSpan, ydspan: DiscreteSpan, resolution: f64) -> Self {
        Self {
            id,
            xdspan,
            ydspan,
            resolution,
        }
    }

    pub fn xdspan(&self) -> DiscreteSpan {
        self.xdspan
    }

    pub fn ydspan(&self) -> DiscreteSpan {
        self.ydspan
    }

    pub fn contains_cell(&self, c: Coord) -> bool {
        self.xdspan.contains(c.x) && self.ydspan.contains(c.y)
    }

    /// All cells, row by row
    pub fn cells(&self) -> impl Iterator<Item = Coord> + '_ {
        self.ydspan
            .iter()
            .flat_map(move |y| self.xdspan.iter().map(move |x| Coord::new(x, y)))
    }

    pub fn capacity(&self) -> usize {
        self.xdspan.size() * self.ydspan.size()
    }
}

impl Entity2D for BlockCluster {
    fn id(&self) -> EntityId {
        self.id
    }

    fn xrspan(&self) -> RealSpan {
        RealSpan::new(
            self.xdspan.lb as f64 * self.resolution,
            (self.xdspan.ub + 1) as f64 * self.resolution,
        )
    }

    fn yrspan(&self) -> RealSpan {
        RealSpan::new(
            self.ydspan.lb as f64 * self.resolution,
            (self.ydspan.ub + 1) as f64 * self.resolution,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cluster_extent() {
        let c = BlockCluster::new(EntityId(0), DiscreteSpan::new(2, 4), DiscreteSpan::new(0, 1), 0.5);
        assert_eq!(c.capacity(), 6);
        assert_eq!(c.cells().count(), 6);
        assert_eq!(c.xrspan(), RealSpan::new(1.0, 2.5));
        assert!(c.contains_cell(Coord::new(4, 1)));
        assert!(!c.contains_cell(Coord::new(5, 1)));
    }
}
