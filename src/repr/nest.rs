//! Nests: rectangular delivery areas.

use super::entity::{Entity2D, EntityId};
use crate::geometry::{Coord, RealSpan, Vec2};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Nest {
    id: EntityId,
    rcenter: Vec2,
    xdim: f64,
    ydim: f64,
    resolution: f64,
}

impl Nest {
    pub fn new(id: EntityId, rcenter: Vec2, xdim: f64, ydim: f64, resolution: f64) -> Self {
        Self {
            id,
            rcenter,
            xdim,
            ydim,
            resolution,
        }
    }

    /// The cell lies (at least partly) inside the nest
    pub fn contains_cell(&self, c: Coord) -> bool {
        let cell_x = RealSpan::from_anchor(c.x as f64 * self.resolution, self.resolution);
        let cell_y = RealSpan::from_anchor(c.y as f64 * self.resolution, self.resolution);
        self.xrspan().overlaps_with(&cell_x) && self.yrspan().overlaps_with(&cell_y)
    }
}

impl Entity2D for Nest {
    fn id(&self) -> EntityId {
        self.id
    }

    fn xrspan(&self) -> RealSpan {
        RealSpan::from_center(self.rcenter.x, self.xdim)
    }

    fn yrspan(&self) -> RealSpan {
        RealSpan::from_center(self.rcenter.y, self.ydim)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nest_cells() {
        let nest = Nest::new(EntityId(0), Vec2::new(5.0, 5.0), 2.0, 2.0, 1.0);
        assert!(nest.contains_cell(Coord::new(4, 4)));
        assert!(nest.contains_cell(Coord::new(5, 5)));
        assert!(!nest.contains_cell(Coord::new(6, 5)));
        assert!(!nest.contains_cell(Coord::new(3, 5)));
        assert!(nest.contains_point(Vec2::new(4.5, 5.9)));
    }
}
