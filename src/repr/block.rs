//! Blocks: the unit of resource robots pick up and carry.

use super::entity::{Entity2D, EntityId, RobotId};
use crate::geometry::{to_discrete, to_real, Coord, RealSpan, Vec2};
use serde::{Deserialize, Serialize};

/// Real location of a block that is being carried
pub const OUT_OF_SIGHT_RLOC: Vec2 = Vec2::new(-1.0, -1.0);

/// Discrete location of a block that is being carried
pub const OUT_OF_SIGHT_DLOC: Coord = Coord::new(usize::MAX, usize::MAX);

/// Bookkeeping for metrics. Nothing in the arena or perception logic reads it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlockMetadata {
    /// Step the block was (re)distributed
    pub dist_time: u64,
    /// Step of the first pickup after the last distribution
    pub first_pickup_time: Option<u64>,
    /// Step the block was last delivered to a nest
    pub nest_drop_time: Option<u64>,
    /// Robots that have carried it since distribution
    pub n_transporters: u32,
}

/// A square block exactly one cell wide.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    id: EntityId,
    /// Lower-left corner
    rloc: Vec2,
    dloc: Coord,
    dim: f64,
    /// Robot currently carrying the block
    pub carried_by: Option<RobotId>,
    pub md: BlockMetadata,
}

impl Block {
    /// Block placed on `dloc`
    pub fn new(id: EntityId, dloc: Coord, resolution: f64) -> Self {
        Self {
            id,
            rloc: to_real(dloc, resolution),
            dloc,
            dim: resolution,
            carried_by: None,
            md: BlockMetadata::default(),
        }
    }

    pub fn rloc(&self) -> Vec2 {
        self.rloc
    }

    pub fn dloc(&self) -> Coord {
        self.dloc
    }

    pub fn dim(&self) -> f64 {
        self.dim
    }

    /// Move the block onto a cell. Real and discrete location change together.
    pub fn move_to(&mut self, dloc: Coord) {
        self.dloc = dloc;
        self.rloc = to_real(dloc, self.dim);
        debug_assert_eq!(to_discrete(self.rloc, self.dim), dloc);
    }

    /// Take the block out of the visible arena (it is being carried)
    pub fn move_out_of_sight(&mut self) {
        self.rloc = OUT_OF_SIGHT_RLOC;
        self.dloc = OUT_OF_SIGHT_DLOC;
    }

    pub fn is_out_of_sight(&self) -> bool {
        self.dloc == OUT_OF_SIGHT_DLOC
    }

    /// Same discrete location as `other`
    pub fn dloccmp(&self, other: &Block) -> bool {
        self.dloc == other.dloc
    }

    /// Record a pickup by `robot` at step `t`
    pub fn picked_up(&mut self, robot: RobotId, t: u64) {
        self.carried_by = Some(robot);
        self.md.n_transporters += 1;
        self.md.first_pickup_time.get_or_insert(t);
        self.move_out_of_sight();
    }

    /// Reset metadata for a fresh distribution at step `t`
    pub fn redistributed(&mut self, t: u64) {
        self.carried_by = None;
        self.md.dist_time = t;
        self.md.first_pickup_time = None;
        self.md.n_transporters = 0;
    }
}

impl Entity2D for Block {
    fn id(&self) -> EntityId {
        self.id
    }

    fn xrspan(&self) -> RealSpan {
        RealSpan::from_anchor(self.rloc.x, self.dim)
    }

    fn yrspan(&self) -> RealSpan {
        RealSpan::from_anchor(self.rloc.y, self.dim)
    }
}
