//! Caches: square multi-block depots centred on a host cell.
//!
//! A cache owns its blocks outright. Blocks are kept in arrival order and the
//! oldest is always the next one handed out. The footprint is a function of the
//! configured dimension alone: it does not move when blocks come and go.

use super::block::Block;
use super::entity::{Entity2D, EntityId};
use crate::geometry::{cell_center, Coord, DiscreteSpan, RealSpan, Vec2};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Per-cache counters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheMetrics {
    pub block_pickups: u32,
    pub block_drops: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cache {
    id: EntityId,
    rcenter: Vec2,
    dcenter: Coord,
    dim: f64,
    resolution: f64,
    blocks: VecDeque<Block>,
    creation_time: u64,
    pub metrics: CacheMetrics,
}

impl Cache {
    /// Build a cache on the host cell `dcenter`. Blocks are relocated onto the
    /// host cell and keep the given order (front = oldest).
    pub fn new(
        id: EntityId,
        dcenter: Coord,
        dim: f64,
        resolution: f64,
        blocks: Vec<Block>,
        creation_time: u64,
    ) -> Self {
        let blocks = blocks
            .into_iter()
            .map(|mut b| {
                b.carried_by = None;
                b.move_to(dcenter);
                b
            })
            .collect();
        Self {
            id,
            rcenter: cell_center(dcenter, resolution),
            dcenter,
            dim,
            resolution,
            blocks,
            creation_time,
            metrics: CacheMetrics::default(),
        }
    }

    pub fn rcenter(&self) -> Vec2 {
        self.rcenter
    }

    pub fn dcenter(&self) -> Coord {
        self.dcenter
    }

    pub fn dim(&self) -> f64 {
        self.dim
    }

    pub fn creation_time(&self) -> u64 {
        self.creation_time
    }

    pub fn n_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// Blocks in arrival order
    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.blocks.iter()
    }

    pub fn contains_block(&self, id: EntityId) -> bool {
        self.blocks.iter().any(|b| b.id() == id)
    }

    /// Append a block; it becomes the newest
    pub fn block_add(&mut self, mut block: Block) {
        block.carried_by = None;
        block.move_to(self.dcenter);
        self.blocks.push_back(block);
    }

    /// Remove and return the oldest block
    pub fn oldest_block_take(&mut self) -> Option<Block> {
        self.blocks.pop_front()
    }

    /// Remove a specific block
    pub fn block_remove(&mut self, id: EntityId) -> Option<Block> {
        let idx = self.blocks.iter().position(|b| b.id() == id)?;
        self.blocks.remove(idx)
    }

    /// Take every remaining block, oldest first
    pub fn drain_blocks(&mut self) -> Vec<Block> {
        self.blocks.drain(..).collect()
    }

    /// Cells spanned per axis
    pub fn ddim(&self) -> usize {
        ((self.dim / self.resolution).round() as usize).max(1)
    }

    pub fn xdspan(&self) -> DiscreteSpan {
        DiscreteSpan::around(self.dcenter.x, (self.ddim() - 1) / 2)
    }

    pub fn ydspan(&self) -> DiscreteSpan {
        DiscreteSpan::around(self.dcenter.y, (self.ddim() - 1) / 2)
    }

    /// The cell lies within the footprint
    pub fn contains_cell(&self, c: Coord) -> bool {
        self.xdspan().contains(c.x) && self.ydspan().contains(c.y)
    }

    /// Same host cell as `other`
    pub fn dloccmp(&self, other: &Cache) -> bool {
        self.dcenter == other.dcenter
    }
}

impl Entity2D for Cache {
    fn id(&self) -> EntityId {
        self.id
    }

    fn xrspan(&self) -> RealSpan {
        RealSpan::from_center(self.rcenter.x, self.dim)
    }

    fn yrspan(&self) -> RealSpan {
        RealSpan::from_center(self.rcenter.y, self.dim)
    }
}
