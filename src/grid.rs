//! Arena occupancy grid.
//!
//! One [`Cell`] per discrete location, stored row-major as `cells[y][x]`. A cell
//! is a small state machine: empty, holding one free block, hosting a cache, or
//! covered by the extent of a cache hosted elsewhere.

use crate::geometry::{Coord, DiscreteSpan};
use crate::repr::EntityId;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CellState {
    #[default]
    Empty,
    HasBlock,
    HasCache,
    CacheExtent,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub loc: Coord,
    state: CellState,
    block: Option<EntityId>,
    cache: Option<EntityId>,
    block_count: usize,
}

impl Cell {
    fn new(loc: Coord) -> Self {
        Self {
            loc,
            ..Default::default()
        }
    }

    #[inline]
    pub fn state(&self) -> CellState {
        self.state
    }

    /// The free block lying here
    #[inline]
    pub fn block(&self) -> Option<EntityId> {
        self.block
    }

    /// The cache hosted here, or whose extent covers this cell
    #[inline]
    pub fn cache(&self) -> Option<EntityId> {
        self.cache
    }

    /// Blocks on this cell (free block or hosted cache contents)
    #[inline]
    pub fn block_count(&self) -> usize {
        self.block_count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.state == CellState::Empty
    }

    #[inline]
    pub fn has_block(&self) -> bool {
        self.state == CellState::HasBlock
    }

    #[inline]
    pub fn has_cache(&self) -> bool {
        self.state == CellState::HasCache
    }

    #[inline]
    pub fn is_cache_extent(&self) -> bool {
        self.state == CellState::CacheExtent
    }

    pub fn block_placed(&mut self, block: EntityId) {
        self.state = CellState::HasBlock;
        self.block = Some(block);
        self.cache = None;
        self.block_count = 1;
    }

    pub fn cache_placed(&mut self, cache: EntityId, n_blocks: usize) {
        self.state = CellState::HasCache;
        self.block = None;
        self.cache = Some(cache);
        self.block_count = n_blocks;
    }

    pub fn cache_extent_placed(&mut self, cache: EntityId) {
        self.state = CellState::CacheExtent;
        self.block = None;
        self.cache = Some(cache);
        self.block_count = 0;
    }

    /// Hosted cache gained or lost blocks
    pub fn cache_count_changed(&mut self, n_blocks: usize) {
        self.block_count = n_blocks;
    }

    pub fn clear(&mut self) {
        self.state = CellState::Empty;
        self.block = None;
        self.cache = None;
        self.block_count = 0;
    }
}

/// Occupancy grid covering the whole arena
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ArenaGrid {
    xdsize: usize,
    ydsize: usize,
    resolution: f64,
    /// cells[y][x]
    cells: Vec<Vec<Cell>>,
}

impl ArenaGrid {
    /// Grid of `xdsize` x `ydsize` empty cells
    pub fn new(xdsize: usize, ydsize: usize, resolution: f64) -> Self {
        let cells = (0..ydsize)
            .map(|y| (0..xdsize).map(|x| Cell::new(Coord::new(x, y))).collect())
            .collect();
        Self {
            xdsize,
            ydsize,
            resolution,
            cells,
        }
    }

    #[inline]
    pub fn xdsize(&self) -> usize {
        self.xdsize
    }

    #[inline]
    pub fn ydsize(&self) -> usize {
        self.ydsize
    }

    #[inline]
    pub fn resolution(&self) -> f64 {
        self.resolution
    }

    #[inline]
    pub fn contains(&self, c: Coord) -> bool {
        c.x < self.xdsize && c.y < self.ydsize
    }

    #[inline]
    pub fn get(&self, c: Coord) -> Option<&Cell> {
        self.cells.get(c.y).and_then(|row| row.get(c.x))
    }

    #[inline]
    pub fn get_mut(&mut self, c: Coord) -> Option<&mut Cell> {
        self.cells.get_mut(c.y).and_then(|row| row.get_mut(c.x))
    }

    /// Empty every cell
    pub fn reset(&mut self) {
        for row in &mut self.cells {
            for cell in row {
                cell.clear();
            }
        }
    }

    /// Clip a window to the grid. `None` if it lies entirely outside.
    pub fn clip(&self, xspan: DiscreteSpan, yspan: DiscreteSpan) -> Option<(DiscreteSpan, DiscreteSpan)> {
        Some((xspan.clip(self.xdsize)?, yspan.clip(self.ydsize)?))
    }

    /// Cells inside a window, row by row. The window must already be clipped.
    pub fn window(&self, xspan: DiscreteSpan, yspan: DiscreteSpan) -> impl Iterator<Item = &Cell> {
        self.cells[yspan.lb..=yspan.ub]
            .iter()
            .flat_map(move |row| row[xspan.lb..=xspan.ub].iter())
    }

    /// Every cell, row by row
    pub fn iter(&self) -> impl Iterator<Item = &Cell> {
        self.cells.iter().flatten()
    }

    /// Number of cells in each state: (empty, block, cache, extent)
    pub fn census(&self) -> (usize, usize, usize, usize) {
        self.iter().fold((0, 0, 0, 0), |(e, b, c, x), cell| match cell.state {
            CellState::Empty => (e + 1, b, c, x),
            CellState::HasBlock => (e, b + 1, c, x),
            CellState::HasCache => (e, b, c + 1, x),
            CellState::CacheExtent => (e, b, c, x + 1),
        })
    }
}
