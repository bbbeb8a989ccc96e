//! Line of sight: the window of the arena a robot sees this step.

use crate::geometry::{Coord, DiscreteSpan};
use crate::grid::Cell;
use crate::repr::{Block, Cache, Entity2D, EntityId};
use std::collections::{BTreeMap, BTreeSet};

/// Immutable snapshot of a rectangular arena window.
///
/// Holds copies of the window's cells and of every block and cache they refer
/// to, so it stays valid after the arena moves on.
#[derive(Clone, Debug)]
pub struct LineOfSight {
    xdspan: DiscreteSpan,
    ydspan: DiscreteSpan,
    /// Row-major copy of the window
    cells: Vec<Cell>,
    blocks: BTreeMap<EntityId, Block>,
    caches: BTreeMap<EntityId, Cache>,
}

impl LineOfSight {
    pub fn new(
        xdspan: DiscreteSpan,
        ydspan: DiscreteSpan,
        cells: Vec<Cell>,
        blocks: impl IntoIterator<Item = Block>,
        caches: impl IntoIterator<Item = Cache>,
    ) -> Self {
        debug_assert_eq!(cells.len(), xdspan.size() * ydspan.size());
        Self {
            xdspan,
            ydspan,
            cells,
            blocks: blocks.into_iter().map(|b| (b.id(), b)).collect(),
            caches: caches.into_iter().map(|c| (c.id(), c)).collect(),
        }
    }

    pub fn xdspan(&self) -> DiscreteSpan {
        self.xdspan
    }

    pub fn ydspan(&self) -> DiscreteSpan {
        self.ydspan
    }

    /// Absolute cell lies inside the window
    pub fn contains_abs(&self, c: Coord) -> bool {
        self.xdspan.contains(c.x) && self.ydspan.contains(c.y)
    }

    /// Cell at an absolute location
    pub fn access(&self, c: Coord) -> Option<&Cell> {
        if !self.contains_abs(c) {
            return None;
        }
        let width = self.xdspan.size();
        self.cells
            .get((c.y - self.ydspan.lb) * width + (c.x - self.xdspan.lb))
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Free blocks lying on cells in the window
    pub fn blocks(&self) -> Vec<&Block> {
        self.cells
            .iter()
            .filter(|cell| cell.has_block())
            .filter_map(|cell| cell.block().and_then(|id| self.blocks.get(&id)))
            .collect()
    }

    /// Caches with a host or extent cell in the window, each reported once,
    /// in order of first appearance.
    pub fn caches(&self) -> Vec<&Cache> {
        let mut seen = BTreeSet::new();
        self.cells
            .iter()
            .filter(|cell| cell.has_cache() || cell.is_cache_extent())
            .filter_map(|cell| cell.cache())
            .filter(|id| seen.insert(*id))
            .filter_map(|id| self.caches.get(&id))
            .collect()
    }

    /// Some visible cache covers the cell
    pub fn cache_covers(&self, c: Coord) -> bool {
        self.caches.values().any(|cache| cache.contains_cell(c))
    }
}
