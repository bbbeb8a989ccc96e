//! Authoritative arena state.
//!
//! [`ArenaMap`] owns the occupancy grid together with every block, live cache,
//! zombie cache, nest and block cluster. It is the ground truth that robot
//! perception is built from, and all block movement goes through it so the
//! grid and the entities never disagree.

use crate::config::Config;
use crate::distributor::BlockDistributor;
use crate::geometry::{Coord, DiscreteSpan, Vec2};
use crate::grid::{ArenaGrid, Cell};
use crate::perception::{LineOfSight, OracleSnapshot};
use crate::repr::{Block, BlockCluster, Cache, Entity2D, EntityId, Nest, RobotId};
use rand::Rng;
use std::collections::BTreeMap;
use thiserror::Error;

/// Illegal arena operations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ArenaError {
    #[error("no such block{0}")]
    NoSuchBlock(EntityId),
    #[error("no such cache{0}")]
    NoSuchCache(EntityId),
    #[error("block{0} is not being carried")]
    BlockNotCarried(EntityId),
    #[error("block{0} is not lying free in the arena")]
    BlockNotFree(EntityId),
    #[error("cell {0} is occupied")]
    CellOccupied(Coord),
    #[error("cell {0} is outside the arena")]
    OutOfBounds(Coord),
    #[error("no empty cell left for a block")]
    NoEmptyCell,
    #[error("could not place block cluster {0}")]
    ClusterPlacement(usize),
}

/// Result of taking a block from a cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachedPickup {
    pub block: EntityId,
    /// The pickup left the cache below the minimum and it was removed
    pub depleted: bool,
}

#[derive(Debug, Clone)]
pub struct ArenaMap {
    grid: ArenaGrid,
    /// Blocks not inside a cache: lying free or being carried
    blocks: BTreeMap<EntityId, Block>,
    caches: Vec<Cache>,
    /// Caches depleted this step, kept until the driver disposes of them
    zombie_caches: Vec<Cache>,
    nests: Vec<Nest>,
    distributor: BlockDistributor,
    min_blocks: usize,
    cache_dim: f64,
    xrsize: f64,
    yrsize: f64,
    n_blocks: usize,
}

impl ArenaMap {
    /// Build the arena and distribute its blocks
    pub fn new(config: &Config, rng: &mut impl Rng) -> Result<Self, ArenaError> {
        let arena = &config.arena;
        let resolution = arena.resolution;
        let (xdsize, ydsize) = arena.dsize();

        let nests: Vec<Nest> = arena
            .nests
            .iter()
            .enumerate()
            .map(|(i, n)| {
                Nest::new(
                    EntityId(i as u32),
                    Vec2::new(n.center_x, n.center_y),
                    n.x_dim,
                    n.y_dim,
                    resolution,
                )
            })
            .collect();
        let distributor =
            BlockDistributor::new(&arena.distribution, xdsize, ydsize, resolution, &nests, rng)?;

        let mut map = Self {
            grid: ArenaGrid::new(xdsize, ydsize, resolution),
            blocks: BTreeMap::new(),
            caches: Vec::new(),
            zombie_caches: Vec::new(),
            nests,
            distributor,
            min_blocks: config.caches.min_blocks,
            cache_dim: config.caches.normalized_dimension(resolution),
            xrsize: arena.x_size,
            yrsize: arena.y_size,
            n_blocks: arena.n_blocks,
        };

        for i in 0..arena.n_blocks {
            let id = EntityId(i as u32);
            let mut block = Block::new(id, Coord::default(), resolution);
            block.move_out_of_sight();
            map.blocks.insert(id, block);
            map.distribute_block(id, 0, rng)?;
        }
        log::info!(
            "Arena {}x{} cells, {} blocks, {} nests, {} clusters",
            xdsize,
            ydsize,
            arena.n_blocks,
            map.nests.len(),
            map.clusters().len()
        );
        Ok(map)
    }

    pub fn grid(&self) -> &ArenaGrid {
        &self.grid
    }

    pub fn resolution(&self) -> f64 {
        self.grid.resolution()
    }

    pub fn xrsize(&self) -> f64 {
        self.xrsize
    }

    pub fn yrsize(&self) -> f64 {
        self.yrsize
    }

    /// Normalized cache edge (real units)
    pub fn cache_dim(&self) -> f64 {
        self.cache_dim
    }

    pub fn min_blocks(&self) -> usize {
        self.min_blocks
    }

    pub fn nests(&self) -> &[Nest] {
        &self.nests
    }

    pub fn clusters(&self) -> &[BlockCluster] {
        self.distributor.clusters()
    }

    pub fn caches(&self) -> &[Cache] {
        &self.caches
    }

    pub fn zombie_caches(&self) -> &[Cache] {
        &self.zombie_caches
    }

    /// Blocks not inside a cache
    pub fn block(&self, id: EntityId) -> Option<&Block> {
        self.blocks.get(&id)
    }

    /// Blocks lying in the arena, not carried and not cached
    pub fn free_blocks(&self) -> impl Iterator<Item = &Block> {
        self.blocks.values().filter(|b| !b.is_out_of_sight())
    }

    /// Blocks currently held by robots
    pub fn carried_blocks(&self) -> impl Iterator<Item = &Block> {
        self.blocks.values().filter(|b| b.is_out_of_sight())
    }

    /// Every block in the arena, wherever it is
    pub fn n_blocks(&self) -> usize {
        self.n_blocks
    }

    /// Count of blocks accounted for across free, carried and cached
    pub fn n_blocks_accounted(&self) -> usize {
        self.blocks.len() + self.caches.iter().map(|c| c.n_blocks()).sum::<usize>()
    }

    pub fn cache(&self, id: EntityId) -> Option<&Cache> {
        self.caches.iter().find(|c| c.id() == id)
    }

    /// Cache hosted on, or extending over, a cell
    pub fn cache_at(&self, c: Coord) -> Option<&Cache> {
        self.grid.get(c)?.cache().and_then(|id| self.cache(id))
    }

    /// Free block lying on a cell
    pub fn block_at(&self, c: Coord) -> Option<&Block> {
        let cell = self.grid.get(c)?;
        cell.block().and_then(|id| self.blocks.get(&id))
    }

    /// The block is inside some cache
    pub fn block_in_cache(&self, id: EntityId) -> Option<&Cache> {
        self.caches.iter().find(|c| c.contains_block(id))
    }

    pub fn in_nest(&self, c: Coord) -> bool {
        self.nests.iter().any(|n| n.contains_cell(c))
    }

    /// Snapshot of the square window of `2 * (dim / 2) + 1` cells centred on
    /// `center`, clipped to the arena.
    pub fn los(&self, center: Coord, dim: usize) -> Option<LineOfSight> {
        let (xspan, yspan) = self.grid.clip(
            DiscreteSpan::around(center.x, dim / 2),
            DiscreteSpan::around(center.y, dim / 2),
        )?;
        let cells: Vec<Cell> = self.grid.window(xspan, yspan).cloned().collect();

        let blocks: Vec<Block> = cells
            .iter()
            .filter(|c| c.has_block())
            .filter_map(|c| c.block().and_then(|id| self.blocks.get(&id)).cloned())
            .collect();
        let mut cache_ids: Vec<EntityId> = cells.iter().filter_map(|c| c.cache()).collect();
        cache_ids.sort_unstable();
        cache_ids.dedup();
        let caches: Vec<Cache> = cache_ids
            .into_iter()
            .filter_map(|id| self.cache(id).cloned())
            .collect();

        Some(LineOfSight::new(xspan, yspan, cells, blocks, caches))
    }

    /// Ground truth for oracular robots
    pub fn oracle(&self) -> OracleSnapshot {
        OracleSnapshot::new(self.free_blocks().cloned().collect(), self.caches.clone())
    }

    /// A robot picks up a free block
    pub fn free_block_pickup(
        &mut self,
        id: EntityId,
        robot: RobotId,
        t: u64,
    ) -> Result<(), ArenaError> {
        let block = self.blocks.get_mut(&id).ok_or(ArenaError::NoSuchBlock(id))?;
        if block.is_out_of_sight() {
            return Err(ArenaError::BlockNotFree(id));
        }
        let loc = block.dloc();
        block.picked_up(robot, t);
        if let Some(cell) = self.grid.get_mut(loc) {
            cell.clear();
        }
        log::trace!("Robot{} picked up block{} at {}", robot, id, loc);
        Ok(())
    }

    /// A robot drops its block on an empty cell
    pub fn free_block_drop(&mut self, id: EntityId, loc: Coord) -> Result<(), ArenaError> {
        let cell = self.grid.get(loc).ok_or(ArenaError::OutOfBounds(loc))?;
        if !cell.is_empty() {
            return Err(ArenaError::CellOccupied(loc));
        }
        let block = self.blocks.get_mut(&id).ok_or(ArenaError::NoSuchBlock(id))?;
        if block.carried_by.is_none() {
            return Err(ArenaError::BlockNotCarried(id));
        }
        block.carried_by = None;
        block.move_to(loc);
        if let Some(cell) = self.grid.get_mut(loc) {
            cell.block_placed(id);
        }
        log::trace!("Block{} dropped at {}", id, loc);
        Ok(())
    }

    /// A robot delivers its block to a nest. The block is redistributed.
    pub fn nest_block_drop(
        &mut self,
        id: EntityId,
        t: u64,
        rng: &mut impl Rng,
    ) -> Result<Coord, ArenaError> {
        let block = self.blocks.get_mut(&id).ok_or(ArenaError::NoSuchBlock(id))?;
        if block.carried_by.is_none() {
            return Err(ArenaError::BlockNotCarried(id));
        }
        block.md.nest_drop_time = Some(t);
        self.distribute_block(id, t, rng)
    }

    /// A robot takes the oldest block from a cache.
    ///
    /// If fewer than the minimum remain the cache is removed and recorded as a
    /// zombie: the oldest remaining block stays on the host cell and the rest
    /// are redistributed.
    pub fn cached_block_pickup(
        &mut self,
        cache_id: EntityId,
        robot: RobotId,
        t: u64,
        rng: &mut impl Rng,
    ) -> Result<CachedPickup, ArenaError> {
        let idx = self
            .caches
            .iter()
            .position(|c| c.id() == cache_id)
            .ok_or(ArenaError::NoSuchCache(cache_id))?;
        let cache = &mut self.caches[idx];
        let mut block = cache
            .oldest_block_take()
            .ok_or(ArenaError::NoSuchCache(cache_id))?;
        cache.metrics.block_pickups += 1;
        let remaining = cache.n_blocks();
        let host = cache.dcenter();

        let block_id = block.id();
        block.picked_up(robot, t);
        self.blocks.insert(block_id, block);
        if let Some(cell) = self.grid.get_mut(host) {
            cell.cache_count_changed(remaining);
        }
        log::trace!("Robot{} took block{} from cache{}", robot, block_id, cache_id);

        let depleted = remaining < self.min_blocks;
        if depleted {
            self.cache_deplete(idx, t, rng)?;
        }
        Ok(CachedPickup {
            block: block_id,
            depleted,
        })
    }

    /// A robot drops its block into a cache
    pub fn cache_block_drop(&mut self, id: EntityId, cache_id: EntityId) -> Result<(), ArenaError> {
        match self.blocks.get(&id) {
            None => return Err(ArenaError::NoSuchBlock(id)),
            Some(b) if b.carried_by.is_none() => return Err(ArenaError::BlockNotCarried(id)),
            Some(_) => {}
        }
        let cache = self
            .caches
            .iter_mut()
            .find(|c| c.id() == cache_id)
            .ok_or(ArenaError::NoSuchCache(cache_id))?;
        let block = self.blocks.remove(&id).ok_or(ArenaError::NoSuchBlock(id))?;
        cache.block_add(block);
        cache.metrics.block_drops += 1;
        let (host, n) = (cache.dcenter(), cache.n_blocks());
        if let Some(cell) = self.grid.get_mut(host) {
            cell.cache_count_changed(n);
        }
        log::trace!("Block{} dropped into cache{}", id, cache_id);
        Ok(())
    }

    /// Cells either side of a cache's host cell
    fn cache_half_ddim(&self) -> usize {
        ((self.cache_dim / self.resolution()).round() as usize).saturating_sub(1) / 2
    }

    /// Build a cache on `dcenter` from free blocks.
    ///
    /// Every footprint cell must be inside the arena and either empty or holding
    /// one of the given blocks. A block already on the host cell becomes the
    /// oldest.
    pub fn cache_construct(
        &mut self,
        id: EntityId,
        dcenter: Coord,
        block_ids: &[EntityId],
        t: u64,
    ) -> Result<&Cache, ArenaError> {
        let half = self.cache_half_ddim();
        if dcenter.x < half || dcenter.y < half {
            return Err(ArenaError::OutOfBounds(dcenter));
        }
        let xspan = DiscreteSpan::around(dcenter.x, half);
        let yspan = DiscreteSpan::around(dcenter.y, half);
        for y in yspan.iter() {
            for x in xspan.iter() {
                let c = Coord::new(x, y);
                let cell = self.grid.get(c).ok_or(ArenaError::OutOfBounds(c))?;
                let ours = cell.block().is_some_and(|b| block_ids.contains(&b));
                if !(cell.is_empty() || ours) {
                    return Err(ArenaError::CellOccupied(c));
                }
            }
        }
        for bid in block_ids {
            match self.blocks.get(bid) {
                Some(b) if !b.is_out_of_sight() => {}
                _ => return Err(ArenaError::BlockNotFree(*bid)),
            }
        }

        let mut blocks: Vec<Block> = Vec::with_capacity(block_ids.len());
        for bid in block_ids {
            if let Some(block) = self.blocks.remove(bid) {
                if let Some(cell) = self.grid.get_mut(block.dloc()) {
                    cell.clear();
                }
                blocks.push(block);
            }
        }
        if let Some(pos) = blocks.iter().position(|b| b.dloc() == dcenter) {
            let host_block = blocks.remove(pos);
            blocks.insert(0, host_block);
        }

        let cache = Cache::new(id, dcenter, self.cache_dim, self.resolution(), blocks, t);
        self.footprint_mark(&cache);
        log::info!(
            "Created cache{} at {} with {} blocks",
            id,
            dcenter,
            cache.n_blocks()
        );
        self.caches.push(cache);
        Ok(&self.caches[self.caches.len() - 1])
    }

    /// Remove a live cache and redistribute all of its blocks
    pub fn cache_delete(
        &mut self,
        id: EntityId,
        t: u64,
        rng: &mut impl Rng,
    ) -> Result<(), ArenaError> {
        let idx = self
            .caches
            .iter()
            .position(|c| c.id() == id)
            .ok_or(ArenaError::NoSuchCache(id))?;
        let mut cache = self.caches.remove(idx);
        self.footprint_clear(&cache);
        for block in cache.drain_blocks() {
            let bid = block.id();
            self.blocks.insert(bid, block);
            self.distribute_block(bid, t, rng)?;
        }
        log::debug!("Deleted cache{}", id);
        Ok(())
    }

    /// Take the zombie caches, leaving none
    pub fn zombie_caches_clear(&mut self) -> Vec<Cache> {
        std::mem::take(&mut self.zombie_caches)
    }

    fn cache_deplete(&mut self, idx: usize, t: u64, rng: &mut impl Rng) -> Result<(), ArenaError> {
        let mut cache = self.caches.remove(idx);
        self.footprint_clear(&cache);
        let zombie = cache.clone();
        let host = cache.dcenter();

        let mut remaining = cache.drain_blocks().into_iter();
        if let Some(first) = remaining.next() {
            let bid = first.id();
            self.blocks.insert(bid, first);
            if let Some(cell) = self.grid.get_mut(host) {
                cell.block_placed(bid);
            }
        }
        for block in remaining {
            let bid = block.id();
            self.blocks.insert(bid, block);
            self.distribute_block(bid, t, rng)?;
        }
        log::info!("Cache{} at {} depleted", zombie.id(), host);
        self.zombie_caches.push(zombie);
        Ok(())
    }

    /// Place a block (carried or newly created) on a fresh cell
    fn distribute_block(
        &mut self,
        id: EntityId,
        t: u64,
        rng: &mut impl Rng,
    ) -> Result<Coord, ArenaError> {
        let loc = self.distributor.choose_cell(&self.grid, &self.nests, rng)?;
        let block = self.blocks.get_mut(&id).ok_or(ArenaError::NoSuchBlock(id))?;
        block.move_to(loc);
        block.redistributed(t);
        if let Some(cell) = self.grid.get_mut(loc) {
            cell.block_placed(id);
        }
        Ok(loc)
    }

    fn footprint_mark(&mut self, cache: &Cache) {
        for y in cache.ydspan().iter() {
            for x in cache.xdspan().iter() {
                let c = Coord::new(x, y);
                if let Some(cell) = self.grid.get_mut(c) {
                    if c == cache.dcenter() {
                        cell.cache_placed(cache.id(), cache.n_blocks());
                    } else {
                        cell.cache_extent_placed(cache.id());
                    }
                }
            }
        }
    }

    fn footprint_clear(&mut self, cache: &Cache) {
        for y in cache.ydspan().iter() {
            for x in cache.xdspan().iter() {
                if let Some(cell) = self.grid.get_mut(Coord::new(x, y)) {
                    if cell.cache() == Some(cache.id()) {
                        cell.clear();
                    }
                }
            }
        }
    }
}
