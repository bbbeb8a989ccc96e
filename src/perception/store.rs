//! The perceptual store: what a robot believes about blocks and caches.

use super::decay::{PheromoneDensity, MAX_PHEROMONE, UNIT_QUANTITY};
use super::tracked::Tracked;
use crate::geometry::{Coord, Vec2};
use crate::repr::{Block, Cache, Entity2D, EntityId};
use std::collections::{BTreeMap, BTreeSet};

/// What an upsert changed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreUpdate {
    NewBlockAdded,
    /// Known block seen somewhere else
    BlockMoved { old: Coord },
    /// Known block seen again where expected
    BlockRefreshed,
    NewCacheAdded,
    /// Known cache replaced by a fresh observation
    CacheUpdated,
}

/// Tracked blocks and caches, one entry per entity id.
///
/// Owned by a single robot. Entries hold copies of arena entities, never
/// references into the arena.
#[derive(Clone, Debug)]
pub struct PerceptualStore {
    rho: f64,
    repeat_deposit: bool,
    blocks: BTreeMap<EntityId, Tracked<Block>>,
    caches: BTreeMap<EntityId, Tracked<Cache>>,
    last_decay: Option<u64>,
    last_block_loc: Option<Vec2>,
    last_cache_loc: Option<Vec2>,
}

impl PerceptualStore {
    pub fn new(rho: f64, repeat_deposit: bool) -> Self {
        Self {
            rho,
            repeat_deposit,
            blocks: BTreeMap::new(),
            caches: BTreeMap::new(),
            last_decay: None,
            last_block_loc: None,
            last_cache_loc: None,
        }
    }

    pub fn rho(&self) -> f64 {
        self.rho
    }

    pub fn repeat_deposit(&self) -> bool {
        self.repeat_deposit
    }

    pub fn known_blocks(&self) -> impl Iterator<Item = &Tracked<Block>> {
        self.blocks.values()
    }

    pub fn known_caches(&self) -> impl Iterator<Item = &Tracked<Cache>> {
        self.caches.values()
    }

    pub fn contains_block(&self, id: EntityId) -> bool {
        self.blocks.contains_key(&id)
    }

    pub fn contains_cache(&self, id: EntityId) -> bool {
        self.caches.contains_key(&id)
    }

    pub fn find_block(&self, id: EntityId) -> Option<&Tracked<Block>> {
        self.blocks.get(&id)
    }

    pub fn find_cache(&self, id: EntityId) -> Option<&Tracked<Cache>> {
        self.caches.get(&id)
    }

    /// Density for an entity seen again
    fn refreshed(&self, mut density: PheromoneDensity) -> PheromoneDensity {
        if self.repeat_deposit {
            density.add(UNIT_QUANTITY);
        } else {
            density.set(MAX_PHEROMONE);
        }
        density
    }

    /// Record an observation of `block`.
    ///
    /// A different block tracked on the same cell is stale and is dropped, as is
    /// a tracked cache hosted on that cell.
    pub fn block_upsert(&mut self, block: Block) -> StoreUpdate {
        let id = block.id();
        let dloc = block.dloc();

        let stale: Vec<EntityId> = self
            .blocks
            .values()
            .filter(|t| t.ent().dloc() == dloc && t.id() != id)
            .map(|t| t.id())
            .collect();
        for victim in stale {
            log::trace!("Remove old block{} at {}: block{} found there", victim, dloc, id);
            self.block_remove(victim);
        }

        let hidden: Vec<EntityId> = self
            .caches
            .values()
            .filter(|t| t.ent().dcenter() == dloc)
            .map(|t| t.id())
            .collect();
        for victim in hidden {
            log::trace!("Remove cache{} at {}: block{} found there", victim, dloc, id);
            self.cache_remove(victim);
        }

        self.block_insert(block)
    }

    /// Record a batch of blocks that hold one cell each, such as a ground-truth
    /// feed. Entries are matched by id only, so tracked blocks missing from the
    /// batch must already be gone. A tracked cache hosted on any of the
    /// batch's cells is dropped.
    pub fn block_upsert_batch(&mut self, blocks: &[Block]) -> usize {
        let cells: BTreeSet<Coord> = blocks.iter().map(|b| b.dloc()).collect();
        let hidden: Vec<EntityId> = self
            .caches
            .values()
            .filter(|t| cells.contains(&t.ent().dcenter()))
            .map(|t| t.id())
            .collect();
        for victim in hidden {
            self.cache_remove(victim);
        }
        for block in blocks {
            self.block_insert(block.clone());
        }
        blocks.len()
    }

    fn block_insert(&mut self, block: Block) -> StoreUpdate {
        let id = block.id();
        let dloc = block.dloc();
        match self.blocks.get(&id) {
            None => {
                self.blocks
                    .insert(id, Tracked::new(block, PheromoneDensity::fresh(self.rho)));
                StoreUpdate::NewBlockAdded
            }
            Some(known) if known.ent().dloc() != dloc => {
                let old = known.ent().dloc();
                log::trace!("Block{} moved: {} -> {}", id, old, dloc);
                self.blocks
                    .insert(id, Tracked::new(block, PheromoneDensity::fresh(self.rho)));
                StoreUpdate::BlockMoved { old }
            }
            Some(known) => {
                let density = self.refreshed(*known.density());
                self.blocks.insert(id, Tracked::new(block, density));
                StoreUpdate::BlockRefreshed
            }
        }
    }

    /// Record an observation of `cache`. The stored copy is replaced wholesale.
    pub fn cache_upsert(&mut self, cache: Cache) -> StoreUpdate {
        let id = cache.id();

        let displaced: Vec<EntityId> = self
            .caches
            .values()
            .filter(|t| t.ent().dloccmp(&cache) && t.id() != id)
            .map(|t| t.id())
            .collect();
        for victim in displaced {
            log::trace!("Remove cache{}: cache{} now hosted at {}", victim, id, cache.dcenter());
            self.cache_remove(victim);
        }

        match self.caches.get(&id) {
            Some(known) => {
                let density = if known.ent().dloccmp(&cache) {
                    self.refreshed(*known.density())
                } else {
                    PheromoneDensity::fresh(self.rho)
                };
                self.caches.insert(id, Tracked::new(cache, density));
                StoreUpdate::CacheUpdated
            }
            None => {
                self.caches
                    .insert(id, Tracked::new(cache, PheromoneDensity::fresh(self.rho)));
                StoreUpdate::NewCacheAdded
            }
        }
    }

    pub fn block_remove(&mut self, id: EntityId) -> Option<Tracked<Block>> {
        let removed = self.blocks.remove(&id)?;
        if self.blocks.is_empty() {
            self.last_block_loc = Some(removed.ent().rloc());
        }
        Some(removed)
    }

    pub fn cache_remove(&mut self, id: EntityId) -> Option<Tracked<Cache>> {
        let removed = self.caches.remove(&id)?;
        if self.caches.is_empty() {
            self.last_cache_loc = Some(removed.ent().rcenter());
        }
        Some(removed)
    }

    /// Decay every entry by one time unit. A second call for the same step is
    /// ignored and returns false.
    pub fn decay_all(&mut self, t: u64) -> bool {
        if self.last_decay == Some(t) {
            log::warn!("Store already decayed at step {}", t);
            return false;
        }
        self.last_decay = Some(t);
        for tracked in self.blocks.values_mut() {
            tracked.density_mut().decay();
        }
        for tracked in self.caches.values_mut() {
            tracked.density_mut().decay();
        }
        true
    }

    /// Forget everything
    pub fn clear_all(&mut self) {
        self.blocks.clear();
        self.caches.clear();
        self.last_decay = None;
        self.last_block_loc = None;
        self.last_cache_loc = None;
    }

    /// Location of the last block forgotten when the store ran out of blocks
    pub fn last_block_loc(&self) -> Option<Vec2> {
        self.last_block_loc
    }

    /// Location of the last cache forgotten when the store ran out of caches
    pub fn last_cache_loc(&self) -> Option<Vec2> {
        self.last_cache_loc
    }

    pub fn n_known_blocks(&self) -> usize {
        self.blocks.len()
    }

    pub fn n_known_caches(&self) -> usize {
        self.caches.len()
    }

    pub fn avg_block_relevance(&self) -> f64 {
        average(self.blocks.values().map(|t| t.relevance()), self.blocks.len())
    }

    pub fn avg_cache_relevance(&self) -> f64 {
        average(self.caches.values().map(|t| t.relevance()), self.caches.len())
    }

    /// Most relevant known block. Ties go to the lowest id.
    pub fn best_block(&self) -> Option<&Tracked<Block>> {
        self.blocks
            .values()
            .rev()
            .max_by(|a, b| a.relevance().total_cmp(&b.relevance()))
    }

    /// Most relevant known cache. Ties go to the lowest id.
    pub fn best_cache(&self) -> Option<&Tracked<Cache>> {
        self.caches
            .values()
            .rev()
            .max_by(|a, b| a.relevance().total_cmp(&b.relevance()))
    }
}

fn average(values: impl Iterator<Item = f64>, n: usize) -> f64 {
    if n == 0 {
        0.0
    } else {
        values.sum::<f64>() / n as f64
    }
}
