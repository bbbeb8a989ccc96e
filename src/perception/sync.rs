//! Reconcile a perceptual store with the current line of sight.

use super::los::LineOfSight;
use super::oracle::OracleFeed;
use super::store::{PerceptualStore, StoreUpdate};
use crate::geometry::Coord;
use crate::repr::{Entity2D, EntityId};
use thiserror::Error;

/// Store disagrees with what was just seen
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SyncError {
    #[error("store does not contain block{id} seen at {loc}")]
    BlockMissing { id: EntityId, loc: Coord },
    #[error("store has block{id} at {stored}, seen at {seen}")]
    BlockLocationMismatch {
        id: EntityId,
        stored: Coord,
        seen: Coord,
    },
    #[error("store does not contain cache{id} seen at {loc}")]
    CacheMissing { id: EntityId, loc: Coord },
    #[error("store has cache{id} at {stored}, seen at {seen}")]
    CacheLocationMismatch {
        id: EntityId,
        stored: Coord,
        seen: Coord,
    },
    #[error("store has {stored} blocks in cache{id}, saw {seen}")]
    CacheBlockCountMismatch {
        id: EntityId,
        stored: usize,
        seen: usize,
    },
}

/// Outcome of one synchronization
#[derive(Debug)]
pub struct SyncReport {
    pub evicted_blocks: Vec<EntityId>,
    pub evicted_caches: Vec<EntityId>,
    pub updates: Vec<(EntityId, StoreUpdate)>,
    pub verify: Result<(), SyncError>,
}

impl SyncReport {
    pub fn discoveries(&self) -> usize {
        self.updates
            .iter()
            .filter(|(_, u)| matches!(u, StoreUpdate::NewBlockAdded | StoreUpdate::NewCacheAdded))
            .count()
    }
}

/// Runs the per-step store update
#[derive(Debug, Clone, Copy)]
pub struct Synchronizer {
    /// Escalate verification failures to a panic in debug builds
    strict_verify: bool,
}

impl Synchronizer {
    pub fn new(strict_verify: bool) -> Self {
        Self { strict_verify }
    }

    /// Synchronize `store` with `los` at step `t`.
    ///
    /// Categories covered by `oracle` are taken from it and skipped in the
    /// line of sight. The store is decayed once at the end.
    pub fn run(
        &self,
        store: &mut PerceptualStore,
        los: &LineOfSight,
        oracle: Option<&OracleFeed<'_>>,
        t: u64,
    ) -> SyncReport {
        let mut report = SyncReport {
            evicted_blocks: Vec::new(),
            evicted_caches: Vec::new(),
            updates: Vec::new(),
            verify: Ok(()),
        };

        if let Some(feed) = oracle {
            feed.apply(store);
        }
        let do_caches = !oracle.is_some_and(|f| f.caches_enabled());
        let do_blocks = !oracle.is_some_and(|f| f.blocks_enabled());

        if do_caches {
            report.evicted_caches = Self::evict_caches(store, los);
        }
        if do_blocks {
            report.evicted_blocks = Self::evict_blocks(store, los);
        }
        if do_caches {
            for cache in los.caches() {
                if !store.contains_cache(cache.id()) {
                    log::info!("Discovered cache{} at {}", cache.id(), cache.dcenter());
                }
                let update = store.cache_upsert(cache.clone());
                report.updates.push((cache.id(), update));
            }
        }
        if do_blocks {
            for block in los.blocks() {
                debug_assert!(!block.is_out_of_sight());
                let update = store.block_upsert(block.clone());
                if update == StoreUpdate::NewBlockAdded {
                    log::debug!("Discovered block{} at {}", block.id(), block.dloc());
                }
                report.updates.push((block.id(), update));
            }
        }

        report.verify = Self::verify(store, los);
        if let Err(e) = &report.verify {
            if cfg!(debug_assertions) && self.strict_verify {
                panic!("LOS verification failed at step {}: {}", t, e);
            }
            log::error!("LOS verification failed at step {}: {}", t, e);
        }

        store.decay_all(t);
        report
    }

    /// Drop tracked caches whose footprint overlaps the window but which are
    /// not seen there. Discrete overlap keeps a cache the robot is leaving from
    /// flickering out on floating point edges.
    fn evict_caches(store: &mut PerceptualStore, los: &LineOfSight) -> Vec<EntityId> {
        let visible = los.caches();
        let victims: Vec<EntityId> = store
            .known_caches()
            .filter(|t| {
                let cache = t.ent();
                let should_be_in_los = cache.xdspan().overlaps_with(&los.xdspan())
                    && cache.ydspan().overlaps_with(&los.ydspan());
                should_be_in_los && !visible.iter().any(|c| c.dloccmp(cache))
            })
            .map(|t| t.id())
            .collect();

        for id in &victims {
            log::trace!("Remove tracked cache{}: not in LOS", id);
            store.cache_remove(*id);
        }
        victims
    }

    /// Drop tracked blocks on a window cell that is not showing them. Blocks on
    /// a cell covered by a visible cache are hidden, not gone, and stay put.
    fn evict_blocks(store: &mut PerceptualStore, los: &LineOfSight) -> Vec<EntityId> {
        let visible = los.blocks();
        let victims: Vec<EntityId> = store
            .known_blocks()
            .filter(|t| {
                let dloc = t.ent().dloc();
                los.contains_abs(dloc)
                    && !visible.iter().any(|b| b.idcmp(t.ent()))
                    && !los.cache_covers(dloc)
            })
            .map(|t| t.id())
            .collect();

        for id in &victims {
            log::trace!("Remove tracked block{}: not in LOS", id);
            store.block_remove(*id);
        }
        victims
    }

    /// Everything in the window must now be in the store as seen.
    pub fn verify(store: &PerceptualStore, los: &LineOfSight) -> Result<(), SyncError> {
        for block in los.blocks() {
            if los.cache_covers(block.dloc()) {
                continue;
            }
            match store.find_block(block.id()) {
                None => {
                    return Err(SyncError::BlockMissing {
                        id: block.id(),
                        loc: block.dloc(),
                    })
                }
                Some(t) if t.ent().dloc() != block.dloc() => {
                    return Err(SyncError::BlockLocationMismatch {
                        id: block.id(),
                        stored: t.ent().dloc(),
                        seen: block.dloc(),
                    })
                }
                Some(_) => {}
            }
        }

        for cache in los.caches() {
            let known = store.find_cache(cache.id()).ok_or(SyncError::CacheMissing {
                id: cache.id(),
                loc: cache.dcenter(),
            })?;
            if known.ent().dcenter() != cache.dcenter() {
                return Err(SyncError::CacheLocationMismatch {
                    id: cache.id(),
                    stored: known.ent().dcenter(),
                    seen: cache.dcenter(),
                });
            }
            if known.ent().n_blocks() != cache.n_blocks() {
                return Err(SyncError::CacheBlockCountMismatch {
                    id: cache.id(),
                    stored: known.ent().n_blocks(),
                    seen: cache.n_blocks(),
                });
            }
        }
        Ok(())
    }
}
