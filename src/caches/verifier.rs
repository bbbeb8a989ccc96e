//! Post-creation sanity checks over the set of live caches.

use crate::arena::ArenaMap;
use crate::geometry::Coord;
use crate::grid::ArenaGrid;
use crate::repr::{Block, BlockCluster, Cache, Entity2D, EntityId, Nest};
use std::collections::BTreeSet;
use thiserror::Error;

/// One failed check
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    #[error("cell {loc} hosting cache{cache} is not in HAS_CACHE state")]
    HostCellState { cache: EntityId, loc: Coord },
    #[error("cell {loc} does not reference cache{cache}")]
    HostCellCache { cache: EntityId, loc: Coord },
    #[error("cache{cache} holds {cache_count} blocks but its cell reports {cell_count}")]
    BlockCountMismatch {
        cache: EntityId,
        cache_count: usize,
        cell_count: usize,
    },
    #[error("cache{cache} holds {n_blocks} blocks, fewer than {min_blocks}")]
    TooFewBlocks {
        cache: EntityId,
        n_blocks: usize,
        min_blocks: usize,
    },
    #[error("block{block} of cache{cache} lies at {loc}, not on host cell {host}")]
    BlockOffHost {
        cache: EntityId,
        block: EntityId,
        loc: Coord,
        host: Coord,
    },
    #[error("cache{cache} overlaps free block{block}")]
    FreeBlockOverlap { cache: EntityId, block: EntityId },
    #[error("cache{cache} overlaps block cluster{cluster}")]
    ClusterOverlap { cache: EntityId, cluster: EntityId },
    #[error("cache{cache} overlaps nest{nest}")]
    NestOverlap { cache: EntityId, nest: EntityId },
    #[error("cache{cache} holds block{block} more than once")]
    DuplicateBlock { cache: EntityId, block: EntityId },
    #[error("block{block} is held by both cache{first} and cache{second}")]
    SharedBlock {
        block: EntityId,
        first: EntityId,
        second: EntityId,
    },
    #[error("cache{first} overlaps cache{second}")]
    CacheOverlap { first: EntityId, second: EntityId },
}

/// Every failed check from one verification run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerificationReport {
    pub failures: Vec<VerifyError>,
}

impl VerificationReport {
    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }

    /// Failures that name `cache`
    pub fn failures_for(&self, cache: EntityId) -> impl Iterator<Item = &VerifyError> {
        self.failures.iter().filter(move |e| e.involves(cache))
    }
}

impl VerifyError {
    /// The failure concerns `cache`
    pub fn involves(&self, cache: EntityId) -> bool {
        match *self {
            Self::HostCellState { cache: c, .. }
            | Self::HostCellCache { cache: c, .. }
            | Self::BlockCountMismatch { cache: c, .. }
            | Self::TooFewBlocks { cache: c, .. }
            | Self::BlockOffHost { cache: c, .. }
            | Self::FreeBlockOverlap { cache: c, .. }
            | Self::ClusterOverlap { cache: c, .. }
            | Self::NestOverlap { cache: c, .. }
            | Self::DuplicateBlock { cache: c, .. } => c == cache,
            Self::SharedBlock { first, second, .. } | Self::CacheOverlap { first, second } => {
                first == cache || second == cache
            }
        }
    }
}

fn overlaps(a: &dyn Entity2D, b: &dyn Entity2D) -> bool {
    a.xrspan().overlaps_with(&b.xrspan()) && a.yrspan().overlaps_with(&b.yrspan())
}

#[derive(Debug, Clone, Copy)]
pub struct CreationVerifier {
    min_blocks: usize,
    /// Discard failing caches instead of keeping them
    strict_constraints: bool,
}

impl CreationVerifier {
    pub fn new(min_blocks: usize, strict_constraints: bool) -> Self {
        Self {
            min_blocks,
            strict_constraints,
        }
    }

    pub fn strict_constraints(&self) -> bool {
        self.strict_constraints
    }

    /// Host cell agrees with the cache, enough blocks, all blocks on the host cell
    pub fn check_internal_consistency(
        &self,
        cache: &Cache,
        grid: &ArenaGrid,
    ) -> Result<(), VerifyError> {
        let loc = cache.dcenter();
        let id = cache.id();
        let cell = grid
            .get(loc)
            .ok_or(VerifyError::HostCellState { cache: id, loc })?;
        if !cell.has_cache() {
            return Err(VerifyError::HostCellState { cache: id, loc });
        }
        if cell.cache() != Some(id) {
            return Err(VerifyError::HostCellCache { cache: id, loc });
        }
        if cell.block_count() != cache.n_blocks() {
            return Err(VerifyError::BlockCountMismatch {
                cache: id,
                cache_count: cache.n_blocks(),
                cell_count: cell.block_count(),
            });
        }
        if cache.n_blocks() < self.min_blocks {
            return Err(VerifyError::TooFewBlocks {
                cache: id,
                n_blocks: cache.n_blocks(),
                min_blocks: self.min_blocks,
            });
        }
        if let Some(b) = cache.blocks().find(|b| b.dloc() != loc) {
            return Err(VerifyError::BlockOffHost {
                cache: id,
                block: b.id(),
                loc: b.dloc(),
                host: loc,
            });
        }
        Ok(())
    }

    pub fn check_free_block_overlap<'a>(
        &self,
        cache: &Cache,
        free_blocks: impl IntoIterator<Item = &'a Block>,
    ) -> Result<(), VerifyError> {
        match free_blocks.into_iter().find(|b| overlaps(cache, *b)) {
            Some(b) => Err(VerifyError::FreeBlockOverlap {
                cache: cache.id(),
                block: b.id(),
            }),
            None => Ok(()),
        }
    }

    pub fn check_cluster_overlap(
        &self,
        cache: &Cache,
        clusters: &[BlockCluster],
    ) -> Result<(), VerifyError> {
        match clusters.iter().find(|c| overlaps(cache, *c)) {
            Some(c) => Err(VerifyError::ClusterOverlap {
                cache: cache.id(),
                cluster: c.id(),
            }),
            None => Ok(()),
        }
    }

    pub fn check_nest_overlap(&self, cache: &Cache, nests: &[Nest]) -> Result<(), VerifyError> {
        match nests.iter().find(|n| overlaps(cache, *n)) {
            Some(n) => Err(VerifyError::NestOverlap {
                cache: cache.id(),
                nest: n.id(),
            }),
            None => Ok(()),
        }
    }

    /// No cache lists a block twice and no block is in two caches
    pub fn check_cross_consistency(&self, caches: &[Cache]) -> Result<(), VerifyError> {
        for cache in caches {
            let mut seen = BTreeSet::new();
            if let Some(b) = cache.blocks().find(|b| !seen.insert(b.id())) {
                return Err(VerifyError::DuplicateBlock {
                    cache: cache.id(),
                    block: b.id(),
                });
            }
        }
        for (i, c1) in caches.iter().enumerate() {
            for c2 in &caches[i + 1..] {
                if let Some(b) = c1.blocks().find(|b| c2.contains_block(b.id())) {
                    return Err(VerifyError::SharedBlock {
                        block: b.id(),
                        first: c1.id(),
                        second: c2.id(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn check_cache_overlap(&self, caches: &[Cache]) -> Result<(), VerifyError> {
        for (i, c1) in caches.iter().enumerate() {
            if let Some(c2) = caches[i + 1..].iter().find(|c2| overlaps(c1, *c2)) {
                return Err(VerifyError::CacheOverlap {
                    first: c1.id(),
                    second: c2.id(),
                });
            }
        }
        Ok(())
    }

    /// Run every check against the arena's live caches. Cluster overlap is
    /// only checked under loose constraints; strict creation keeps clear of
    /// clusters upstream.
    pub fn report(&self, arena: &ArenaMap) -> VerificationReport {
        let caches = arena.caches();
        let mut failures = Vec::new();

        for cache in caches {
            failures.extend(self.check_internal_consistency(cache, arena.grid()).err());
            failures.extend(self.check_free_block_overlap(cache, arena.free_blocks()).err());
            if !self.strict_constraints {
                failures.extend(self.check_cluster_overlap(cache, arena.clusters()).err());
            }
            failures.extend(self.check_nest_overlap(cache, arena.nests()).err());
        }
        failures.extend(self.check_cross_consistency(caches).err());
        failures.extend(self.check_cache_overlap(caches).err());

        VerificationReport { failures }
    }

    /// Whether a newly created cache may stay. Only failures that name the
    /// cache count against it: under strict constraints such a failure
    /// discards it, under loose constraints it is kept with a warning.
    pub fn verify_single(&self, cache: EntityId, arena: &ArenaMap) -> (bool, VerificationReport) {
        let report = self.report(arena);
        let mut own = 0;
        for failure in &report.failures {
            if failure.involves(cache) {
                own += 1;
                log::warn!("Cache{} sanity check failed: {}", cache, failure);
            } else {
                log::debug!("Sanity check failed elsewhere during cache{} creation: {}", cache, failure);
            }
        }
        if own == 0 {
            log::debug!("Cache{} creation sanity checks OK", cache);
            (true, report)
        } else if self.strict_constraints {
            log::warn!("Bad cache{} creation: discard (strict constraints)", cache);
            (false, report)
        } else {
            log::warn!("Bad cache{} creation: keep (loose constraints)", cache);
            (true, report)
        }
    }
}
