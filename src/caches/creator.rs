//! Dynamic cache creation from groups of nearby free blocks.

use super::center::CacheCenterCalculator;
use super::verifier::{CreationVerifier, VerificationReport};
use crate::arena::ArenaMap;
use crate::config::CachesConfig;
use crate::geometry::{to_discrete, RealSpan};
use crate::repr::{Block, Entity2D, EntityId, IdAllocator};
use rand::Rng;
use std::collections::BTreeSet;

/// Outcome of one creation pass
#[derive(Debug, Clone, Default)]
pub struct CreationResult {
    /// Caches created and kept, in creation order
    pub created: Vec<EntityId>,
    /// Groups that produced no cache (no centre, construction refused or
    /// verification failed under strict constraints)
    pub n_discarded: usize,
    /// Verification report for every cache that was constructed
    pub reports: Vec<(EntityId, VerificationReport)>,
}

#[derive(Debug, Clone)]
pub struct DynamicCacheCreator {
    min_blocks: usize,
    min_dist: f64,
    max_attempts: usize,
    verifier: CreationVerifier,
}

impl DynamicCacheCreator {
    pub fn new(config: &CachesConfig) -> Self {
        Self {
            min_blocks: config.min_blocks,
            min_dist: config.min_dist,
            max_attempts: config.max_deconflict_attempts,
            verifier: CreationVerifier::new(config.min_blocks, config.strict_constraints),
        }
    }

    pub fn verifier(&self) -> &CreationVerifier {
        &self.verifier
    }

    /// Free blocks that may seed a cache: those outside every block cluster
    fn usable_blocks(&self, arena: &ArenaMap) -> Vec<Block> {
        arena
            .free_blocks()
            .filter(|b| !arena.clusters().iter().any(|c| c.contains_cell(b.dloc())))
            .cloned()
            .collect()
    }

    /// Partition usable blocks into seed groups. Each unused block anchors a
    /// group holding every other unused block within `min_dist` of it; groups
    /// below the minimum size are dropped and their blocks stay unused.
    fn groups(&self, usable: &[Block]) -> Vec<Vec<EntityId>> {
        let mut used = BTreeSet::new();
        let mut groups = Vec::new();

        for anchor in usable {
            if used.contains(&anchor.id()) {
                continue;
            }
            let group: Vec<EntityId> = usable
                .iter()
                .filter(|b| !used.contains(&b.id()))
                .filter(|b| b.id() == anchor.id() || anchor.rloc().distance(b.rloc()) <= self.min_dist)
                .map(|b| b.id())
                .collect();
            if group.len() < self.min_blocks {
                log::trace!(
                    "Block{} anchors only {} blocks, need {}",
                    anchor.id(),
                    group.len(),
                    self.min_blocks
                );
                continue;
            }
            used.extend(group.iter().copied());
            groups.push(group);
        }
        groups
    }

    /// Verify a freshly built cache and delete it if the verdict says so.
    /// A deleted cache's blocks are redistributed.
    fn settle(
        &self,
        id: EntityId,
        arena: &mut ArenaMap,
        t: u64,
        rng: &mut impl Rng,
    ) -> (bool, VerificationReport) {
        let (keep, report) = self.verifier.verify_single(id, arena);
        if !keep {
            if let Err(e) = arena.cache_delete(id, t, rng) {
                log::error!("Could not delete rejected cache{}: {}", id, e);
            }
        }
        (keep, report)
    }

    /// Create as many caches as the free blocks currently support
    pub fn create_all(
        &self,
        arena: &mut ArenaMap,
        ids: &mut IdAllocator,
        t: u64,
        rng: &mut impl Rng,
    ) -> CreationResult {
        let mut result = CreationResult::default();
        let usable = self.usable_blocks(arena);
        if usable.len() < self.min_blocks {
            log::debug!(
                "Not enough usable blocks for a cache: {} < {}",
                usable.len(),
                self.min_blocks
            );
            return result;
        }

        let calculator = CacheCenterCalculator::from_arena(arena, self.max_attempts);
        let res = arena.resolution();
        let dim = arena.cache_dim();

        for group in self.groups(&usable) {
            // Earlier caches in this pass may have absorbed some of the group
            let seed: Vec<Block> = group
                .iter()
                .filter_map(|id| arena.block(*id))
                .filter(|b| !b.is_out_of_sight() && b.carried_by.is_none())
                .cloned()
                .collect();
            if seed.len() < self.min_blocks {
                result.n_discarded += 1;
                continue;
            }
            let seed_refs: Vec<&Block> = seed.iter().collect();

            let Some(center) = calculator.calc(
                &seed_refs,
                arena.caches(),
                arena.nests(),
                arena.clusters(),
                rng,
            ) else {
                result.n_discarded += 1;
                continue;
            };
            let dcenter = to_discrete(center, res);

            let xspan = RealSpan::from_center(center.x, dim);
            let yspan = RealSpan::from_center(center.y, dim);
            let mut members: Vec<EntityId> = seed.iter().map(|b| b.id()).collect();
            let absorbed: Vec<EntityId> = arena
                .free_blocks()
                .filter(|b| !members.contains(&b.id()))
                .filter(|b| xspan.overlaps_with(&b.xrspan()) && yspan.overlaps_with(&b.yrspan()))
                .map(|b| b.id())
                .collect();
            if !absorbed.is_empty() {
                log::debug!("Absorbing {} free blocks into new cache", absorbed.len());
            }
            members.extend(absorbed);

            let id = ids.peek();
            if let Err(e) = arena.cache_construct(id, dcenter, &members, t) {
                log::warn!("Cache construction at {} failed: {}", dcenter, e);
                result.n_discarded += 1;
                continue;
            }
            ids.allocate();

            let (keep, report) = self.settle(id, arena, t, rng);
            result.reports.push((id, report));
            if keep {
                result.created.push(id);
            } else {
                result.n_discarded += 1;
            }
        }

        log::debug!(
            "Created {} caches, discarded {} groups",
            result.created.len(),
            result.n_discarded
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::geometry::Coord;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn test_config() -> Config {
        let mut config = Config::default();
        config.arena.x_size = 20.0;
        config.arena.y_size = 20.0;
        config.arena.resolution = 1.0;
        config.arena.nests[0].center_x = 10.0;
        config.arena.nests[0].center_y = 10.0;
        config.arena.n_blocks = 20;
        config.caches.dimension = 3.0;
        config.caches.min_blocks = 2;
        config.caches.min_dist = 1.5;
        config
    }

    /// Every block is carried except blocks 0..n, dropped on the cells given
    fn arena_with(config: &Config, locs: &[Coord], rng: &mut ChaCha8Rng) -> ArenaMap {
        let mut map = ArenaMap::new(config, rng).unwrap();
        for i in 0..map.n_blocks() as u32 {
            map.free_block_pickup(EntityId(i), 0, 0).unwrap();
        }
        for (i, &loc) in locs.iter().enumerate() {
            map.free_block_drop(EntityId(i as u32), loc).unwrap();
        }
        map
    }

    #[test]
    fn test_creates_cache_from_nearby_blocks() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let config = test_config();
        let mut map = arena_with(&config, &[Coord::new(4, 4), Coord::new(5, 4)], &mut rng);
        let creator = DynamicCacheCreator::new(&config.caches);
        let mut ids = IdAllocator::new();

        let result = creator.create_all(&mut map, &mut ids, 10, &mut rng);
        assert_eq!(result.created, vec![EntityId(0)]);
        assert_eq!(result.n_discarded, 0);
        assert!(result.reports[0].1.passed());

        let cache = map.cache(EntityId(0)).unwrap();
        assert_eq!(cache.n_blocks(), 2);
        assert_eq!(cache.creation_time(), 10);
        assert_eq!(map.free_blocks().count(), 0);
        assert_eq!(ids.peek(), EntityId(1));
    }

    #[test]
    fn test_too_few_blocks() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let config = test_config();
        let mut map = arena_with(&config, &[Coord::new(4, 4), Coord::new(15, 4)], &mut rng);
        let creator = DynamicCacheCreator::new(&config.caches);
        let mut ids = IdAllocator::new();

        let result = creator.create_all(&mut map, &mut ids, 0, &mut rng);
        assert!(result.created.is_empty());
        assert!(map.caches().is_empty());
        assert_eq!(ids.peek(), EntityId(0));
    }

    #[test]
    fn test_separate_groups_make_separate_caches() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let config = test_config();
        let locs = [
            Coord::new(4, 4),
            Coord::new(5, 5),
            Coord::new(15, 4),
            Coord::new(15, 5),
        ];
        let mut map = arena_with(&config, &locs, &mut rng);
        let creator = DynamicCacheCreator::new(&config.caches);
        let mut ids = IdAllocator::new();

        let result = creator.create_all(&mut map, &mut ids, 0, &mut rng);
        assert_eq!(result.created.len(), 2);
        let caches = map.caches();
        assert!(!caches[0].overlaps_with(&caches[1]));
        assert!(creator.verifier().report(&map).passed());
    }

    #[test]
    fn test_absorbs_free_blocks_under_footprint() {
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let mut config = test_config();
        config.caches.min_dist = 1.0;
        // Blocks 0 and 1 seed the cache; block 2 is too far from block 0 to
        // join the group but lies under the footprint
        let locs = [Coord::new(5, 5), Coord::new(5, 4), Coord::new(4, 4)];
        let mut map = arena_with(&config, &locs, &mut rng);
        let creator = DynamicCacheCreator::new(&config.caches);
        let mut ids = IdAllocator::new();

        let result = creator.create_all(&mut map, &mut ids, 0, &mut rng);
        assert_eq!(result.created.len(), 1);
        let cache = map.cache(result.created[0]).unwrap();
        assert_eq!(cache.n_blocks(), 3);
        assert!(map.free_blocks().next().is_none());
    }

    #[test]
    fn test_unrelated_bad_cache_does_not_block_creation() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let config = test_config();
        assert!(config.caches.strict_constraints);
        let mut map = arena_with(
            &config,
            &[Coord::new(4, 4), Coord::new(5, 4), Coord::new(16, 16)],
            &mut rng,
        );
        map.cache_construct(EntityId(900), Coord::new(16, 16), &[EntityId(2)], 0)
            .unwrap();
        let creator = DynamicCacheCreator::new(&config.caches);
        let mut ids = IdAllocator::new();

        let result = creator.create_all(&mut map, &mut ids, 0, &mut rng);
        assert_eq!(result.created, vec![EntityId(0)]);
        assert_eq!(result.n_discarded, 0);
        let (id, report) = &result.reports[0];
        assert_eq!(report.failures_for(*id).count(), 0);
        assert_eq!(report.failures_for(EntityId(900)).count(), 1);
    }

    #[test]
    fn test_strict_constraints_delete_failing_cache() {
        let mut rng = ChaCha8Rng::seed_from_u64(6);
        let config = test_config();
        let mut map = arena_with(&config, &[Coord::new(6, 6)], &mut rng);
        map.cache_construct(EntityId(0), Coord::new(6, 6), &[EntityId(0)], 0)
            .unwrap();
        let creator = DynamicCacheCreator::new(&config.caches);

        let (keep, report) = creator.settle(EntityId(0), &mut map, 3, &mut rng);
        assert!(!keep);
        assert_eq!(report.failures_for(EntityId(0)).count(), 1);
        assert!(map.caches().is_empty());
        assert!(map.cache(EntityId(0)).is_none());
        // The lone block went back into the arena as a free block
        assert_eq!(map.free_blocks().map(|b| b.id()).collect::<Vec<_>>(), vec![EntityId(0)]);
        assert_eq!(map.n_blocks_accounted(), map.n_blocks());
    }

    #[test]
    fn test_loose_constraints_keep_failing_cache() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut config = test_config();
        config.caches.strict_constraints = false;
        let mut map = arena_with(&config, &[Coord::new(6, 6)], &mut rng);
        map.cache_construct(EntityId(0), Coord::new(6, 6), &[EntityId(0)], 0)
            .unwrap();
        let creator = DynamicCacheCreator::new(&config.caches);
        assert!(!creator.verifier().strict_constraints());

        let (keep, report) = creator.settle(EntityId(0), &mut map, 3, &mut rng);
        assert!(keep);
        assert!(!report.passed());
        assert_eq!(map.caches().len(), 1);
        assert_eq!(map.cache(EntityId(0)).unwrap().n_blocks(), 1);
    }
}
