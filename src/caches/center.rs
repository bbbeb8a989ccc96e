//! Centre selection for a new cache.

use crate::arena::ArenaMap;
use crate::geometry::{cell_center, to_discrete, RealSpan, Vec2};
use crate::repr::{Block, BlockCluster, Cache, Entity2D, Nest};
use rand::Rng;

/// Finds a centre for a new cache that keeps it clear of the arena edges,
/// nests, block clusters and every existing cache.
///
/// The first guess is the cell containing the mean of the seed blocks. Each
/// pass checks the boundaries and then every entity in turn against the
/// current candidate; a conflicting entity nudges the candidate one cell in a
/// random direction on each axis. A pass without nudges ends the search, and
/// the number of passes is bounded.
#[derive(Debug, Clone)]
pub struct CacheCenterCalculator {
    cache_dim: f64,
    resolution: f64,
    xrsize: f64,
    yrsize: f64,
    max_attempts: usize,
}

impl CacheCenterCalculator {
    pub fn new(
        cache_dim: f64,
        resolution: f64,
        xrsize: f64,
        yrsize: f64,
        max_attempts: usize,
    ) -> Self {
        Self {
            cache_dim,
            resolution,
            xrsize,
            yrsize,
            max_attempts,
        }
    }

    pub fn from_arena(arena: &ArenaMap, max_attempts: usize) -> Self {
        Self::new(
            arena.cache_dim(),
            arena.resolution(),
            arena.xrsize(),
            arena.yrsize(),
            max_attempts,
        )
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// Conflict-free centre, or `None` if the pass budget runs out
    pub fn calc(
        &self,
        seed_blocks: &[&Block],
        caches: &[Cache],
        nests: &[Nest],
        clusters: &[BlockCluster],
        rng: &mut impl Rng,
    ) -> Option<Vec2> {
        if seed_blocks.is_empty() {
            return None;
        }
        let half_cell = Vec2::new(self.resolution / 2.0, self.resolution / 2.0);
        let sum = seed_blocks
            .iter()
            .fold(Vec2::default(), |acc, b| acc + b.rloc() + half_cell);
        let mean = sum / seed_blocks.len() as f64;
        let mut center = cell_center(to_discrete(mean, self.resolution), self.resolution);
        log::debug!("Guess center={}", center);

        let entities: Vec<&dyn Entity2D> = nests
            .iter()
            .map(|n| n as &dyn Entity2D)
            .chain(clusters.iter().map(|c| c as &dyn Entity2D))
            .chain(caches.iter().map(|c| c as &dyn Entity2D))
            .collect();

        for pass in 0..self.max_attempts {
            let mut conflict = false;
            if let Some(moved) = self.deconflict_boundaries(center) {
                center = moved;
                conflict = true;
            }
            for ent in &entities {
                if let Some(moved) = self.deconflict_entity(*ent, center, rng) {
                    center = moved;
                    conflict = true;
                }
            }
            if !conflict {
                log::trace!("Search pass {} successful: center={}", pass, center);
                return Some(center);
            }
            log::trace!("Search pass {} unsuccessful: center={}", pass, center);
        }

        log::warn!(
            "No conflict-free center found in {} tries: blocks={} caches={} clusters={} nests={}",
            self.max_attempts,
            seed_blocks.len(),
            caches.len(),
            clusters.len(),
            nests.len()
        );
        None
    }

    /// Pull the candidate at least one cache dimension in from every edge,
    /// staying on a cell centre
    fn deconflict_boundaries(&self, center: Vec2) -> Option<Vec2> {
        let x = self.bound(center.x, self.xrsize);
        let y = self.bound(center.y, self.yrsize);
        if x == center.x && y == center.y {
            None
        } else {
            Some(Vec2::new(x, y))
        }
    }

    fn bound(&self, v: f64, size: f64) -> f64 {
        let (lb, ub) = (self.cache_dim, size - self.cache_dim);
        if (lb..=ub).contains(&v) {
            return v;
        }
        let clamped = v.clamp(lb, ub.max(lb));
        let cell = (clamped / self.resolution + 1e-9).floor();
        let mut snapped = cell * self.resolution + self.resolution / 2.0;
        if snapped < lb {
            snapped += self.resolution;
        } else if snapped > ub {
            snapped -= self.resolution;
        }
        snapped
    }

    /// Nudge the candidate if a cache there would overlap `ent` on both axes
    fn deconflict_entity(
        &self,
        ent: &dyn Entity2D,
        center: Vec2,
        rng: &mut impl Rng,
    ) -> Option<Vec2> {
        let xspan = RealSpan::from_center(center.x, self.cache_dim);
        let yspan = RealSpan::from_center(center.y, self.cache_dim);
        let x_conflict = xspan.overlaps_with(&ent.xrspan());
        let y_conflict = yspan.overlaps_with(&ent.yrspan());
        if !(x_conflict && y_conflict) {
            return None;
        }

        let x_delta = if rng.gen_bool(0.5) { self.resolution } else { -self.resolution };
        let y_delta = if rng.gen_bool(0.5) { self.resolution } else { -self.resolution };
        log::trace!(
            "Conflict: cache xspan={},yspan={} overlaps ent{} xspan={},yspan={}",
            xspan,
            yspan,
            ent.id(),
            ent.xrspan(),
            ent.yrspan()
        );
        Some(center + Vec2::new(x_delta, y_delta))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Coord, DiscreteSpan};
    use crate::repr::EntityId;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn calculator() -> CacheCenterCalculator {
        CacheCenterCalculator::new(3.0, 1.0, 30.0, 30.0, 100)
    }

    fn blocks(locs: &[(usize, usize)]) -> Vec<Block> {
        locs.iter()
            .enumerate()
            .map(|(i, &(x, y))| Block::new(EntityId(i as u32), Coord::new(x, y), 1.0))
            .collect()
    }

    #[test]
    fn test_center_is_snapped_mean() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let seed = blocks(&[(10, 10), (12, 10), (11, 13)]);
        let refs: Vec<&Block> = seed.iter().collect();
        let center = calculator().calc(&refs, &[], &[], &[], &mut rng).unwrap();
        assert_eq!(center, Vec2::new(11.5, 11.5));
    }

    #[test]
    fn test_boundary_clamp() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let seed = blocks(&[(0, 0), (1, 0), (0, 1)]);
        let refs: Vec<&Block> = seed.iter().collect();
        let calc = calculator();
        let center = calc.calc(&refs, &[], &[], &[], &mut rng).unwrap();

        assert!(center.x >= 3.0 && center.y >= 3.0);
        assert!(center.x - 1.5 > 0.0 && center.y - 1.5 > 0.0);
        assert_eq!(center, Vec2::new(3.5, 3.5));

        let seed = blocks(&[(29, 29)]);
        let refs: Vec<&Block> = seed.iter().collect();
        let center = calc.calc(&refs, &[], &[], &[], &mut rng).unwrap();
        assert!(center.x + 1.5 < 30.0 && center.y + 1.5 < 30.0);
    }

    #[test]
    fn test_moves_off_nest_and_caches() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let nest = Nest::new(EntityId(0), Vec2::new(15.0, 15.0), 2.0, 2.0, 1.0);
        let existing = Cache::new(
            EntityId(7),
            Coord::new(10, 10),
            3.0,
            1.0,
            blocks(&[(10, 10), (10, 10)]),
            0,
        );
        let cluster = BlockCluster::new(
            EntityId(0),
            DiscreteSpan::new(20, 23),
            DiscreteSpan::new(20, 23),
            1.0,
        );
        let calc = calculator();

        for (x, y) in [(15, 15), (10, 10), (21, 21)] {
            let seed = blocks(&[(x, y)]);
            let refs: Vec<&Block> = seed.iter().collect();
            let center = calc
                .calc(&refs, std::slice::from_ref(&existing), &[nest.clone()], &[cluster.clone()], &mut rng)
                .unwrap();
            let xspan = RealSpan::from_center(center.x, 3.0);
            let yspan = RealSpan::from_center(center.y, 3.0);
            for ent in [&nest as &dyn Entity2D, &existing, &cluster] {
                assert!(!(xspan.overlaps_with(&ent.xrspan()) && yspan.overlaps_with(&ent.yrspan())));
            }
        }
    }

    #[test]
    fn test_gives_up_within_budget() {
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let everywhere = Nest::new(EntityId(0), Vec2::new(15.0, 15.0), 30.0, 30.0, 1.0);
        let seed = blocks(&[(5, 5)]);
        let refs: Vec<&Block> = seed.iter().collect();
        let calc = CacheCenterCalculator::new(3.0, 1.0, 30.0, 30.0, 7);
        assert!(calc.calc(&refs, &[], &[everywhere], &[], &mut rng).is_none());
    }

    #[test]
    fn test_no_seed_blocks() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        assert!(calculator().calc(&[], &[], &[], &[], &mut rng).is_none());
    }
}
