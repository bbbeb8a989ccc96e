//! Block distribution: where new and redistributed blocks land.

use crate::arena::ArenaError;
use crate::config::DistributionConfig;
use crate::geometry::{Coord, DiscreteSpan};
use crate::grid::ArenaGrid;
use crate::repr::{BlockCluster, Entity2D, EntityId, Nest};
use rand::seq::SliceRandom;
use rand::Rng;

/// Random probes before falling back to scanning for an empty cell
const MAX_RANDOM_PROBES: usize = 100;

/// Random probes when placing a cluster
const MAX_CLUSTER_PLACEMENT_ATTEMPTS: usize = 100;

#[derive(Debug, Clone)]
pub enum BlockDistributor {
    /// Anywhere in the arena outside nests
    Random,
    /// Only inside the clusters
    Clustered { clusters: Vec<BlockCluster> },
}

impl BlockDistributor {
    /// Set up a distributor. Clusters are placed once, clear of nests and of each other.
    pub fn new(
        config: &DistributionConfig,
        xdsize: usize,
        ydsize: usize,
        resolution: f64,
        nests: &[Nest],
        rng: &mut impl Rng,
    ) -> Result<Self, ArenaError> {
        match *config {
            DistributionConfig::Random => Ok(Self::Random),
            DistributionConfig::Clustered {
                n_clusters,
                cluster_dim,
            } => {
                if cluster_dim > xdsize || cluster_dim > ydsize {
                    return Err(ArenaError::ClusterPlacement(0));
                }
                let mut clusters: Vec<BlockCluster> = Vec::with_capacity(n_clusters);
                for i in 0..n_clusters {
                    let mut placed = None;
                    for _ in 0..MAX_CLUSTER_PLACEMENT_ATTEMPTS {
                        let x = rng.gen_range(0..=xdsize - cluster_dim);
                        let y = rng.gen_range(0..=ydsize - cluster_dim);
                        let candidate = BlockCluster::new(
                            EntityId(i as u32),
                            DiscreteSpan::new(x, x + cluster_dim - 1),
                            DiscreteSpan::new(y, y + cluster_dim - 1),
                            resolution,
                        );
                        let conflict = nests.iter().any(|n| candidate.overlaps_with(n))
                            || clusters.iter().any(|c| candidate.overlaps_with(c));
                        if !conflict {
                            placed = Some(candidate);
                            break;
                        }
                    }
                    match placed {
                        Some(c) => clusters.push(c),
                        None => return Err(ArenaError::ClusterPlacement(i)),
                    }
                }
                log::debug!("Placed {} block clusters", clusters.len());
                Ok(Self::Clustered { clusters })
            }
        }
    }

    /// Block clusters (empty for random distribution)
    pub fn clusters(&self) -> &[BlockCluster] {
        match self {
            Self::Random => &[],
            Self::Clustered { clusters } => clusters,
        }
    }

    /// Pick an empty cell for a block. Cells inside nests, or covered by a cache,
    /// are never chosen.
    pub fn choose_cell(
        &self,
        grid: &ArenaGrid,
        nests: &[Nest],
        rng: &mut impl Rng,
    ) -> Result<Coord, ArenaError> {
        let usable = |c: Coord| {
            grid.get(c).is_some_and(|cell| cell.is_empty())
                && !nests.iter().any(|n| n.contains_cell(c))
        };

        match self {
            Self::Random => {
                for _ in 0..MAX_RANDOM_PROBES {
                    let c = Coord::new(
                        rng.gen_range(0..grid.xdsize()),
                        rng.gen_range(0..grid.ydsize()),
                    );
                    if usable(c) {
                        return Ok(c);
                    }
                }
                let candidates: Vec<Coord> =
                    grid.iter().map(|cell| cell.loc).filter(|&c| usable(c)).collect();
                candidates
                    .choose(rng)
                    .copied()
                    .ok_or(ArenaError::NoEmptyCell)
            }
            Self::Clustered { clusters } => {
                let mut order: Vec<&BlockCluster> = clusters.iter().collect();
                order.shuffle(rng);
                for cluster in order {
                    let candidates: Vec<Coord> = cluster.cells().filter(|&c| usable(c)).collect();
                    if let Some(c) = candidates.choose(rng) {
                        return Ok(*c);
                    }
                }
                Err(ArenaError::NoEmptyCell)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Vec2;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn nest() -> Nest {
        Nest::new(EntityId(0), Vec2::new(10.0, 10.0), 4.0, 4.0, 1.0)
    }

    #[test]
    fn test_random_avoids_nest_and_occupied() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut grid = ArenaGrid::new(20, 20, 1.0);
        grid.get_mut(Coord::new(0, 0)).unwrap().block_placed(EntityId(1));
        let nests = vec![nest()];
        let dist = BlockDistributor::new(&DistributionConfig::Random, 20, 20, 1.0, &nests, &mut rng)
            .unwrap();

        for _ in 0..500 {
            let c = dist.choose_cell(&grid, &nests, &mut rng).unwrap();
            assert!(!nests[0].contains_cell(c));
            assert_ne!(c, Coord::new(0, 0));
        }
    }

    #[test]
    fn test_full_grid_reports_no_cell() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut grid = ArenaGrid::new(3, 3, 1.0);
        for y in 0..3 {
            for x in 0..3 {
                grid.get_mut(Coord::new(x, y)).unwrap().block_placed(EntityId(0));
            }
        }
        let dist = BlockDistributor::Random;
        assert!(matches!(
            dist.choose_cell(&grid, &[], &mut rng),
            Err(ArenaError::NoEmptyCell)
        ));
    }

    #[test]
    fn test_clustered_stays_in_clusters() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let grid = ArenaGrid::new(30, 30, 1.0);
        let nests = vec![nest()];
        let config = DistributionConfig::Clustered {
            n_clusters: 3,
            cluster_dim: 4,
        };
        let dist = BlockDistributor::new(&config, 30, 30, 1.0, &nests, &mut rng).unwrap();
        assert_eq!(dist.clusters().len(), 3);
        assert!(dist.clusters().iter().all(|c| !c.overlaps_with(&nests[0])));

        for _ in 0..100 {
            let c = dist.choose_cell(&grid, &nests, &mut rng).unwrap();
            assert!(dist.clusters().iter().any(|cl| cl.contains_cell(c)));
        }
    }
}
