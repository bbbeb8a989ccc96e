//! Foraging robots and their capability profiles.

use crate::arena::ArenaMap;
use crate::config::{PerceptionConfig, SwarmConfig};
use crate::geometry::Coord;
use crate::perception::{OracleSnapshot, PerceptualStore, SyncReport, Synchronizer};
use crate::repr::{EntityId, RobotId};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// What a robot's controller is capable of
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Profile {
    /// Correlated random walk, no memory
    Crw,
    /// Keeps a decaying-pheromone store fed from its line of sight
    Dpo,
    /// As [`Profile::Dpo`], with ground truth for the enabled categories
    OracularDpo { blocks: bool, caches: bool },
}

impl Profile {
    pub fn has_memory(&self) -> bool {
        match self {
            Profile::Crw => false,
            Profile::Dpo | Profile::OracularDpo { .. } => true,
        }
    }

    pub fn is_oracular(&self) -> bool {
        matches!(self, Profile::OracularDpo { .. })
    }

    /// Profiles for the whole swarm, in robot id order
    pub fn roster(swarm: &SwarmConfig) -> Vec<Profile> {
        let oracular = Profile::OracularDpo {
            blocks: swarm.oracle.blocks,
            caches: swarm.oracle.caches,
        };
        std::iter::repeat(Profile::Crw)
            .take(swarm.crw)
            .chain(std::iter::repeat(Profile::Dpo).take(swarm.dpo))
            .chain(std::iter::repeat(oracular).take(swarm.oracular_dpo))
            .collect()
    }
}

/// One robot of the swarm
#[derive(Clone, Debug)]
pub struct Forager {
    pub id: RobotId,
    profile: Profile,
    loc: Coord,
    carrying: Option<EntityId>,
    store: Option<PerceptualStore>,
    los_dim: usize,
}

impl Forager {
    pub fn new(id: RobotId, profile: Profile, loc: Coord, perception: &PerceptionConfig) -> Self {
        let store = profile
            .has_memory()
            .then(|| PerceptualStore::new(perception.rho, perception.repeat_deposit));
        Self {
            id,
            profile,
            loc,
            carrying: None,
            store,
            los_dim: perception.los_dim,
        }
    }

    pub fn profile(&self) -> Profile {
        self.profile
    }

    pub fn loc(&self) -> Coord {
        self.loc
    }

    pub fn carrying(&self) -> Option<EntityId> {
        self.carrying
    }

    pub fn store(&self) -> Option<&PerceptualStore> {
        self.store.as_ref()
    }

    /// Update the store from what the robot can see at step `t`.
    ///
    /// Robots without memory sense nothing. The arena is only read, so any
    /// number of robots may sense concurrently.
    pub fn sense(
        &mut self,
        arena: &ArenaMap,
        oracle: &OracleSnapshot,
        sync: &Synchronizer,
        t: u64,
    ) -> Option<SyncReport> {
        let store = self.store.as_mut()?;
        let los = arena.los(self.loc, self.los_dim)?;
        let report = match self.profile {
            Profile::Crw => return None,
            Profile::Dpo => sync.run(store, &los, None, t),
            Profile::OracularDpo { blocks, caches } => {
                let feed = oracle.feed(blocks, caches);
                sync.run(store, &los, Some(&feed), t)
            }
        };
        Some(report)
    }

    /// Move to a random neighbouring cell (or stay), inside the arena
    pub fn random_step(&mut self, xdsize: usize, ydsize: usize, rng: &mut impl Rng) {
        let dx = rng.gen_range(-1i64..=1);
        let dy = rng.gen_range(-1i64..=1);
        let step = |v: usize, d: i64, size: usize| {
            (v as i64 + d).clamp(0, size.saturating_sub(1) as i64) as usize
        };
        self.loc = Coord::new(step(self.loc.x, dx, xdsize), step(self.loc.y, dy, ydsize));
    }

    pub fn pick_up(&mut self, block: EntityId) {
        debug_assert!(self.carrying.is_none());
        self.carrying = Some(block);
    }

    pub fn release(&mut self) -> Option<EntityId> {
        self.carrying.take()
    }

    /// Back to an empty-handed robot with an empty store at `loc`
    pub fn reset(&mut self, loc: Coord) {
        self.loc = loc;
        self.carrying = None;
        if let Some(store) = self.store.as_mut() {
            store.clear_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_roster() {
        let mut swarm = SwarmConfig::default();
        swarm.crw = 2;
        swarm.dpo = 1;
        swarm.oracular_dpo = 1;
        let roster = Profile::roster(&swarm);
        assert_eq!(roster.len(), swarm.n_robots());
        assert_eq!(roster[0], Profile::Crw);
        assert_eq!(roster[2], Profile::Dpo);
        assert!(roster[3].is_oracular());
        assert!(!Profile::Crw.has_memory());
    }

    #[test]
    fn test_random_step_stays_inside() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let perception = PerceptionConfig::default();
        let mut robot = Forager::new(0, Profile::Crw, Coord::new(0, 0), &perception);
        for _ in 0..500 {
            robot.random_step(3, 4, &mut rng);
            assert!(robot.loc().x < 3 && robot.loc().y < 4);
        }
    }

    #[test]
    fn test_sense_by_profile() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let config = Config::default();
        let arena = ArenaMap::new(&config, &mut rng).unwrap();
        let oracle = arena.oracle();
        let sync = Synchronizer::new(true);
        let loc = arena.free_blocks().next().unwrap().dloc();

        let mut crw = Forager::new(0, Profile::Crw, loc, &config.perception);
        assert!(crw.sense(&arena, &oracle, &sync, 0).is_none());

        let mut dpo = Forager::new(1, Profile::Dpo, loc, &config.perception);
        let report = dpo.sense(&arena, &oracle, &sync, 0).unwrap();
        assert!(report.verify.is_ok());
        assert!(dpo.store().unwrap().n_known_blocks() >= 1);

        let oracular = Profile::OracularDpo {
            blocks: true,
            caches: false,
        };
        let mut odpo = Forager::new(2, oracular, loc, &config.perception);
        odpo.sense(&arena, &oracle, &sync, 0);
        assert_eq!(
            odpo.store().unwrap().n_known_blocks(),
            arena.free_blocks().count()
        );

        odpo.reset(Coord::new(1, 1));
        assert_eq!(odpo.store().unwrap().n_known_blocks(), 0);
    }
}
