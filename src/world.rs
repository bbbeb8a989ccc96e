//! World simulation engine - main foraging loop.

use crate::arena::{ArenaError, ArenaMap};
use crate::caches::{CacheEvent, CacheManager, CreationTrigger};
use crate::config::{Config, ConfigError};
use crate::geometry::Coord;
use crate::perception::{OracleSnapshot, Synchronizer};
use crate::repr::{Entity2D, EntityId};
use crate::robot::{Forager, Profile};
use crate::stats::{Stats, StatsHistory, StepCounters};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorldError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("arena setup failed: {0}")]
    Arena(#[from] ArenaError),
}

/// The simulation world
pub struct World {
    // Swarm
    pub robots: Vec<Forager>,

    // Environment
    pub arena: ArenaMap,
    pub caches: CacheManager,

    // State
    pub time: u64,

    // Configuration
    pub config: Config,

    // Statistics
    pub stats: Stats,
    pub stats_history: StatsHistory,

    synchronizer: Synchronizer,
    counters: StepCounters,

    // Random number generator (seeded for reproducibility)
    rng: ChaCha8Rng,
    seed: u64,
}

impl World {
    /// Create a new world with the given configuration
    pub fn new(config: Config) -> Result<Self, WorldError> {
        let seed = rand::thread_rng().gen();
        Self::new_with_seed(config, seed)
    }

    /// Create a new world with a specific seed for reproducibility
    pub fn new_with_seed(config: Config, seed: u64) -> Result<Self, WorldError> {
        config.validate()?;
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let arena = ArenaMap::new(&config, &mut rng)?;

        let robots = Profile::roster(&config.swarm)
            .into_iter()
            .enumerate()
            .map(|(id, profile)| {
                let loc = Self::random_cell(&arena, &mut rng);
                Forager::new(id, profile, loc, &config.perception)
            })
            .collect();

        let mut world = Self {
            robots,
            arena,
            caches: CacheManager::new(&config.caches),
            time: 0,
            synchronizer: Synchronizer::new(config.perception.strict_verify),
            stats: Stats::new(),
            stats_history: StatsHistory::new(config.logging.stats_interval),
            config,
            counters: StepCounters::default(),
            rng,
            seed,
        };
        world.initial_caches();
        log::info!(
            "World ready: {} robots, {} caches, policy {}",
            world.robots.len(),
            world.arena.caches().len(),
            world.caches.policy_name()
        );
        Ok(world)
    }

    fn random_cell(arena: &ArenaMap, rng: &mut impl Rng) -> Coord {
        Coord::new(
            rng.gen_range(0..arena.grid().xdsize()),
            rng.gen_range(0..arena.grid().ydsize()),
        )
    }

    fn initial_caches(&mut self) {
        self.caches
            .try_create(&mut self.arena, CreationTrigger::Init, self.time, &mut self.rng);
        self.caches.drain_events();
    }

    /// Return arena, caches and every robot's memory to their initial state.
    /// Cache ids keep counting up.
    pub fn reset(&mut self) -> Result<(), WorldError> {
        self.arena = ArenaMap::new(&self.config, &mut self.rng)?;
        self.caches.reset();
        for robot in &mut self.robots {
            let loc = Self::random_cell(&self.arena, &mut self.rng);
            robot.reset(loc);
        }
        self.time = 0;
        self.stats = Stats::new();
        self.stats_history = StatsHistory::new(self.config.logging.stats_interval);
        self.initial_caches();
        log::info!("World reset");
        Ok(())
    }

    /// Main simulation step
    pub fn step(&mut self) {
        self.counters = StepCounters::default();

        // Phase 1: Parallel sensing
        self.sense();

        // Phase 2: Robot/arena interactions (sequential to avoid conflicts)
        self.interact();

        // Phase 3: Deferred cache creation
        let outcome = self
            .caches
            .process_deferred(&mut self.arena, self.time, &mut self.rng);
        self.counters.cache_verify_failures = outcome.n_verify_failures();
        for event in self.caches.drain_events() {
            match event {
                CacheEvent::Created { .. } => self.counters.caches_created += 1,
                CacheEvent::Depleted { .. } => self.counters.caches_depleted += 1,
            }
        }

        // Phase 4: Dispose of zombie caches
        self.counters.zombies_disposed = self.caches.dispose_zombies(&mut self.arena).len();

        // Phase 5: Update statistics
        self.update_stats();

        self.time += 1;
    }

    /// Every robot syncs its store against a read-only view of the arena
    fn sense(&mut self) {
        let oracle = if self.robots.iter().any(|r| r.profile().is_oracular()) {
            self.arena.oracle()
        } else {
            OracleSnapshot::default()
        };
        let arena = &self.arena;
        let sync = &self.synchronizer;
        let t = self.time;

        let reports: Vec<_> = self
            .robots
            .par_iter_mut()
            .filter_map(|robot| robot.sense(arena, &oracle, sync, t))
            .collect();

        for report in reports {
            self.counters.sync_discoveries += report.discoveries();
            self.counters.sync_evictions += report.evicted_blocks.len() + report.evicted_caches.len();
            if let Err(e) = &report.verify {
                log::error!("Perception out of sync at t={}: {}", t, e);
                self.counters.sync_failures += 1;
            }
        }
    }

    fn interact(&mut self) {
        let (xdsize, ydsize) = (self.arena.grid().xdsize(), self.arena.grid().ydsize());
        let free_drop_prob = self.config.swarm.free_drop_prob;
        for robot in &mut self.robots {
            robot.random_step(xdsize, ydsize, &mut self.rng);
            let result = match robot.carrying() {
                None => Self::try_pickup(
                    robot,
                    &mut self.arena,
                    &self.caches,
                    self.time,
                    &mut self.rng,
                    &mut self.counters,
                ),
                Some(block) => Self::try_drop(
                    robot,
                    block,
                    &mut self.arena,
                    &self.caches,
                    free_drop_prob,
                    self.time,
                    &mut self.rng,
                    &mut self.counters,
                ),
            };
            if let Err(e) = result {
                log::warn!("Robot{} interaction failed at {}: {}", robot.id, robot.loc(), e);
            }
        }
    }

    fn try_pickup(
        robot: &mut Forager,
        arena: &mut ArenaMap,
        caches: &CacheManager,
        t: u64,
        rng: &mut ChaCha8Rng,
        counters: &mut StepCounters,
    ) -> Result<(), ArenaError> {
        let loc = robot.loc();
        if let Some(cache) = arena.cache_at(loc).map(|c| c.id()) {
            let pickup = caches.block_pickup(arena, cache, robot.id, t, rng)?;
            robot.pick_up(pickup.block);
            counters.cache_pickups += 1;
        } else if let Some(block) = arena.block_at(loc).map(|b| b.id()) {
            arena.free_block_pickup(block, robot.id, t)?;
            robot.pick_up(block);
            counters.free_pickups += 1;
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn try_drop(
        robot: &mut Forager,
        block: EntityId,
        arena: &mut ArenaMap,
        caches: &CacheManager,
        free_drop_prob: f64,
        t: u64,
        rng: &mut ChaCha8Rng,
        counters: &mut StepCounters,
    ) -> Result<(), ArenaError> {
        let loc = robot.loc();
        if arena.in_nest(loc) {
            arena.nest_block_drop(block, t, rng)?;
            robot.release();
            counters.nest_drops += 1;
        } else if let Some(cache) = arena.cache_at(loc).map(|c| c.id()) {
            caches.block_drop(arena, block, cache)?;
            robot.release();
            counters.cache_drops += 1;
        } else if arena.grid().get(loc).is_some_and(|c| c.is_empty())
            && rng.gen_bool(free_drop_prob)
        {
            arena.free_block_drop(block, loc)?;
            robot.release();
            caches.request_creation(CreationTrigger::BlockDrop);
            counters.free_drops += 1;
        }
        Ok(())
    }

    /// Update statistics
    fn update_stats(&mut self) {
        self.stats.time = self.time;
        self.stats.update(&self.robots, &self.arena, self.counters);

        // Record history
        if self.time % self.config.logging.stats_interval == 0 {
            self.stats_history.record(self.stats.clone());
        }
    }

    /// Run simulation for specified number of steps
    pub fn run(&mut self, steps: u64) {
        for _ in 0..steps {
            self.step();
        }
    }

    /// Run simulation with callback for progress updates
    pub fn run_with_callback<F>(&mut self, steps: u64, mut callback: F)
    where
        F: FnMut(&World, u64),
    {
        for i in 0..steps {
            self.step();
            callback(self, i);
        }
    }

    /// Every block is free, carried or cached, exactly once
    pub fn blocks_conserved(&self) -> bool {
        self.arena.n_blocks_accounted() == self.arena.n_blocks()
    }

    /// Get seed for reproducibility
    pub fn seed(&self) -> u64 {
        self.seed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        let mut config = Config::default();
        config.arena.n_blocks = 40;
        config.swarm.crw = 4;
        config.swarm.dpo = 4;
        config.swarm.oracular_dpo = 2;
        config.swarm.free_drop_prob = 0.2;
        config
    }

    #[test]
    fn test_world_creation() {
        let config = test_config();
        let world = World::new(config.clone()).unwrap();

        assert_eq!(world.robots.len(), config.swarm.n_robots());
        assert_eq!(world.time, 0);
        assert!(world.blocks_conserved());
    }

    #[test]
    fn test_world_step() {
        let mut world = World::new_with_seed(test_config(), 7).unwrap();
        world.step();

        assert_eq!(world.time, 1);
        assert_eq!(world.stats.step.sync_failures, 0);
        assert!(world.blocks_conserved());
    }

    #[test]
    fn test_world_run() {
        let mut world = World::new_with_seed(test_config(), 11).unwrap();
        world.run(200);

        assert_eq!(world.time, 200);
        assert!(world.blocks_conserved());
        let carried = world.robots.iter().filter(|r| r.carrying().is_some()).count();
        assert_eq!(carried, world.arena.carried_blocks().count());
    }

    #[test]
    fn test_reproducibility() {
        // Sensing only touches each robot's own store, so parallel runs agree
        let config = test_config();

        let mut world1 = World::new_with_seed(config.clone(), 42).unwrap();
        let mut world2 = World::new_with_seed(config, 42).unwrap();

        world1.run(100);
        world2.run(100);

        assert_eq!(world1.stats.total_deliveries, world2.stats.total_deliveries);
        assert_eq!(world1.stats.n_caches, world2.stats.n_caches);
        assert_eq!(world1.stats.known_blocks_mean, world2.stats.known_blocks_mean);
    }

    #[test]
    fn test_reset() {
        let mut world = World::new_with_seed(test_config(), 3).unwrap();
        world.run(50);
        world.reset().unwrap();

        assert_eq!(world.time, 0);
        assert!(world.robots.iter().all(|r| r.carrying().is_none()));
        assert!(world
            .robots
            .iter()
            .filter_map(|r| r.store())
            .all(|s| s.n_known_blocks() == 0 && s.n_known_caches() == 0));
        assert_eq!(world.arena.carried_blocks().count(), 0);
        assert!(world.blocks_conserved());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = test_config();
        config.arena.resolution = 0.0;
        assert!(matches!(
            World::new_with_seed(config, 1),
            Err(WorldError::Config(_))
        ));
    }
}
