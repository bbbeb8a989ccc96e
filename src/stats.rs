//! Statistics tracking for the foraging run.

use crate::arena::ArenaMap;
use crate::robot::Forager;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Events counted while a step runs
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepCounters {
    pub free_pickups: usize,
    pub free_drops: usize,
    pub cache_pickups: usize,
    pub cache_drops: usize,
    pub nest_drops: usize,
    pub caches_created: usize,
    pub caches_depleted: usize,
    pub zombies_disposed: usize,
    pub sync_discoveries: usize,
    pub sync_evictions: usize,
    pub sync_failures: usize,
    /// Failed verification checks charged to caches built this step
    pub cache_verify_failures: usize,
}

/// Statistics snapshot for a simulation step
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Stats {
    /// Current simulation time
    pub time: u64,
    pub n_robots: usize,
    /// Robots currently carrying a block
    pub n_laden: usize,
    pub free_blocks: usize,
    pub carried_blocks: usize,
    pub cached_blocks: usize,
    /// Live caches
    pub n_caches: usize,
    /// Blocks delivered to a nest since the start of the run
    pub total_deliveries: u64,
    pub total_caches_created: u64,
    pub total_caches_depleted: u64,
    /// Mean number of blocks known per robot with memory
    pub known_blocks_mean: f64,
    /// Mean number of caches known per robot with memory
    pub known_caches_mean: f64,
    pub block_relevance_mean: f64,
    pub cache_relevance_mean: f64,
    /// This step's events
    pub step: StepCounters,
    /// Steps per second (performance)
    pub steps_per_second: f32,
}

impl Stats {
    /// Create new empty stats
    pub fn new() -> Self {
        Self::default()
    }

    /// Update stats from current simulation state
    pub fn update(&mut self, robots: &[Forager], arena: &ArenaMap, step: StepCounters) {
        self.n_robots = robots.len();
        self.n_laden = robots.iter().filter(|r| r.carrying().is_some()).count();

        self.free_blocks = arena.free_blocks().count();
        self.carried_blocks = arena.carried_blocks().count();
        self.cached_blocks = arena.caches().iter().map(|c| c.n_blocks()).sum();
        self.n_caches = arena.caches().len();

        self.total_deliveries += step.nest_drops as u64;
        self.total_caches_created += step.caches_created as u64;
        self.total_caches_depleted += step.caches_depleted as u64;
        self.step = step;

        let stores: Vec<_> = robots.iter().filter_map(|r| r.store()).collect();
        if stores.is_empty() {
            self.known_blocks_mean = 0.0;
            self.known_caches_mean = 0.0;
            self.block_relevance_mean = 0.0;
            self.cache_relevance_mean = 0.0;
        } else {
            let n = stores.len() as f64;
            self.known_blocks_mean = stores.iter().map(|s| s.n_known_blocks()).sum::<usize>() as f64 / n;
            self.known_caches_mean = stores.iter().map(|s| s.n_known_caches()).sum::<usize>() as f64 / n;
            self.block_relevance_mean = stores.iter().map(|s| s.avg_block_relevance()).sum::<f64>() / n;
            self.cache_relevance_mean = stores.iter().map(|s| s.avg_cache_relevance()).sum::<f64>() / n;
        }
    }

    /// Record wall-clock speed over `steps` steps
    pub fn record_speed(&mut self, steps: u64, elapsed: Duration) {
        let secs = elapsed.as_secs_f64();
        self.steps_per_second = if secs > 0.0 {
            (steps as f64 / secs) as f32
        } else {
            0.0
        };
    }

    /// Save stats to JSON file
    pub fn save_json(&self, path: &str) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
    }

    /// Load stats from JSON file
    pub fn load_json(path: &str) -> std::io::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// Format stats as a one-line summary
    pub fn summary(&self) -> String {
        format!(
            "T:{:6} | Free:{:4} | Carried:{:3} | Caches:{:3} ({:4} blk) | Delivered:{:5} | Known:{:.1}/{:.1} | Rel:{:.3}",
            self.time,
            self.free_blocks,
            self.carried_blocks,
            self.n_caches,
            self.cached_blocks,
            self.total_deliveries,
            self.known_blocks_mean,
            self.known_caches_mean,
            self.block_relevance_mean,
        )
    }
}

/// Historical statistics tracker
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StatsHistory {
    /// All recorded stats snapshots
    pub snapshots: Vec<Stats>,
    /// Recording interval
    pub interval: u64,
}

impl StatsHistory {
    /// Create new history with recording interval
    pub fn new(interval: u64) -> Self {
        Self {
            snapshots: Vec::new(),
            interval,
        }
    }

    /// Record a stats snapshot
    pub fn record(&mut self, stats: Stats) {
        self.snapshots.push(stats);
    }

    /// Get stats at a specific time (approximate)
    pub fn get_at(&self, time: u64) -> Option<&Stats> {
        let index = (time / self.interval.max(1)) as usize;
        self.snapshots.get(index)
    }

    /// Deliveries over time
    pub fn delivery_series(&self) -> Vec<(u64, u64)> {
        self.snapshots
            .iter()
            .map(|s| (s.time, s.total_deliveries))
            .collect()
    }

    /// Live cache count over time
    pub fn cache_series(&self) -> Vec<(u64, usize)> {
        self.snapshots.iter().map(|s| (s.time, s.n_caches)).collect()
    }

    /// Mean block relevance over time
    pub fn relevance_series(&self) -> Vec<(u64, f64)> {
        self.snapshots
            .iter()
            .map(|s| (s.time, s.block_relevance_mean))
            .collect()
    }

    /// Save history to file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let json = serde_json::to_string(self)?;
        std::fs::write(path, json)
    }

    /// Load history from file
    pub fn load(path: &str) -> std::io::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::geometry::Coord;
    use crate::robot::Profile;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_record_speed() {
        let mut stats = Stats::new();
        stats.record_speed(500, Duration::from_millis(250));
        assert_eq!(stats.steps_per_second, 2000.0);

        let json = serde_json::to_string(&stats).unwrap();
        let loaded: Stats = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded.steps_per_second, 2000.0);

        stats.record_speed(10, Duration::ZERO);
        assert_eq!(stats.steps_per_second, 0.0);
    }

    #[test]
    fn test_stats_update() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let config = Config::default();
        let arena = ArenaMap::new(&config, &mut rng).unwrap();
        let robots = vec![
            Forager::new(0, Profile::Crw, Coord::new(1, 1), &config.perception),
            Forager::new(1, Profile::Dpo, Coord::new(2, 2), &config.perception),
        ];

        let mut stats = Stats::new();
        let step = StepCounters {
            nest_drops: 2,
            ..StepCounters::default()
        };
        stats.update(&robots, &arena, step);
        stats.update(&robots, &arena, step);

        assert_eq!(stats.n_robots, 2);
        assert_eq!(stats.free_blocks, config.arena.n_blocks);
        assert_eq!(stats.total_deliveries, 4);
        assert_eq!(stats.known_blocks_mean, 0.0);
    }

    #[test]
    fn test_stats_history() {
        let mut history = StatsHistory::new(10);

        for i in 0..5 {
            let mut stats = Stats::new();
            stats.time = i * 10;
            stats.total_deliveries = (i + 1) * 100;
            history.record(stats);
        }

        let series = history.delivery_series();
        assert_eq!(series.len(), 5);
        assert_eq!(series[0], (0, 100));
        assert_eq!(series[4], (40, 500));
        assert_eq!(history.get_at(25).map(|s| s.time), Some(20));
    }
}
