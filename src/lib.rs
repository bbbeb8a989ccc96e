//! # SWARM FORAGE
//!
//! Foraging swarm core: robots that remember what they have seen with
//! decaying-pheromone relevance, and an arena that creates and retires block
//! caches at run time.
//!
//! ## Features
//!
//! - **Perception**: per-robot stores kept consistent with a line of sight,
//!   occlusion-aware eviction, optional ground-truth oracle
//! - **Caches**: conflict-free placement, creation verification, depletion
//!   with zombie tracking, pluggable recreation policy
//! - **Parallel**: robots sense concurrently via Rayon
//! - **Configurable**: YAML configuration files
//! - **Reproducible**: Seeded random number generation
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use swarm_forage::{World, Config};
//!
//! let config = Config::default();
//! let mut world = World::new(config).unwrap();
//!
//! world.run(1000);
//!
//! println!("Delivered: {}", world.stats.total_deliveries);
//! println!("Live caches: {}", world.arena.caches().len());
//! ```
//!
//! ## Configuration
//!
//! ```rust
//! use swarm_forage::Config;
//! use swarm_forage::caches::RecreationPolicyKind;
//!
//! let mut config = Config::default();
//! config.caches.min_blocks = 3;
//! config.caches.recreation = RecreationPolicyKind::EveryStep;
//! config.perception.rho = 0.05;
//! assert!(config.validate().is_ok());
//! ```

pub mod arena;
pub mod caches;
pub mod config;
pub mod distributor;
pub mod geometry;
pub mod grid;
pub mod perception;
pub mod repr;
pub mod robot;
pub mod stats;
pub mod world;

// Re-export main types
pub use arena::ArenaMap;
pub use config::Config;
pub use robot::{Forager, Profile};
pub use world::{World, WorldError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Run a quick benchmark
pub fn benchmark(steps: u64, robots: usize) -> Result<BenchmarkResult, WorldError> {
    use std::time::Instant;

    let mut config = Config::default();
    config.swarm.crw = robots / 4;
    config.swarm.dpo = robots - robots / 4;
    config.swarm.oracular_dpo = 0;

    let mut world = World::new(config)?;

    let start = Instant::now();
    world.run(steps);
    let elapsed = start.elapsed();

    Ok(BenchmarkResult {
        steps,
        robots,
        elapsed_secs: elapsed.as_secs_f64(),
        steps_per_second: steps as f64 / elapsed.as_secs_f64(),
        deliveries: world.stats.total_deliveries,
        caches_created: world.stats.total_caches_created,
    })
}

/// Benchmark result
#[derive(Debug, Clone)]
pub struct BenchmarkResult {
    pub steps: u64,
    pub robots: usize,
    pub elapsed_secs: f64,
    pub steps_per_second: f64,
    pub deliveries: u64,
    pub caches_created: u64,
}

impl std::fmt::Display for BenchmarkResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Benchmark Results ===")?;
        writeln!(f, "Steps: {}", self.steps)?;
        writeln!(f, "Robots: {}", self.robots)?;
        writeln!(f, "Time: {:.3}s", self.elapsed_secs)?;
        writeln!(f, "Speed: {:.1} steps/s", self.steps_per_second)?;
        writeln!(f, "Deliveries: {}", self.deliveries)?;
        writeln!(f, "Caches created: {}", self.caches_created)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_quick_simulation() {
        let config = Config::default();
        let mut world = World::new(config).unwrap();

        world.run(100);

        assert!(world.time == 100);
    }

    #[test]
    fn test_benchmark() {
        let result = benchmark(100, 16).unwrap();

        assert_eq!(result.steps, 100);
        assert!(result.steps_per_second > 0.0);
    }
}
