//! Configuration system for the foraging simulation.
//!
//! Supports YAML configuration files with sensible defaults.

use crate::caches::policy::RecreationPolicyKind;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors raised while loading or validating a configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub arena: ArenaConfig,
    #[serde(default)]
    pub caches: CachesConfig,
    #[serde(default)]
    pub perception: PerceptionConfig,
    #[serde(default)]
    pub swarm: SwarmConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Arena geometry and block population
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaConfig {
    /// Arena width (real units)
    pub x_size: f64,
    /// Arena height (real units)
    pub y_size: f64,
    /// Edge length of one grid cell
    pub resolution: f64,
    /// Delivery areas
    pub nests: Vec<NestConfig>,
    /// Number of blocks in the arena
    pub n_blocks: usize,
    /// How blocks are scattered
    pub distribution: DistributionConfig,
}

/// A rectangular nest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NestConfig {
    pub center_x: f64,
    pub center_y: f64,
    pub x_dim: f64,
    pub y_dim: f64,
}

/// Block distribution strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DistributionConfig {
    /// Uniformly over empty cells
    Random,
    /// Into square clusters of `cluster_dim` cells per side
    Clustered { n_clusters: usize, cluster_dim: usize },
}

/// Dynamic cache creation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CachesConfig {
    /// Create caches at all
    pub enabled: bool,
    /// Cache edge length (real units), normalized to an odd number of cells
    pub dimension: f64,
    /// Fewest blocks a cache may hold
    pub min_blocks: usize,
    /// Grouping radius for seeding a cache from free blocks
    pub min_dist: f64,
    /// Discard caches that fail verification instead of keeping them
    pub strict_constraints: bool,
    /// When to attempt (re)creation
    pub recreation: RecreationPolicyKind,
    /// Bound on center deconfliction passes
    pub max_deconflict_attempts: usize,
}

/// Per-robot perceptual store
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PerceptionConfig {
    /// Pheromone decay rate per step, in [0, 1)
    pub rho: f64,
    /// Re-observation deposits pheromone instead of resetting to 1
    pub repeat_deposit: bool,
    /// Line-of-sight window edge (cells)
    pub los_dim: usize,
    /// Panic on post-sync invariant violations (debug builds only)
    pub strict_verify: bool,
}

/// Swarm composition
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SwarmConfig {
    /// Robots without memory
    pub crw: usize,
    /// Robots with a perceptual store
    pub dpo: usize,
    /// Robots with a perceptual store and an oracle feed
    pub oracular_dpo: usize,
    /// What the oracle reveals to oracular robots
    pub oracle: OracleConfig,
    /// Chance per step that a laden robot drops its block outside the nest
    pub free_drop_prob: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    pub blocks: bool,
    pub caches: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Steps between stats logging
    pub stats_interval: u64,
    /// Log level (error, warn, info, debug, trace)
    pub log_level: String,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            x_size: 24.0,
            y_size: 12.0,
            resolution: 0.2,
            nests: vec![NestConfig {
                center_x: 12.0,
                center_y: 6.0,
                x_dim: 2.0,
                y_dim: 2.0,
            }],
            n_blocks: 100,
            distribution: DistributionConfig::Random,
        }
    }
}

impl Default for CachesConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dimension: 0.6,
            min_blocks: 2,
            min_dist: 1.0,
            strict_constraints: true,
            recreation: RecreationPolicyKind::OnDropOnly,
            max_deconflict_attempts: 100,
        }
    }
}

impl Default for PerceptionConfig {
    fn default() -> Self {
        Self {
            rho: 0.01,
            repeat_deposit: false,
            los_dim: 7,
            strict_verify: true,
        }
    }
}

impl Default for SwarmConfig {
    fn default() -> Self {
        Self {
            crw: 4,
            dpo: 8,
            oracular_dpo: 0,
            oracle: OracleConfig::default(),
            free_drop_prob: 0.02,
        }
    }
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            blocks: true,
            caches: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            stats_interval: 50,
            log_level: "info".to_string(),
        }
    }
}

impl ArenaConfig {
    /// Grid size in cells: (x, y)
    pub fn dsize(&self) -> (usize, usize) {
        (
            (self.x_size / self.resolution).round() as usize,
            (self.y_size / self.resolution).round() as usize,
        )
    }
}

impl CachesConfig {
    /// Cache edge in cells: the configured dimension rounded to whole cells,
    /// less one if even so the cache has a centre cell.
    pub fn ddim(&self, resolution: f64) -> usize {
        let n = ((self.dimension / resolution).round() as usize).max(1);
        if n % 2 == 0 {
            n - 1
        } else {
            n
        }
    }

    /// Cache edge (real units) after normalization
    pub fn normalized_dimension(&self, resolution: f64) -> f64 {
        self.ddim(resolution) as f64 * resolution
    }
}

impl SwarmConfig {
    pub fn n_robots(&self) -> usize {
        self.crw + self.dpo + self.oracular_dpo
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a YAML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| -> Result<(), ConfigError> {
            Err(ConfigError::Invalid(msg.to_string()))
        };
        let arena = &self.arena;

        if arena.x_size <= 0.0 || arena.y_size <= 0.0 {
            return invalid("arena sizes must be > 0");
        }
        if arena.resolution <= 0.0 {
            return invalid("resolution must be > 0");
        }
        let (xd, yd) = arena.dsize();
        if xd == 0 || yd == 0 {
            return invalid("arena must span at least one cell per axis");
        }
        if arena.n_blocks >= xd * yd {
            return invalid("n_blocks must be smaller than the number of cells");
        }
        for nest in &arena.nests {
            let inside = nest.x_dim > 0.0
                && nest.y_dim > 0.0
                && nest.center_x - nest.x_dim / 2.0 >= 0.0
                && nest.center_y - nest.y_dim / 2.0 >= 0.0
                && nest.center_x + nest.x_dim / 2.0 <= arena.x_size
                && nest.center_y + nest.y_dim / 2.0 <= arena.y_size;
            if !inside {
                return invalid("nests must have a positive extent inside the arena");
            }
        }
        if let DistributionConfig::Clustered {
            n_clusters,
            cluster_dim,
        } = arena.distribution
        {
            if n_clusters == 0 || cluster_dim == 0 {
                return invalid("clustered distribution needs n_clusters and cluster_dim > 0");
            }
            if n_clusters * cluster_dim * cluster_dim < arena.n_blocks {
                return invalid("clusters cannot hold n_blocks");
            }
        }

        let caches = &self.caches;
        if caches.dimension < arena.resolution {
            return invalid("cache dimension must be >= resolution");
        }
        if caches.min_blocks < 2 {
            return invalid("min_blocks must be >= 2");
        }
        if caches.min_dist <= 0.0 {
            return invalid("min_dist must be > 0");
        }
        if caches.max_deconflict_attempts == 0 {
            return invalid("max_deconflict_attempts must be >= 1");
        }

        let perception = &self.perception;
        if !(0.0..1.0).contains(&perception.rho) {
            return invalid("rho must be in [0, 1)");
        }
        if perception.los_dim == 0 {
            return invalid("los_dim must be >= 1");
        }

        if !(0.0..=1.0).contains(&self.swarm.free_drop_prob) {
            return invalid("free_drop_prob must be in [0, 1]");
        }
        if self.swarm.n_robots() == 0 {
            return invalid("swarm must contain at least one robot");
        }
        if self.logging.stats_interval == 0 {
            return invalid("stats_interval must be > 0");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_roundtrip() {
        let mut config = Config::default();
        config.arena.distribution = DistributionConfig::Clustered {
            n_clusters: 4,
            cluster_dim: 6,
        };
        config.caches.recreation = RecreationPolicyKind::EveryStep;
        let yaml = serde_yaml::to_string(&config).unwrap();
        let loaded: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(config.arena.distribution, loaded.arena.distribution);
        assert_eq!(loaded.caches.recreation, RecreationPolicyKind::EveryStep);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config: Config = serde_yaml::from_str("caches:\n  min_blocks: 3\n").unwrap();
        assert_eq!(config.caches.min_blocks, 3);
        assert_eq!(config.caches.max_deconflict_attempts, 100);
        assert_eq!(config.perception.los_dim, 7);
    }

    #[test]
    fn test_dimension_normalized_to_odd_cells() {
        let mut caches = CachesConfig::default();
        caches.dimension = 0.8;
        assert_eq!(caches.ddim(0.2), 3);
        caches.dimension = 1.0;
        assert_eq!(caches.ddim(0.2), 5);
        assert!((caches.normalized_dimension(0.2) - 1.0).abs() < 1e-9);
        caches.dimension = 0.2;
        assert_eq!(caches.ddim(0.2), 1);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = Config::default();
        config.caches.min_blocks = 1;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.perception.rho = 1.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.caches.max_deconflict_attempts = 0;
        assert!(config.validate().is_err());
    }
}
