//! Per-robot perceptual world model.
//!
//! Each DPO robot keeps a [`PerceptualStore`] of the blocks and caches it has
//! seen. Every entry carries a decaying pheromone density: it is topped up when
//! the entity is seen again and fades otherwise. Once per step the
//! [`Synchronizer`] reconciles the store with what the robot can currently see
//! ([`LineOfSight`]) and, for oracular robots, with ground truth
//! ([`OracleSnapshot`]).

pub mod decay;
pub mod los;
pub mod oracle;
pub mod store;
pub mod sync;
pub mod tracked;

pub use decay::PheromoneDensity;
pub use los::LineOfSight;
pub use oracle::{OracleFeed, OracleSnapshot};
pub use store::{PerceptualStore, StoreUpdate};
pub use sync::{SyncError, SyncReport, Synchronizer};
pub use tracked::Tracked;
