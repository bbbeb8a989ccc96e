//! Spatial entities that live in the arena.
//!
//! - Blocks (the resource robots carry)
//! - Caches (multi-block depots created and destroyed during a run)
//! - Nests (where blocks are delivered)
//! - Block clusters (regions reserved for block distribution)

pub mod block;
pub mod cache;
pub mod cluster;
pub mod entity;
pub mod nest;

pub use block::{Block, BlockMetadata};
pub use cache::Cache;
pub use cluster::BlockCluster;
pub use entity::{Entity2D, EntityId, IdAllocator, RobotId};
pub use nest::Nest;
