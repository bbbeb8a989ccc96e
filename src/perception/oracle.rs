//! Ground-truth feed for oracular robots.

use super::store::PerceptualStore;
use crate::repr::{Block, Cache, Entity2D, EntityId};
use std::collections::BTreeSet;

/// Every free block and live cache in the arena at one instant
#[derive(Clone, Debug, Default)]
pub struct OracleSnapshot {
    blocks: Vec<Block>,
    caches: Vec<Cache>,
}

impl OracleSnapshot {
    pub fn new(blocks: Vec<Block>, caches: Vec<Cache>) -> Self {
        Self { blocks, caches }
    }

    /// Restrict the snapshot to the categories a robot is entitled to
    pub fn feed(&self, blocks: bool, caches: bool) -> OracleFeed<'_> {
        OracleFeed {
            blocks: blocks.then_some(self.blocks.as_slice()),
            caches: caches.then_some(self.caches.as_slice()),
        }
    }
}

/// The part of an [`OracleSnapshot`] one robot receives
#[derive(Clone, Copy, Debug, Default)]
pub struct OracleFeed<'a> {
    pub blocks: Option<&'a [Block]>,
    pub caches: Option<&'a [Cache]>,
}

impl OracleFeed<'_> {
    pub fn blocks_enabled(&self) -> bool {
        self.blocks.is_some()
    }

    pub fn caches_enabled(&self) -> bool {
        self.caches.is_some()
    }

    /// Bring each enabled category of the store in line with ground truth:
    /// every entity in the feed is upserted and tracked entities absent from it
    /// are dropped.
    pub fn apply(&self, store: &mut PerceptualStore) {
        if let Some(caches) = self.caches {
            let live: BTreeSet<EntityId> = caches.iter().map(|c| c.id()).collect();
            let gone: Vec<EntityId> = store
                .known_caches()
                .map(|t| t.id())
                .filter(|id| !live.contains(id))
                .collect();
            for id in gone {
                store.cache_remove(id);
            }
            for cache in caches {
                store.cache_upsert(cache.clone());
            }
            log::trace!("Oracle supplied {} caches", caches.len());
        }
        if let Some(blocks) = self.blocks {
            let live: BTreeSet<EntityId> = blocks.iter().map(|b| b.id()).collect();
            let gone: Vec<EntityId> = store
                .known_blocks()
                .map(|t| t.id())
                .filter(|id| !live.contains(id))
                .collect();
            for id in gone {
                store.block_remove(id);
            }
            // Free blocks never share a cell, so the per-block cell scan is skipped
            let n = store.block_upsert_batch(blocks);
            log::trace!("Oracle supplied {} blocks", n);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Coord;

    #[test]
    fn test_feed_replaces_category() {
        let mut store = PerceptualStore::new(0.1, false);
        store.block_upsert(Block::new(EntityId(40), Coord::new(9, 9), 1.0));

        let snapshot = OracleSnapshot::new(
            vec![
                Block::new(EntityId(1), Coord::new(1, 1), 1.0),
                Block::new(EntityId(2), Coord::new(2, 1), 1.0),
            ],
            vec![],
        );
        snapshot.feed(true, false).apply(&mut store);
        assert_eq!(store.n_known_blocks(), 2);
        assert!(!store.contains_block(EntityId(40)));

        let none = snapshot.feed(false, false);
        assert!(!none.blocks_enabled() && !none.caches_enabled());
    }

    #[test]
    fn test_block_feed_matches_by_id() {
        let mut store = PerceptualStore::new(0.1, false);
        store.block_upsert(Block::new(EntityId(1), Coord::new(4, 4), 1.0));
        store.block_upsert(Block::new(EntityId(2), Coord::new(5, 5), 1.0));
        store.cache_upsert(Cache::new(
            EntityId(7),
            Coord::new(8, 8),
            3.0,
            1.0,
            vec![Block::new(EntityId(30), Coord::new(8, 8), 1.0)],
            0,
        ));

        // Block 1 moved onto block 2's old cell, block 2 moved onto the cache host
        let snapshot = OracleSnapshot::new(
            vec![
                Block::new(EntityId(1), Coord::new(5, 5), 1.0),
                Block::new(EntityId(2), Coord::new(8, 8), 1.0),
            ],
            vec![],
        );
        snapshot.feed(true, false).apply(&mut store);

        assert_eq!(store.n_known_blocks(), 2);
        assert_eq!(store.find_block(EntityId(1)).unwrap().ent().dloc(), Coord::new(5, 5));
        assert_eq!(store.find_block(EntityId(2)).unwrap().ent().dloc(), Coord::new(8, 8));
        assert!(!store.contains_cache(EntityId(7)));
    }
}
