//! Cache lifecycle manager.
//!
//! The manager is the single owner of every creation and depletion decision.
//! Its bookkeeping sits behind one mutex, so a check and the mutation that
//! follows it always run as one transaction even when interactions are driven
//! from several call sites.

use super::creator::{CreationResult, DynamicCacheCreator};
use super::policy::{CreationTrigger, RecreationPolicy};
use super::verifier::VerificationReport;
use crate::arena::{ArenaError, ArenaMap, CachedPickup};
use crate::config::CachesConfig;
use crate::repr::{Cache, Entity2D, EntityId, IdAllocator, RobotId};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Where a managed cache is in its life
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CacheLifecycle {
    Created,
    /// At least one block has been taken since creation
    Depleting,
    /// Fell below the minimum block count; held as a zombie until disposal
    Depleted,
}

/// Notification for the driver and metrics
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CacheEvent {
    Created { id: EntityId, t: u64 },
    Depleted { id: EntityId, t: u64 },
}

/// Result of a creation request
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CreationOutcome {
    /// Caches are disabled or the recreation policy declined the trigger
    Declined,
    /// Creation ran; `created` may be empty
    Attempted {
        created: Vec<EntityId>,
        n_discarded: usize,
        /// Verification of every cache built during the attempt, kept or not
        reports: Vec<(EntityId, VerificationReport)>,
    },
}

impl CreationOutcome {
    pub fn created(&self) -> &[EntityId] {
        match self {
            Self::Declined => &[],
            Self::Attempted { created, .. } => created,
        }
    }

    pub fn reports(&self) -> &[(EntityId, VerificationReport)] {
        match self {
            Self::Declined => &[],
            Self::Attempted { reports, .. } => reports,
        }
    }

    /// Failed checks that name a cache built during the attempt
    pub fn n_verify_failures(&self) -> usize {
        self.reports()
            .iter()
            .map(|(id, report)| report.failures_for(*id).count())
            .sum()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerMetrics {
    pub n_attempts: u64,
    pub n_declined: u64,
    pub n_created: u64,
    pub n_discarded: u64,
    pub n_verify_failures: u64,
    pub n_depleted: u64,
    pub n_block_pickups: u64,
    pub n_block_drops: u64,
}

#[derive(Debug, Default)]
struct ManagerState {
    ids: IdAllocator,
    /// Creation requested during interaction, run after all robots
    pending: Option<CreationTrigger>,
    lifecycle: BTreeMap<EntityId, CacheLifecycle>,
    metrics: ManagerMetrics,
    events: Vec<CacheEvent>,
}

pub struct CacheManager {
    enabled: bool,
    creator: DynamicCacheCreator,
    policy: Box<dyn RecreationPolicy>,
    state: Mutex<ManagerState>,
}

impl std::fmt::Debug for CacheManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheManager")
            .field("enabled", &self.enabled)
            .field("policy", &self.policy.name())
            .finish_non_exhaustive()
    }
}

impl CacheManager {
    pub fn new(config: &CachesConfig) -> Self {
        Self::with_policy(config, config.recreation.build())
    }

    pub fn with_policy(config: &CachesConfig, policy: Box<dyn RecreationPolicy>) -> Self {
        Self {
            enabled: config.enabled,
            creator: DynamicCacheCreator::new(config),
            policy,
            state: Mutex::new(ManagerState::default()),
        }
    }

    /// A panic while holding the lock leaves plain bookkeeping behind, which
    /// stays usable.
    fn state(&self) -> MutexGuard<'_, ManagerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn policy_name(&self) -> &'static str {
        self.policy.name()
    }

    pub fn metrics(&self) -> ManagerMetrics {
        self.state().metrics
    }

    pub fn lifecycle(&self, id: EntityId) -> Option<CacheLifecycle> {
        self.state().lifecycle.get(&id).copied()
    }

    /// Flag a creation attempt for the end of the step. A block drop request
    /// is never downgraded by a later ordinary one.
    pub fn request_creation(&self, trigger: CreationTrigger) {
        let mut state = self.state();
        state.pending = match (state.pending, trigger) {
            (Some(CreationTrigger::BlockDrop), _) => Some(CreationTrigger::BlockDrop),
            _ => Some(trigger),
        };
    }

    pub fn creation_pending(&self) -> Option<CreationTrigger> {
        self.state().pending
    }

    /// Run creation now if the policy accepts `trigger`. Failing to place a
    /// cache is not an error: the next qualifying trigger tries again.
    pub fn try_create(
        &self,
        arena: &mut ArenaMap,
        trigger: CreationTrigger,
        t: u64,
        rng: &mut impl Rng,
    ) -> CreationOutcome {
        let mut state = self.state();
        if !self.enabled || !self.policy.should_create(trigger) {
            state.metrics.n_declined += 1;
            log::trace!("Cache creation declined for {:?} by {}", trigger, self.policy.name());
            return CreationOutcome::Declined;
        }

        state.metrics.n_attempts += 1;
        let CreationResult {
            created,
            n_discarded,
            reports,
        } = self.creator.create_all(arena, &mut state.ids, t, rng);
        let outcome = CreationOutcome::Attempted {
            created,
            n_discarded,
            reports,
        };

        let created = outcome.created();
        state.metrics.n_created += created.len() as u64;
        state.metrics.n_discarded += n_discarded as u64;
        state.metrics.n_verify_failures += outcome.n_verify_failures() as u64;
        for id in created {
            state.lifecycle.insert(*id, CacheLifecycle::Created);
            state.events.push(CacheEvent::Created { id: *id, t });
        }
        if !created.is_empty() {
            log::info!("Created {} caches at t={}", created.len(), t);
        } else if n_discarded > 0 {
            log::warn!(
                "No cache created at t={} ({:?}, {} groups discarded)",
                t,
                trigger,
                n_discarded
            );
        } else {
            log::debug!("No cache created at t={} ({:?}): no eligible groups", t, trigger);
        }
        outcome
    }

    /// Run the creation flagged during this step, if any. Without a flag the
    /// attempt counts as an ordinary step trigger.
    pub fn process_deferred(
        &self,
        arena: &mut ArenaMap,
        t: u64,
        rng: &mut impl Rng,
    ) -> CreationOutcome {
        let trigger = self.state().pending.take().unwrap_or(CreationTrigger::Step);
        self.try_create(arena, trigger, t, rng)
    }

    /// A robot takes the oldest block of a cache
    pub fn block_pickup(
        &self,
        arena: &mut ArenaMap,
        cache: EntityId,
        robot: RobotId,
        t: u64,
        rng: &mut impl Rng,
    ) -> Result<CachedPickup, ArenaError> {
        let mut state = self.state();
        let pickup = arena.cached_block_pickup(cache, robot, t, rng)?;
        state.metrics.n_block_pickups += 1;
        if pickup.depleted {
            state.lifecycle.insert(cache, CacheLifecycle::Depleted);
            state.metrics.n_depleted += 1;
            state.events.push(CacheEvent::Depleted { id: cache, t });
            log::info!("Cache{} depleted at t={}", cache, t);
        } else {
            state.lifecycle.insert(cache, CacheLifecycle::Depleting);
        }
        Ok(pickup)
    }

    /// A robot drops its block into a cache
    pub fn block_drop(
        &self,
        arena: &mut ArenaMap,
        block: EntityId,
        cache: EntityId,
    ) -> Result<(), ArenaError> {
        let mut state = self.state();
        arena.cache_block_drop(block, cache)?;
        state.metrics.n_block_drops += 1;
        Ok(())
    }

    /// Permanently dispose of this step's zombie caches, returning their final
    /// state
    pub fn dispose_zombies(&self, arena: &mut ArenaMap) -> Vec<Cache> {
        let mut state = self.state();
        let zombies = arena.zombie_caches_clear();
        for z in &zombies {
            state.lifecycle.remove(&z.id());
        }
        zombies
    }

    pub fn drain_events(&self) -> Vec<CacheEvent> {
        std::mem::take(&mut self.state().events)
    }

    /// Forget every managed cache. Ids keep counting up so a cache id is never
    /// reused within the process.
    pub fn reset(&self) {
        let mut state = self.state();
        let ids = std::mem::take(&mut state.ids);
        *state = ManagerState {
            ids,
            ..ManagerState::default()
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caches::policy::RecreationPolicyKind;
    use crate::caches::verifier::VerifyError;
    use crate::config::Config;
    use crate::geometry::Coord;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn test_config() -> Config {
        let mut config = Config::default();
        config.arena.x_size = 20.0;
        config.arena.y_size = 20.0;
        config.arena.resolution = 1.0;
        config.arena.nests[0].center_x = 10.0;
        config.arena.nests[0].center_y = 10.0;
        config.arena.n_blocks = 20;
        config.caches.dimension = 3.0;
        config.caches.min_blocks = 2;
        config.caches.min_dist = 1.5;
        config
    }

    /// Two free blocks side by side; everything else carried by robot 0
    fn arena_with_pair(config: &Config, rng: &mut ChaCha8Rng) -> ArenaMap {
        let mut map = ArenaMap::new(config, rng).unwrap();
        for i in 0..map.n_blocks() as u32 {
            map.free_block_pickup(EntityId(i), 0, 0).unwrap();
        }
        map.free_block_drop(EntityId(0), Coord::new(4, 4)).unwrap();
        map.free_block_drop(EntityId(1), Coord::new(5, 4)).unwrap();
        map
    }

    #[test]
    fn test_depletion_then_recreation_on_drop() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let config = test_config();
        let mut map = arena_with_pair(&config, &mut rng);
        let manager = CacheManager::new(&config.caches);

        let outcome = manager.try_create(&mut map, CreationTrigger::Init, 0, &mut rng);
        assert_eq!(outcome.created(), &[EntityId(0)]);
        assert_eq!(manager.lifecycle(EntityId(0)), Some(CacheLifecycle::Created));

        // Exactly min_blocks: one pickup depletes it
        let pickup = manager
            .block_pickup(&mut map, EntityId(0), 3, 5, &mut rng)
            .unwrap();
        assert!(pickup.depleted);
        assert!(map.caches().is_empty());
        assert_eq!(manager.lifecycle(EntityId(0)), Some(CacheLifecycle::Depleted));
        assert_eq!(map.zombie_caches().len(), 1);

        // Still visible to the rest of the step, then disposed
        let zombies = manager.dispose_zombies(&mut map);
        assert_eq!(zombies[0].id(), EntityId(0));
        assert!(map.zombie_caches().is_empty());
        assert_eq!(manager.lifecycle(EntityId(0)), None);

        // No drop this step: nothing recreated
        let remaining = map.free_blocks().next().unwrap().dloc();
        assert_eq!(
            manager.process_deferred(&mut map, 6, &mut rng),
            CreationOutcome::Declined
        );
        assert!(map.caches().is_empty());

        // A drop next to the remaining block qualifies
        let drop_at = Coord::new(remaining.x + 1, remaining.y);
        map.free_block_drop(pickup.block, drop_at).unwrap();
        manager.request_creation(CreationTrigger::BlockDrop);
        let outcome = manager.process_deferred(&mut map, 7, &mut rng);
        assert_eq!(outcome.created(), &[EntityId(1)]);

        let events = manager.drain_events();
        assert_eq!(
            events,
            vec![
                CacheEvent::Created { id: EntityId(0), t: 0 },
                CacheEvent::Depleted { id: EntityId(0), t: 5 },
                CacheEvent::Created { id: EntityId(1), t: 7 },
            ]
        );
        assert!(manager.drain_events().is_empty());
    }

    #[test]
    fn test_every_step_policy_creates_without_drop() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let mut config = test_config();
        config.caches.recreation = RecreationPolicyKind::EveryStep;
        let mut map = arena_with_pair(&config, &mut rng);
        let manager = CacheManager::new(&config.caches);

        let outcome = manager.process_deferred(&mut map, 1, &mut rng);
        assert_eq!(outcome.created().len(), 1);
        assert_eq!(manager.metrics().n_attempts, 1);
    }

    #[test]
    fn test_disabled_caches_decline() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut config = test_config();
        config.caches.enabled = false;
        let mut map = arena_with_pair(&config, &mut rng);
        let manager = CacheManager::new(&config.caches);

        let outcome = manager.try_create(&mut map, CreationTrigger::Init, 0, &mut rng);
        assert_eq!(outcome, CreationOutcome::Declined);
        assert_eq!(manager.metrics().n_declined, 1);
    }

    #[test]
    fn test_pickup_drop_and_reset() {
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let mut config = test_config();
        config.caches.min_dist = 1.0;
        let mut map = ArenaMap::new(&config, &mut rng).unwrap();
        for i in 0..map.n_blocks() as u32 {
            map.free_block_pickup(EntityId(i), 0, 0).unwrap();
        }
        for (i, x) in [4usize, 5].iter().enumerate() {
            map.free_block_drop(EntityId(i as u32), Coord::new(*x, 4)).unwrap();
        }
        let manager = CacheManager::new(&config.caches);
        manager.try_create(&mut map, CreationTrigger::Init, 0, &mut rng);

        manager.block_drop(&mut map, EntityId(5), EntityId(0)).unwrap();
        assert_eq!(map.cache(EntityId(0)).unwrap().n_blocks(), 3);
        let pickup = manager
            .block_pickup(&mut map, EntityId(0), 1, 2, &mut rng)
            .unwrap();
        assert!(!pickup.depleted);
        assert_eq!(manager.lifecycle(EntityId(0)), Some(CacheLifecycle::Depleting));
        assert_eq!(manager.metrics().n_block_drops, 1);

        assert!(manager.block_drop(&mut map, EntityId(6), EntityId(42)).is_err());

        manager.request_creation(CreationTrigger::BlockDrop);
        manager.request_creation(CreationTrigger::Step);
        assert_eq!(manager.creation_pending(), Some(CreationTrigger::BlockDrop));

        manager.reset();
        assert_eq!(manager.metrics(), ManagerMetrics::default());
        assert_eq!(manager.lifecycle(EntityId(0)), None);
        assert_eq!(manager.creation_pending(), None);
        assert_eq!(manager.state().ids.peek(), EntityId(1));
    }

    #[test]
    fn test_attempt_returns_verification_reports() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let config = test_config();
        let mut map = arena_with_pair(&config, &mut rng);
        map.free_block_drop(EntityId(2), Coord::new(16, 16)).unwrap();
        map.cache_construct(EntityId(900), Coord::new(16, 16), &[EntityId(2)], 0)
            .unwrap();
        let manager = CacheManager::new(&config.caches);

        let outcome = manager.try_create(&mut map, CreationTrigger::Init, 0, &mut rng);
        assert_eq!(outcome.created(), &[EntityId(0)]);
        let reports = outcome.reports();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].0, EntityId(0));
        assert!(matches!(
            reports[0].1.failures.as_slice(),
            [VerifyError::TooFewBlocks { cache: EntityId(900), .. }]
        ));
        // Failures that belong to an older cache are not charged to this attempt
        assert_eq!(outcome.n_verify_failures(), 0);
        assert_eq!(manager.metrics().n_verify_failures, 0);
        assert!(CreationOutcome::Declined.reports().is_empty());
    }

    #[test]
    fn test_verify_failures_count_own_failures_only() {
        let own = VerifyError::NestOverlap {
            cache: EntityId(3),
            nest: EntityId(0),
        };
        let other = VerifyError::TooFewBlocks {
            cache: EntityId(1),
            n_blocks: 1,
            min_blocks: 2,
        };
        let outcome = CreationOutcome::Attempted {
            created: vec![EntityId(3)],
            n_discarded: 0,
            reports: vec![(
                EntityId(3),
                VerificationReport {
                    failures: vec![own, other],
                },
            )],
        };
        assert_eq!(outcome.n_verify_failures(), 1);
    }

    #[test]
    fn test_attempt_without_groups_discards_nothing() {
        let mut rng = ChaCha8Rng::seed_from_u64(6);
        let mut config = test_config();
        config.caches.recreation = RecreationPolicyKind::EveryStep;
        let mut map = ArenaMap::new(&config, &mut rng).unwrap();
        for i in 0..map.n_blocks() as u32 {
            map.free_block_pickup(EntityId(i), 0, 0).unwrap();
        }
        let manager = CacheManager::new(&config.caches);

        for t in 0..5 {
            let outcome = manager.process_deferred(&mut map, t, &mut rng);
            assert_eq!(
                outcome,
                CreationOutcome::Attempted {
                    created: vec![],
                    n_discarded: 0,
                    reports: vec![],
                }
            );
        }
        let metrics = manager.metrics();
        assert_eq!(metrics.n_attempts, 5);
        assert_eq!(metrics.n_discarded, 0);
    }
}
