//! Dynamic cache lifecycle.
//!
//! - [`center`]: choose a conflict-free centre for a new cache
//! - [`verifier`]: sanity checks over the set of live caches
//! - [`creator`]: turn groups of nearby free blocks into caches
//! - [`policy`]: when (re)creation may happen
//! - [`manager`]: the single owner that serializes all of the above

pub mod center;
pub mod creator;
pub mod manager;
pub mod policy;
pub mod verifier;

pub use center::CacheCenterCalculator;
pub use creator::{CreationResult, DynamicCacheCreator};
pub use manager::{CacheEvent, CacheLifecycle, CacheManager, CreationOutcome, ManagerMetrics};
pub use policy::{CreationTrigger, OnDropOnly, RecreationPolicy, RecreationPolicyKind, Spontaneous};
pub use verifier::{CreationVerifier, VerificationReport, VerifyError};
