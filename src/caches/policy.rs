//! Recreation policies: whether a creation attempt may run for a given trigger.

use serde::{Deserialize, Serialize};

/// What prompted a creation attempt
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CreationTrigger {
    /// Arena initialization
    Init,
    /// End of an ordinary step
    Step,
    /// A robot dropped a free block this step
    BlockDrop,
}

pub trait RecreationPolicy: Send + Sync {
    fn should_create(&self, trigger: CreationTrigger) -> bool;

    fn name(&self) -> &'static str;
}

/// Caches appear only after a free block drop (and at initialization)
#[derive(Clone, Copy, Debug, Default)]
pub struct OnDropOnly;

impl RecreationPolicy for OnDropOnly {
    fn should_create(&self, trigger: CreationTrigger) -> bool {
        matches!(trigger, CreationTrigger::Init | CreationTrigger::BlockDrop)
    }

    fn name(&self) -> &'static str {
        "on_drop_only"
    }
}

/// Caches may appear on any trigger
#[derive(Clone, Copy, Debug, Default)]
pub struct Spontaneous;

impl RecreationPolicy for Spontaneous {
    fn should_create(&self, _trigger: CreationTrigger) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "every_step"
    }
}

/// Configurable policy selector
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecreationPolicyKind {
    #[default]
    OnDropOnly,
    EveryStep,
}

impl RecreationPolicyKind {
    pub fn build(self) -> Box<dyn RecreationPolicy> {
        match self {
            Self::OnDropOnly => Box::new(OnDropOnly),
            Self::EveryStep => Box::new(Spontaneous),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policies() {
        let drop_only = RecreationPolicyKind::OnDropOnly.build();
        assert!(drop_only.should_create(CreationTrigger::BlockDrop));
        assert!(drop_only.should_create(CreationTrigger::Init));
        assert!(!drop_only.should_create(CreationTrigger::Step));

        let every = RecreationPolicyKind::EveryStep.build();
        assert!(every.should_create(CreationTrigger::Step));
        assert_eq!(every.name(), "every_step");
    }
}
