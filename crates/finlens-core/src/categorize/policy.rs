//! Confidence → action tier mapping

use crate::config::PolicyConfig;
use crate::models::ActionTier;

/// Thresholds shared by categorization decisions and query intents
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidencePolicy {
    /// Strictly above this: apply without asking
    pub auto_apply_above: f64,
    /// At or above this (and not auto): apply but flag for review
    pub flag_at_or_above: f64,
}

impl Default for ConfidencePolicy {
    fn default() -> Self {
        Self {
            auto_apply_above: 0.8,
            flag_at_or_above: 0.5,
        }
    }
}

impl From<&PolicyConfig> for ConfidencePolicy {
    fn from(config: &PolicyConfig) -> Self {
        Self {
            auto_apply_above: config.auto_apply_above,
            flag_at_or_above: config.flag_at_or_above,
        }
    }
}

impl ConfidencePolicy {
    pub fn tier(&self, confidence: f64) -> ActionTier {
        if confidence > self.auto_apply_above {
            ActionTier::AutoApply
        } else if confidence >= self.flag_at_or_above {
            ActionTier::ApplyWithFlag
        } else {
            ActionTier::RequireConfirmation
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_boundaries() {
        let policy = ConfidencePolicy::default();
        assert_eq!(policy.tier(1.0), ActionTier::AutoApply);
        assert_eq!(policy.tier(0.95), ActionTier::AutoApply);
        assert_eq!(policy.tier(0.8000001), ActionTier::AutoApply);
        assert_eq!(policy.tier(0.8), ActionTier::ApplyWithFlag);
        assert_eq!(policy.tier(0.72), ActionTier::ApplyWithFlag);
        assert_eq!(policy.tier(0.5), ActionTier::ApplyWithFlag);
        assert_eq!(policy.tier(0.4999), ActionTier::RequireConfirmation);
        assert_eq!(policy.tier(0.0), ActionTier::RequireConfirmation);
    }

    #[test]
    fn test_from_config() {
        let policy = ConfidencePolicy::from(&PolicyConfig {
            auto_apply_above: 0.9,
            flag_at_or_above: 0.6,
        });
        assert_eq!(policy.tier(0.85), ActionTier::ApplyWithFlag);
        assert_eq!(policy.tier(0.55), ActionTier::RequireConfirmation);
    }

    #[test]
    fn test_nan_requires_confirmation() {
        assert_eq!(
            ConfidencePolicy::default().tier(f64::NAN),
            ActionTier::RequireConfirmation
        );
    }
}
