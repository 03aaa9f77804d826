//! Categorization orchestrator
//!
//! Sequences rules → fallback → confidence policy and records exactly one
//! audit entry per resolved decision. The entry is written last, so a call
//! that errors or is cancelled leaves nothing behind.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::ai::AIClient;
use crate::audit::AuditLedger;
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::models::{
    normalize_input, ActionTier, AuditKind, CategorizationMethod, CategoryLabel, NewAuditEntry,
};

use super::cache::{CacheStats, ClassificationCache};
use super::fallback::FallbackClassifier;
use super::policy::ConfidencePolicy;
use super::rules::RuleMatcher;

/// Largest batch accepted by `classify_batch`
pub const MAX_BATCH_SIZE: usize = 100;

/// Model name recorded for deterministic decisions
const RULES_MODEL: &str = "rules";
/// Model name recorded for manual overrides
const MANUAL_MODEL: &str = "user";

/// Resolved categorization decision
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorizationOutcome {
    pub description: String,
    pub category: CategoryLabel,
    pub confidence: f64,
    pub method: CategorizationMethod,
    pub tier: ActionTier,
    pub reasoning: String,
    pub audit_id: i64,
    /// Audit id of the decision this one replaces (overrides only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supersedes: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub timestamp: DateTime<Utc>,
}

struct Decision {
    category: CategoryLabel,
    confidence: f64,
    method: CategorizationMethod,
    reasoning: String,
    model: Option<String>,
    supersedes: Option<i64>,
}

/// Hybrid rule + model categorizer
pub struct Categorizer {
    rules: Arc<RuleMatcher>,
    fallback: FallbackClassifier,
    policy: ConfidencePolicy,
    ledger: Arc<dyn AuditLedger>,
}

impl Categorizer {
    pub fn new(
        rules: Arc<RuleMatcher>,
        fallback: FallbackClassifier,
        policy: ConfidencePolicy,
        ledger: Arc<dyn AuditLedger>,
    ) -> Self {
        Self {
            rules,
            fallback,
            policy,
            ledger,
        }
    }

    /// Default rule table, fallback, cache and policy from config
    pub fn from_config(
        config: &EngineConfig,
        ai: Option<AIClient>,
        ledger: Arc<dyn AuditLedger>,
    ) -> Result<Self> {
        let rules = RuleMatcher::with_default_rules(config.categorization.rule_confidence)?;

        let mut fallback = FallbackClassifier::from_config(ai, &config.categorization);
        if let Some(cache) = ClassificationCache::from_config(&config.cache) {
            fallback = fallback.with_cache(Arc::new(cache));
        }

        Ok(Self::new(
            Arc::new(rules),
            fallback,
            ConfidencePolicy::from(&config.policy),
            ledger,
        ))
    }

    pub fn policy(&self) -> ConfidencePolicy {
        self.policy
    }

    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.fallback.cache().map(|c| c.stats())
    }

    pub fn clear_cache(&self) {
        if let Some(cache) = self.fallback.cache() {
            cache.clear();
        }
    }

    /// Categorize one expense description
    pub async fn classify(&self, description: &str) -> Result<CategorizationOutcome> {
        let description = normalize_input(description, "description")?;
        let started = Instant::now();

        let decision = match self.rules.evaluate(description) {
            Some(hit) => {
                debug!(description, rule = %hit.rule, category = %hit.category, "Rule matched");
                Decision {
                    category: hit.category,
                    confidence: hit.confidence,
                    method: CategorizationMethod::Rule,
                    reasoning: format!("Matched pattern for {}", hit.category),
                    model: Some(RULES_MODEL.to_string()),
                    supersedes: None,
                }
            }
            None => {
                let result = self.fallback.classify(description).await;
                Decision {
                    category: result.category,
                    confidence: result.confidence,
                    method: CategorizationMethod::Fallback,
                    reasoning: result.reasoning,
                    model: result.model,
                    supersedes: None,
                }
            }
        };

        self.record(description, decision, started)
    }

    /// Replace the decision for a description with the user's choice
    pub fn override_category(
        &self,
        description: &str,
        chosen: &str,
    ) -> Result<CategorizationOutcome> {
        let description = normalize_input(description, "description")?;
        let category: CategoryLabel = chosen.parse()?;
        let started = Instant::now();

        let prior = self.ledger.latest_categorization(description)?;
        let reasoning = match prior {
            Some(ref entry) => format!(
                "Manually set to {} (was {})",
                category, entry.output_summary
            ),
            None => format!("Manually set to {}", category),
        };

        let decision = Decision {
            category,
            confidence: 1.0,
            method: CategorizationMethod::Manual,
            reasoning,
            model: Some(MANUAL_MODEL.to_string()),
            supersedes: prior.map(|e| e.id),
        };

        self.record(description, decision, started)
    }

    /// Categorize several descriptions in order, one audit entry each
    ///
    /// Every description is validated before any is classified, so a bad
    /// item rejects the whole batch without recording anything.
    pub async fn classify_batch(&self, descriptions: &[String]) -> Result<Vec<CategorizationOutcome>> {
        if descriptions.is_empty() {
            return Err(Error::Validation("descriptions must not be empty".into()));
        }
        if descriptions.len() > MAX_BATCH_SIZE {
            return Err(Error::Validation(format!(
                "at most {} descriptions per batch (got {})",
                MAX_BATCH_SIZE,
                descriptions.len()
            )));
        }
        for (i, description) in descriptions.iter().enumerate() {
            normalize_input(description, &format!("descriptions[{}]", i))?;
        }

        let mut outcomes = Vec::with_capacity(descriptions.len());
        for description in descriptions {
            outcomes.push(self.classify(description).await?);
        }
        Ok(outcomes)
    }

    fn record(
        &self,
        description: &str,
        decision: Decision,
        started: Instant,
    ) -> Result<CategorizationOutcome> {
        let tier = self.policy.tier(decision.confidence);
        let latency_ms = started.elapsed().as_millis() as i64;

        let audit_id = self.ledger.append(&NewAuditEntry {
            kind: AuditKind::Categorization,
            method: decision.method.as_str().to_string(),
            confidence: Some(decision.confidence),
            input_summary: description.to_string(),
            output_summary: decision.category.as_str().to_string(),
            model: decision.model.clone(),
            latency_ms: Some(latency_ms),
            supersedes: decision.supersedes,
        })?;

        info!(
            audit_id,
            method = decision.method.as_str(),
            category = %decision.category,
            confidence = decision.confidence,
            tier = tier.as_str(),
            "Expense categorized"
        );

        Ok(CategorizationOutcome {
            description: description.to_string(),
            category: decision.category,
            confidence: decision.confidence,
            method: decision.method,
            tier,
            reasoning: decision.reasoning,
            audit_id,
            supersedes: decision.supersedes,
            model: decision.model,
            timestamp: Utc::now(),
        })
    }
}
