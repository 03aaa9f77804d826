//! Language-model fallback for descriptions no rule matches
//!
//! The classifier never returns an error: provider failures become
//! `Other` with confidence 0 and the failure reason in `reasoning`.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::ai::{call_with_retry, AIBackend, AIClient, ExpenseClassification};
use crate::config::CategorizationConfig;
use crate::error::Error;
use crate::models::CategoryLabel;

use super::cache::{CachedClassification, ClassificationCache};

/// Outcome of a fallback classification
#[derive(Debug, Clone, PartialEq)]
pub struct FallbackResult {
    pub category: CategoryLabel,
    pub confidence: f64,
    pub reasoning: String,
    /// Model that answered (None when no provider was reached)
    pub model: Option<String>,
    /// False when the provider failed and the default was used
    pub succeeded: bool,
    pub cached: bool,
}

impl FallbackResult {
    fn failed(reason: String) -> Self {
        Self {
            category: CategoryLabel::Other,
            confidence: 0.0,
            reasoning: reason,
            model: None,
            succeeded: false,
            cached: false,
        }
    }
}

/// Fallback classifier wrapping an optional AI client and cache
pub struct FallbackClassifier {
    ai: Option<AIClient>,
    timeout: Duration,
    invalid_label_confidence: f64,
    cache: Option<Arc<ClassificationCache>>,
}

impl FallbackClassifier {
    pub fn new(ai: Option<AIClient>, timeout: Duration) -> Self {
        Self {
            ai,
            timeout,
            invalid_label_confidence: 0.3,
            cache: None,
        }
    }

    pub fn from_config(ai: Option<AIClient>, config: &CategorizationConfig) -> Self {
        Self {
            invalid_label_confidence: config.invalid_label_confidence,
            ..Self::new(ai, config.fallback_timeout)
        }
    }

    pub fn with_cache(mut self, cache: Arc<ClassificationCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn cache(&self) -> Option<&Arc<ClassificationCache>> {
        self.cache.as_ref()
    }

    pub fn model(&self) -> Option<&str> {
        self.ai.as_ref().map(|ai| ai.model())
    }

    /// Classify a description the rules did not match
    pub async fn classify(&self, description: &str) -> FallbackResult {
        if let Some(hit) = self.cache.as_ref().and_then(|c| c.get(description)) {
            debug!(description, category = %hit.category, "Fallback cache hit");
            return FallbackResult {
                category: hit.category,
                confidence: hit.confidence,
                reasoning: format!("{} (cached)", hit.reasoning),
                model: hit.model,
                succeeded: true,
                cached: true,
            };
        }

        let Some(ref ai) = self.ai else {
            return FallbackResult::failed("AI backend not configured".to_string());
        };

        let response = call_with_retry(self.timeout, || {
            ai.classify_expense(description, &CategoryLabel::ALL)
        })
        .await;

        match response {
            Ok(raw) => {
                let result = self.coerce(raw, ai.model());
                if let Some(ref cache) = self.cache {
                    cache.insert(
                        description,
                        CachedClassification {
                            category: result.category,
                            confidence: result.confidence,
                            reasoning: result.reasoning.clone(),
                            model: result.model.clone(),
                        },
                    );
                }
                result
            }
            Err(e) => {
                warn!(description, error = %e, "AI categorization failed, defaulting to Other");
                let reason = match e {
                    Error::ProviderTimeout(_) => {
                        format!("AI provider timed out after {}s", self.timeout.as_secs())
                    }
                    other => format!("AI error: {}", other),
                };
                FallbackResult::failed(reason)
            }
        }
    }

    /// Map the model's answer onto the closed taxonomy
    fn coerce(&self, raw: ExpenseClassification, model: &str) -> FallbackResult {
        let confidence = clamp_unit(raw.confidence);

        match CategoryLabel::parse(&raw.category) {
            Some(category) => FallbackResult {
                category,
                confidence,
                reasoning: if raw.reasoning.trim().is_empty() {
                    "AI categorization".to_string()
                } else {
                    raw.reasoning
                },
                model: Some(model.to_string()),
                succeeded: true,
                cached: false,
            },
            None => {
                warn!(label = %raw.category, "AI suggested a category outside the taxonomy");
                FallbackResult {
                    category: CategoryLabel::Other,
                    confidence: confidence.min(self.invalid_label_confidence),
                    reasoning: format!(
                        "Unknown category '{}' suggested, defaulted to Other",
                        raw.category
                    ),
                    model: Some(model.to_string()),
                    succeeded: true,
                    cached: false,
                }
            }
        }
    }
}

/// Clamp into [0, 1]; NaN becomes 0
pub(crate) fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{MockBackend, MockFailure};

    fn classifier(mock: MockBackend) -> FallbackClassifier {
        FallbackClassifier::new(Some(AIClient::Mock(mock)), Duration::from_secs(2))
    }

    #[tokio::test]
    async fn test_valid_label_passes_through() {
        let mock = MockBackend::new().with_expense_response("Food & Dining", 0.72, "diner");
        let result = classifier(mock.clone()).classify("obscure diner").await;

        assert_eq!(result.category, CategoryLabel::FoodDining);
        assert!((result.confidence - 0.72).abs() < 1e-9);
        assert_eq!(result.reasoning, "diner");
        assert_eq!(result.model.as_deref(), Some("mock"));
        assert!(result.succeeded);
        assert_eq!(mock.expense_calls(), 1);
    }

    #[tokio::test]
    async fn test_invented_label_coerced_to_other() {
        let mock = MockBackend::new().with_expense_response("Snacks", 0.9, "chips");
        let result = classifier(mock).classify("chips").await;

        assert_eq!(result.category, CategoryLabel::Other);
        assert!((result.confidence - 0.3).abs() < 1e-9);
        assert!(result.reasoning.contains("Snacks"));
    }

    #[tokio::test]
    async fn test_invented_label_keeps_lower_confidence() {
        let mock = MockBackend::new().with_expense_response("Snacks", 0.1, "");
        let result = classifier(mock).classify("chips").await;
        assert!((result.confidence - 0.1).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_confidence_clamped() {
        let mock = MockBackend::new().with_expense_response("Travel", 7.5, "sure");
        let result = classifier(mock).classify("ferry").await;
        assert_eq!(result.confidence, 1.0);

        let mock = MockBackend::new().with_expense_response("Travel", -2.0, "unsure");
        let result = classifier(mock).classify("ferry").await;
        assert_eq!(result.confidence, 0.0);
    }

    #[tokio::test]
    async fn test_provider_error_defaults_to_other() {
        let mock = MockBackend::new().failing(MockFailure::Provider("garbled".into()));
        let result = classifier(mock.clone()).classify("thing").await;

        assert_eq!(result.category, CategoryLabel::Other);
        assert_eq!(result.confidence, 0.0);
        assert!(!result.succeeded);
        assert!(result.reasoning.contains("garbled"));
        // Malformed output is not retried
        assert_eq!(mock.expense_calls(), 1);
    }

    #[tokio::test]
    async fn test_timeout_defaults_to_other_after_one_retry() {
        let mock = MockBackend::new().failing(MockFailure::Hang);
        let classifier =
            FallbackClassifier::new(Some(AIClient::Mock(mock.clone())), Duration::from_millis(20));
        let result = classifier.classify("thing").await;

        assert_eq!(result.category, CategoryLabel::Other);
        assert_eq!(result.confidence, 0.0);
        assert!(result.reasoning.contains("timed out"));
        assert_eq!(mock.expense_calls(), 2);
    }

    #[tokio::test]
    async fn test_no_backend_configured() {
        let classifier = FallbackClassifier::new(None, Duration::from_secs(1));
        let result = classifier.classify("thing").await;
        assert_eq!(result.category, CategoryLabel::Other);
        assert_eq!(result.reasoning, "AI backend not configured");
        assert!(classifier.model().is_none());
    }

    #[tokio::test]
    async fn test_cache_serves_repeat_descriptions() {
        let mock = MockBackend::new().with_expense_response("Food & Dining", 0.72, "diner");
        let cache = Arc::new(ClassificationCache::new(Duration::from_secs(60), 100));
        let classifier = classifier(mock.clone()).with_cache(cache.clone());

        let first = classifier.classify("Obscure Diner").await;
        let second = classifier.classify("obscure diner ").await;

        assert!(!first.cached);
        assert!(second.cached);
        assert_eq!(second.reasoning, "diner (cached)");
        assert_eq!(second.category, CategoryLabel::FoodDining);
        assert_eq!(mock.expense_calls(), 1);
        assert_eq!(cache.stats().hits, 1);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let mock = MockBackend::new().failing_times(2, MockFailure::Provider("down".into()));
        let cache = Arc::new(ClassificationCache::new(Duration::from_secs(60), 100));
        let classifier = classifier(mock.clone()).with_cache(cache.clone());

        classifier.classify("thing").await;
        assert_eq!(cache.stats().size, 0);
    }

    #[test]
    fn test_clamp_unit() {
        assert_eq!(clamp_unit(f64::NAN), 0.0);
        assert_eq!(clamp_unit(0.42), 0.42);
        assert_eq!(clamp_unit(f64::INFINITY), 1.0);
    }
}
