//! Mock backend for testing
//!
//! Returns predictable responses without a running model server. Responses
//! can be scripted per operation, failures injected, and calls counted.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::models::{CategoryLabel, Intent};

use super::types::{ExpenseClassification, IntentClassification};
use super::AIBackend;

/// How an injected failure behaves
#[derive(Debug, Clone)]
pub enum MockFailure {
    /// Non-retryable provider error (e.g. malformed output)
    Provider(String),
    /// Retryable transport failure
    Transient,
    /// Never answers within any sane timeout
    Hang,
}

/// Mock AI backend for testing
#[derive(Clone)]
pub struct MockBackend {
    /// Whether health_check should return true
    pub healthy: bool,
    model: String,
    expense_response: Option<ExpenseClassification>,
    intent_response: Option<IntentClassification>,
    explanation_response: Option<String>,
    delay: Option<Duration>,
    failure: Option<MockFailure>,
    /// Remaining calls that fail before the mock starts answering
    failures_left: Arc<AtomicUsize>,
    expense_calls: Arc<AtomicUsize>,
    intent_calls: Arc<AtomicUsize>,
    explain_calls: Arc<AtomicUsize>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    /// Create a new mock backend (healthy, heuristic answers)
    pub fn new() -> Self {
        Self {
            healthy: true,
            model: "mock".to_string(),
            expense_response: None,
            intent_response: None,
            explanation_response: None,
            delay: None,
            failure: None,
            failures_left: Arc::new(AtomicUsize::new(0)),
            expense_calls: Arc::new(AtomicUsize::new(0)),
            intent_calls: Arc::new(AtomicUsize::new(0)),
            explain_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn unhealthy() -> Self {
        Self {
            healthy: false,
            ..Self::new()
        }
    }

    /// Create a new instance with a different model name (shares counters)
    pub fn with_model(&self, model: &str) -> Self {
        Self {
            model: model.to_string(),
            ..self.clone()
        }
    }

    /// Always answer expense classification with this triple
    pub fn with_expense_response(mut self, category: &str, confidence: f64, reasoning: &str) -> Self {
        self.expense_response = Some(ExpenseClassification {
            category: category.to_string(),
            confidence,
            reasoning: reasoning.to_string(),
        });
        self
    }

    /// Always answer intent classification with this pair
    pub fn with_intent_response(mut self, intent: &str, confidence: f64) -> Self {
        self.intent_response = Some(IntentClassification {
            intent: intent.to_string(),
            confidence,
        });
        self
    }

    /// Always answer explanation requests with this text
    pub fn with_explanation(mut self, text: &str) -> Self {
        self.explanation_response = Some(text.to_string());
        self
    }

    /// Sleep before answering every call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Fail every call
    pub fn failing(self, failure: MockFailure) -> Self {
        self.failing_times(usize::MAX, failure)
    }

    /// Fail the first `times` calls, then answer normally
    pub fn failing_times(mut self, times: usize, failure: MockFailure) -> Self {
        self.failure = Some(failure);
        self.failures_left = Arc::new(AtomicUsize::new(times));
        self
    }

    pub fn expense_calls(&self) -> usize {
        self.expense_calls.load(Ordering::SeqCst)
    }

    pub fn intent_calls(&self) -> usize {
        self.intent_calls.load(Ordering::SeqCst)
    }

    pub fn explain_calls(&self) -> usize {
        self.explain_calls.load(Ordering::SeqCst)
    }

    async fn before_call(&self) -> Result<()> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let Some(ref failure) = self.failure else {
            return Ok(());
        };
        let should_fail = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if !should_fail {
            return Ok(());
        }

        match failure {
            MockFailure::Provider(msg) => Err(Error::Provider(msg.clone())),
            MockFailure::Transient => Err(Error::ProviderTimeout(0)),
            MockFailure::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(Error::ProviderTimeout(3600))
            }
        }
    }
}

#[async_trait]
impl AIBackend for MockBackend {
    async fn classify_expense(
        &self,
        description: &str,
        _categories: &[CategoryLabel],
    ) -> Result<ExpenseClassification> {
        self.expense_calls.fetch_add(1, Ordering::SeqCst);
        self.before_call().await?;

        if let Some(ref response) = self.expense_response {
            return Ok(response.clone());
        }

        // Keywords the rule table does not cover
        let lower = description.to_lowercase();
        let (category, confidence) = match lower.as_str() {
            d if d.contains("diner") || d.contains("bistro") || d.contains("bakery") => {
                ("Food & Dining", 0.72)
            }
            d if d.contains("toll") || d.contains("ferry") => ("Transportation", 0.7),
            d if d.contains("concert") || d.contains("museum") => ("Entertainment", 0.68),
            _ => ("Other", 0.4),
        };

        Ok(ExpenseClassification {
            category: category.to_string(),
            confidence,
            reasoning: format!("Mock guess for '{}'", description),
        })
    }

    async fn classify_intent(
        &self,
        question: &str,
        _intents: &[Intent],
    ) -> Result<IntentClassification> {
        self.intent_calls.fetch_add(1, Ordering::SeqCst);
        self.before_call().await?;

        if let Some(ref response) = self.intent_response {
            return Ok(response.clone());
        }

        let lower = question.to_lowercase();
        let (intent, confidence) = if lower.contains("budget") {
            ("budget_status", 0.7)
        } else if lower.contains("spent") || lower.contains("spend") {
            ("total_spending_timeframe", 0.6)
        } else {
            ("unknown", 0.2)
        };

        Ok(IntentClassification {
            intent: intent.to_string(),
            confidence,
        })
    }

    async fn explain_result(&self, _question: &str, draft: &str, _facts: &str) -> Result<String> {
        self.explain_calls.fetch_add(1, Ordering::SeqCst);
        self.before_call().await?;

        Ok(self
            .explanation_response
            .clone()
            .unwrap_or_else(|| draft.to_string()))
    }

    async fn health_check(&self) -> bool {
        self.healthy
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn host(&self) -> &str {
        "mock://localhost"
    }
}
