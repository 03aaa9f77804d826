//! Pluggable language-model backend abstraction
//!
//! The categorization and query engines only ever talk to a model through
//! this interface. Model output is treated as a suggestion: the engines map
//! it back onto the closed label and intent sets themselves.
//!
//! # Architecture
//!
//! - `AIBackend` trait: the three model-assisted operations plus health info
//! - `AIClient` enum: concrete wrapper providing Clone + compile-time dispatch
//! - Backend implementations: `OllamaBackend`, `OpenAICompatibleBackend`, `MockBackend`
//!
//! # Configuration
//!
//! Environment variables:
//! - `AI_BACKEND`: Backend to use (ollama, openai_compatible, mock). Default: ollama
//! - `OLLAMA_HOST`: Ollama server URL (required for ollama backend)
//! - `OLLAMA_MODEL`: Default model name (default: llama3.2)
//! - `OPENAI_COMPATIBLE_HOST`: Server URL (required for openai_compatible backend)
//! - `OPENAI_COMPATIBLE_MODEL`: Model name (default: gpt-3.5-turbo)
//! - `OPENAI_COMPATIBLE_API_KEY`: API key if required (optional)

mod mock;
mod ollama;
mod openai_compatible;
pub mod parsing;
pub mod types;

pub use mock::{MockBackend, MockFailure};
pub use ollama::OllamaBackend;
pub use openai_compatible::OpenAICompatibleBackend;
pub use types::*;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::models::{CategoryLabel, Intent};

/// Trait defining the interface for all AI backends
///
/// Backends should be Send + Sync to allow use across async tasks.
/// Implementations must not apply their own retry policy.
#[async_trait]
pub trait AIBackend: Send + Sync {
    /// Suggest a category for an expense description
    async fn classify_expense(
        &self,
        description: &str,
        categories: &[CategoryLabel],
    ) -> Result<ExpenseClassification>;

    /// Suggest which supported intent a question expresses
    async fn classify_intent(
        &self,
        question: &str,
        intents: &[Intent],
    ) -> Result<IntentClassification>;

    /// Rephrase a grounded explanation without changing its figures
    async fn explain_result(&self, question: &str, draft: &str, facts: &str) -> Result<String>;

    /// Check if the backend is available
    async fn health_check(&self) -> bool;

    /// Model name recorded in the audit ledger
    fn model(&self) -> &str;

    fn host(&self) -> &str;
}

/// Concrete AI client enum
///
/// Provides Clone and compile-time dispatch without Box<dyn> overhead.
#[derive(Clone)]
pub enum AIClient {
    /// Ollama backend (HTTP API)
    Ollama(OllamaBackend),
    /// OpenAI-compatible backend (vLLM, LocalAI, llama-server, etc.)
    OpenAICompatible(OpenAICompatibleBackend),
    /// Mock backend for testing
    Mock(MockBackend),
}

impl AIClient {
    /// Create an AI client from environment variables
    ///
    /// Returns None if the required environment variables are not set, in
    /// which case the engines run rules-only.
    pub fn from_env() -> Option<Self> {
        let backend = std::env::var("AI_BACKEND").unwrap_or_else(|_| "ollama".to_string());

        match backend.to_lowercase().as_str() {
            "ollama" => OllamaBackend::from_env().map(AIClient::Ollama),
            "openai_compatible" | "openai" | "vllm" | "localai" | "llamacpp" => {
                OpenAICompatibleBackend::from_env().map(AIClient::OpenAICompatible)
            }
            "mock" => Some(AIClient::Mock(MockBackend::new())),
            "none" | "off" => None,
            _ => {
                tracing::warn!(backend = %backend, "Unknown AI_BACKEND, falling back to ollama");
                OllamaBackend::from_env().map(AIClient::Ollama)
            }
        }
    }

    pub fn ollama(host: &str, model: &str) -> Self {
        AIClient::Ollama(OllamaBackend::new(host, model))
    }

    pub fn mock() -> Self {
        AIClient::Mock(MockBackend::new())
    }

    /// Create a new instance with a different model
    pub fn with_model(&self, model: &str) -> Self {
        match self {
            AIClient::Ollama(b) => AIClient::Ollama(b.with_model(model)),
            AIClient::OpenAICompatible(b) => AIClient::OpenAICompatible(b.with_model(model)),
            AIClient::Mock(b) => AIClient::Mock(b.with_model(model)),
        }
    }

    /// Short backend name for health output
    pub fn kind(&self) -> &'static str {
        match self {
            AIClient::Ollama(_) => "ollama",
            AIClient::OpenAICompatible(_) => "openai_compatible",
            AIClient::Mock(_) => "mock",
        }
    }
}

// Implement AIBackend for AIClient by delegating to the inner backend
#[async_trait]
impl AIBackend for AIClient {
    async fn classify_expense(
        &self,
        description: &str,
        categories: &[CategoryLabel],
    ) -> Result<ExpenseClassification> {
        match self {
            AIClient::Ollama(b) => b.classify_expense(description, categories).await,
            AIClient::OpenAICompatible(b) => b.classify_expense(description, categories).await,
            AIClient::Mock(b) => b.classify_expense(description, categories).await,
        }
    }

    async fn classify_intent(
        &self,
        question: &str,
        intents: &[Intent],
    ) -> Result<IntentClassification> {
        match self {
            AIClient::Ollama(b) => b.classify_intent(question, intents).await,
            AIClient::OpenAICompatible(b) => b.classify_intent(question, intents).await,
            AIClient::Mock(b) => b.classify_intent(question, intents).await,
        }
    }

    async fn explain_result(&self, question: &str, draft: &str, facts: &str) -> Result<String> {
        match self {
            AIClient::Ollama(b) => b.explain_result(question, draft, facts).await,
            AIClient::OpenAICompatible(b) => b.explain_result(question, draft, facts).await,
            AIClient::Mock(b) => b.explain_result(question, draft, facts).await,
        }
    }

    async fn health_check(&self) -> bool {
        match self {
            AIClient::Ollama(b) => b.health_check().await,
            AIClient::OpenAICompatible(b) => b.health_check().await,
            AIClient::Mock(b) => b.health_check().await,
        }
    }

    fn model(&self) -> &str {
        match self {
            AIClient::Ollama(b) => b.model(),
            AIClient::OpenAICompatible(b) => b.model(),
            AIClient::Mock(b) => b.model(),
        }
    }

    fn host(&self) -> &str {
        match self {
            AIClient::Ollama(b) => b.host(),
            AIClient::OpenAICompatible(b) => b.host(),
            AIClient::Mock(b) => b.host(),
        }
    }
}

/// Run one provider call under `timeout`, retrying once on a transient failure
///
/// Elapsed timeouts surface as `Error::ProviderTimeout`. Malformed responses
/// and other non-transient errors return immediately.
pub async fn call_with_retry<T, F, Fut>(timeout: Duration, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 1;
    loop {
        let result = match tokio::time::timeout(timeout, op()).await {
            Ok(result) => result,
            Err(_) => Err(Error::ProviderTimeout(timeout.as_secs())),
        };

        match result {
            Err(e) if attempt == 1 && e.is_transient() => {
                tracing::warn!(error = %e, "Transient AI provider failure, retrying once");
                attempt += 1;
            }
            other => return other,
        }
    }
}

/// Bullet list of the taxonomy for prompts
pub(crate) fn format_categories(categories: &[CategoryLabel]) -> String {
    categories
        .iter()
        .map(|c| format!("- {}: {}", c.as_str(), c.description()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Bullet list of supported intents for prompts
pub(crate) fn format_intents(intents: &[Intent]) -> String {
    intents
        .iter()
        .map(|i| format!("- {}: {}", i.as_str(), i.describe()))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ai_client_mock() {
        let client = AIClient::mock();
        assert_eq!(client.model(), "mock");
        assert_eq!(client.host(), "mock://localhost");
        assert_eq!(client.kind(), "mock");
    }

    #[tokio::test]
    async fn test_mock_health_check() {
        let client = AIClient::mock();
        assert!(client.health_check().await);
    }

    #[test]
    fn test_with_model_keeps_backend_kind() {
        let client = AIClient::ollama("http://localhost:11434", "llama3.2").with_model("qwen2.5");
        assert_eq!(client.kind(), "ollama");
        assert_eq!(client.model(), "qwen2.5");
        assert_eq!(client.host(), "http://localhost:11434");
    }

    #[tokio::test]
    async fn test_call_with_retry_retries_transient_once() {
        let mock = MockBackend::new().failing(MockFailure::Transient);
        let result = call_with_retry(Duration::from_secs(1), || {
            mock.classify_expense("x", &CategoryLabel::ALL)
        })
        .await;
        assert!(result.is_err());
        assert_eq!(mock.expense_calls(), 2);
    }

    #[tokio::test]
    async fn test_call_with_retry_recovers_after_one_failure() {
        let mock = MockBackend::new().failing_times(1, MockFailure::Transient);
        let result = call_with_retry(Duration::from_secs(1), || {
            mock.classify_intent("am I over budget?", &Intent::KNOWN)
        })
        .await
        .unwrap();
        assert_eq!(result.intent, "budget_status");
        assert_eq!(mock.intent_calls(), 2);
    }

    #[tokio::test]
    async fn test_call_with_retry_does_not_retry_malformed() {
        let mock = MockBackend::new().failing(MockFailure::Provider("no json".into()));
        let result = call_with_retry(Duration::from_secs(1), || {
            mock.classify_expense("x", &CategoryLabel::ALL)
        })
        .await;
        assert!(matches!(result, Err(Error::Provider(_))));
        assert_eq!(mock.expense_calls(), 1);
    }

    #[tokio::test]
    async fn test_call_with_retry_times_out() {
        let mock = MockBackend::new().failing(MockFailure::Hang);
        let result = call_with_retry(Duration::from_millis(20), || {
            mock.classify_expense("x", &CategoryLabel::ALL)
        })
        .await;
        assert!(matches!(result, Err(Error::ProviderTimeout(_))));
        // A timeout counts as transient: one retry
        assert_eq!(mock.expense_calls(), 2);
    }

    #[test]
    fn test_format_categories_lists_every_label() {
        let text = format_categories(&CategoryLabel::ALL);
        assert_eq!(text.lines().count(), CategoryLabel::ALL.len());
        assert!(text.contains("- Food & Dining: "));
    }

    #[test]
    fn test_format_intents_uses_identifiers() {
        let text = format_intents(&Intent::KNOWN);
        assert!(text.contains("- budget_status: "));
        assert!(!text.contains("- unknown"));
    }
}
