//! Ollama backend implementation
//!
//! HTTP client for the Ollama `/api/generate` endpoint. Prompts come from
//! the prompt library so they can be overridden without a rebuild.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::{CategoryLabel, Intent};
use crate::prompts::{PromptId, PromptLibrary};

use super::parsing::{parse_expense_classification, parse_explanation, parse_intent_classification};
use super::types::{ExpenseClassification, IntentClassification};
use super::{format_categories, format_intents, AIBackend};

/// Ollama backend
#[derive(Clone)]
pub struct OllamaBackend {
    http_client: Client,
    base_url: String,
    model: String,
    prompts: Arc<RwLock<PromptLibrary>>,
}

impl OllamaBackend {
    pub fn new(base_url: &str, model: &str) -> Self {
        Self::with_prompts(base_url, model, PromptLibrary::new())
    }

    /// Create with a specific prompt library (tests use embedded-only)
    pub fn with_prompts(base_url: &str, model: &str, prompts: PromptLibrary) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            prompts: Arc::new(RwLock::new(prompts)),
        }
    }

    /// Create a new instance with a different model
    pub fn with_model(&self, model: &str) -> Self {
        Self {
            model: model.to_string(),
            ..self.clone()
        }
    }

    /// Create from environment variables
    pub fn from_env() -> Option<Self> {
        let host = std::env::var("OLLAMA_HOST").ok()?;
        let model = std::env::var("OLLAMA_MODEL").unwrap_or_else(|_| "llama3.2".to_string());
        Some(Self::new(&host, &model))
    }

    fn render(&self, id: PromptId, vars: &HashMap<&str, &str>) -> Result<(Option<String>, String)> {
        let mut prompts = self
            .prompts
            .write()
            .map_err(|_| Error::InvalidData("Failed to acquire prompt library lock".into()))?;
        prompts.render(id, vars)
    }

    /// Send one prompt and return the raw model text
    async fn generate(&self, id: PromptId, vars: &HashMap<&str, &str>) -> Result<String> {
        let (system, prompt) = self.render(id, vars)?;

        let request = OllamaRequest {
            model: self.model.clone(),
            prompt,
            system,
            format: "json",
            stream: false,
        };

        let response = self
            .http_client
            .post(format!("{}/api/generate", self.base_url))
            .json(&request)
            .send()
            .await?
            .error_for_status()?;

        let ollama_response: OllamaResponse = response.json().await?;
        debug!(prompt = id.as_str(), "Ollama response: {}", ollama_response.response);

        Ok(ollama_response.response)
    }
}

/// Request to Ollama API
#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    format: &'static str,
    stream: bool,
}

/// Response from Ollama API
#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
}

#[async_trait]
impl AIBackend for OllamaBackend {
    async fn classify_expense(
        &self,
        description: &str,
        categories: &[CategoryLabel],
    ) -> Result<ExpenseClassification> {
        let categories = format_categories(categories);
        let mut vars = HashMap::new();
        vars.insert("description", description);
        vars.insert("categories", categories.as_str());

        let raw = self.generate(PromptId::ClassifyExpense, &vars).await?;
        parse_expense_classification(&raw)
    }

    async fn classify_intent(
        &self,
        question: &str,
        intents: &[Intent],
    ) -> Result<IntentClassification> {
        let intents = format_intents(intents);
        let mut vars = HashMap::new();
        vars.insert("question", question);
        vars.insert("intents", intents.as_str());

        let raw = self.generate(PromptId::ClassifyIntent, &vars).await?;
        parse_intent_classification(&raw)
    }

    async fn explain_result(&self, question: &str, draft: &str, facts: &str) -> Result<String> {
        let mut vars = HashMap::new();
        vars.insert("question", question);
        vars.insert("explanation", draft);
        vars.insert("facts", facts);

        let raw = self.generate(PromptId::ExplainResult, &vars).await?;
        parse_explanation(&raw)
    }

    async fn health_check(&self) -> bool {
        match self
            .http_client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn host(&self) -> &str {
        &self.base_url
    }
}
