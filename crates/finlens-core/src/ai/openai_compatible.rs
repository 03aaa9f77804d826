//! OpenAI-compatible backend implementation
//!
//! Works with any server that implements the OpenAI chat completions API:
//! - vLLM (http://localhost:8000)
//! - LocalAI (http://localhost:8080)
//! - llama-server / llama.cpp (http://localhost:8080)
//! - Docker Model Runner (http://localhost:12434)
//!
//! # Configuration
//!
//! Environment variables:
//! - `OPENAI_COMPATIBLE_HOST`: Server URL (required)
//! - `OPENAI_COMPATIBLE_MODEL`: Model name (default: gpt-3.5-turbo)
//! - `OPENAI_COMPATIBLE_API_KEY`: API key if required (optional)

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

/// OpenAI-compatible backend
#[derive(Clone)]
pub struct OpenAICompatibleBackend {
    http_client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    prompts: Arc<RwLock<PromptLibrary>>,
}

impl OpenAICompatibleBackend {
    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: None,
            prompts: Arc::new(RwLock::new(PromptLibrary::new())),
        }
    }

    pub fn with_api_key(base_url: &str, model: &str, api_key: &str) -> Self {
        Self {
            api_key: Some(api_key.to_string()),
            ..Self::new(base_url, model)
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
    ///
    /// Required: `OPENAI_COMPATIBLE_HOST`
    pub fn from_env() -> Option<Self> {
        let host = std::env::var("OPENAI_COMPATIBLE_HOST").ok()?;
        let model = std::env::var("OPENAI_COMPATIBLE_MODEL")
            .unwrap_or_else(|_| "gpt-3.5-turbo".to_string());

        let mut backend = Self::new(&host, &model);
        backend.api_key = std::env::var("OPENAI_COMPATIBLE_API_KEY").ok();
        Some(backend)
    }

    fn messages(&self, id: PromptId, vars: &HashMap<&str, &str>) -> Result<Vec<ChatMessage>> {
        let (system, user) = {
            let mut prompts = self
                .prompts
                .write()
                .map_err(|_| Error::InvalidData("Failed to acquire prompt library lock".into()))?;
            prompts.render(id, vars)?
        };

        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: user,
        });
        Ok(messages)
    }

    /// Make a chat completion request
    async fn chat_completion(&self, id: PromptId, vars: &HashMap<&str, &str>) -> Result<String> {
        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages: self.messages(id, vars)?,
            temperature: Some(0.1),
            stream: false,
        };

        let mut req_builder = self
            .http_client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .json(&request);

        if let Some(ref api_key) = self.api_key {
            req_builder = req_builder.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = req_builder.send().await?.error_for_status()?;
        let chat_response: ChatCompletionResponse = response.json().await?;

        let content = chat_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| Error::Provider("No choices in chat completion response".into()))?;
        debug!(prompt = id.as_str(), "OpenAI-compatible response: {}", content);

        Ok(content)
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[async_trait]
impl AIBackend for OpenAICompatibleBackend {
    async fn classify_expense(
        &self,
        description: &str,
        categories: &[CategoryLabel],
    ) -> Result<ExpenseClassification> {
        let categories = format_categories(categories);
        let mut vars = HashMap::new();
        vars.insert("description", description);
        vars.insert("categories", categories.as_str());

        let raw = self.chat_completion(PromptId::ClassifyExpense, &vars).await?;
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

        let raw = self.chat_completion(PromptId::ClassifyIntent, &vars).await?;
        parse_intent_classification(&raw)
    }

    async fn explain_result(&self, question: &str, draft: &str, facts: &str) -> Result<String> {
        let mut vars = HashMap::new();
        vars.insert("question", question);
        vars.insert("explanation", draft);
        vars.insert("facts", facts);

        let raw = self.chat_completion(PromptId::ExplainResult, &vars).await?;
        parse_explanation(&raw)
    }

    async fn health_check(&self) -> bool {
        // /v1/models is standard; /health covers LocalAI and Docker Model Runner
        for path in ["/v1/models", "/health"] {
            if let Ok(resp) = self
                .http_client
                .get(format!("{}{}", self.base_url, path))
                .send()
                .await
            {
                if resp.status().is_success() {
                    return true;
                }
            }
        }
        false
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn host(&self) -> &str {
        &self.base_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_api_key() {
        let backend =
            OpenAICompatibleBackend::with_api_key("http://localhost:8000/", "llama3.2", "secret");
        assert_eq!(backend.api_key.as_deref(), Some("secret"));
        assert_eq!(backend.host(), "http://localhost:8000");
    }

    #[test]
    fn test_messages_include_system_section() {
        let backend = OpenAICompatibleBackend::new("http://localhost:8000", "llama3.2");
        let mut vars = HashMap::new();
        vars.insert("question", "what did I spend?");
        vars.insert("intents", "- total_spending_timeframe: totals");

        let messages = backend.messages(PromptId::ClassifyIntent, &vars).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");
        assert_eq!(messages[1].role, "user");
        assert!(messages[1].content.contains("what did I spend?"));
    }

    #[test]
    fn test_chat_completion_request_serialization() {
        let request = ChatCompletionRequest {
            model: "llama3.2".to_string(),
            messages: vec![ChatMessage {
                role: "user",
                content: "Hello".to_string(),
            }],
            temperature: None,
            stream: false,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["messages"][0]["content"], "Hello");
        assert!(json.get("temperature").is_none());
    }

    #[tokio::test]
    async fn test_health_check_unreachable() {
        let backend = OpenAICompatibleBackend::new("http://127.0.0.1:1", "llama3.2");
        assert!(!backend.health_check().await);
    }
}
