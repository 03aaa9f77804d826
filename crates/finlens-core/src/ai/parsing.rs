//! JSON parsing helpers for AI backend responses
//!
//! Models often wrap their JSON in prose or code fences. These helpers take
//! the span between the first `{` and the last `}` and deserialize that.

use serde::de::DeserializeOwned;

use crate::error::{Error, Result};

use super::types::{ExpenseClassification, ExplanationRewrite, IntentClassification};

const RAW_PREVIEW_CHARS: usize = 200;

fn preview(raw: &str) -> String {
    if raw.chars().count() > RAW_PREVIEW_CHARS {
        format!("{}...", raw.chars().take(RAW_PREVIEW_CHARS).collect::<String>())
    } else {
        raw.to_string()
    }
}

/// Extract and deserialize the JSON object embedded in a model response
pub fn extract_json<T: DeserializeOwned>(response: &str, what: &str) -> Result<T> {
    let response = response.trim();
    let start = response.find('{');
    let end = response.rfind('}');

    match (start, end) {
        (Some(s), Some(e)) if s < e => {
            let json_str = &response[s..=e];
            serde_json::from_str(json_str).map_err(|err| {
                Error::Provider(format!(
                    "Invalid {} JSON from AI: {} | Raw: {}",
                    what,
                    err,
                    preview(json_str)
                ))
            })
        }
        _ => Err(Error::Provider(format!(
            "No JSON found in AI {} response | Raw: {}",
            what,
            preview(response)
        ))),
    }
}

pub fn parse_expense_classification(response: &str) -> Result<ExpenseClassification> {
    extract_json(response, "classification")
}

pub fn parse_intent_classification(response: &str) -> Result<IntentClassification> {
    extract_json(response, "intent")
}

pub fn parse_explanation(response: &str) -> Result<String> {
    let rewrite: ExplanationRewrite = extract_json(response, "explanation")?;
    let text = rewrite.explanation.trim();
    if text.is_empty() {
        return Err(Error::Provider("AI returned an empty explanation".into()));
    }
    Ok(text.to_string())
}
