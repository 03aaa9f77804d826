//! AI backend response types
//!
//! These types are backend-agnostic and used across all AI implementations.
//! They carry the model's raw answer; mapping onto the closed label and
//! intent sets happens in the engines, not here.

use serde::{Deserialize, Serialize};

/// Raw expense classification returned by a model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseClassification {
    /// Category name as written by the model (may be outside the taxonomy)
    pub category: String,
    /// Self-reported confidence (unclamped)
    pub confidence: f64,
    #[serde(default)]
    pub reasoning: String,
}

/// Raw intent classification returned by a model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentClassification {
    /// Intent identifier as written by the model
    pub intent: String,
    #[serde(default)]
    pub confidence: f64,
}

/// Rephrased explanation returned by a model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplanationRewrite {
    pub explanation: String,
}
