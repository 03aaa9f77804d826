//! FinLens Core Library
//!
//! Decision engines for the FinLens expense assistant:
//! - Hybrid expense categorization (keyword rules, language-model fallback,
//!   confidence policy, manual overrides)
//! - Template-constrained natural-language queries over expense records
//! - Pluggable local AI backends (Ollama, OpenAI-compatible servers, mock)
//! - Prompt library for customizable AI prompts
//! - Append-only audit ledger for every decision
//! - SQLite storage with SQLCipher encryption

pub mod ai;
pub mod audit;
pub mod categorize;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod prompts;
pub mod query;

/// Test utilities including mock Ollama server
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use ai::{
    AIBackend, AIClient, ExpenseClassification, IntentClassification, MockBackend, MockFailure,
    OllamaBackend, OpenAICompatibleBackend,
};
pub use audit::{AuditLedger, MemoryLedger};
pub use categorize::{
    CacheStats, CategorizationOutcome, Categorizer, ClassificationCache, ConfidencePolicy,
    RuleMatcher, MAX_BATCH_SIZE,
};
pub use config::EngineConfig;
pub use db::Database;
pub use error::{Error, ParameterFailure, Result};
pub use models::{
    ActionTier, AuditEntry, AuditKind, Budget, CategorizationMethod, CategoryLabel, Expense,
    Intent, NewAuditEntry, NewExpense,
};
pub use prompts::{Prompt, PromptId, PromptLibrary};
pub use query::{
    AskOutcome, ClarifyingResponse, QueryAnswer, QueryEngine, RecordStore, ResultRow,
    TemplateRegistry, EXAMPLE_QUESTIONS,
};
