//! Error types for FinLens
//!
//! The decision engines distinguish errors that are recovered locally
//! (provider failures during categorization), errors that become a
//! clarifying response for the caller (ambiguous intent, bad parameters),
//! and hard failures (query execution).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("AI provider timed out after {0}s")]
    ProviderTimeout(u64),

    #[error("AI provider error: {0}")]
    Provider(String),

    #[error("Could not understand the question: {0}")]
    ClassificationAmbiguous(String),

    #[error("Invalid query parameters: {}", format_parameter_failures(.0))]
    ParameterValidation(Vec<ParameterFailure>),

    #[error("No query template registered for intent '{0}'")]
    NoTemplate(String),

    #[error("Query execution failed: {0}")]
    Execution(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// A single parameter that failed extraction or validation
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ParameterFailure {
    pub name: String,
    pub reason: String,
}

impl ParameterFailure {
    pub fn new(name: &str, reason: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

fn format_parameter_failures(failures: &[ParameterFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{}: {}", f.name, f.reason))
        .collect::<Vec<_>>()
        .join("; ")
}

impl Error {
    /// Errors the caller should answer with a clarifying question rather than a failure
    pub fn is_clarification(&self) -> bool {
        matches!(
            self,
            Error::ClassificationAmbiguous(_) | Error::ParameterValidation(_)
        )
    }

    /// Provider failures worth one immediate retry (transport-level only)
    pub fn is_transient(&self) -> bool {
        match self {
            Error::ProviderTimeout(_) => true,
            Error::Http(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.status()
                        .map(|s| s.as_u16() == 429 || s.is_server_error())
                        .unwrap_or(false)
            }
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
