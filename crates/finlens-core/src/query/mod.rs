//! Template-constrained natural-language queries
//!
//! A question is mapped to a closed intent, the intent selects one pre-vetted
//! template, and values extracted from the question are bound by name. The
//! question text itself never becomes query text.

pub mod engine;
pub mod executor;
pub mod explain;
pub mod intent;
pub mod params;
pub mod templates;

pub use engine::{
    AskOutcome, ClarificationReason, ClarifyingResponse, QueryAnswer, QueryEngine,
    EXAMPLE_QUESTIONS,
};
pub use executor::{QueryExecutor, QueryResult, RecordStore, ResultRow, SqlParam};
pub use explain::{Explanation, ExplanationGenerator};
pub use intent::{IntentClassifier, IntentDecision, IntentSource};
pub use params::{ParamValue, ParameterExtractor, ParameterSet};
pub use templates::{ParamSpec, ParamType, QueryTemplate, TemplateRegistry};
