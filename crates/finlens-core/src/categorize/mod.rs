//! Hybrid expense categorization
//!
//! Deterministic keyword rules first, a language-model fallback for the rest,
//! and a confidence policy that tells the caller how much to trust the result.

pub mod cache;
pub mod fallback;
pub mod orchestrator;
pub mod policy;
pub mod rules;

pub use cache::{CacheStats, ClassificationCache};
pub use fallback::{FallbackClassifier, FallbackResult};
pub use orchestrator::{CategorizationOutcome, Categorizer, MAX_BATCH_SIZE};
pub use policy::ConfidencePolicy;
pub use rules::{Rule, RuleMatch, RuleMatcher};
