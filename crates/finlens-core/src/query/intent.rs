//! Question → intent classification
//!
//! Curated phrasings are recognized by ordered phrase rules; anything else
//! goes to the language model, whose answer must be one of the known intent
//! identifiers. Every failure path lands on `Intent::Unknown` at confidence 0.

use std::time::Duration;

use regex::Regex;
use serde::Serialize;
use tracing::{debug, warn};

use crate::ai::{call_with_retry, AIBackend, AIClient};
use crate::categorize::fallback::clamp_unit;
use crate::error::Result;
use crate::models::Intent;

use super::params::NUMBER;

/// Confidence reported for a phrase rule match
pub const PHRASE_RULE_CONFIDENCE: f64 = 0.9;

/// Words after "in", "for", "at" or "on" that start a time window, not a category
const WINDOW_LEADS: &[&str] = &[
    "a", "all", "an", "any", "average", "each", "every", "general", "last", "past", "previous",
    "the", "this", "today", "total", "yesterday",
];

/// How an intent was decided
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IntentSource {
    Rule,
    Model,
    /// Nothing recognized the question (includes provider failures)
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntentDecision {
    pub intent: Intent,
    pub confidence: f64,
    pub source: IntentSource,
    /// "rules" or the model name
    pub model: Option<String>,
}

impl IntentDecision {
    fn unknown(model: Option<String>) -> Self {
        Self {
            intent: Intent::Unknown,
            confidence: 0.0,
            source: IntentSource::None,
            model,
        }
    }
}

enum PhraseRule {
    Pattern(Regex),
    /// See `IntentClassifier::names_spending_target`
    SpendingTarget,
}

/// Two-stage intent classifier
pub struct IntentClassifier {
    phrases: Vec<(PhraseRule, Intent)>,
    spend_question: Regex,
    spend_target: Regex,
    ai: Option<AIClient>,
    timeout: Duration,
}

impl IntentClassifier {
    pub fn new(ai: Option<AIClient>, timeout: Duration) -> Result<Self> {
        let pattern = |p: &str| -> Result<PhraseRule> { Ok(PhraseRule::Pattern(Regex::new(p)?)) };

        // First match wins, so the narrower shapes come first. A named target
        // ("at restaurants") must outrank the plain total.
        let phrases = vec![
            (
                pattern(r"(?i)\b(?:compare|compared|comparison|versus|vs)\b")?,
                Intent::PeriodComparison,
            ),
            (pattern(r"(?i)\bbudgets?\b")?, Intent::BudgetStatus),
            (
                pattern(&format!(
                    r"(?i)\btop\s+(?:{}|expenses|purchases|transactions)\b|\b(?:highest|largest|biggest|most\s+expensive)\b",
                    NUMBER
                ))?,
                Intent::TopNExpenses,
            ),
            (
                pattern(r"(?i)\bbreak\s*down\b|\b(?:by|per|each)\s+category\b|\bsplit\b")?,
                Intent::CategoryBreakdown,
            ),
            (PhraseRule::SpendingTarget, Intent::TotalByCategoryTimeframe),
            (
                pattern(r"(?i)\btotal\s+(?:spending|spent|expenses)\b|\bhow\s+much\s+(?:did|have)\s+i\s+(?:spend|spent)\b|\bwhat\s+did\s+i\s+spend\b")?,
                Intent::TotalSpendingTimeframe,
            ),
        ];

        Ok(Self {
            phrases,
            spend_question: Regex::new(r"(?i)\b(?:spend|spent|spending|how\s+much)\b")?,
            spend_target: Regex::new(r"(?i)\b(?:on|for|at|in)\s+(?:my\s+)?([a-z][a-z'-]*)")?,
            ai,
            timeout,
        })
    }

    /// Phrase-rule stage only
    pub fn match_phrase(&self, question: &str) -> Option<Intent> {
        self.phrases
            .iter()
            .find(|(rule, _)| match rule {
                PhraseRule::Pattern(re) => re.is_match(question),
                PhraseRule::SpendingTarget => self.names_spending_target(question),
            })
            .map(|(_, intent)| *intent)
    }

    /// A spending question that points at something ("at restaurants",
    /// "for rent") rather than only at a time window ("in the last week")
    fn names_spending_target(&self, question: &str) -> bool {
        let Some(trigger) = self.spend_question.find(question) else {
            return false;
        };
        self.spend_target
            .captures_iter(&question[trigger.end()..])
            .any(|caps| !WINDOW_LEADS.contains(&caps[1].to_lowercase().as_str()))
    }

    pub async fn classify(&self, question: &str) -> IntentDecision {
        if let Some(intent) = self.match_phrase(question) {
            debug!(question, intent = %intent, "Intent phrase rule matched");
            return IntentDecision {
                intent,
                confidence: PHRASE_RULE_CONFIDENCE,
                source: IntentSource::Rule,
                model: Some("rules".to_string()),
            };
        }

        let Some(ref ai) = self.ai else {
            debug!(question, "No phrase rule and no AI backend, intent unknown");
            return IntentDecision::unknown(None);
        };

        let response = call_with_retry(self.timeout, || {
            ai.classify_intent(question, &Intent::KNOWN)
        })
        .await;

        let model = Some(ai.model().to_string());
        match response {
            Ok(raw) => match Intent::parse(&raw.intent) {
                Some(intent) if intent != Intent::Unknown => IntentDecision {
                    intent,
                    confidence: clamp_unit(raw.confidence),
                    source: IntentSource::Model,
                    model,
                },
                Some(_) => IntentDecision::unknown(model),
                None => {
                    warn!(answer = %raw.intent, "Model returned an intent outside the known set");
                    IntentDecision::unknown(model)
                }
            },
            Err(e) => {
                warn!(question, error = %e, "Intent classification failed");
                IntentDecision::unknown(model)
            }
        }
    }
}
