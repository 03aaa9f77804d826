//! Natural-language question answering
//!
//! intent → confidence floor → template → parameters → execution →
//! explanation → one audit entry. Any failure before the audit write leaves
//! the ledger untouched.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::ai::AIClient;
use crate::audit::AuditLedger;
use crate::categorize::ConfidencePolicy;
use crate::config::EngineConfig;
use crate::error::{Error, ParameterFailure, Result};
use crate::models::{normalize_input, ActionTier, AuditKind, Intent, NewAuditEntry};

use super::executor::{QueryExecutor, RecordStore, ResultRow};
use super::explain::ExplanationGenerator;
use super::intent::IntentClassifier;
use super::params::{ParameterExtractor, ParameterSet};
use super::templates::TemplateRegistry;

/// Questions offered when a question cannot be answered
pub const EXAMPLE_QUESTIONS: [&str; 6] = [
    "How much did I spend on food in the last 30 days?",
    "What's my total spending this week?",
    "Show me my top 5 highest expenses this month",
    "Am I over budget in any category?",
    "Compare my spending this month vs last month",
    "How much did I spend on transportation last month?",
];

/// Answer to a supported question
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryAnswer {
    pub query: String,
    pub intent: Intent,
    pub explanation: String,
    pub template_id: &'static str,
    pub confidence: f64,
    pub tier: ActionTier,
    pub results: Vec<ResultRow>,
    pub result_count: usize,
    pub parameters: ParameterSet,
    pub audit_id: i64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClarificationReason {
    AmbiguousIntent,
    InvalidParameters,
}

/// Returned instead of an answer when the question needs rewording
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClarifyingResponse {
    pub status: &'static str,
    pub reason: ClarificationReason,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<ParameterFailure>,
    pub examples: Vec<&'static str>,
}

impl ClarifyingResponse {
    /// Clarification for an ambiguity or parameter error, None for anything else
    pub fn from_error(err: &Error) -> Option<Self> {
        let (reason, message, parameters) = match err {
            Error::ClassificationAmbiguous(msg) => (
                ClarificationReason::AmbiguousIntent,
                format!(
                    "I couldn't tell what you're asking ({}). Try one of the example questions.",
                    msg
                ),
                Vec::new(),
            ),
            Error::ParameterValidation(failures) => (
                ClarificationReason::InvalidParameters,
                "Some details in the question could not be used. Please rephrase.".to_string(),
                failures.clone(),
            ),
            _ => return None,
        };

        Some(Self {
            status: "clarification_needed",
            reason,
            message,
            parameters,
            examples: EXAMPLE_QUESTIONS.to_vec(),
        })
    }
}

/// Either an answer or a request to rephrase
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AskOutcome {
    Answer(Box<QueryAnswer>),
    Clarification(ClarifyingResponse),
}

pub struct QueryEngine {
    intents: IntentClassifier,
    registry: TemplateRegistry,
    extractor: ParameterExtractor,
    executor: QueryExecutor,
    explainer: ExplanationGenerator,
    policy: ConfidencePolicy,
    min_intent_confidence: f64,
    ledger: Arc<dyn AuditLedger>,
}

impl QueryEngine {
    pub fn from_config(
        config: &EngineConfig,
        ai: Option<AIClient>,
        store: Arc<dyn RecordStore>,
        ledger: Arc<dyn AuditLedger>,
    ) -> Result<Self> {
        let query = &config.query;
        Ok(Self {
            intents: IntentClassifier::new(ai.clone(), query.intent_timeout)?,
            registry: TemplateRegistry::builtin(),
            extractor: ParameterExtractor::new(query.category_match_floor)?,
            executor: QueryExecutor::new(store),
            explainer: ExplanationGenerator::new(
                ai,
                query.polish_explanations,
                query.explanation_timeout,
            ),
            policy: ConfidencePolicy::from(&config.policy),
            min_intent_confidence: query.min_intent_confidence,
            ledger,
        })
    }

    pub fn registry(&self) -> &TemplateRegistry {
        &self.registry
    }

    /// Answer a question against today's date
    pub async fn ask(&self, question: &str) -> Result<QueryAnswer> {
        self.ask_on(question, Local::now().date_naive()).await
    }

    /// Answer a question, turning ambiguity and parameter errors into a clarification
    pub async fn respond(&self, question: &str) -> Result<AskOutcome> {
        match self.ask(question).await {
            Ok(answer) => Ok(AskOutcome::Answer(Box::new(answer))),
            Err(e) => match ClarifyingResponse::from_error(&e) {
                Some(clarification) => Ok(AskOutcome::Clarification(clarification)),
                None => Err(e),
            },
        }
    }

    /// Answer a question with windows ending at `today`
    pub async fn ask_on(&self, question: &str, today: NaiveDate) -> Result<QueryAnswer> {
        let question = normalize_input(question, "query")?;
        let started = Instant::now();

        let decision = self.intents.classify(question).await;
        if decision.intent == Intent::Unknown {
            debug!(question, "Question did not map to a supported intent");
            return Err(Error::ClassificationAmbiguous(
                "the question does not match a supported query type".to_string(),
            ));
        }
        if decision.confidence < self.min_intent_confidence {
            debug!(question, intent = %decision.intent, confidence = decision.confidence, "Intent below floor");
            return Err(Error::ClassificationAmbiguous(format!(
                "'{}' was only recognized with confidence {:.2}",
                decision.intent, decision.confidence
            )));
        }

        let template = self.registry.get(decision.intent)?;
        let params = self.extractor.extract(question, template, today)?;
        let result = self.executor.execute(template, &params)?;
        let explanation = self.explainer.explain(question, &params, &result.rows).await;

        let audit_id = self.ledger.append(&NewAuditEntry {
            kind: AuditKind::Query,
            method: decision.intent.as_str().to_string(),
            confidence: Some(decision.confidence),
            input_summary: question.to_string(),
            output_summary: format!("{}: {} rows", template.id, result.row_count),
            model: decision.model.clone(),
            latency_ms: Some(started.elapsed().as_millis() as i64),
            supersedes: None,
        })?;

        info!(
            audit_id,
            intent = decision.intent.as_str(),
            template = template.id,
            rows = result.row_count,
            polished = explanation.polished,
            "Question answered"
        );

        Ok(QueryAnswer {
            query: question.to_string(),
            intent: decision.intent,
            explanation: explanation.text,
            template_id: template.id,
            confidence: decision.confidence,
            tier: self.policy.tier(decision.confidence),
            result_count: result.row_count,
            results: result.rows,
            parameters: params,
            audit_id,
            timestamp: Utc::now(),
        })
    }
}
