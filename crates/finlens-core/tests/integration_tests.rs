//! Integration tests for finlens-core
//!
//! These tests run the categorizer and the query engine end to end against a
//! real SQLite store and ledger, with the mock AI backend standing in for a
//! language model.

use std::sync::Arc;

use chrono::NaiveDate;
use finlens_core::{
    ai::MockBackend,
    audit::AuditLedger,
    db::Database,
    models::{ActionTier, AuditKind, CategorizationMethod, CategoryLabel, Intent, NewExpense},
    query::{ClarificationReason, ClarifyingResponse},
    AIClient, Categorizer, EngineConfig, Error, QueryEngine,
};

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
}

fn seeded_db() -> Database {
    let db = Database::in_memory().expect("Failed to create in-memory database");
    let expenses = [
        ("2024-06-14", "Whole Foods groceries", 64.25, CategoryLabel::FoodDining),
        ("2024-06-10", "Pizza delivery", 23.5, CategoryLabel::FoodDining),
        ("2024-05-20", "Cafe brunch", 18.75, CategoryLabel::FoodDining),
        ("2024-05-01", "Old restaurant bill", 80.0, CategoryLabel::FoodDining),
        ("2024-06-12", "Uber to airport", 42.0, CategoryLabel::Transportation),
        ("2024-06-03", "Hotel in Porto", 310.0, CategoryLabel::Travel),
    ];
    for (date, description, amount, category) in expenses {
        db.insert_expense(&NewExpense {
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            description: description.to_string(),
            amount,
            category,
        })
        .expect("Failed to insert expense");
    }
    db.upsert_budget(CategoryLabel::FoodDining, 75.0).unwrap();
    db.upsert_budget(CategoryLabel::Travel, 400.0).unwrap();
    db
}

fn engines(db: &Database, mock: MockBackend) -> (Categorizer, QueryEngine) {
    let config = EngineConfig::default();
    let ledger: Arc<dyn AuditLedger> = Arc::new(db.clone());
    let ai = Some(AIClient::Mock(mock));
    let categorizer = Categorizer::from_config(&config, ai.clone(), ledger.clone()).unwrap();
    let query = QueryEngine::from_config(&config, ai, Arc::new(db.clone()), ledger).unwrap();
    (categorizer, query)
}

// =============================================================================
// Categorization
// =============================================================================

#[tokio::test]
async fn test_rule_and_fallback_decisions_are_audited() {
    let db = seeded_db();
    let mock = MockBackend::new().with_expense_response("Food & Dining", 0.72, "sounds like food");
    let (categorizer, _) = engines(&db, mock.clone());

    let rule = categorizer.classify("Uber ride to work").await.unwrap();
    assert_eq!(rule.category, CategoryLabel::Transportation);
    assert_eq!(rule.confidence, 0.95);
    assert_eq!(rule.method, CategorizationMethod::Rule);
    assert_eq!(rule.tier, ActionTier::AutoApply);

    let fallback = categorizer
        .classify("quick bite at an obscure diner")
        .await
        .unwrap();
    assert_eq!(fallback.category, CategoryLabel::FoodDining);
    assert_eq!(fallback.method, CategorizationMethod::Fallback);
    assert_eq!(fallback.tier, ActionTier::ApplyWithFlag);
    assert_eq!(mock.expense_calls(), 1);

    assert_eq!(
        db.count_audit_entries(Some(AuditKind::Categorization)).unwrap(),
        2
    );
}

#[tokio::test]
async fn test_injection_description_is_categorized_not_executed() {
    let db = seeded_db();
    let (categorizer, _) = engines(&db, MockBackend::new());
    let before = db.count_expenses().unwrap();

    let outcome = categorizer
        .classify("'; DROP TABLE expenses; --")
        .await
        .unwrap();
    assert!(matches!(
        outcome.method,
        CategorizationMethod::Rule | CategorizationMethod::Fallback
    ));

    assert_eq!(db.count_expenses().unwrap(), before);
    let entries = db.list(10).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].input_summary, "'; DROP TABLE expenses; --");
}

#[tokio::test]
async fn test_override_supersedes_previous_decision() {
    let db = seeded_db();
    let (categorizer, _) = engines(&db, MockBackend::new());

    let first = categorizer.classify("Starbucks latte").await.unwrap();
    let manual = categorizer
        .override_category("starbucks LATTE", "personal_care")
        .unwrap();

    assert_eq!(manual.category, CategoryLabel::PersonalCare);
    assert_eq!(manual.method, CategorizationMethod::Manual);
    assert_eq!(manual.confidence, 1.0);
    assert_eq!(manual.supersedes, Some(first.audit_id));

    let stored = db.get_audit_entry(manual.audit_id).unwrap().unwrap();
    assert_eq!(stored.supersedes, Some(first.audit_id));
    assert_eq!(stored.method, "manual");
}

#[tokio::test]
async fn test_override_rejects_unknown_category() {
    let db = seeded_db();
    let (categorizer, _) = engines(&db, MockBackend::new());

    let err = categorizer
        .override_category("Starbucks latte", "Snacks")
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    assert_eq!(db.count_audit_entries(None).unwrap(), 0);
}

// =============================================================================
// Queries
// =============================================================================

#[tokio::test]
async fn test_food_last_30_days_exact_total() {
    let db = seeded_db();
    let (_, engine) = engines(&db, MockBackend::new());

    let answer = engine
        .ask_on("How much did I spend on food in the last 30 days?", today())
        .await
        .unwrap();

    assert_eq!(answer.intent, Intent::TotalByCategoryTimeframe);
    assert_eq!(answer.template_id, "total_by_category_v1");
    assert_eq!(answer.parameters.category(), Some(CategoryLabel::FoodDining));
    assert_eq!(answer.parameters.integer("days"), Some(30));

    // 64.25 + 23.50 + 18.75; the 2024-05-01 bill is outside the window
    assert_eq!(answer.results[0].f64("total"), Some(106.5));
    assert!(answer.explanation.contains("$106.50"), "{}", answer.explanation);

    let entries = db.list(5).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].kind, AuditKind::Query);
    assert_eq!(entries[0].output_summary, "total_by_category_v1: 1 rows");
}

#[tokio::test]
async fn test_meaning_of_life_is_clarified_without_audit() {
    let db = seeded_db();
    let mock = MockBackend::new();
    let (_, engine) = engines(&db, mock.clone());

    let err = engine
        .ask_on("What is the meaning of life?", today())
        .await
        .unwrap_err();
    let clarification = ClarifyingResponse::from_error(&err).expect("clarification");
    assert_eq!(clarification.status, "clarification_needed");
    assert_eq!(clarification.reason, ClarificationReason::AmbiguousIntent);
    assert!(!clarification.examples.is_empty());

    assert_eq!(mock.intent_calls(), 1);
    assert_eq!(db.count_audit_entries(None).unwrap(), 0);
}

#[tokio::test]
async fn test_example_questions_all_answer() {
    let db = seeded_db();
    let (_, engine) = engines(&db, MockBackend::new());

    for question in finlens_core::EXAMPLE_QUESTIONS {
        let answer = engine
            .ask_on(question, today())
            .await
            .unwrap_or_else(|e| panic!("{} failed: {}", question, e));
        assert!(!answer.explanation.is_empty());
    }
    assert_eq!(
        db.count_audit_entries(Some(AuditKind::Query)).unwrap(),
        finlens_core::EXAMPLE_QUESTIONS.len() as i64
    );
}

#[tokio::test]
async fn test_budget_question_reports_overspend() {
    let db = seeded_db();
    let (_, engine) = engines(&db, MockBackend::new());

    let answer = engine
        .ask_on("Am I over budget in any category?", today())
        .await
        .unwrap();
    assert_eq!(answer.intent, Intent::BudgetStatus);
    // June food: 64.25 + 23.50 = 87.75 against 75.00
    assert!(answer.explanation.contains("Food & Dining"));
    assert!(answer.explanation.contains("$87.75"));
}

#[tokio::test]
async fn test_empty_window_says_no_data() {
    let db = Database::in_memory().unwrap();
    let (_, engine) = engines(&db, MockBackend::new());

    let answer = engine
        .ask_on("What's my total spending this week?", today())
        .await
        .unwrap();
    assert!(answer.explanation.starts_with("No matching data found"));
    assert_eq!(db.count_audit_entries(None).unwrap(), 1);
}
