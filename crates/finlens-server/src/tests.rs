//! Server API tests

use super::*;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use chrono::Local;
use finlens_core::ai::MockBackend;
use finlens_core::db::Database;
use finlens_core::models::{CategoryLabel, NewExpense};
use finlens_core::test_utils::MockOllamaServer;
use http_body_util::BodyExt;
use tower::ServiceExt;

fn setup_test_app_with(db: Database, ai: Option<AIClient>) -> Router {
    create_router_with_ai(db, ServerConfig::default(), ai).unwrap()
}

fn setup_test_app() -> (Router, Database) {
    let db = Database::in_memory().unwrap();
    let app = setup_test_app_with(db.clone(), Some(AIClient::Mock(MockBackend::new())));
    (app, db)
}

async fn get_body_json(response: axum::response::Response) -> serde_json::Value {
    let body = response.into_body();
    let bytes = body.collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn get(app: &Router, uri: &str) -> axum::response::Response {
    app.clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn post_json(app: &Router, uri: &str, body: serde_json::Value) -> axum::response::Response {
    app.clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_string(&body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap()
}

// ========== Categorization API Tests ==========

#[tokio::test]
async fn test_categorize_rule_match() {
    let (app, db) = setup_test_app();

    let response = post_json(
        &app,
        "/api/categorize",
        serde_json::json!({ "description": "Uber ride to work" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["category"], "Transportation");
    assert_eq!(json["confidence"], 0.95);
    assert_eq!(json["method"], "rule");
    assert_eq!(json["tier"], "auto_apply");
    assert!(json["audit_id"].as_i64().is_some());

    assert_eq!(db.count_audit_entries(None).unwrap(), 1);
}

#[tokio::test]
async fn test_categorize_fallback_is_flagged() {
    let (app, _db) = setup_test_app();

    let response = post_json(
        &app,
        "/api/categorize",
        serde_json::json!({ "description": "quick bite at an obscure diner" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["category"], "Food & Dining");
    assert_eq!(json["method"], "fallback");
    assert_eq!(json["tier"], "apply_with_flag");
}

#[tokio::test]
async fn test_categorize_empty_description_is_bad_request() {
    let (app, db) = setup_test_app();

    let response = post_json(&app, "/api/categorize", serde_json::json!({ "description": "   " })).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = get_body_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("description"));
    assert_eq!(db.count_audit_entries(None).unwrap(), 0);
}

#[tokio::test]
async fn test_categorize_malformed_body_is_bad_request() {
    let (app, _db) = setup_test_app();

    let response = post_json(&app, "/api/categorize", serde_json::json!({ "text": "Uber" })).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_categorize_injection_text_leaves_store_alone() {
    let (app, db) = setup_test_app();

    let response = post_json(
        &app,
        "/api/categorize",
        serde_json::json!({ "description": "'; DROP TABLE expenses; --" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(db.count_expenses().unwrap(), 0);
    assert_eq!(db.count_audit_entries(None).unwrap(), 1);
}

#[tokio::test]
async fn test_categorize_batch_preserves_order() {
    let (app, db) = setup_test_app();

    let response = post_json(
        &app,
        "/api/categorize/batch",
        serde_json::json!({ "descriptions": ["Netflix subscription", "Uber ride", "Pharmacy run"] }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    let outcomes = json.as_array().unwrap();
    assert_eq!(outcomes.len(), 3);
    assert_eq!(outcomes[1]["category"], "Transportation");
    assert_eq!(outcomes[0]["description"], "Netflix subscription");
    assert_eq!(db.count_audit_entries(None).unwrap(), 3);
}

#[tokio::test]
async fn test_categorize_batch_too_large() {
    let (app, db) = setup_test_app();
    let descriptions: Vec<String> = (0..101).map(|i| format!("Uber ride {}", i)).collect();

    let response = post_json(
        &app,
        "/api/categorize/batch",
        serde_json::json!({ "descriptions": descriptions }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(db.count_audit_entries(None).unwrap(), 0);
}

#[tokio::test]
async fn test_override_supersedes_prior_decision() {
    let (app, db) = setup_test_app();

    let first = get_body_json(
        post_json(
            &app,
            "/api/categorize",
            serde_json::json!({ "description": "Uber Eats order" }),
        )
        .await,
    )
    .await;

    let response = post_json(
        &app,
        "/api/categorize/override",
        serde_json::json!({ "description": "Uber Eats order", "category": "Food & Dining" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["method"], "manual");
    assert_eq!(json["confidence"], 1.0);
    assert_eq!(json["supersedes"], first["audit_id"]);
    assert_eq!(db.count_audit_entries(None).unwrap(), 2);
}

#[tokio::test]
async fn test_override_unknown_category() {
    let (app, _db) = setup_test_app();

    let response = post_json(
        &app,
        "/api/categorize/override",
        serde_json::json!({ "description": "Lunch", "category": "Snacks" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_cache_stats_and_clear() {
    let (app, _db) = setup_test_app();

    post_json(
        &app,
        "/api/categorize",
        serde_json::json!({ "description": "quick bite at an obscure diner" }),
    )
    .await;
    post_json(
        &app,
        "/api/categorize",
        serde_json::json!({ "description": "quick bite at an obscure diner" }),
    )
    .await;

    let json = get_body_json(get(&app, "/api/categorize/cache").await).await;
    assert_eq!(json["size"], 1);
    assert_eq!(json["hits"], 1);
    assert_eq!(json["max_entries"], 1000);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/api/categorize/cache")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = get_body_json(get(&app, "/api/categorize/cache").await).await;
    assert_eq!(json["size"], 0);
}

// ========== Question API Tests ==========

#[tokio::test]
async fn test_ask_food_total() {
    let (app, db) = setup_test_app();
    db.insert_expense(&NewExpense {
        date: Local::now().date_naive(),
        description: "Farmers market".to_string(),
        amount: 12.34,
        category: CategoryLabel::FoodDining,
    })
    .unwrap();

    let response = post_json(
        &app,
        "/api/ask",
        serde_json::json!({ "query": "How much did I spend on food in the last 30 days?" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["intent"], "total_by_category_timeframe");
    assert_eq!(json["template_id"], "total_by_category_v1");
    assert_eq!(json["parameters"]["category"], "Food & Dining");
    assert_eq!(json["parameters"]["days"], 30);
    assert_eq!(json["result_count"], 1);
    assert!(json["explanation"].as_str().unwrap().contains("$12.34"));
    assert_eq!(db.count_audit_entries(None).unwrap(), 1);
}

#[tokio::test]
async fn test_ask_unrelated_question_needs_clarification() {
    let (app, db) = setup_test_app();

    let response = post_json(
        &app,
        "/api/ask",
        serde_json::json!({ "query": "What is the meaning of life?" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = get_body_json(response).await;
    assert_eq!(json["status"], "clarification_needed");
    assert_eq!(json["reason"], "ambiguous_intent");
    assert!(!json["examples"].as_array().unwrap().is_empty());
    assert_eq!(db.count_audit_entries(None).unwrap(), 0);
}

#[tokio::test]
async fn test_ask_invalid_parameters_lists_them() {
    let (app, db) = setup_test_app();

    let response = post_json(
        &app,
        "/api/ask",
        serde_json::json!({ "query": "How much did I spend on unicorns in the last 30 days?" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = get_body_json(response).await;
    assert_eq!(json["reason"], "invalid_parameters");
    assert_eq!(json["parameters"][0]["name"], "category");
    assert_eq!(db.count_audit_entries(None).unwrap(), 0);
}

#[tokio::test]
async fn test_ask_empty_query_is_bad_request() {
    let (app, _db) = setup_test_app();

    let response = post_json(&app, "/api/ask", serde_json::json!({ "query": "" })).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_ask_examples() {
    let (app, _db) = setup_test_app();

    let response = get(&app, "/api/ask/examples").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(
        json["examples"].as_array().unwrap().len(),
        finlens_core::EXAMPLE_QUESTIONS.len()
    );
}

// ========== Reference, Audit and Health Tests ==========

#[tokio::test]
async fn test_list_categories() {
    let (app, _db) = setup_test_app();

    let response = get(&app, "/api/categories").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    let categories = json.as_array().unwrap();
    assert_eq!(categories.len(), 11);
    assert!(categories.iter().any(|c| c["name"] == "Food & Dining"));
    assert!(categories[0]["icon"].as_str().is_some());
}

#[tokio::test]
async fn test_audit_log_newest_first_and_clamped() {
    let (app, _db) = setup_test_app();

    for description in ["Uber ride", "Netflix subscription", "Shell gas station"] {
        post_json(
            &app,
            "/api/categorize",
            serde_json::json!({ "description": description }),
        )
        .await;
    }

    let json = get_body_json(get(&app, "/api/audit?limit=2").await).await;
    let entries = json.as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["input_summary"], "Shell gas station");
    assert_eq!(entries[0]["kind"], "categorization");

    // limit=0 is clamped up to 1
    let json = get_body_json(get(&app, "/api/audit?limit=0").await).await;
    assert_eq!(json.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_security_headers() {
    let (app, _db) = setup_test_app();

    let response = get(&app, "/api/health").await;

    let headers = response.headers();
    assert_eq!(headers.get("x-content-type-options").unwrap(), "nosniff");
    assert_eq!(headers.get("x-frame-options").unwrap(), "DENY");
}

#[tokio::test]
async fn test_health_with_mock_backend() {
    let (app, _db) = setup_test_app();

    let json = get_body_json(get(&app, "/api/health").await).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["ai_backend"], "mock");
    assert_eq!(json["ai_available"], true);
}

#[tokio::test]
async fn test_health_rules_only() {
    let app = setup_test_app_with(Database::in_memory().unwrap(), None);

    let json = get_body_json(get(&app, "/api/health").await).await;
    assert_eq!(json["ai_backend"], "none");
    assert_eq!(json["ai_available"], false);
    assert!(json.get("ai_model").is_none());
}

#[tokio::test]
async fn test_rules_only_fallback_defaults_to_other() {
    let app = setup_test_app_with(Database::in_memory().unwrap(), None);

    let response = post_json(
        &app,
        "/api/categorize",
        serde_json::json!({ "description": "quick bite at an obscure diner" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["category"], "Other");
    assert_eq!(json["method"], "fallback");
    assert_eq!(json["tier"], "require_confirmation");
}

// ========== Ollama over HTTP ==========

#[tokio::test]
async fn test_categorize_through_ollama_server() {
    let server = MockOllamaServer::start().await;
    let app = setup_test_app_with(
        Database::in_memory().unwrap(),
        Some(AIClient::ollama(&server.url(), "llama3.2")),
    );

    let json = get_body_json(get(&app, "/api/health").await).await;
    assert_eq!(json["ai_backend"], "ollama");
    assert_eq!(json["ai_available"], true);

    let response = post_json(
        &app,
        "/api/categorize",
        serde_json::json!({ "description": "quick bite at an obscure diner" }),
    )
    .await;
    let json = get_body_json(response).await;
    assert_eq!(json["category"], "Food & Dining");
    assert_eq!(json["confidence"], 0.72);
    assert_eq!(json["model"], "llama3.2");
    assert_eq!(server.request_count(), 1);
}

#[tokio::test]
async fn test_ollama_outage_still_answers() {
    let server = MockOllamaServer::start_failing(503).await;
    let app = setup_test_app_with(
        Database::in_memory().unwrap(),
        Some(AIClient::ollama(&server.url(), "llama3.2")),
    );

    let response = post_json(
        &app,
        "/api/categorize",
        serde_json::json!({ "description": "quick bite at an obscure diner" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["category"], "Other");
    // 503 is transient: one retry, then the default
    assert_eq!(server.request_count(), 2);
}
