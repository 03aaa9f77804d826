//! FinLens Web Server
//!
//! Axum-based REST API over the FinLens decision engines.
//!
//! - Restrictive CORS policy and security headers
//! - Input validation (batch and pagination limits)
//! - Every categorization and answered question recorded in the audit ledger
//! - Sanitized error responses

use std::sync::Arc;

use axum::{
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::{cors::CorsLayer, set_header::SetResponseHeaderLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use finlens_core::ai::{AIBackend, AIClient};
use finlens_core::audit::AuditLedger;
use finlens_core::db::Database;
use finlens_core::query::RecordStore;
use finlens_core::{Categorizer, ClarifyingResponse, EngineConfig, QueryEngine};

mod handlers;

/// Maximum pagination limit
pub const MAX_PAGE_LIMIT: usize = 1000;

/// Server configuration
#[derive(Clone, Default)]
pub struct ServerConfig {
    /// Allowed CORS origins (empty = same-origin only)
    pub allowed_origins: Vec<String>,
    /// Engine thresholds, timeouts and cache settings
    pub engine: EngineConfig,
}

/// Shared application state
pub struct AppState {
    pub db: Database,
    pub ai: Option<AIClient>,
    pub categorizer: Categorizer,
    pub query: QueryEngine,
}

impl AppState {
    /// Wire both engines to the database, which serves as record store and ledger
    pub fn new(db: Database, ai: Option<AIClient>, engine: &EngineConfig) -> anyhow::Result<Self> {
        let ledger: Arc<dyn AuditLedger> = Arc::new(db.clone());
        let store: Arc<dyn RecordStore> = Arc::new(db.clone());

        let categorizer = Categorizer::from_config(engine, ai.clone(), ledger.clone())?;
        let query = QueryEngine::from_config(engine, ai.clone(), store, ledger)?;

        Ok(Self {
            db,
            ai,
            categorizer,
            query,
        })
    }
}

/// Create the application router, selecting the AI backend from the environment
pub fn create_router(db: Database, config: ServerConfig) -> anyhow::Result<Router> {
    let ai = AIClient::from_env();
    match ai {
        Some(ref client) => info!(
            "AI backend configured: {} ({}, model: {})",
            client.kind(),
            client.host(),
            client.model()
        ),
        None => info!("ℹ️  AI backend not configured (set OLLAMA_HOST to enable the language-model fallback)"),
    }
    create_router_with_ai(db, config, ai)
}

/// Create the application router with an explicit AI backend (for testing)
pub fn create_router_with_ai(
    db: Database,
    config: ServerConfig,
    ai: Option<AIClient>,
) -> anyhow::Result<Router> {
    let state = Arc::new(AppState::new(db, ai, &config.engine)?);

    let api_routes = Router::new()
        // Categorization
        .route("/categorize", post(handlers::categorize))
        .route("/categorize/batch", post(handlers::categorize_batch))
        .route("/categorize/override", post(handlers::override_category))
        .route(
            "/categorize/cache",
            get(handlers::cache_stats).delete(handlers::clear_cache),
        )
        // Natural-language queries
        .route("/ask", post(handlers::ask))
        .route("/ask/examples", get(handlers::ask_examples))
        // Reference data
        .route("/categories", get(handlers::list_categories))
        // Audit
        .route("/audit", get(handlers::list_audit_log))
        // Status
        .route("/health", get(handlers::health));

    // Build CORS layer
    let cors = if config.allowed_origins.is_empty() {
        // Restrictive default: only allow same-origin
        CorsLayer::new()
            .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE])
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE])
    };

    let app = Router::new()
        .nest("/api", api_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        // Security headers
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ));

    Ok(app)
}

/// Start the server
pub async fn serve(db: Database, host: &str, port: u16) -> anyhow::Result<()> {
    serve_with_config(db, host, port, ServerConfig::default()).await
}

/// Start the server with custom configuration
pub async fn serve_with_config(
    db: Database,
    host: &str,
    port: u16,
    config: ServerConfig,
) -> anyhow::Result<()> {
    match db.is_encrypted() {
        Ok(true) => {}
        Ok(false) => {
            warn!("⚠️  Database is not encrypted - set FINLENS_DB_KEY to protect the audit log")
        }
        Err(e) => warn!("Failed to check database encryption: {}", e),
    }

    check_ai_connection().await;

    let app = create_router(db, config)?;
    let addr = format!("{}:{}", host, port);

    info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Check and log AI backend connection status
async fn check_ai_connection() {
    match AIClient::from_env() {
        Some(client) => {
            if client.health_check().await {
                info!(
                    "✅ AI backend connected: {} (model: {})",
                    client.host(),
                    client.model()
                );
            } else {
                warn!(
                    "⚠️  AI backend configured but not responding: {} - categorization will use rules and defaults",
                    client.host()
                );
            }
        }
        None => {
            info!("ℹ️  AI backend not configured (running rules-only)");
        }
    }
}

/// Success response
#[derive(Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

// ============================================================================
// Error Handling
// ============================================================================

/// Application error type with proper HTTP status codes
pub struct AppError {
    status: StatusCode,
    message: String,
    /// Replaces the `{"error": ...}` body when set
    payload: Option<serde_json::Value>,
    internal: Option<anyhow::Error>,
}

impl AppError {
    pub fn bad_request(msg: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.to_string(),
            payload: None,
            internal: None,
        }
    }

    /// 422 carrying a clarifying response
    pub fn clarification(response: &ClarifyingResponse) -> Self {
        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            message: response.message.clone(),
            payload: serde_json::to_value(response).ok(),
            internal: None,
        }
    }

    pub fn unavailable(msg: &str) -> Self {
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
            message: msg.to_string(),
            payload: None,
            internal: None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log the full internal error if present
        if let Some(err) = &self.internal {
            error!(error = %err, status = %self.status, "Request failed");
        }

        let body = self
            .payload
            .unwrap_or_else(|| serde_json::json!({ "error": self.message }));

        (self.status, Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        let err = err.into();

        let client_error = err.downcast_ref::<finlens_core::Error>().and_then(|core| {
            if let Some(clarification) = ClarifyingResponse::from_error(core) {
                return Some(Self::clarification(&clarification));
            }
            match core {
                // Caller mistakes are safe to echo back
                finlens_core::Error::Validation(msg) => Some(Self::bad_request(msg)),
                _ => None,
            }
        });
        if let Some(client_error) = client_error {
            return client_error;
        }

        if matches!(
            err.downcast_ref::<finlens_core::Error>(),
            Some(finlens_core::Error::Execution(_))
        ) {
            return Self {
                internal: Some(err),
                ..Self::unavailable("The expense store is unavailable")
            };
        }

        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            // Return generic message to client
            message: "An internal error occurred".to_string(),
            payload: None,
            // Keep full error for logging
            internal: Some(err),
        }
    }
}

#[cfg(test)]
mod tests;
