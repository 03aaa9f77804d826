//! Reference data and health handlers

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::Serialize;

use crate::AppState;
use finlens_core::ai::AIBackend;
use finlens_core::CategoryLabel;

#[derive(Debug, Serialize)]
pub struct CategoryInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub icon: &'static str,
    pub color: &'static str,
    pub description: &'static str,
}

/// GET /api/categories - The fixed category taxonomy
pub async fn list_categories() -> Json<Vec<CategoryInfo>> {
    let categories = CategoryLabel::ALL
        .iter()
        .map(|c| CategoryInfo {
            id: c.id(),
            name: c.as_str(),
            icon: c.icon(),
            color: c.color(),
            description: c.description(),
        })
        .collect();
    Json(categories)
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    /// Backend kind, or "none" when running rules-only
    pub ai_backend: &'static str,
    pub ai_available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_model: Option<String>,
}

/// GET /api/health - Server and AI backend status
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let (ai_backend, ai_available, ai_model) = match state.ai {
        Some(ref client) => (
            client.kind(),
            client.health_check().await,
            Some(client.model().to_string()),
        ),
        None => ("none", false, None),
    };

    Json(HealthResponse {
        status: "ok",
        ai_backend,
        ai_available,
        ai_model,
    })
}
