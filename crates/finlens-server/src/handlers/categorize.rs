//! Expense categorization handlers

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::Deserialize;

use crate::{AppError, AppState, SuccessResponse};
use finlens_core::{CacheStats, CategorizationOutcome};

/// Unwrap a JSON body, reporting malformed input as 400 rather than axum's 422
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| AppError::bad_request(&rejection.body_text()))
}

#[derive(Debug, Deserialize)]
pub struct CategorizeRequest {
    pub description: String,
}

/// POST /api/categorize - Categorize one expense description
pub async fn categorize(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CategorizeRequest>, JsonRejection>,
) -> Result<Json<CategorizationOutcome>, AppError> {
    let req = json_body(payload)?;
    let outcome = state.categorizer.classify(&req.description).await?;
    Ok(Json(outcome))
}

#[derive(Debug, Deserialize)]
pub struct BatchCategorizeRequest {
    pub descriptions: Vec<String>,
}

/// POST /api/categorize/batch - Categorize up to MAX_BATCH_SIZE descriptions in order
pub async fn categorize_batch(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<BatchCategorizeRequest>, JsonRejection>,
) -> Result<Json<Vec<CategorizationOutcome>>, AppError> {
    let req = json_body(payload)?;
    let outcomes = state.categorizer.classify_batch(&req.descriptions).await?;
    Ok(Json(outcomes))
}

#[derive(Debug, Deserialize)]
pub struct OverrideRequest {
    pub description: String,
    pub category: String,
}

/// POST /api/categorize/override - Record the user's own category for a description
pub async fn override_category(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<OverrideRequest>, JsonRejection>,
) -> Result<Json<CategorizationOutcome>, AppError> {
    let req = json_body(payload)?;
    let outcome = state
        .categorizer
        .override_category(&req.description, &req.category)?;
    Ok(Json(outcome))
}

/// GET /api/categorize/cache - Fallback cache statistics
pub async fn cache_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<CacheStats>, AppError> {
    state
        .categorizer
        .cache_stats()
        .map(Json)
        .ok_or_else(|| AppError::bad_request("The classification cache is disabled"))
}

/// DELETE /api/categorize/cache - Drop every cached fallback answer
pub async fn clear_cache(State(state): State<Arc<AppState>>) -> Json<SuccessResponse> {
    state.categorizer.clear_cache();
    Json(SuccessResponse { success: true })
}
