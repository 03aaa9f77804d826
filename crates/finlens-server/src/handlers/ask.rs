//! Natural-language question handlers

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::categorize::json_body;
use crate::{AppError, AppState};
use finlens_core::{AskOutcome, EXAMPLE_QUESTIONS};

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub query: String,
}

/// POST /api/ask - Answer a question about spending
///
/// Questions that cannot be mapped to a supported query, or whose parameters
/// fail validation, get a 422 with a clarifying payload instead of an answer.
pub async fn ask(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<AskRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let req = json_body(payload)?;

    match state.query.respond(&req.query).await? {
        AskOutcome::Answer(answer) => Ok(Json(answer).into_response()),
        AskOutcome::Clarification(clarification) => {
            debug!(reason = ?clarification.reason, "Asking the user to rephrase");
            Ok((StatusCode::UNPROCESSABLE_ENTITY, Json(clarification)).into_response())
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ExamplesResponse {
    pub examples: Vec<&'static str>,
}

/// GET /api/ask/examples - Questions the engine is known to answer
pub async fn ask_examples() -> Json<ExamplesResponse> {
    Json(ExamplesResponse {
        examples: EXAMPLE_QUESTIONS.to_vec(),
    })
}
