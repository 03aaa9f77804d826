//! Test utilities for finlens-core
//!
//! A mock Ollama server that answers the three prompts in `prompts/*.md`
//! with canned JSON, plus failure modes for exercising timeouts and retries
//! over real HTTP.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

#[derive(Clone)]
enum Mode {
    /// Answer every prompt from the canned tables
    Canned,
    /// Return this status code for the first `n` generate calls, then answer
    FailFirst { status: u16, n: usize },
    /// Return this raw model text for every generate call
    Fixed(String),
    /// Sleep before answering
    Slow(Duration),
}

struct ServerState {
    mode: Mode,
    requests: AtomicUsize,
}

/// Mock Ollama server for testing and development
pub struct MockOllamaServer {
    addr: SocketAddr,
    state: Arc<ServerState>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockOllamaServer {
    /// Start the mock server on an available port
    pub async fn start() -> Self {
        Self::start_with_mode(Mode::Canned).await
    }

    /// Every generate call fails with `status`
    pub async fn start_failing(status: u16) -> Self {
        Self::start_with_mode(Mode::FailFirst {
            status,
            n: usize::MAX,
        })
        .await
    }

    /// The first `n` generate calls fail with `status`, later ones succeed
    pub async fn start_flaky(status: u16, n: usize) -> Self {
        Self::start_with_mode(Mode::FailFirst { status, n }).await
    }

    /// Every generate call returns `response` as the model text
    pub async fn start_with_response(response: &str) -> Self {
        Self::start_with_mode(Mode::Fixed(response.to_string())).await
    }

    /// Every generate call waits `delay` before answering
    pub async fn start_slow(delay: Duration) -> Self {
        Self::start_with_mode(Mode::Slow(delay)).await
    }

    async fn start_with_mode(mode: Mode) -> Self {
        let state = Arc::new(ServerState {
            mode,
            requests: AtomicUsize::new(0),
        });

        let app = Router::new()
            .route("/api/tags", get(handle_tags))
            .route("/api/generate", post(handle_generate))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            state,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Get the base URL for this mock server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Number of generate calls received so far
    pub fn request_count(&self) -> usize {
        self.state.requests.load(Ordering::SeqCst)
    }

    /// Stop the mock server
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockOllamaServer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[derive(Serialize)]
struct TagsResponse {
    models: Vec<ModelInfo>,
}

#[derive(Serialize)]
struct ModelInfo {
    name: String,
}

#[derive(Deserialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
}

#[derive(Serialize)]
struct GenerateResponse {
    model: String,
    response: String,
    done: bool,
}

async fn handle_tags() -> Json<TagsResponse> {
    Json(TagsResponse {
        models: vec![ModelInfo {
            name: "llama3.2:latest".to_string(),
        }],
    })
}

async fn handle_generate(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<GenerateRequest>,
) -> Response {
    let seen = state.requests.fetch_add(1, Ordering::SeqCst);

    let response = match &state.mode {
        Mode::FailFirst { status, n } if seen < *n => {
            let code = StatusCode::from_u16(*status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            return (code, "mock failure").into_response();
        }
        Mode::Fixed(text) => text.clone(),
        Mode::Slow(delay) => {
            tokio::time::sleep(*delay).await;
            canned_response(&request.prompt)
        }
        _ => canned_response(&request.prompt),
    };

    Json(GenerateResponse {
        model: request.model,
        response,
        done: true,
    })
    .into_response()
}

/// Pick the canned answer by which prompt template was rendered
fn canned_response(prompt: &str) -> String {
    if prompt.contains("Draft answer:") {
        let draft = section_after(prompt, "Draft answer:");
        serde_json::json!({ "explanation": draft }).to_string()
    } else if prompt.contains("Supported query types:") {
        let question = quoted_after(prompt, "Question: \"").to_lowercase();
        let intent = if question.contains("overspending") || question.contains("budget") {
            ("budget_status", 0.8)
        } else if question.contains("split") || question.contains("categories") {
            ("category_breakdown", 0.75)
        } else {
            ("unknown", 0.1)
        };
        serde_json::json!({ "intent": intent.0, "confidence": intent.1 }).to_string()
    } else {
        let description = quoted_after(prompt, "Description: \"").to_lowercase();
        let (category, confidence, reasoning) = if description.contains("diner") {
            ("Food & Dining", 0.72, "Diners serve meals")
        } else if description.contains("ferry") {
            ("Travel", 0.66, "Ferries are usually trips")
        } else if description.contains("mystery") {
            ("Snacks", 0.9, "Invented label")
        } else {
            ("Other", 0.35, "No strong signal")
        };
        serde_json::json!({
            "category": category,
            "confidence": confidence,
            "reasoning": reasoning,
        })
        .to_string()
    }
}

fn quoted_after(prompt: &str, marker: &str) -> String {
    prompt
        .find(marker)
        .map(|start| &prompt[start + marker.len()..])
        .and_then(|rest| rest.find('"').map(|end| rest[..end].to_string()))
        .unwrap_or_default()
}

fn section_after(prompt: &str, marker: &str) -> String {
    prompt
        .find(marker)
        .map(|start| &prompt[start + marker.len()..])
        .map(|rest| rest.split("\n\n").next().unwrap_or_default().trim().to_string())
        .unwrap_or_default()
}
