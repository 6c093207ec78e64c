use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::error;

use crate::brain::Brain;
use crate::config::Config;
use crate::runner;
use crate::types::{Plan, RunOutcome, validate};

/// Shared state for the HTTP surface.
pub struct AppState {
    pub config: Arc<Config>,
    pub brain: Brain,
}

/// Body of `/plan` and `/solve`.
#[derive(Debug, Deserialize)]
pub struct GoalRequest {
    #[serde(default)]
    pub goal: String,
    #[serde(default, rename = "startUrl")]
    pub start_url: String,
    #[serde(default)]
    pub trace: bool,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/plan", post(plan))
        .route("/run", post(run))
        .route("/solve", post(solve))
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .with_state(state)
}

async fn healthz() -> Json<Value> {
    Json(json!({ "ok": true }))
}

async fn plan(
    State(state): State<Arc<AppState>>,
    Json(request): Json<GoalRequest>,
) -> Response {
    if request.goal.is_empty() {
        return bad_request("goal is required");
    }
    match state.brain.plan(&request.goal, &request.start_url).await {
        Ok(plan) => (StatusCode::OK, Json(json!({ "ok": true, "plan": plan }))).into_response(),
        Err(err) => {
            error!("planning failed: {err}");
            server_error(&err.to_string())
        }
    }
}

/// Execute a plan supplied directly in the request body. A shape-invalid
/// plan is rejected before any browser session is opened.
async fn run(State(state): State<Arc<AppState>>, Json(body): Json<Value>) -> Response {
    let trace = body["trace"].as_bool().unwrap_or(false);
    let plan = match validate(&body) {
        Ok(plan) => plan,
        Err(err) => return bad_request(&err.to_string()),
    };
    match execute(state, plan, trace).await {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(message) => server_error(&message),
    }
}

/// Plan, then run, composed. The top-level `ok` mirrors the run result.
async fn solve(
    State(state): State<Arc<AppState>>,
    Json(request): Json<GoalRequest>,
) -> Response {
    if request.goal.is_empty() {
        return bad_request("goal is required");
    }
    let plan = match state.brain.plan(&request.goal, &request.start_url).await {
        Ok(plan) => plan,
        Err(err) => {
            error!("planning failed: {err}");
            return server_error(&err.to_string());
        }
    };
    match execute(state, plan.clone(), request.trace).await {
        Ok(outcome) => (
            StatusCode::OK,
            Json(json!({ "ok": outcome.ok, "plan": plan, "result": outcome })),
        )
            .into_response(),
        Err(message) => server_error(&message),
    }
}

/// The browser client is synchronous, so runs go to the blocking pool.
async fn execute(state: Arc<AppState>, plan: Plan, trace: bool) -> Result<RunOutcome, String> {
    let config = state.config.clone();
    tokio::task::spawn_blocking(move || runner::run_plan(&config, &plan, trace))
        .await
        .map_err(|err| format!("runner task failed: {err}"))
}

fn bad_request(message: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "ok": false, "error": message })),
    )
        .into_response()
}

fn server_error(message: &str) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "ok": false, "error": message })),
    )
        .into_response()
}
