//! Brandpilot HTTP surface
//!
//! Thin axum layer translating wire JSON to and from the agent.

use std::sync::Arc;

use anyhow::Context;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use brandpilot_core::agent::{Agent, AgentResponse, AgentSettings, RequestStatus};
use brandpilot_core::cache::SessionCache;
use brandpilot_core::config::Config;
use brandpilot_core::provider::UpstreamClient;
use brandpilot_core::tools::{BrandBriefStore, ContentDatabase, ToolRegistry};

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub agent: Arc<Agent>,
    pub briefs: Arc<BrandBriefStore>,
}

impl AppState {
    /// Wire up cache, upstream client, data stores and agent from `config`
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let cache = Arc::new(SessionCache::connect(&config.cache).await);
        let client = UpstreamClient::new(config.provider.clone(), cache)
            .context("Failed to create upstream client")?;

        let briefs = Arc::new(BrandBriefStore::with_defaults());
        if let Some(dir) = &config.data.brand_briefs_dir {
            match briefs.load_dir(dir) {
                Ok(count) => info!(dir = %dir.display(), count, "Loaded brand briefs"),
                Err(e) => warn!(dir = %dir.display(), error = %e, "Could not read brand briefs directory"),
            }
        }

        let database = match &config.data.content_db_dir {
            Some(dir) => ContentDatabase::load(dir)
                .with_context(|| format!("Failed to load content database from {}", dir.display()))?,
            None => ContentDatabase::builtin(),
        };

        let tools = ToolRegistry::standard(briefs.clone(), Arc::new(database));
        let settings = AgentSettings::from_config(&config.agent, &config.provider);
        let agent = Agent::new(Arc::new(client), Arc::new(tools), settings);

        Ok(Self {
            agent: Arc::new(agent),
            briefs,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub prompt: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelRequest {
    #[serde(default)]
    pub request_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CancelResponse {
    pub success: bool,
    pub message: String,
}

type ApiError = (StatusCode, Json<Value>);

fn not_found(detail: String) -> ApiError {
    (StatusCode::NOT_FOUND, Json(json!({ "detail": detail })))
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/chat", post(chat))
        .route("/cancel", post(cancel))
        .route("/request-status/:request_id", get(request_status))
        .route("/brand-briefs", get(list_brand_briefs))
        .route("/brand-briefs/:name", get(get_brand_brief))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn root(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "message": "Brandpilot API is running",
        "mock_mode": state.agent.is_mock(),
    }))
}

async fn chat(State(state): State<AppState>, Json(request): Json<ChatRequest>) -> Json<AgentResponse> {
    let session_id = request
        .session_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    Json(state.agent.process_query(&request.prompt, &session_id).await)
}

async fn cancel(State(state): State<AppState>, Json(request): Json<CancelRequest>) -> Json<CancelResponse> {
    let request_id = request.request_id.trim();
    if request_id.is_empty() {
        return Json(CancelResponse {
            success: false,
            message: "No request ID provided".to_string(),
        });
    }

    let response = if state.agent.cancel_request(request_id) {
        CancelResponse {
            success: true,
            message: format!("Request {} cancelled successfully", request_id),
        }
    } else {
        info!(request_id = %request_id, "Request could not be cancelled");
        CancelResponse {
            success: false,
            message: format!(
                "Request {} could not be cancelled (not found or already completed)",
                request_id
            ),
        }
    };
    Json(response)
}

async fn request_status(
    State(state): State<AppState>,
    Path(request_id): Path<String>,
) -> Result<Json<RequestStatus>, ApiError> {
    state
        .agent
        .request_status(&request_id)
        .map(Json)
        .ok_or_else(|| not_found(format!("Request {} not found", request_id)))
}

async fn list_brand_briefs(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "briefs": state.briefs.summaries() }))
}

async fn get_brand_brief(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state
        .briefs
        .get(&name)
        .map(Json)
        .ok_or_else(|| not_found(format!("Brand brief '{}' not found", name)))
}
