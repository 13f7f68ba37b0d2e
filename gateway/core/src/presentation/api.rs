// Copyright (c) 2026 TR5 Chat Contributors
// SPDX-License-Identifier: AGPL-3.0

//! HTTP API
//!
//! | Route | Method | Handler |
//! |-------|--------|---------|
//! | `/api/chat` | POST | stateless chat |
//! | `/api/chat/stream` | POST | stateless chat replayed as SSE, one character per event |
//! | `/api/v2/chat` | POST | memory-backed chat |
//! | `/api/v2/chat/context/{conversation_id}` | GET | stored conversation context |
//! | `/api/v2/chat/save-training` | POST | training data upload |
//! | `/api/v2/chat/patterns` | POST | conversation pattern extraction |
//! | `/api/health`, `/api/v2/health` | GET | provider and platform status |
//! | `/api/info` | GET | service description |

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderValue, Method},
    response::sse::{Event, Sse},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use futures::stream::Stream;
use metrics::counter;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::info;

use super::error::ApiError;
use crate::application::chat::{ChatExchange, ChatRequest, ChatService, ChatSettings, MemoryMode};
use crate::application::fallback::{FallbackOrchestrator, FallbackPolicy};
use crate::application::training::{SaveTrainingRequest, SavedTraining, TrainingService};
use crate::domain::gateway_config::GatewayConfigManifest;
use crate::domain::memory::ConversationMemory;
use crate::infrastructure::llm::ProviderRegistry;
use crate::infrastructure::PlatformMemoryClient;

pub const SERVICE_NAME: &str = "TR5 Chat Gateway";

pub struct AppState {
    pub chat: Arc<ChatService>,
    pub training: Arc<TrainingService>,
    pub stream_delay: Duration,
    pub context_default_limit: usize,
    pub cors_allowed_origins: Vec<String>,
    pub static_dir: Option<PathBuf>,
    pub hostname: Option<String>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(chat: Arc<ChatService>, training: Arc<TrainingService>, config: &GatewayConfigManifest) -> Self {
        Self {
            chat,
            training,
            stream_delay: config.spec.chat.stream_delay,
            context_default_limit: config.spec.memory.context_endpoint_default_limit,
            cors_allowed_origins: config.spec.server.cors_allowed_origins.clone(),
            static_dir: config.spec.server.static_dir.clone(),
            hostname: hostname::get().ok().and_then(|h| h.into_string().ok()),
            started_at: Instant::now(),
        }
    }

    /// Wire providers, the platform client and the services from configuration.
    pub fn from_config(config: &GatewayConfigManifest) -> anyhow::Result<Self> {
        let registry = Arc::new(ProviderRegistry::from_config(config)?);
        let orchestrator = Arc::new(FallbackOrchestrator::new(registry, FallbackPolicy::from_config(config)));
        let memory = Arc::new(PlatformMemoryClient::from_config(&config.spec.memory)?);

        if memory.is_configured() {
            info!(platform_url = %config.spec.memory.platform_url, "Conversation memory enabled");
        } else {
            info!("PLATFORM_API_KEY not set, conversation memory disabled");
        }

        let chat = Arc::new(ChatService::new(orchestrator, memory.clone(), ChatSettings::from_config(config)));
        let training = Arc::new(TrainingService::new(memory));
        Ok(Self::new(chat, training, config))
    }
}

pub fn app(state: Arc<AppState>) -> Router {
    let cors = build_cors_layer(&state.cors_allowed_origins);
    let static_dir = state.static_dir.clone();

    let api = Router::new()
        .route("/api/chat", post(chat_stateless))
        .route("/api/chat/stream", post(chat_stream))
        .route("/api/v2/chat", post(chat_with_memory))
        .route("/api/v2/chat/context/{conversation_id}", get(conversation_context))
        .route("/api/v2/chat/save-training", post(save_training))
        .route("/api/v2/chat/patterns", post(extract_patterns))
        .route("/api/health", get(health))
        .route("/api/v2/health", get(health))
        .route("/api/info", get(service_info))
        .route("/api/{*rest}", get(api_not_found).post(api_not_found))
        .with_state(state);

    let router = match static_dir {
        Some(dir) => {
            let index = dir.join("index.html");
            api.fallback_service(ServeDir::new(dir).not_found_service(ServeFile::new(index)))
        }
        None => api.fallback(api_not_found),
    };

    router.layer(TraceLayer::new_for_http()).layer(cors)
}

fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    if origins.is_empty() {
        return cors.allow_origin(Any);
    }

    let parsed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
    cors.allow_origin(AllowOrigin::list(parsed))
}

async fn chat_stateless(State(state): State<Arc<AppState>>, body: Bytes) -> Result<Json<ChatExchange>, ApiError> {
    counter!("tr5_chat_requests_total", "endpoint" => "chat").increment(1);
    let request = ChatRequest::from_body(&body)?;
    Ok(Json(state.chat.handle(request, MemoryMode::Stateless).await?))
}

async fn chat_with_memory(State(state): State<Arc<AppState>>, body: Bytes) -> Result<Json<ChatExchange>, ApiError> {
    counter!("tr5_chat_requests_total", "endpoint" => "chat_v2").increment(1);
    let request = ChatRequest::from_body(&body)?;
    Ok(Json(state.chat.handle(request, MemoryMode::Stateful).await?))
}

/// Replays a stateless reply one character at a time. Failures become a
/// single `error` event instead of an HTTP error status.
async fn chat_stream(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    counter!("tr5_chat_requests_total", "endpoint" => "chat_stream").increment(1);
    let chat = state.chat.clone();
    let delay = state.stream_delay;

    let stream = async_stream::stream! {
        let exchange = match ChatRequest::from_body(&body) {
            Ok(request) => chat.handle(request, MemoryMode::Stateless).await,
            Err(e) => Err(e),
        };

        match exchange {
            Ok(exchange) => {
                let (message_id, text) = exchange
                    .reply()
                    .map(|m| (m.id.clone(), m.text()))
                    .unwrap_or_default();

                for (index, ch) in text.chars().enumerate() {
                    yield Event::default().json_data(json!({
                        "type": "text",
                        "content": ch.to_string(),
                        "index": index,
                    }));
                    tokio::time::sleep(delay).await;
                }

                yield Event::default().json_data(json!({
                    "type": "complete",
                    "message_id": message_id,
                    "timestamp": Utc::now().to_rfc3339(),
                    "model": exchange.model_used,
                }));
            }
            Err(e) => {
                yield Event::default().json_data(json!({ "type": "error", "error": e.to_string() }));
            }
        }
    };

    Sse::new(stream)
}

// `limit` stays raw so a non-numeric value falls back to the default instead of a 400.
#[derive(Debug, Deserialize)]
struct ContextParams {
    limit: Option<String>,
}

impl ContextParams {
    fn limit_or(&self, default: usize) -> usize {
        self.limit
            .as_deref()
            .and_then(|raw| raw.trim().parse().ok())
            .unwrap_or(default)
    }
}

async fn conversation_context(
    State(state): State<Arc<AppState>>,
    Path(conversation_id): Path<String>,
    Query(params): Query<ContextParams>,
) -> Json<Value> {
    let limit = params.limit_or(state.context_default_limit);
    let messages = state.chat.load_context(&conversation_id, limit).await;

    Json(json!({
        "conversationId": conversation_id,
        "count": messages.len(),
        "messages": messages,
    }))
}

async fn save_training(State(state): State<Arc<AppState>>, body: Bytes) -> Result<Json<SavedTraining>, ApiError> {
    let request: SaveTrainingRequest = parse_optional_body(&body)?;
    Ok(Json(state.training.save(request).await?))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PatternRequest {
    #[serde(default)]
    user_id: Option<i64>,
    #[serde(default)]
    conversation_id: Option<String>,
}

async fn extract_patterns(State(state): State<Arc<AppState>>, body: Bytes) -> Result<Json<Value>, ApiError> {
    let request: PatternRequest = parse_optional_body(&body)?;
    let conversation_id = request
        .conversation_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("No conversation id provided".into()))?;

    let patterns = state.chat.patterns(request.user_id.unwrap_or(1), &conversation_id).await;
    Ok(Json(json!({
        "conversationId": conversation_id,
        "patterns": patterns,
    })))
}

async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    let apis: serde_json::Map<String, Value> = state
        .chat
        .orchestrator()
        .registry()
        .configuration_status()
        .into_iter()
        .map(|(kind, configured)| {
            let status = if configured { "configured" } else { "not_configured" };
            (kind.as_str().to_string(), Value::from(status))
        })
        .collect();
    let memory = state.chat.memory();

    Json(json!({
        "status": "healthy",
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "host": state.hostname,
        "timestamp": Utc::now().to_rfc3339(),
        "uptimeSeconds": state.started_at.elapsed().as_secs(),
        "apis": apis,
        "database": {
            "platform_url": memory.platform_url(),
            "connected": memory.is_configured(),
        },
    }))
}

async fn service_info() -> Json<Value> {
    Json(json!({
        "name": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Multi-provider chat gateway with conversation memory",
        "endpoints": {
            "chat": "/api/chat",
            "chat_stream": "/api/chat/stream",
            "chat_v2": "/api/v2/chat",
            "context": "/api/v2/chat/context/{conversation_id}",
            "save_training": "/api/v2/chat/save-training",
            "patterns": "/api/v2/chat/patterns",
            "health": "/api/health",
            "health_v2": "/api/v2/health",
        },
        "features": [
            "provider fallback chain (openai, groq, deepseek, huggingface)",
            "conversation memory",
            "training data upload",
            "pattern extraction",
            "simulated streaming",
        ],
    }))
}

async fn api_not_found() -> ApiError {
    ApiError::NotFound("Endpoint not found".into())
}

/// Empty bodies decode as `T::default()`.
fn parse_optional_body<T: serde::de::DeserializeOwned + Default>(body: &[u8]) -> Result<T, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(format!("Invalid JSON body: {e}")))
}
