mod api;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::{Query, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use relay_core::{
    JobHandle, JobService, OpenAiJobService, Registry, Settings, ToolSchema,
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::api::{
    ApiError, ChatRequest, ChatResponse, CheckRequest, CheckResponse, StartQuery, StartResponse,
};

// Shared by every handler: the job service, the read-only tool registry and settings.
#[derive(Clone)]
struct AppState {
    service: Arc<dyn JobService>,
    registry: Arc<Registry>,
    settings: Arc<Settings>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    info!("Chat relay gateway initializing...");

    // 2. Configuration
    let settings = Settings::from_env().context("Failed to load configuration")?;

    // 3. Tool registry, built once and shared read-only
    let registry = Registry::load(relay_tools::builtin(&settings.webhook_url))
        .context("Failed to load tool registry")?;
    let schema_names: Vec<&str> = registry.schemas().iter().map(ToolSchema::name).collect();
    info!(tools = ?schema_names, "Loaded tool schemas");
    info!(functions = ?registry.function_names(), "Available functions");

    // 4. Assistant service client
    let service = OpenAiJobService::new(&settings.openai_api_key);

    let port = settings.port;
    let state = AppState {
        service: Arc::new(service),
        registry: Arc::new(registry),
        settings: Arc::new(settings),
    };

    // 5. Serve
    let listener = TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("Failed to bind port {port}"))?;
    info!("Gateway listening on port {}...", port);

    axum::serve(listener, router(state)).await.context("Server error")?;
    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/tools", get(list_tools))
        .route("/start", get(start_thread))
        .route("/chat", post(chat))
        .route("/check", post(check_run))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// --- HANDLERS ---

async fn health_check() -> &'static str {
    "Chat relay gateway: Operational"
}

async fn list_tools(State(state): State<AppState>) -> Json<Vec<ToolSchema>> {
    Json(state.registry.schemas().to_vec())
}

async fn start_thread(
    State(state): State<AppState>,
    Query(query): Query<StartQuery>,
) -> Result<Json<StartResponse>, ApiError> {
    let platform = query.platform.as_deref().unwrap_or("Not Specified");
    let username = query.username.as_deref().unwrap_or("Not Specified");
    info!(platform, username, "Starting new conversation");

    let thread_id = state.service.create_thread().await.map_err(|e| {
        error!("Error creating thread: {}", e);
        ApiError::internal()
    })?;

    info!(thread_id = %thread_id, "New thread created");
    Ok(Json(StartResponse { thread_id, message: "Thread created".to_string() }))
}

fn verify_token(headers: &HeaderMap, expected: &str) -> Result<(), ApiError> {
    let header = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::bad_request("Missing Authorization header"))?;

    match header.split_whitespace().nth(1) {
        Some(token) if token == expected => Ok(()),
        _ => Err(ApiError::forbidden("Forbidden: invalid token")),
    }
}

async fn chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    verify_token(&headers, &state.settings.access_token)?;

    let thread_id = payload
        .thread_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing thread_id"))?;
    let message = payload
        .message
        .filter(|m| !m.is_empty())
        .ok_or_else(|| ApiError::bad_request("Message is required and must be a string"))?;

    info!(thread_id = %thread_id, "Received message");

    let message_id = state.service.add_user_message(&thread_id, &message).await.map_err(|e| {
        error!(thread_id = %thread_id, "Error posting message: {}", e);
        ApiError::internal()
    })?;
    info!(message_id = %message_id, "Message sent");

    let run_id = state
        .service
        .create_run(&thread_id, &state.settings.assistant_id)
        .await
        .map_err(|e| {
            error!(thread_id = %thread_id, "Error creating run: {}", e);
            ApiError::internal()
        })?;
    info!(run_id = %run_id, "Run created");

    Ok(Json(ChatResponse { run_id }))
}

async fn check_run(
    State(state): State<AppState>,
    Json(payload): Json<CheckRequest>,
) -> Result<(StatusCode, Json<CheckResponse>), ApiError> {
    let (Some(thread_id), Some(run_id)) = (payload.thread_id, payload.run_id) else {
        return Err(ApiError::bad_request("Missing thread_id or run_id"));
    };
    let handle = JobHandle::new(thread_id, run_id);

    let outcome = relay_core::resolve(state.service.as_ref(), &state.registry, &handle, state.settings.run)
        .await
        .map_err(|e| {
            error!(run_id = %handle.run_id, "Error processing tool calls: {}", e);
            ApiError::internal()
        })?;

    let (status, body) = CheckResponse::from_outcome(outcome);
    Ok((status, Json(body)))
}
