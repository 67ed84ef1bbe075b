// JSON API routes driven by the form page
// API keys are accepted but never echoed back.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use super::AppState;
use crate::ai::{CredentialManager, FormFields};
use crate::error::Result;
use crate::form::lock;
use crate::history::LogRow;
use crate::render::RenderedResult;

const DEFAULT_PAGE_SIZE: usize = 20;
const MAX_PAGE_SIZE: usize = 200;

// ---- Request/Response types ----

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub name: String,
    pub version: String,
    pub provider: String,
    pub model: String,
    pub api_key_configured: bool,
    pub is_loading: bool,
    pub button_label: String,
    pub log_entries: usize,
    pub log_capacity: usize,
}

#[derive(Serialize)]
pub struct PromptResponse {
    pub prompt: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultResponse {
    pub result: Option<RenderedResult>,
    pub error: Option<String>,
    pub is_loading: bool,
    pub button_label: String,
}

#[derive(Deserialize)]
pub struct PaginationParams {
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

#[derive(Serialize)]
pub struct LogPageResponse {
    pub total: usize,
    pub offset: usize,
    pub limit: usize,
    pub rows: Vec<LogRow>,
}

#[derive(Serialize)]
pub struct ToggleResponse {
    pub index: usize,
    pub expanded: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeyRequest {
    pub api_key: String,
}

#[derive(Serialize)]
pub struct ApiKeyStatusResponse {
    pub provider: String,
    pub configured: bool,
}

// ---- Route registration ----

pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/status", get(get_status))
        .route("/api/form", get(get_form).put(update_form))
        .route("/api/form/reset", post(reset_form))
        .route("/api/prompt", get(get_prompt))
        .route("/api/submit", post(submit))
        .route("/api/result", get(get_result))
        .route("/api/logs", get(get_logs))
        .route("/api/logs/{index}/toggle", post(toggle_log_row))
        .route(
            "/api/settings/api-key",
            put(set_api_key).get(get_api_key_status).delete(delete_api_key),
        )
}

// ---- Handlers ----

async fn get_status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let (log_entries, log_capacity) = {
        let log = lock(&state.log);
        (log.len(), log.capacity())
    };

    Json(StatusResponse {
        name: "LyricDeck".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        provider: state.config.completion.provider.display_name().to_string(),
        model: state.config.completion.model_name().to_string(),
        api_key_configured: state.client().is_some(),
        is_loading: state.form.is_loading(),
        button_label: state.form.button_label().to_string(),
        log_entries,
        log_capacity,
    })
}

async fn get_form(State(state): State<Arc<AppState>>) -> Json<FormFields> {
    Json(state.form.fields())
}

/// Partial update: body is `{ "<wireName>": "<value>", ... }`
async fn update_form(
    State(state): State<Arc<AppState>>,
    Json(updates): Json<HashMap<String, String>>,
) -> Result<Json<FormFields>> {
    Ok(Json(state.form.apply_updates(&updates)?))
}

async fn reset_form(State(state): State<Arc<AppState>>) -> Json<FormFields> {
    Json(state.form.reset_fields())
}

async fn get_prompt(State(state): State<Arc<AppState>>) -> Json<PromptResponse> {
    Json(PromptResponse { prompt: state.form.preview_prompt() })
}

async fn submit(State(state): State<Arc<AppState>>) -> Result<Json<RenderedResult>> {
    let client = state.require_client()?;
    let rendered = state.form.submit(client.as_ref(), &state.log).await?;
    Ok(Json(rendered))
}

async fn get_result(State(state): State<Arc<AppState>>) -> Json<ResultResponse> {
    Json(ResultResponse {
        result: state.form.result(),
        error: state.form.last_error(),
        is_loading: state.form.is_loading(),
        button_label: state.form.button_label().to_string(),
    })
}

async fn get_logs(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PaginationParams>,
) -> Json<LogPageResponse> {
    let offset = params.offset.unwrap_or(0);
    let limit = params.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);

    let log = lock(&state.log);
    Json(LogPageResponse {
        total: log.len(),
        offset,
        limit,
        rows: log.rows(offset, limit),
    })
}

async fn toggle_log_row(
    State(state): State<Arc<AppState>>,
    Path(index): Path<usize>,
) -> Result<Json<ToggleResponse>> {
    let expanded = lock(&state.log).toggle(index)?;
    Ok(Json(ToggleResponse { index, expanded }))
}

async fn get_api_key_status(State(state): State<Arc<AppState>>) -> Json<ApiKeyStatusResponse> {
    Json(ApiKeyStatusResponse {
        provider: state.config.completion.provider.display_name().to_string(),
        configured: state.client().is_some(),
    })
}

/// Store the key in the keychain and start using it
async fn set_api_key(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ApiKeyRequest>,
) -> Result<StatusCode> {
    let provider = state.config.completion.provider;
    let key = body.api_key.trim().to_string();
    CredentialManager::store_api_key(provider, &key)?;
    state.install_api_key(key)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Remove the keychain key. A key from config/env stays in effect.
async fn delete_api_key(State(state): State<Arc<AppState>>) -> Result<StatusCode> {
    CredentialManager::delete_api_key(state.config.completion.provider)?;
    match state
        .config
        .completion
        .configured_api_key(|name| std::env::var(name).ok())
    {
        Some(key) => state.install_api_key(key)?,
        None => state.set_client(None),
    }
    Ok(StatusCode::NO_CONTENT)
}
