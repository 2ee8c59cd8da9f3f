/// Axum HTTP handlers for the record store REST surface

use ajnabi_ledger::store::wire::{
    CasRequest, CasResponse, ChangesQuery, ChangesResponse, ErrorBody, UpdateRequest,
};
use ajnabi_ledger::{LedgerError, MemoryStore, Query, RecordStore};
use axum::{
    extract::{Path, Query as QueryParams, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

/// Shared application state
pub type AppState = Arc<MemoryStore>;

/// Custom error type for handlers
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            LedgerError::Conflict(msg) => ApiError::Conflict(msg),
            LedgerError::InvalidRecord(msg) => ApiError::BadRequest(msg),
            LedgerError::Serialization(msg) => ApiError::BadRequest(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

/// GET /health
pub async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// POST /rest/{table}
/// Inserts one row and returns it as stored
pub async fn insert_row(
    State(store): State<AppState>,
    Path(table): Path<String>,
    Json(record): Json<Value>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let row = store.insert(&table, record).await?;
    log::debug!("insert into {}", table);
    Ok((StatusCode::CREATED, Json(row)))
}

/// POST /rest/{table}/query
/// Filter, order and limit travel in the body
pub async fn select_rows(
    State(store): State<AppState>,
    Path(table): Path<String>,
    Json(query): Json<Query>,
) -> Result<Json<Vec<Value>>, ApiError> {
    Ok(Json(store.select(&table, &query).await?))
}

/// PATCH /rest/{table}
/// Merges the patch into every row matching the filter
pub async fn update_rows(
    State(store): State<AppState>,
    Path(table): Path<String>,
    Json(req): Json<UpdateRequest>,
) -> Result<Json<Vec<Value>>, ApiError> {
    if !req.patch.is_object() {
        return Err(ApiError::BadRequest("patch must be a JSON object".to_string()));
    }
    let rows = store.update(&table, &req.filter, req.patch).await?;
    log::debug!("update {}: {} row(s)", table, rows.len());
    Ok(Json(rows))
}

/// POST /rest/{table}/{id}/cas
/// Conditional single-field write; `swapped: false` means the field moved
pub async fn compare_and_swap(
    State(store): State<AppState>,
    Path((table, id)): Path<(String, Uuid)>,
    Json(req): Json<CasRequest>,
) -> Result<Json<CasResponse>, ApiError> {
    let swapped = store
        .compare_and_swap(&table, id, &req.field, req.expected, req.new)
        .await?;
    if !swapped {
        log::debug!("cas {}.{} on {} lost", table, req.field, id);
    }
    Ok(Json(CasResponse { swapped }))
}

/// GET /changes?after={seq}&limit={n}
/// Retained change events newer than `after`
pub async fn get_changes(
    State(store): State<AppState>,
    QueryParams(params): QueryParams<ChangesQuery>,
) -> Json<ChangesResponse> {
    let (events, latest_seq) = store.changes_since(params.after, params.limit);
    Json(ChangesResponse { events, latest_seq })
}
