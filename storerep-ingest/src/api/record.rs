//! Working record API handlers
//!
//! GET /api/record, PUT /api/record/fields/{field}, DELETE /api/record

use axum::{
    extract::{Path, State},
    routing::{get, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    alias,
    error::{ApiError, ApiResult},
    schema::{CanonicalRecord, Field, FieldValue},
    AppState,
};

/// PUT /api/record/fields/{field} request
#[derive(Debug, Deserialize)]
pub struct EditFieldRequest {
    #[serde(default)]
    pub value: Value,
}

/// PUT /api/record/fields/{field} response
#[derive(Debug, Serialize)]
pub struct EditFieldResponse {
    pub field: Field,
    /// Value as stored (may be a transient `""` for a numeric field)
    pub value: FieldValue,
    pub record: CanonicalRecord,
}

/// GET /api/record
///
/// Materialized record: every field present and within its invariants.
pub async fn get_record(State(state): State<AppState>) -> Json<CanonicalRecord> {
    Json(state.record.read().await.materialize())
}

/// PUT /api/record/fields/{field}
///
/// `field` is a canonical key (`totalRevenue`) or any known synonym.
pub async fn edit_field(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(request): Json<EditFieldRequest>,
) -> ApiResult<Json<EditFieldResponse>> {
    let field = Field::from_key(&key)
        .or_else(|| alias::resolve_label(&key))
        .ok_or_else(|| ApiError::NotFound(format!("Unknown report field: {}", key)))?;

    let mut record = state.record.write().await;
    let value = record.apply_edit(field, &request.value);

    tracing::debug!(field = %field, "Field edited");

    Ok(Json(EditFieldResponse {
        field,
        value,
        record: record.materialize(),
    }))
}

/// DELETE /api/record
pub async fn reset_record(State(state): State<AppState>) -> Json<CanonicalRecord> {
    let mut record = state.record.write().await;
    record.reset();
    Json(record.materialize())
}

/// Build working record routes
pub fn record_routes() -> Router<AppState> {
    Router::new()
        .route("/api/record", get(get_record).delete(reset_record))
        .route("/api/record/fields/:field", put(edit_field))
}
