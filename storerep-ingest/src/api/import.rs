//! Import API handlers
//!
//! POST /api/import/spreadsheet, POST /api/import/image
//!
//! The request body is the raw file; `?filename=` and `Content-Type` help
//! type detection. A successful extraction is normalized and merged into the
//! working record under one write lock. A failed one leaves the record
//! untouched.

use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, HeaderMap},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::{
    alias,
    error::{ApiError, ApiResult},
    extractors::{
        image::{prepare_request, ImageExtraction},
        spreadsheet,
        upload::{check_size, Upload, MAX_UPLOAD_BYTES},
        ExtractionError,
    },
    normalizer::{normalize, Patch},
    schema::{CanonicalRecord, Field},
    AppState,
};

/// Upload query parameters
#[derive(Debug, Default, Deserialize)]
pub struct ImportQuery {
    pub filename: Option<String>,
}

/// Import response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResponse {
    pub success: bool,
    pub message: String,
    pub fields_updated: Vec<Field>,
    /// Collaborator attempts (image imports only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempts: Option<u32>,
    pub record: CanonicalRecord,
}

/// POST /api/import/spreadsheet
pub async fn import_spreadsheet(
    State(state): State<AppState>,
    Query(query): Query<ImportQuery>,
    headers: HeaderMap,
    body: Body,
) -> ApiResult<Json<ImportResponse>> {
    let result = run_spreadsheet_import(&state, query, &headers, body).await;
    report_failure(&state, result).await
}

async fn run_spreadsheet_import(
    state: &AppState,
    query: ImportQuery,
    headers: &HeaderMap,
    body: Body,
) -> ApiResult<Json<ImportResponse>> {
    let upload = read_upload(query, headers, body).await?;
    upload.validate()?;

    let _guard = state.sheet_busy.try_acquire().ok_or_else(|| {
        ApiError::Conflict("A spreadsheet is already being processed".to_string())
    })?;

    tracing::info!(
        filename = upload.filename.as_deref().unwrap_or("-"),
        size_bytes = upload.bytes.len(),
        "Spreadsheet import started"
    );

    // Workbook parsing is CPU-bound
    let raw = tokio::task::spawn_blocking(move || spreadsheet::extract_upload(&upload, alias::resolver()))
        .await
        .map_err(|e| ApiError::Internal(format!("Spreadsheet task failed: {}", e)))??;

    let patch = normalize(&raw);
    let (fields_updated, record) = merge_patch(state, patch).await;

    Ok(Json(ImportResponse {
        success: true,
        message: format!("Imported {} field(s) from spreadsheet", fields_updated.len()),
        fields_updated,
        attempts: None,
        record,
    }))
}

/// POST /api/import/image
pub async fn import_image(
    State(state): State<AppState>,
    Query(query): Query<ImportQuery>,
    headers: HeaderMap,
    body: Body,
) -> ApiResult<Json<ImportResponse>> {
    let result = run_image_import(&state, query, &headers, body).await;
    report_failure(&state, result).await
}

async fn run_image_import(
    state: &AppState,
    query: ImportQuery,
    headers: &HeaderMap,
    body: Body,
) -> ApiResult<Json<ImportResponse>> {
    let upload = read_upload(query, headers, body).await?;
    let request = prepare_request(&upload)?;

    let _guard = state.image_busy.try_acquire().ok_or_else(|| {
        ApiError::Conflict("An image is already being processed".to_string())
    })?;

    tracing::info!(
        filename = upload.filename.as_deref().unwrap_or("-"),
        mime_type = %request.mime_type,
        size_bytes = upload.bytes.len(),
        "Image import started"
    );

    match state.image_client.extract(&request).await {
        ImageExtraction::Succeeded { patch, attempts } => {
            let (fields_updated, record) = merge_patch(state, patch).await;
            Ok(Json(ImportResponse {
                success: true,
                message: format!("Extracted {} field(s) from image", fields_updated.len()),
                fields_updated,
                attempts: Some(attempts),
                record,
            }))
        }
        ImageExtraction::Failed { message, .. } => Err(ApiError::BadGateway(message)),
    }
}

/// Build import routes
pub fn import_routes() -> Router<AppState> {
    Router::new()
        .route("/api/import/spreadsheet", post(import_spreadsheet))
        .route("/api/import/image", post(import_image))
}

/// Read the request body into an [`Upload`], enforcing the size ceiling
///
/// A declared `Content-Length` over the ceiling is rejected before reading.
async fn read_upload(query: ImportQuery, headers: &HeaderMap, body: Body) -> Result<Upload, ExtractionError> {
    let declared_length = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    if let Some(length) = declared_length {
        check_size(length)?;
    }

    let bytes = axum::body::to_bytes(body, MAX_UPLOAD_BYTES as usize)
        .await
        .map_err(|_| ExtractionError::FileTooLarge {
            size_bytes: declared_length.unwrap_or(MAX_UPLOAD_BYTES + 1),
            limit_bytes: MAX_UPLOAD_BYTES,
        })?;

    let mime_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    Ok(Upload::new(bytes.to_vec(), query.filename, mime_type))
}

/// Apply a patch under one write lock
async fn merge_patch(state: &AppState, patch: Patch) -> (Vec<Field>, CanonicalRecord) {
    let mut record = state.record.write().await;
    let fields = record.merge(patch);
    (fields, record.materialize())
}

/// Store a failure as the service's last error before returning it
async fn report_failure(
    state: &AppState,
    result: ApiResult<Json<ImportResponse>>,
) -> ApiResult<Json<ImportResponse>> {
    if let Err(err) = &result {
        tracing::warn!(error = %err, "Import failed");
        state.record_error(err.to_string()).await;
    }
    result
}
