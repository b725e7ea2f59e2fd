//! storerep-ingest library interface
//!
//! Reconciles manual edits, spreadsheet uploads and AI image extraction into
//! one store performance record. Exposes public APIs for integration testing.

pub mod alias;
pub mod api;
pub mod config;
pub mod error;
pub mod extractors;
pub mod normalizer;
pub mod sanitize;
pub mod schema;
pub mod session;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use extractors::image::ImageExtractionClient;
use session::{BusyFlag, WorkingRecord};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Record being edited in this session
    pub record: Arc<RwLock<WorkingRecord>>,
    /// Set while an image extraction is in flight
    pub image_busy: Arc<BusyFlag>,
    /// Set while a spreadsheet extraction is in flight
    pub sheet_busy: Arc<BusyFlag>,
    pub image_client: Arc<ImageExtractionClient>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last error for diagnostic purposes
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(image_client: ImageExtractionClient) -> Self {
        Self::with_record(WorkingRecord::default(), image_client)
    }

    pub fn with_record(record: WorkingRecord, image_client: ImageExtractionClient) -> Self {
        Self {
            record: Arc::new(RwLock::new(record)),
            image_busy: Arc::new(BusyFlag::new("image extraction")),
            sheet_busy: Arc::new(BusyFlag::new("spreadsheet extraction")),
            image_client: Arc::new(image_client),
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    /// Remember a failure for the health endpoint
    pub async fn record_error(&self, message: impl Into<String>) {
        *self.last_error.write().await = Some(message.into());
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::record_routes())
        .merge(api::import_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
