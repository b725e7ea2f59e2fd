//! HTTP API handlers for storerep-ingest

pub mod health;
pub mod import;
pub mod record;

pub use health::health_routes;
pub use import::import_routes;
pub use record::record_routes;
