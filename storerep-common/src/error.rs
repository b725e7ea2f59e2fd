//! Common error types for store report services

use thiserror::Error;

/// Common result type for store report operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the store report crates
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),
}
