//! # Store Report Common Library
//!
//! Shared code for the store report services:
//! - Error and result types
//! - Configuration file model and loading

pub mod config;
pub mod error;

pub use error::{Error, Result};
