//! Service configuration
//!
//! **Priority:** command line → environment → TOML file → compiled default.
//! clap handles the first two tiers through `env = ...`.

use crate::extractors::retry::BackoffSchedule;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use storerep_common::config::TomlConfig;
use storerep_common::{Error, Result};

pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:5780";
pub const DEFAULT_EXTRACTION_ENDPOINT: &str = "http://127.0.0.1:3001/api/extract";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_BASE_DELAY_MS: u64 = 1000;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 6;
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Command-line arguments for storerep-ingest
#[derive(Parser, Debug, Default)]
#[command(name = "storerep-ingest")]
#[command(about = "Store performance report ingest service")]
#[command(version)]
pub struct Args {
    /// Configuration file
    #[arg(short, long, env = "STOREREP_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Address to listen on
    #[arg(short, long, env = "STOREREP_BIND")]
    pub bind: Option<String>,

    /// URL of the image extraction collaborator
    #[arg(long, env = "STOREREP_EXTRACTION_URL")]
    pub extraction_url: Option<String>,

    /// Default log level when RUST_LOG is not set
    #[arg(long, env = "STOREREP_LOG_LEVEL")]
    pub log_level: Option<String>,
}

/// Fully resolved service configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    pub bind_address: SocketAddr,
    pub extraction_endpoint: String,
    pub request_timeout: Duration,
    pub schedule: BackoffSchedule,
    pub log_level: String,
}

impl ServiceConfig {
    /// Merge arguments over a loaded TOML file
    pub fn resolve(args: &Args, toml_config: &TomlConfig) -> Result<Self> {
        let bind = first_non_empty(&[args.bind.as_deref(), toml_config.bind_address.as_deref()])
            .unwrap_or(DEFAULT_BIND_ADDRESS);
        let bind_address: SocketAddr = bind
            .parse()
            .map_err(|e| Error::Config(format!("Invalid bind address '{}': {}", bind, e)))?;

        let extraction = &toml_config.extraction;
        let extraction_endpoint = first_non_empty(&[
            args.extraction_url.as_deref(),
            extraction.endpoint.as_deref(),
        ])
        .unwrap_or(DEFAULT_EXTRACTION_ENDPOINT)
        .to_string();

        let log_level = first_non_empty(&[args.log_level.as_deref(), Some(toml_config.logging.level.as_str())])
            .unwrap_or(DEFAULT_LOG_LEVEL)
            .to_string();

        let schedule = BackoffSchedule::new(
            Duration::from_millis(extraction.base_delay_ms.unwrap_or(DEFAULT_BASE_DELAY_MS)),
            extraction.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS),
        );

        Ok(Self {
            bind_address,
            extraction_endpoint,
            request_timeout: Duration::from_secs(extraction.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
            schedule,
            log_level,
        })
    }

    /// Load the TOML file named by the arguments (or the platform default) and resolve
    pub fn load(args: &Args) -> Result<Self> {
        let toml_config = storerep_common::config::load_config(args.config.as_deref())?;
        Self::resolve(args, &toml_config)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([127, 0, 0, 1], 5780)),
            extraction_endpoint: DEFAULT_EXTRACTION_ENDPOINT.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            schedule: BackoffSchedule::default(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

fn first_non_empty<'a>(candidates: &[Option<&'a str>]) -> Option<&'a str> {
    candidates
        .iter()
        .flatten()
        .map(|s| s.trim())
        .find(|s| !s.is_empty())
}
