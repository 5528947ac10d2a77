//! CLI configuration management.
//!
//! This module defines the complete CLI configuration hierarchy:
//!
//! ```text
//! Cli
//! ├── service: ServiceConfig       # R2 bucket, credentials, delivery mode
//! ├── middleware: MiddlewareConfig # CORS, recovery/timeouts
//! └── server: ServerConfig         # Host, port, shutdown
//! ```
//!
//! All configuration can be provided via CLI arguments or environment
//! variables. Use `--help` to see all available options.
//!
//! # Example
//!
//! ```bash
//! # Configure the bucket and server
//! konvert-cli --r2-account-id "..." --r2-bucket konvert-downloads --port 8080
//!
//! # Or via environment variables
//! R2_ACCOUNT_ID="..." R2_BUCKET=konvert-downloads PORT=8080 konvert-cli
//! ```

mod middleware;
mod server;

use std::process;

use anyhow::Context;
use clap::Parser;
use konvert_server::service::ServiceConfig;
pub use middleware::MiddlewareConfig;
use serde::{Deserialize, Serialize};
pub use server::ServerConfig;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::{TRACING_TARGET_CONFIG, TRACING_TARGET_STARTUP};

/// Complete CLI configuration.
///
/// Combines all configuration groups for the downloads server:
/// - [`ServiceConfig`]: Object store connection and delivery mode
/// - [`MiddlewareConfig`]: HTTP middleware (CORS, recovery)
/// - [`ServerConfig`]: Network binding and shutdown
#[derive(Debug, Clone, Parser, Serialize, Deserialize)]
#[command(name = "konvert")]
#[command(about = "Konvert downloads server")]
#[command(version)]
pub struct Cli {
    /// Server network and lifecycle configuration.
    #[clap(flatten)]
    pub server: ServerConfig,

    /// HTTP middleware configuration (CORS, timeouts).
    #[clap(flatten)]
    pub middleware: MiddlewareConfig,

    /// Object store configuration (bucket, credentials, delivery).
    #[clap(flatten)]
    pub service: ServiceConfig,
}

impl Cli {
    /// Loads environment variables from .env file (if enabled) and parses
    /// CLI arguments.
    ///
    /// .env files are loaded before clap parses arguments, so environment
    /// variables from .env can be used as defaults.
    pub fn init() -> Self {
        Self::load_dotenv();
        Self::parse()
    }

    /// Loads environment variables from .env file if the dotenv feature is enabled.
    #[cfg(feature = "dotenv")]
    fn load_dotenv() {
        if let Err(err) = dotenvy::dotenv()
            && !err.not_found()
        {
            eprintln!("Warning: failed to load .env file: {err}");
        }
    }

    /// No-op when dotenv feature is disabled.
    #[cfg(not(feature = "dotenv"))]
    fn load_dotenv() {}

    /// Initializes tracing with environment-based filtering.
    pub fn init_tracing() {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    /// Validates all configuration values.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.server
            .validate()
            .context("invalid server configuration")?;
        self.service
            .validate()
            .context("invalid service configuration")?;
        Ok(())
    }

    /// Logs configuration at startup (no sensitive information).
    pub fn log(&self) {
        Self::log_build_info();
        self.server.log();
        self.middleware.log();

        tracing::info!(
            target: TRACING_TARGET_CONFIG,
            bucket = %self.service.r2_bucket,
            delivery = %self.service.delivery,
            public_url = self.service.r2_public_url.as_ref().map(|url| url.as_str()).unwrap_or("none"),
            "Storage configuration"
        );
    }

    /// Logs build information at debug level.
    fn log_build_info() {
        tracing::debug!(
            target: TRACING_TARGET_STARTUP,
            version = env!("CARGO_PKG_VERSION"),
            pid = process::id(),
            arch = std::env::consts::ARCH,
            os = std::env::consts::OS,
            features = ?Self::enabled_features(),
            "Build information"
        );
    }

    /// Returns a list of enabled compile-time features.
    fn enabled_features() -> Vec<&'static str> {
        [cfg!(feature = "dotenv").then_some("dotenv")]
            .into_iter()
            .flatten()
            .collect()
    }
}
