#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod config;
mod server;

use std::process;

use anyhow::Context;
use axum::Router;
use konvert_server::handler;
use konvert_server::middleware::{
    RouterObservabilityExt, RouterRecoveryExt, RouterSecurityExt,
};
use konvert_server::service::ServiceState;

use crate::config::{Cli, MiddlewareConfig};

/// Tracing target for server startup events.
pub const TRACING_TARGET_STARTUP: &str = "konvert_cli::server::startup";

/// Tracing target for server shutdown events.
pub const TRACING_TARGET_SHUTDOWN: &str = "konvert_cli::server::shutdown";

/// Tracing target for configuration loading.
pub const TRACING_TARGET_CONFIG: &str = "konvert_cli::config";

#[tokio::main]
async fn main() {
    let Err(error) = run().await else {
        tracing::info!(
            target: TRACING_TARGET_SHUTDOWN,
            "application terminated successfully"
        );
        process::exit(0);
    };

    if tracing::enabled!(tracing::Level::ERROR) {
        tracing::error!(
            target: TRACING_TARGET_SHUTDOWN,
            error = %error,
            "application terminated with error"
        );
    } else {
        eprintln!("Error: {error:#}");
    }

    process::exit(1);
}

/// Main application entry point.
async fn run() -> anyhow::Result<()> {
    let cli = Cli::init();

    Cli::init_tracing();
    cli.log();
    cli.validate()?;

    let state = ServiceState::from_config(&cli.service)
        .context("failed to connect to the object store")?;
    let router = create_router(state, &cli.middleware);

    server::serve(router, cli.server).await?;

    Ok(())
}

/// Creates the router with all middleware layers applied.
///
/// Middleware is applied in reverse order (last added = outermost):
/// 1. Recovery (outermost) - catches panics and enforces timeouts
/// 2. Observability - request IDs and tracing spans
/// 3. Security - CORS and security headers
/// 4. Routes (innermost) - actual request handlers
fn create_router(state: ServiceState, middleware: &MiddlewareConfig) -> Router {
    handler::router(state)
        .with_security(&middleware.cors)
        .with_observability()
        .with_recovery(&middleware.recovery)
}
