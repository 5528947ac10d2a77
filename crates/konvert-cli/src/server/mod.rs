//! HTTP server startup with lifecycle management.

mod error;
mod http_server;
mod shutdown;

pub use error::{ServerError, ServerResult};
use http_server::serve_http;
use shutdown::shutdown_signal;

use axum::Router;

use crate::config::ServerConfig;

/// Starts the HTTP server with graceful shutdown.
///
/// # Errors
///
/// Returns an error if:
/// - Server configuration is invalid
/// - Cannot bind to the specified address/port
/// - Server encounters a fatal error during operation
pub async fn serve(app: Router, config: ServerConfig) -> ServerResult<()> {
    serve_http(app, config).await
}
