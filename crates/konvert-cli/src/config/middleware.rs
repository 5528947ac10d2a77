//! HTTP middleware configuration.

use clap::Args;
use konvert_server::middleware::{CorsConfig, RecoveryConfig};
use serde::{Deserialize, Serialize};

use crate::TRACING_TARGET_CONFIG;

/// HTTP middleware configuration.
///
/// Groups the middleware settings exposed on the command line: CORS
/// origins and the request timeout enforced by the recovery layer.
#[derive(Debug, Clone, Args, Serialize, Deserialize)]
#[must_use = "config does nothing unless you use it"]
pub struct MiddlewareConfig {
    /// Cross-origin request policy.
    #[clap(flatten)]
    pub cors: CorsConfig,

    /// Panic and timeout recovery.
    #[clap(flatten)]
    pub recovery: RecoveryConfig,
}

impl MiddlewareConfig {
    /// Logs middleware configuration.
    pub fn log(&self) {
        tracing::info!(
            target: TRACING_TARGET_CONFIG,
            cors_origins = ?self.cors.allowed_origins,
            request_timeout_secs = self.recovery.request_timeout,
            "Middleware configuration"
        );
    }
}
