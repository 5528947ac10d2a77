//! Security middleware for HTTP request protection.
//!
//! The service is a read-only download API consumed cross-origin by the
//! marketing site, so the CORS policy allows `GET`/`HEAD` only and exposes
//! the range and download headers browsers need for resumable downloads.

use std::time::Duration;

use axum::Router;
use axum::http::Method;
use axum::http::header::{self, HeaderValue};
#[cfg(feature = "config")]
use clap::Args;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::set_header::SetResponseHeaderLayer;

/// Extension trait for `axum::`[`Router`] to apply security middleware.
pub trait RouterSecurityExt<S> {
    /// Layers security middlewares with the provided CORS configuration.
    ///
    /// Applies the cross-origin policy and static security headers that
    /// protect against content sniffing and clickjacking.
    fn with_security(self, cors: &CorsConfig) -> Self;

    /// Layers security middlewares with default configurations.
    ///
    /// Uses development-friendly CORS settings. For production deployments,
    /// prefer `with_security` with explicit configuration.
    fn with_default_security(self) -> Self;
}

impl<S> RouterSecurityExt<S> for Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_security(self, cors: &CorsConfig) -> Self {
        let cors_layer = CorsLayer::new()
            .allow_origin(cors.to_header_values())
            .allow_methods([Method::GET, Method::HEAD])
            .allow_headers([header::RANGE, header::CONTENT_TYPE, header::ACCEPT])
            .expose_headers([
                header::ACCEPT_RANGES,
                header::CONTENT_RANGE,
                header::CONTENT_DISPOSITION,
                header::ETAG,
            ])
            .max_age(cors.max_age());

        self.layer(cors_layer)
            .layer(SetResponseHeaderLayer::overriding(
                header::X_CONTENT_TYPE_OPTIONS,
                HeaderValue::from_static("nosniff"),
            ))
            .layer(SetResponseHeaderLayer::overriding(
                header::X_FRAME_OPTIONS,
                HeaderValue::from_static("DENY"),
            ))
            .layer(SetResponseHeaderLayer::overriding(
                header::REFERRER_POLICY,
                HeaderValue::from_static("strict-origin-when-cross-origin"),
            ))
    }

    fn with_default_security(self) -> Self {
        self.with_security(&CorsConfig::default())
    }
}

/// CORS (Cross-Origin Resource Sharing) configuration.
///
/// Controls which origins can call the download API from a browser.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
#[must_use = "config does nothing unless you use it"]
pub struct CorsConfig {
    /// List of allowed CORS origins.
    ///
    /// If empty, defaults to localhost origins for development.
    #[cfg_attr(
        feature = "config",
        arg(long, env = "CORS_ALLOWED_ORIGINS", value_delimiter = ',')
    )]
    pub allowed_origins: Vec<String>,

    /// Maximum age for CORS preflight requests in seconds.
    #[cfg_attr(
        feature = "config",
        arg(long, env = "CORS_MAX_AGE", default_value = "3600")
    )]
    pub max_age_seconds: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: Vec::new(),
            max_age_seconds: 3600,
        }
    }
}

impl CorsConfig {
    /// Returns the CORS max age as a Duration.
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_seconds)
    }

    /// Converts configured origins to HeaderValue list, falling back to localhost for development.
    pub fn to_header_values(&self) -> Vec<HeaderValue> {
        if self.allowed_origins.is_empty() {
            vec![
                "http://localhost:3000".parse().unwrap(),
                "http://localhost:5173".parse().unwrap(),
                "http://127.0.0.1:3000".parse().unwrap(),
            ]
        } else {
            self.allowed_origins
                .iter()
                .filter_map(|origin| origin.parse().ok())
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_origins_fall_back_to_localhost() {
        let cors = CorsConfig::default();
        assert!(!cors.to_header_values().is_empty());
    }

    #[test]
    fn configured_origins_are_parsed() {
        let cors = CorsConfig {
            allowed_origins: vec!["https://konvert.app".to_string()],
            ..CorsConfig::default()
        };

        let values = cors.to_header_values();
        assert_eq!(values, vec![HeaderValue::from_static("https://konvert.app")]);
    }

    #[test]
    fn invalid_origins_are_skipped() {
        let cors = CorsConfig {
            allowed_origins: vec!["https://konvert.app".to_string(), "\u{0}bad".to_string()],
            ..CorsConfig::default()
        };

        assert_eq!(cors.to_header_values().len(), 1);
    }
}
