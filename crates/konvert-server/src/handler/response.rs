//! Shared response types for the HTTP handlers.

use std::borrow::Cow;

use axum::Json;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

/// JSON error body returned by every failing endpoint.
///
/// Callers always receive a well-formed `{"error": ...}` document; internal
/// diagnostics ride along in `details` only for unclassified failures.
#[must_use = "error responses do nothing unless serialized"]
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ErrorResponse<'a> {
    /// User-facing error message.
    pub error: Cow<'a, str>,
    /// Diagnostic details for unclassified failures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Cow<'a, str>>,
    /// HTTP status code (not serialized in JSON).
    #[serde(skip)]
    pub status: StatusCode,
}

impl<'a> ErrorResponse<'a> {
    // 4xx Client Errors
    pub const AUTH_FAILED: Self = Self::new(
        "Authentication failed with the object store. Please check your credentials",
        StatusCode::UNAUTHORIZED,
    );
    pub const FILE_KEY_REQUIRED: Self =
        Self::new("File key is required", StatusCode::BAD_REQUEST);
    pub const FILE_NOT_FOUND: Self = Self::new("File not found", StatusCode::NOT_FOUND);
    pub const NO_INSTALLER: Self = Self::new(
        "No installer found for requested platform",
        StatusCode::NOT_FOUND,
    );
    pub const NOT_FOUND: Self = Self::new(
        "The requested resource was not found",
        StatusCode::NOT_FOUND,
    );
    // 5xx Server Errors
    pub const DOWNLOAD_FAILED: Self =
        Self::new("Failed to download file", StatusCode::INTERNAL_SERVER_ERROR);
    pub const INTERNAL_SERVER_ERROR: Self = Self::new(
        "An internal server error occurred",
        StatusCode::INTERNAL_SERVER_ERROR,
    );
    pub const METADATA_FAILED: Self = Self::new(
        "Failed to fetch file metadata",
        StatusCode::INTERNAL_SERVER_ERROR,
    );

    /// Creates a new error response.
    #[inline]
    pub const fn new(error: &'a str, status: StatusCode) -> Self {
        Self {
            error: Cow::Borrowed(error),
            details: None,
            status,
        }
    }

    /// Attaches diagnostic details to the error response.
    pub fn with_details(mut self, details: impl Into<Cow<'a, str>>) -> Self {
        self.details = Some(details.into());
        self
    }
}

impl Default for ErrorResponse<'_> {
    #[inline]
    fn default() -> Self {
        Self::INTERNAL_SERVER_ERROR
    }
}

impl IntoResponse for ErrorResponse<'_> {
    fn into_response(self) -> Response {
        let status = self.status;
        (
            status,
            [(header::CACHE_CONTROL, "no-store")],
            Json(self),
        )
            .into_response()
    }
}
