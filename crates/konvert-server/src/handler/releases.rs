//! Release metadata handlers.
//!
//! The latest-release endpoint scans the release prefix for installer
//! objects matching the requested platform, picks the most recently
//! modified one, and returns download-page metadata for it.

use axum::Json;
use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use konvert_opendal::{ObjectSummary, ReleaseStore, StorageError};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use crate::handler::utils::{
    extract_version, filename_from_key, format_release_date, format_size,
};
use crate::handler::{ErrorResponse, Result};
use crate::service::ServiceState;

/// Tracing target for release operations.
const TRACING_TARGET: &str = "konvert_server::handler::releases";

/// Prefix under which current installers are published.
const RELEASE_PREFIX: &str = "latest/";

/// Listing page size; the release prefix holds a handful of objects.
const LIST_LIMIT: usize = 20;

/// Shown when the store reports no modification time for the installer.
const FALLBACK_RELEASE_DATE: &str = "March 8, 2025";

/// Desktop platforms installers are published for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[derive(strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
enum Platform {
    Windows,
    #[strum(to_string = "mac", serialize = "macos")]
    Mac,
}

impl Platform {
    /// Whether a release object is an installer for this platform.
    ///
    /// Windows keys must name themselves an installer because the prefix
    /// also holds auxiliary artifacts like update manifests.
    fn matches(self, key: &str) -> bool {
        let lowered = key.to_ascii_lowercase();
        match self {
            Self::Windows => {
                (key.contains("Setup") || key.contains("Installer"))
                    && (lowered.ends_with(".msi") || lowered.ends_with(".exe"))
            }
            Self::Mac => lowered.ends_with(".dmg") || lowered.ends_with(".pkg"),
        }
    }
}

/// Query parameters for the latest-release endpoint.
#[derive(Debug, Serialize, Deserialize, IntoParams)]
pub struct ReleaseParams {
    /// Target platform, `windows` (default) or `mac`.
    pub platform: Option<String>,
}

/// Metadata for the newest installer of a platform.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseResponse {
    /// Storage key to pass to the download endpoint.
    pub key: String,
    /// Installer filename.
    pub filename: String,
    /// Exact size in bytes.
    pub size_bytes: u64,
    /// Humanized size for display, e.g. `42.5 MB`.
    pub size: String,
    /// Semantic version parsed from the filename.
    pub version: String,
    /// Long-form release date for display.
    pub release_date: String,
    /// Entity tag of the installer object.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    /// SHA-256 checksum, when published with the object.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

/// Returns metadata for the newest installer of the requested platform.
#[tracing::instrument(skip_all)]
#[utoipa::path(
    get, path = "/api/files", tag = "releases",
    params(ReleaseParams),
    responses(
        (status = 200, description = "Newest installer metadata", body = ReleaseResponse),
        (status = 404, description = "No installer for the platform", body = ErrorResponse),
        (status = 500, description = "Listing or metadata lookup failed", body = ErrorResponse),
    )
)]
async fn latest_release(
    State(store): State<ReleaseStore>,
    Query(params): Query<ReleaseParams>,
) -> Result<Response> {
    let requested = params.platform.as_deref().unwrap_or("windows");
    let Ok(platform) = requested.to_ascii_lowercase().parse::<Platform>() else {
        tracing::warn!(
            target: TRACING_TARGET,
            platform = %requested,
            "unknown platform requested"
        );
        return Err(ErrorResponse::NO_INSTALLER);
    };

    let entries = store.list(RELEASE_PREFIX, LIST_LIMIT).await.map_err(|err| {
        tracing::error!(
            target: TRACING_TARGET,
            error = %err,
            "failed to list release objects"
        );
        classify(&err)
    })?;

    let Some(newest) = entries
        .into_iter()
        .filter(|entry| platform.matches(&entry.key))
        .max_by_key(|entry| entry.last_modified)
    else {
        tracing::warn!(
            target: TRACING_TARGET,
            platform = %platform,
            "no installer under release prefix"
        );
        return Err(ErrorResponse::NO_INSTALLER);
    };

    // Listings can report stale or missing metadata; the head lookup is
    // authoritative for size, etag, and checksum.
    let stat = store.stat(&newest.key).await.map_err(|err| {
        tracing::error!(
            target: TRACING_TARGET,
            key = %newest.key,
            error = %err,
            "failed to stat release object"
        );
        ErrorResponse::METADATA_FAILED.with_details(err.to_string())
    })?;

    let response = build_response(&newest, stat.size, stat.etag, stat.sha256);

    tracing::info!(
        target: TRACING_TARGET,
        platform = %platform,
        key = %response.key,
        version = %response.version,
        "resolved latest release"
    );

    Ok((
        [(header::CACHE_CONTROL, "no-store")],
        Json(response),
    )
        .into_response())
}

fn build_response(
    entry: &ObjectSummary,
    size_bytes: u64,
    etag: Option<String>,
    sha256: Option<String>,
) -> ReleaseResponse {
    let filename = filename_from_key(&entry.key).to_string();
    let release_date = entry
        .last_modified
        .map(format_release_date)
        .unwrap_or_else(|| FALLBACK_RELEASE_DATE.to_string());

    ReleaseResponse {
        key: entry.key.clone(),
        version: extract_version(&filename),
        filename,
        size_bytes,
        size: format_size(size_bytes),
        release_date,
        etag,
        sha256,
    }
}

/// Maps a storage error to the JSON error contract.
fn classify(err: &StorageError) -> ErrorResponse<'static> {
    match err {
        StorageError::NotFound(_) => ErrorResponse::NO_INSTALLER,
        StorageError::PermissionDenied(_) => ErrorResponse::AUTH_FAILED,
        _ => ErrorResponse::METADATA_FAILED.with_details(err.to_string()),
    }
}

/// Returns a [`Router`] with all release routes.
///
/// [`Router`]: axum::routing::Router
pub fn routes() -> OpenApiRouter<ServiceState> {
    OpenApiRouter::new().routes(routes!(latest_release))
}

#[cfg(test)]
mod tests {
    use super::ReleaseResponse;
    use crate::handler::test::{create_test_server, memory_state, seed};
    use crate::service::DeliveryMode;

    #[tokio::test]
    async fn windows_release_is_resolved_with_metadata() {
        let state = memory_state(DeliveryMode::Stream);
        seed(&state, "latest/Konvert-Setup-1.2.0.msi", vec![0u8; 2048]).await;
        seed(&state, "latest/Konvert-Mac-1.2.0.dmg", vec![0u8; 4096]).await;
        let server = create_test_server(&state);

        let response = server
            .get("/api/files")
            .add_query_param("platform", "windows")
            .await;

        assert_eq!(response.status_code(), 200);
        assert_eq!(response.header("cache-control"), "no-store");

        let release: ReleaseResponse = response.json();
        assert_eq!(release.key, "latest/Konvert-Setup-1.2.0.msi");
        assert_eq!(release.filename, "Konvert-Setup-1.2.0.msi");
        assert_eq!(release.version, "1.2.0");
        assert_eq!(release.size_bytes, 2048);
        assert_eq!(release.size, "2.0 KB");
    }

    #[tokio::test]
    async fn mac_release_is_resolved() {
        let state = memory_state(DeliveryMode::Stream);
        seed(&state, "latest/Konvert-Setup-1.2.0.msi", vec![0u8; 2048]).await;
        seed(&state, "latest/Konvert-Mac-2.0.1.dmg", vec![0u8; 4096]).await;
        let server = create_test_server(&state);

        let response = server
            .get("/api/files")
            .add_query_param("platform", "mac")
            .await;

        assert_eq!(response.status_code(), 200);
        let release: ReleaseResponse = response.json();
        assert_eq!(release.key, "latest/Konvert-Mac-2.0.1.dmg");
        assert_eq!(release.version, "2.0.1");
    }

    #[tokio::test]
    async fn macos_alias_is_accepted() {
        let state = memory_state(DeliveryMode::Stream);
        seed(&state, "latest/Konvert-Mac-2.0.1.dmg", vec![0u8; 16]).await;
        let server = create_test_server(&state);

        let response = server
            .get("/api/files")
            .add_query_param("platform", "macOS")
            .await;

        assert_eq!(response.status_code(), 200);
        let release: ReleaseResponse = response.json();
        assert_eq!(release.key, "latest/Konvert-Mac-2.0.1.dmg");
    }

    #[tokio::test]
    async fn platform_defaults_to_windows() {
        let state = memory_state(DeliveryMode::Stream);
        seed(&state, "latest/Konvert-Setup-1.2.0.exe", vec![0u8; 16]).await;
        seed(&state, "latest/Konvert-Mac-1.2.0.dmg", vec![0u8; 16]).await;
        let server = create_test_server(&state);

        let response = server.get("/api/files").await;

        assert_eq!(response.status_code(), 200);
        let release: ReleaseResponse = response.json();
        assert_eq!(release.key, "latest/Konvert-Setup-1.2.0.exe");
    }

    #[tokio::test]
    async fn auxiliary_artifacts_are_skipped() {
        let state = memory_state(DeliveryMode::Stream);
        seed(&state, "latest/latest.yml", vec![0u8; 16]).await;
        seed(&state, "latest/Konvert-Setup-1.2.0.msi", vec![0u8; 16]).await;
        let server = create_test_server(&state);

        let response = server.get("/api/files").await;

        assert_eq!(response.status_code(), 200);
        let release: ReleaseResponse = response.json();
        assert_eq!(release.key, "latest/Konvert-Setup-1.2.0.msi");
    }

    #[tokio::test]
    async fn unknown_platform_is_rejected() {
        let state = memory_state(DeliveryMode::Stream);
        seed(&state, "latest/Konvert-Setup-1.2.0.msi", vec![0u8; 16]).await;
        let server = create_test_server(&state);

        let response = server
            .get("/api/files")
            .add_query_param("platform", "linux")
            .await;

        assert_eq!(response.status_code(), 404);
        assert_eq!(
            response.json::<serde_json::Value>(),
            serde_json::json!({ "error": "No installer found for requested platform" })
        );
    }

    #[tokio::test]
    async fn empty_prefix_yields_not_found() {
        let state = memory_state(DeliveryMode::Stream);
        let server = create_test_server(&state);

        let response = server.get("/api/files").await;

        assert_eq!(response.status_code(), 404);
    }
}
