//! Installer download proxy handlers.
//!
//! The download endpoint resolves an object key against the release bucket
//! and delivers the installer one of two ways, picked once per request from
//! the [`DeliveryPolicy`]:
//!
//! - **Redirect** (default): respond `307` with a time-limited presigned URL
//!   (or the public bucket URL when one is configured). No object bytes pass
//!   through this server.
//! - **Stream**: proxy the object body, honoring RFC 7233 single-range
//!   requests with `200`/`206`/`416` status handling. The body is a
//!   pass-through stream; the object is never buffered whole.
//!
//! Store failures are classified immediately after the store call and
//! translated to the JSON error contract, so no provider-specific error
//! shapes leak past this module.

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use konvert_opendal::{ByteRange, ReleaseStore, StorageError};
use serde::{Deserialize, Serialize};
use utoipa::IntoParams;
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use crate::handler::utils::filename_from_key;
use crate::handler::{ErrorResponse, Result};
use crate::service::{DeliveryMode, DeliveryPolicy, ServiceState};

/// Tracing target for download operations.
const TRACING_TARGET: &str = "konvert_server::handler::downloads";

/// Content type forced for Windows installer packages. The stored metadata
/// is unreliable for this extension, so the extension wins.
const MSI_CONTENT_TYPE: &str = "application/x-msi";

/// Fallback content type when the store reports none.
const OCTET_STREAM: &str = "application/octet-stream";

/// Query parameters for the download endpoint.
#[derive(Debug, Serialize, Deserialize, IntoParams)]
pub struct DownloadParams {
    /// Storage key of the requested installer.
    pub key: Option<String>,
}

/// Serves an installer download by key.
#[tracing::instrument(skip_all)]
#[utoipa::path(
    get, path = "/api/download", tag = "downloads",
    params(DownloadParams),
    responses(
        (status = 200, description = "Full object bytes"),
        (status = 206, description = "Requested byte range of the object"),
        (status = 307, description = "Redirect to a time-limited download URL"),
        (status = 400, description = "Missing file key", body = ErrorResponse),
        (status = 401, description = "Store rejected the credentials", body = ErrorResponse),
        (status = 404, description = "No such object", body = ErrorResponse),
        (status = 416, description = "Requested range is beyond the object"),
        (status = 500, description = "Download failed", body = ErrorResponse),
    )
)]
async fn download_installer(
    State(store): State<ReleaseStore>,
    State(delivery): State<DeliveryPolicy>,
    Query(params): Query<DownloadParams>,
    headers: HeaderMap,
) -> Result<Response> {
    let Some(key) = params.key.filter(|key| !key.is_empty()) else {
        tracing::warn!(target: TRACING_TARGET, "download request without file key");
        return Err(ErrorResponse::FILE_KEY_REQUIRED);
    };

    let host = headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    let range_header = headers
        .get(header::RANGE)
        .and_then(|value| value.to_str().ok());

    tracing::info!(
        target: TRACING_TARGET,
        key = %key,
        host = %host,
        range = range_header.unwrap_or("none"),
        mode = %delivery.mode,
        "download requested"
    );

    match delivery.mode {
        DeliveryMode::Redirect => redirect_download(&store, &delivery, &key).await,
        DeliveryMode::Stream => stream_download(&store, &key, range_header).await,
    }
}

/// Responds `307` with a time-limited URL for the object.
async fn redirect_download(
    store: &ReleaseStore,
    delivery: &DeliveryPolicy,
    key: &str,
) -> Result<Response> {
    let filename = filename_from_key(key);
    let content_disposition = format!("attachment; filename=\"{filename}\"");

    let location = match delivery.public_base_url {
        Some(ref base) => base
            .join(key)
            .map_err(|err| {
                tracing::error!(
                    target: TRACING_TARGET,
                    key = %key,
                    error = %err,
                    "failed to build public download URL"
                );
                ErrorResponse::DOWNLOAD_FAILED.with_details(err.to_string())
            })?
            .to_string(),
        None => store
            .presign_download(
                key,
                delivery.signed_url_ttl,
                &content_disposition,
                forced_content_type(filename),
            )
            .await
            .map_err(|err| {
                tracing::error!(
                    target: TRACING_TARGET,
                    key = %key,
                    error = %err,
                    "failed to presign download URL"
                );
                classify(&err)
            })?,
    };

    let location_value = HeaderValue::from_str(&location).map_err(|_| {
        ErrorResponse::DOWNLOAD_FAILED.with_details("redirect URL is not a valid header value")
    })?;

    tracing::info!(
        target: TRACING_TARGET,
        key = %key,
        status = StatusCode::TEMPORARY_REDIRECT.as_u16(),
        "redirecting to download URL"
    );

    let mut response_headers = HeaderMap::new();
    response_headers.insert(header::LOCATION, location_value);
    response_headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));

    Ok((StatusCode::TEMPORARY_REDIRECT, response_headers, Body::empty()).into_response())
}

/// Streams the object (or a byte sub-range of it) through this server.
async fn stream_download(
    store: &ReleaseStore,
    key: &str,
    range_header: Option<&str>,
) -> Result<Response> {
    let filename = filename_from_key(key);
    // Malformed and multi-range headers are ignored, which RFC 7233 allows;
    // the client then gets the full object.
    let range = range_header.and_then(ByteRange::parse);

    let download = match store.fetch(key, range).await {
        Ok(download) => download,
        Err(StorageError::RangeNotSatisfied(reason)) => {
            return range_not_satisfiable(store, key, &reason).await;
        }
        Err(err) => {
            tracing::error!(
                target: TRACING_TARGET,
                key = %key,
                error = %err,
                "failed to fetch object"
            );
            return Err(classify(&err));
        }
    };

    let status = if download.is_partial() {
        StatusCode::PARTIAL_CONTENT
    } else {
        StatusCode::OK
    };

    let mut response_headers = HeaderMap::new();
    response_headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    response_headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    try_insert(
        &mut response_headers,
        header::CONTENT_TYPE,
        resolve_content_type(filename, download.content_type.as_deref()),
    );
    try_insert(
        &mut response_headers,
        header::CONTENT_DISPOSITION,
        &format!("attachment; filename=\"{filename}\""),
    );

    if let Some(ref etag) = download.etag {
        try_insert(&mut response_headers, header::ETAG, etag);
    }

    if let Some((start, end)) = download.segment {
        try_insert(
            &mut response_headers,
            header::CONTENT_RANGE,
            &format!("bytes {start}-{end}/{}", download.total_size),
        );
    }

    try_insert(
        &mut response_headers,
        header::CONTENT_LENGTH,
        &download.content_length().to_string(),
    );

    tracing::info!(
        target: TRACING_TARGET,
        key = %key,
        status = status.as_u16(),
        content_length = download.content_length(),
        segment = ?download.segment,
        etag = download.etag.as_deref().unwrap_or("none"),
        "streaming object"
    );

    Ok((status, response_headers, Body::from_stream(download.stream)).into_response())
}

/// Responds `416` with the object's actual size in `Content-Range`.
///
/// The failed ranged fetch carries no authoritative size, so a second head
/// lookup recovers the total for the `bytes */<total>` line.
async fn range_not_satisfiable(
    store: &ReleaseStore,
    key: &str,
    reason: &str,
) -> Result<Response> {
    let stat = store.stat(key).await.map_err(|err| {
        tracing::error!(
            target: TRACING_TARGET,
            key = %key,
            error = %err,
            "failed to stat object for range error"
        );
        classify(&err)
    })?;

    tracing::warn!(
        target: TRACING_TARGET,
        key = %key,
        total_size = stat.size,
        reason = %reason,
        "requested range not satisfiable"
    );

    let mut response_headers = HeaderMap::new();
    response_headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    response_headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    try_insert(
        &mut response_headers,
        header::CONTENT_RANGE,
        &format!("bytes */{}", stat.size),
    );

    if let Some(ref etag) = stat.etag {
        try_insert(&mut response_headers, header::ETAG, &format!("\"{etag}\""));
    }

    Ok((StatusCode::RANGE_NOT_SATISFIABLE, response_headers, Body::empty()).into_response())
}

/// Maps a storage error to the JSON error contract.
///
/// The range case is handled separately because it needs a follow-up store
/// call; everything else translates directly.
fn classify(err: &StorageError) -> ErrorResponse<'static> {
    match err {
        StorageError::NotFound(_) => ErrorResponse::FILE_NOT_FOUND,
        StorageError::PermissionDenied(_) => ErrorResponse::AUTH_FAILED,
        _ => ErrorResponse::DOWNLOAD_FAILED.with_details(err.to_string()),
    }
}

/// Content type forced by the filename extension, if any.
fn forced_content_type(filename: &str) -> Option<&'static str> {
    filename
        .to_ascii_lowercase()
        .ends_with(".msi")
        .then_some(MSI_CONTENT_TYPE)
}

/// Resolves the outgoing content type from the filename and stored metadata.
fn resolve_content_type<'a>(filename: &str, stored: Option<&'a str>) -> &'a str {
    forced_content_type(filename).unwrap_or_else(|| stored.unwrap_or(OCTET_STREAM))
}

/// Inserts a derived header value, logging instead of failing the download
/// when the value cannot be represented.
fn try_insert(headers: &mut HeaderMap, name: HeaderName, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(value) => {
            headers.insert(name, value);
        }
        Err(_) => {
            tracing::warn!(
                target: TRACING_TARGET,
                header = %name,
                "skipping header with invalid value"
            );
        }
    }
}

/// Returns a [`Router`] with all download routes.
///
/// [`Router`]: axum::routing::Router
pub fn routes() -> OpenApiRouter<ServiceState> {
    OpenApiRouter::new().routes(routes!(download_installer))
}

#[cfg(test)]
mod tests {
    use axum::http::{HeaderValue, header};
    use serde_json::json;

    use crate::handler::test::{create_test_server, memory_state, public_redirect_state, seed};
    use crate::service::DeliveryMode;

    const EXE_KEY: &str = "latest/Konvert-Setup-1.2.0.exe";
    const MSI_KEY: &str = "latest/Konvert-Setup-1.2.0.msi";

    fn installer_bytes() -> Vec<u8> {
        (0..2048u32).map(|byte| (byte % 251) as u8).collect()
    }

    #[tokio::test]
    async fn missing_key_is_rejected_before_store_access() {
        let state = memory_state(DeliveryMode::Stream);
        let server = create_test_server(&state);

        let response = server.get("/api/download").await;

        assert_eq!(response.status_code(), 400);
        assert_eq!(
            response.json::<serde_json::Value>(),
            json!({ "error": "File key is required" })
        );
    }

    #[tokio::test]
    async fn empty_key_is_rejected() {
        let state = memory_state(DeliveryMode::Stream);
        let server = create_test_server(&state);

        let response = server.get("/api/download").add_query_param("key", "").await;

        assert_eq!(response.status_code(), 400);
    }

    #[tokio::test]
    async fn streams_full_object() {
        let state = memory_state(DeliveryMode::Stream);
        seed(&state, EXE_KEY, installer_bytes()).await;
        let server = create_test_server(&state);

        let response = server.get("/api/download").add_query_param("key", EXE_KEY).await;

        assert_eq!(response.status_code(), 200);
        assert_eq!(response.header("accept-ranges"), "bytes");
        assert_eq!(response.header("cache-control"), "no-store");
        assert_eq!(response.header("content-length"), "2048");
        assert_eq!(response.header("content-type"), "application/octet-stream");
        assert_eq!(
            response.header("content-disposition"),
            "attachment; filename=\"Konvert-Setup-1.2.0.exe\""
        );
        assert_eq!(response.as_bytes().as_ref(), installer_bytes().as_slice());
    }

    #[tokio::test]
    async fn streams_requested_range_as_partial_content() {
        let state = memory_state(DeliveryMode::Stream);
        seed(&state, EXE_KEY, installer_bytes()).await;
        let server = create_test_server(&state);

        let response = server
            .get("/api/download")
            .add_query_param("key", EXE_KEY)
            .add_header(header::RANGE, HeaderValue::from_static("bytes=0-99"))
            .await;

        assert_eq!(response.status_code(), 206);
        assert_eq!(response.header("content-range"), "bytes 0-99/2048");
        assert_eq!(response.header("content-length"), "100");
        assert_eq!(response.as_bytes().as_ref(), &installer_bytes()[..100]);
    }

    #[tokio::test]
    async fn mid_object_range_reports_correct_offsets() {
        let state = memory_state(DeliveryMode::Stream);
        seed(&state, EXE_KEY, installer_bytes()).await;
        let server = create_test_server(&state);

        let response = server
            .get("/api/download")
            .add_query_param("key", EXE_KEY)
            .add_header(header::RANGE, HeaderValue::from_static("bytes=1024-2047"))
            .await;

        assert_eq!(response.status_code(), 206);
        assert_eq!(response.header("content-range"), "bytes 1024-2047/2048");
        assert_eq!(response.as_bytes().as_ref(), &installer_bytes()[1024..]);
    }

    #[tokio::test]
    async fn msi_extension_forces_content_type() {
        let state = memory_state(DeliveryMode::Stream);
        seed(&state, MSI_KEY, installer_bytes()).await;
        let server = create_test_server(&state);

        let response = server.get("/api/download").add_query_param("key", MSI_KEY).await;

        assert_eq!(response.status_code(), 200);
        assert_eq!(response.header("content-type"), "application/x-msi");
    }

    #[tokio::test]
    async fn range_beyond_object_yields_416_with_total_size() {
        let state = memory_state(DeliveryMode::Stream);
        seed(&state, "latest/App.dmg", installer_bytes()).await;
        let server = create_test_server(&state);

        let response = server
            .get("/api/download")
            .add_query_param("key", "latest/App.dmg")
            .add_header(
                header::RANGE,
                HeaderValue::from_static("bytes=999999999-999999999"),
            )
            .await;

        assert_eq!(response.status_code(), 416);
        assert_eq!(response.header("content-range"), "bytes */2048");
        assert_eq!(response.header("accept-ranges"), "bytes");
        assert!(response.as_bytes().is_empty());
    }

    #[tokio::test]
    async fn malformed_range_is_ignored() {
        let state = memory_state(DeliveryMode::Stream);
        seed(&state, EXE_KEY, installer_bytes()).await;
        let server = create_test_server(&state);

        let response = server
            .get("/api/download")
            .add_query_param("key", EXE_KEY)
            .add_header(header::RANGE, HeaderValue::from_static("bytes=0-99,200-299"))
            .await;

        assert_eq!(response.status_code(), 200);
        assert_eq!(response.header("content-length"), "2048");
    }

    #[tokio::test]
    async fn missing_object_is_not_found() {
        let state = memory_state(DeliveryMode::Stream);
        let server = create_test_server(&state);

        let response = server
            .get("/api/download")
            .add_query_param("key", "missing/file.exe")
            .await;

        assert_eq!(response.status_code(), 404);
        assert_eq!(
            response.json::<serde_json::Value>(),
            json!({ "error": "File not found" })
        );
    }

    #[tokio::test]
    async fn repeated_requests_are_idempotent() {
        let state = memory_state(DeliveryMode::Stream);
        seed(&state, EXE_KEY, installer_bytes()).await;
        let server = create_test_server(&state);

        let first = server
            .get("/api/download")
            .add_query_param("key", EXE_KEY)
            .add_header(header::RANGE, HeaderValue::from_static("bytes=0-99"))
            .await;
        let second = server
            .get("/api/download")
            .add_query_param("key", EXE_KEY)
            .add_header(header::RANGE, HeaderValue::from_static("bytes=0-99"))
            .await;

        assert_eq!(first.status_code(), second.status_code());
        assert_eq!(first.header("content-range"), second.header("content-range"));
        assert_eq!(first.header("content-length"), second.header("content-length"));
    }

    #[tokio::test]
    async fn public_redirect_points_at_bucket_url() {
        let state = public_redirect_state("https://downloads.konvert.app");
        let server = create_test_server(&state);

        let response = server.get("/api/download").add_query_param("key", EXE_KEY).await;

        assert_eq!(response.status_code(), 307);
        assert_eq!(
            response.header("location"),
            "https://downloads.konvert.app/latest/Konvert-Setup-1.2.0.exe"
        );
        assert_eq!(response.header("cache-control"), "no-store");
        assert!(response.as_bytes().is_empty());
    }
}
