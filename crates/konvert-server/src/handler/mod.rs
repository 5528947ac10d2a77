//! All `axum::`[`Router`]s with related `axum::`[`Handler`]s.
//!
//! [`Router`]: axum::routing::Router
//! [`Handler`]: axum::handler::Handler

mod downloads;
mod monitors;
mod releases;
mod response;
mod utils;

use axum::Json;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;

pub use crate::handler::downloads::DownloadParams;
pub use crate::handler::monitors::HealthResponse;
pub use crate::handler::releases::ReleaseResponse;
pub use crate::handler::response::ErrorResponse;
use crate::service::ServiceState;

/// A specialized [`Result`] type for HTTP handlers.
///
/// [`Result`]: std::result::Result
pub type Result<T, E = ErrorResponse<'static>> = std::result::Result<T, E>;

/// OpenAPI document for the downloads API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Konvert downloads API",
        description = "Installer downloads and release metadata for the Konvert desktop app",
    ),
    tags(
        (name = "downloads", description = "Installer download proxy"),
        (name = "releases", description = "Release metadata"),
        (name = "health", description = "Service health"),
    )
)]
struct ApiDoc;

#[inline]
async fn fallback() -> Response {
    ErrorResponse::NOT_FOUND.into_response()
}

/// Returns the complete application router with the OpenAPI document mounted.
pub fn router(state: ServiceState) -> axum::Router {
    let (router, api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .merge(downloads::routes())
        .merge(releases::routes())
        .merge(monitors::routes())
        .split_for_parts();

    router
        .route("/api-docs/openapi.json", get(move || async move { Json(api) }))
        .fallback(fallback)
        .with_state(state)
}

#[cfg(test)]
mod test {
    use axum_test::TestServer;
    use konvert_opendal::{ReleaseStore, StorageConfig};
    use url::Url;

    use crate::service::{DeliveryMode, DeliveryPolicy, ServiceState};

    /// Returns state backed by an empty in-memory store.
    pub(crate) fn memory_state(mode: DeliveryMode) -> ServiceState {
        let store = ReleaseStore::new(StorageConfig::Memory).expect("memory store");
        let delivery = DeliveryPolicy {
            mode,
            ..DeliveryPolicy::default()
        };
        ServiceState::new(store, delivery)
    }

    /// Returns redirect-mode state pointing at a public bucket URL.
    pub(crate) fn public_redirect_state(public_base_url: &str) -> ServiceState {
        let store = ReleaseStore::new(StorageConfig::Memory).expect("memory store");
        let delivery = DeliveryPolicy {
            mode: DeliveryMode::Redirect,
            public_base_url: Some(Url::parse(public_base_url).expect("valid base url")),
            ..DeliveryPolicy::default()
        };
        ServiceState::new(store, delivery)
    }

    /// Returns a new [`TestServer`] over the full application router.
    pub(crate) fn create_test_server(state: &ServiceState) -> TestServer {
        TestServer::new(super::router(state.clone())).expect("test server")
    }

    /// Seeds an object into the state's store.
    pub(crate) async fn seed(state: &ServiceState, key: &str, data: Vec<u8>) {
        state
            .release_store()
            .put(key, bytes::Bytes::from(data))
            .await
            .expect("seed object");
    }
}
