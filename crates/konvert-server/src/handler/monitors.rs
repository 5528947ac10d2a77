//! Service health handlers.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use konvert_opendal::ReleaseStore;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use crate::service::ServiceState;

/// Tracing target for monitoring operations.
const TRACING_TARGET: &str = "konvert_server::handler::monitors";

/// Current health status of the service.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[must_use = "responses do nothing unless serialized"]
pub struct HealthResponse {
    /// Whether the object store is reachable.
    pub is_healthy: bool,
    /// Timestamp of the check.
    pub updated_at: jiff::Timestamp,
}

/// Verifies connectivity to the object store.
#[tracing::instrument(skip_all)]
#[utoipa::path(
    get, path = "/health", tag = "health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "Object store is unreachable", body = HealthResponse),
    )
)]
async fn health_status(State(store): State<ReleaseStore>) -> Response {
    let is_healthy = match store.check().await {
        Ok(()) => true,
        Err(err) => {
            tracing::error!(
                target: TRACING_TARGET,
                error = %err,
                "object store health check failed"
            );
            false
        }
    };

    let status = if is_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = HealthResponse {
        is_healthy,
        updated_at: jiff::Timestamp::now(),
    };

    (status, Json(response)).into_response()
}

/// Returns a [`Router`] with all monitoring routes.
///
/// [`Router`]: axum::routing::Router
pub fn routes() -> OpenApiRouter<ServiceState> {
    OpenApiRouter::new().routes(routes!(health_status))
}

#[cfg(test)]
mod tests {
    use super::HealthResponse;
    use crate::handler::test::{create_test_server, memory_state};
    use crate::service::DeliveryMode;

    #[tokio::test]
    async fn healthy_store_reports_ok() {
        let state = memory_state(DeliveryMode::Redirect);
        let server = create_test_server(&state);

        let response = server.get("/health").await;

        assert_eq!(response.status_code(), 200);
        let health: HealthResponse = response.json();
        assert!(health.is_healthy);
    }

    #[tokio::test]
    async fn unknown_route_returns_json_not_found() {
        let state = memory_state(DeliveryMode::Redirect);
        let server = create_test_server(&state);

        let response = server.get("/nope").await;

        assert_eq!(response.status_code(), 404);
        assert_eq!(
            response.json::<serde_json::Value>(),
            serde_json::json!({ "error": "The requested resource was not found" })
        );
    }
}
