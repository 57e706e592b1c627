//! Health endpoint.
//!
//! Reports the environment name, store reachability and whether sign-in and
//! bootstrap are configured. A failing store check answers 503 with status
//! `degraded` instead of an error body, so probes can still read the details.
use crate::api::types::{AuthHealth, DatabaseHealth, HealthResponse};
use crate::app::AppState;
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;

#[utoipa::path(
    get,
    path = "/api/health",
    tag = "system",
    responses(
        (status = 200, description = "Portal healthy", body = HealthResponse),
        (status = 503, description = "Store unreachable", body = HealthResponse)
    )
)]
pub(crate) async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let check = state.store.health_check().await;
    let database = DatabaseHealth {
        backend: state.store.backend_name().to_string(),
        connected: check.is_ok(),
        error: check.as_ref().err().map(|err| err.to_string()),
    };
    if let Err(err) = &check {
        tracing::warn!(error = %err, "store health check failed");
    }

    let (status_code, status) = if check.is_ok() {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };
    (
        status_code,
        Json(HealthResponse {
            status: status.to_string(),
            environment: state.environment.clone(),
            database,
            auth: AuthHealth {
                sign_in_configured: state.oidc_issuer.is_some(),
                bootstrap_enabled: state.bootstrap_secret.is_some(),
            },
        }),
    )
}
