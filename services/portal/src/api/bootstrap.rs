//! One-time super-admin bootstrap.
//!
//! # Purpose
//! A fresh deployment has no admins and therefore nobody who may grant
//! access. This endpoint, guarded by a shared secret from configuration,
//! creates the first `super_admin`. Once any super-admin exists it answers
//! `409 CONFLICT` forever.
use crate::api::error::{
    ApiError, api_auth_required, api_conflict, api_not_found, api_store_error,
    api_validation_error,
};
use crate::api::types::{BootstrapRequest, BootstrapResponse};
use crate::app::AppState;
use crate::store::StoreError;
use axum::Json;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use chrono::Utc;
use prepdesk_identity::{AccessTypes, MockAccess, Role, User, is_plausible_email};

pub const BOOTSTRAP_SECRET_HEADER: &str = "X-PrepDesk-Bootstrap-Secret";

#[utoipa::path(
    post,
    path = "/api/bootstrap/super-admin",
    tag = "bootstrap",
    request_body = BootstrapRequest,
    params(("X-PrepDesk-Bootstrap-Secret" = String, Header, description = "Configured bootstrap secret")),
    responses(
        (status = 201, description = "Super admin created", body = BootstrapResponse),
        (status = 400, description = "Validation error"),
        (status = 401, description = "Missing or wrong secret"),
        (status = 404, description = "Bootstrap not enabled"),
        (status = 409, description = "A super admin already exists")
    )
)]
pub(crate) async fn create_super_admin(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<BootstrapRequest>,
) -> Result<(StatusCode, Json<BootstrapResponse>), ApiError> {
    let expected = state
        .bootstrap_secret
        .as_deref()
        .ok_or_else(|| api_not_found("bootstrap not enabled"))?;
    ensure_bootstrap_authorized(expected, &headers)?;

    if !is_plausible_email(&body.email) {
        return Err(api_validation_error("email is not valid"));
    }

    let mut user = User::new(&body.email, body.name.trim(), Role::SuperAdmin, Utc::now());
    user.access_types = AccessTypes::all();
    user.mock_access = MockAccess::all();

    let user = match state.store.create_first_super_admin(user).await {
        Ok(user) => user,
        Err(StoreError::Conflict(_)) => {
            return Err(api_conflict("a super admin already exists"));
        }
        Err(err) => return Err(api_store_error("failed to bootstrap super admin", err)),
    };
    tracing::warn!(email = %user.email, "first super admin bootstrapped");

    Ok((
        StatusCode::CREATED,
        Json(BootstrapResponse {
            status: "created".to_string(),
            user,
        }),
    ))
}

fn ensure_bootstrap_authorized(expected: &str, headers: &HeaderMap) -> Result<(), ApiError> {
    let secret = match headers.get(BOOTSTRAP_SECRET_HEADER) {
        Some(value) => value
            .to_str()
            .map_err(|_| api_auth_required("invalid bootstrap secret"))?,
        None => return Err(api_auth_required("missing bootstrap secret")),
    };
    if !constant_time_eq(secret.as_bytes(), expected.as_bytes()) {
        return Err(api_auth_required("invalid bootstrap secret"));
    }
    Ok(())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (left, right) in a.iter().zip(b.iter()) {
        diff |= left ^ right;
    }
    diff == 0
}
