//! Sign-in callback and session introspection handlers.
//!
//! # Purpose
//! The browser completes the provider's sign-in flow itself and posts the ID
//! token here. A verified token always yields a session; whether that
//! session can do anything is decided per request by the access gate.
use crate::api::error::{
    ApiError, api_auth_required, api_internal, api_internal_message, api_not_found,
};
use crate::api::types::{SessionResponse, SignInRequest, SignInResponse};
use crate::app::AppState;
use crate::auth::gate::{optional_caller, require_caller};
use crate::observability::SIGNINS;
use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use prepdesk_identity::{AccessProfile, Role, resolve_access};

#[utoipa::path(
    post,
    path = "/api/auth/callback",
    tag = "auth",
    request_body = SignInRequest,
    responses(
        (status = 200, description = "Session minted", body = SignInResponse),
        (status = 401, description = "ID token rejected"),
        (status = 404, description = "Sign-in not configured")
    )
)]
pub(crate) async fn callback(
    State(state): State<AppState>,
    Json(body): Json<SignInRequest>,
) -> Result<Json<SignInResponse>, ApiError> {
    let issuer = state
        .oidc_issuer
        .as_ref()
        .ok_or_else(|| api_not_found("sign-in is not configured"))?;

    let identity = match state.oidc_validator.validate(&body.id_token, issuer).await {
        Ok(identity) => identity,
        Err(err) => {
            tracing::info!(error = %err, "id token rejected");
            metrics::counter!(SIGNINS, "outcome" => "rejected").increment(1);
            return Err(api_auth_required("id token rejected"));
        }
    };

    let user = state
        .store
        .get_user(&identity.email)
        .await
        .map_err(|err| api_internal("failed to load user", &err))?;
    let access = resolve_access(user.as_ref());
    let outcome = if access.is_denied() { "no_access" } else { "granted" };
    metrics::counter!(SIGNINS, "outcome" => outcome).increment(1);

    let name = user
        .as_ref()
        .map(|user| user.name.clone())
        .filter(|name| !name.is_empty())
        .or(identity.name.clone())
        .unwrap_or_default();
    let role = access.role.unwrap_or(Role::Student);
    let (token, _) = state
        .session_keys
        .mint(&identity.email, &name, role)
        .map_err(|err| {
            tracing::error!(error = %err, "failed to mint session");
            api_internal_message("failed to mint session")
        })?;

    tracing::info!(email = %identity.email, %outcome, "signed in");
    Ok(Json(SignInResponse {
        token,
        token_type: "Bearer".to_string(),
        expires_in: state.session_keys.ttl().as_secs(),
        email: identity.email,
        user: user.filter(|_| !access.is_denied()).map(|user| user.info()),
        access,
    }))
}

#[utoipa::path(
    get,
    path = "/api/auth/session",
    tag = "auth",
    responses(
        (status = 200, description = "Signed-in user and access", body = SessionResponse),
        (status = 401, description = "No valid session"),
        (status = 403, description = "Account has no access")
    )
)]
pub(crate) async fn session(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<SessionResponse>, ApiError> {
    let caller = require_caller(&state, &headers).await?;
    Ok(Json(SessionResponse {
        user: caller.user.info(),
        access: caller.access,
    }))
}

#[utoipa::path(
    get,
    path = "/api/access",
    tag = "auth",
    responses(
        (status = 200, description = "Caller's access flags; all false when anonymous", body = AccessProfile),
        (status = 401, description = "Session presented but invalid")
    )
)]
pub(crate) async fn access(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<AccessProfile>, ApiError> {
    let profile = optional_caller(&state, &headers)
        .await?
        .map(|caller| caller.access)
        .unwrap_or_else(AccessProfile::denied);
    Ok(Json(profile))
}
