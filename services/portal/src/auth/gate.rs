//! Request gate: bearer session to [`Caller`].
//!
//! # Key invariants
//! - A missing or unverifiable session is `AUTH_REQUIRED` (401).
//! - A verified session whose email resolves to nothing (unknown or inactive
//!   user) is `ACCESS_DENIED` (403).
//! - Role checks for admin actions are `UNAUTHORIZED` (403).
//! - Access is resolved from the store on every request; the session's role
//!   claim is never trusted.
use crate::api::error::{
    ApiError, api_access_denied, api_auth_required, api_internal, api_unauthorized,
};
use crate::app::AppState;
use axum::http::HeaderMap;
use prepdesk_identity::{AccessProfile, User, resolve_access};

/// Seconds of clock skew tolerated on session expiry.
const SESSION_LEEWAY_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct Caller {
    pub user: User,
    pub access: AccessProfile,
}

impl Caller {
    pub fn email(&self) -> &str {
        &self.user.email
    }

    pub fn is_admin(&self) -> bool {
        self.access.is_admin
    }

    pub fn require_admin(&self) -> Result<(), ApiError> {
        if self.access.is_admin {
            Ok(())
        } else {
            Err(api_unauthorized("admin role required"))
        }
    }

    pub fn require_super_admin(&self) -> Result<(), ApiError> {
        if self.access.is_super_admin() {
            Ok(())
        } else {
            Err(api_unauthorized("super admin role required"))
        }
    }
}

pub fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(axum::http::header::AUTHORIZATION)?;
    let value = value.to_str().ok()?;
    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

pub async fn require_caller(state: &AppState, headers: &HeaderMap) -> Result<Caller, ApiError> {
    let token = extract_bearer(headers).ok_or_else(|| api_auth_required("sign in required"))?;
    caller_from_token(state, token).await
}

/// `None` for anonymous callers and for sessions whose account has no access;
/// a presented but invalid token still fails with `AUTH_REQUIRED`.
pub async fn optional_caller(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<Option<Caller>, ApiError> {
    let Some(token) = extract_bearer(headers) else {
        return Ok(None);
    };
    let (user, access) = resolve_session(state, token).await?;
    Ok(user
        .filter(|_| !access.is_denied())
        .map(|user| Caller { user, access }))
}

async fn caller_from_token(state: &AppState, token: &str) -> Result<Caller, ApiError> {
    match resolve_session(state, token).await? {
        (Some(user), access) if !access.is_denied() => Ok(Caller { user, access }),
        _ => Err(api_access_denied("no portal access for this account")),
    }
}

async fn resolve_session(
    state: &AppState,
    token: &str,
) -> Result<(Option<User>, AccessProfile), ApiError> {
    let claims = state
        .session_keys
        .verify(token, SESSION_LEEWAY_SECS)
        .map_err(|err| {
            tracing::debug!(error = %err, "session rejected");
            api_auth_required("session is invalid or expired")
        })?;

    let user = state
        .store
        .get_user(&claims.sub)
        .await
        .map_err(|err| api_internal("failed to load user", &err))?;
    let access = resolve_access(user.as_ref());
    Ok((user, access))
}
