//! API error types and helpers.
//!
//! # Purpose
//! Keeps every error body in the portal's single shape
//! `{error, code, details}` and maps store failures onto HTTP statuses.
//!
//! # Key invariants
//! - `status` always agrees with `body.code`.
//! - Internal errors are logged in full and their text is returned in
//!   `details`.
use crate::api::types::ErrorResponse;
use crate::store::StoreError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;

pub const AUTH_REQUIRED: &str = "AUTH_REQUIRED";
pub const ACCESS_DENIED: &str = "ACCESS_DENIED";
pub const UNAUTHORIZED: &str = "UNAUTHORIZED";
pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
pub const NOT_FOUND: &str = "NOT_FOUND";
pub const CONFLICT: &str = "CONFLICT";
pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";

/// Structured API error returned by handlers.
///
/// # Example
/// ```rust
/// use axum::http::StatusCode;
/// use portal::api::error::{ApiError, api_not_found};
///
/// let err: ApiError = api_not_found("unknown test");
/// assert_eq!(err.status, StatusCode::NOT_FOUND);
/// assert_eq!(err.body.code, "NOT_FOUND");
/// ```
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorResponse,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status, Json(self.body)).into_response()
    }
}

fn error(status: StatusCode, code: &str, message: &str, details: Option<String>) -> ApiError {
    ApiError {
        status,
        body: ErrorResponse {
            error: message.to_string(),
            code: code.to_string(),
            details,
        },
    }
}

/// 401: no session, or the session token did not verify.
pub fn api_auth_required(message: &str) -> ApiError {
    error(StatusCode::UNAUTHORIZED, AUTH_REQUIRED, message, None)
}

/// 403: signed in, but the caller's access profile does not cover the request.
pub fn api_access_denied(message: &str) -> ApiError {
    error(StatusCode::FORBIDDEN, ACCESS_DENIED, message, None)
}

/// 403: the caller's role is too low for an administrative action.
pub fn api_unauthorized(message: &str) -> ApiError {
    error(StatusCode::FORBIDDEN, UNAUTHORIZED, message, None)
}

pub fn api_validation_error(message: &str) -> ApiError {
    error(StatusCode::BAD_REQUEST, VALIDATION_ERROR, message, None)
}

pub fn api_not_found(message: &str) -> ApiError {
    error(StatusCode::NOT_FOUND, NOT_FOUND, message, None)
}

pub fn api_conflict(message: &str) -> ApiError {
    error(StatusCode::CONFLICT, CONFLICT, message, None)
}

/// Build a 500 from a store error; the error is logged and echoed in `details`.
pub fn api_internal(message: &str, err: &StoreError) -> ApiError {
    tracing::error!(error = ?err, "portal storage error");
    error(
        StatusCode::INTERNAL_SERVER_ERROR,
        INTERNAL_ERROR,
        message,
        Some(err.to_string()),
    )
}

pub fn api_internal_message(message: &str) -> ApiError {
    tracing::error!(%message, "portal internal error");
    error(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR, message, None)
}

/// Maps `NotFound`/`Conflict` onto their HTTP codes and everything else to 500.
pub fn api_store_error(message: &str, err: StoreError) -> ApiError {
    match err {
        StoreError::NotFound(detail) => {
            error(StatusCode::NOT_FOUND, NOT_FOUND, message, Some(detail))
        }
        StoreError::Conflict(detail) => {
            error(StatusCode::CONFLICT, CONFLICT, message, Some(detail))
        }
        other => api_internal(message, &other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_helpers_build_expected_codes() {
        let cases = [
            (api_auth_required("x"), StatusCode::UNAUTHORIZED, AUTH_REQUIRED),
            (api_access_denied("x"), StatusCode::FORBIDDEN, ACCESS_DENIED),
            (api_unauthorized("x"), StatusCode::FORBIDDEN, UNAUTHORIZED),
            (api_validation_error("x"), StatusCode::BAD_REQUEST, VALIDATION_ERROR),
            (api_not_found("x"), StatusCode::NOT_FOUND, NOT_FOUND),
            (api_conflict("x"), StatusCode::CONFLICT, CONFLICT),
            (
                api_internal_message("x"),
                StatusCode::INTERNAL_SERVER_ERROR,
                INTERNAL_ERROR,
            ),
        ];
        for (err, status, code) in cases {
            assert_eq!(err.status, status);
            assert_eq!(err.body.code, code);
            assert_eq!(err.body.error, "x");
        }
    }

    #[test]
    fn api_internal_carries_error_text() {
        let err = StoreError::Unexpected(anyhow::anyhow!("boom"));
        let api = api_internal("storage failed", &err);
        assert_eq!(api.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(api.body.error, "storage failed");
        assert_eq!(api.body.details.as_deref(), Some("boom"));
    }

    #[test]
    fn store_errors_map_to_http_codes() {
        let missing = api_store_error("no user", StoreError::NotFound("a@x.com".into()));
        assert_eq!(missing.status, StatusCode::NOT_FOUND);
        let taken = api_store_error("exists", StoreError::Conflict("a@x.com".into()));
        assert_eq!(taken.body.code, CONFLICT);
        let broken = api_store_error("boom", StoreError::Unexpected(anyhow::anyhow!("io")));
        assert_eq!(broken.status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
