//! Public registration intake and the admin listing.
use crate::api::error::{ApiError, api_internal, api_validation_error};
use crate::api::types::RegistrationListResponse;
use crate::app::AppState;
use crate::auth::gate::require_caller;
use crate::model::{NewRegistration, Registration};
use crate::store::new_record_id;
use axum::Json;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use chrono::Utc;

#[utoipa::path(
    post,
    path = "/api/registrations",
    tag = "registrations",
    request_body = NewRegistration,
    responses(
        (status = 201, description = "Registration recorded", body = Registration),
        (status = 400, description = "Invalid registration")
    )
)]
pub(crate) async fn submit_registration(
    State(state): State<AppState>,
    Json(body): Json<NewRegistration>,
) -> Result<(StatusCode, Json<Registration>), ApiError> {
    let registration = body
        .into_registration(new_record_id(), Utc::now())
        .map_err(|err| api_validation_error(&err.to_string()))?;
    let registration = state
        .store
        .insert_registration(registration)
        .await
        .map_err(|err| api_internal("failed to record registration", &err))?;
    tracing::info!(id = %registration.id, track = ?registration.track, "registration received");
    Ok((StatusCode::CREATED, Json(registration)))
}

#[utoipa::path(
    get,
    path = "/api/admin/registrations",
    tag = "registrations",
    responses(
        (status = 200, description = "Registrations, newest first", body = RegistrationListResponse),
        (status = 401, description = "Sign in required"),
        (status = 403, description = "Admin role required")
    )
)]
pub(crate) async fn list_registrations(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<RegistrationListResponse>, ApiError> {
    let caller = require_caller(&state, &headers).await?;
    caller.require_admin()?;
    let registrations = state
        .store
        .list_registrations()
        .await
        .map_err(|err| api_internal("failed to list registrations", &err))?;
    Ok(Json(RegistrationListResponse { registrations }))
}
