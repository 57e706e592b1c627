//! Administrative handlers: student grants, admin accounts, roster sync.
//!
//! # Key invariants
//! - Every route requires an admin session; creating or changing admins and
//!   importing a roster require `super_admin`.
//! - Student routes only ever touch student records and admin routes only
//!   admin records; a mismatch is `NOT_FOUND`.
//! - Deleting deactivates. Records are never removed.
//! - A super-admin cannot demote or deactivate their own account.
use crate::api::error::{
    ApiError, api_conflict, api_internal, api_not_found, api_store_error, api_validation_error,
};
use crate::api::types::{
    AdminCreateRequest, AdminUpdateRequest, BackfillRequest, RosterImportParams,
    StudentGrantRequest, StudentUpdateRequest, UserListResponse,
};
use crate::app::AppState;
use crate::auth::gate::{Caller, require_caller};
use crate::roster::{backfill_role_numbers, import_roster};
use crate::store::UserScope;
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use chrono::Utc;
use prepdesk_identity::roster::{
    AccessControlDocument, BackfillReport, RolePolicy, SyncReport,
};
use prepdesk_identity::{
    AccessTypes, MockAccess, Role, RoleNumber, User, is_plausible_email, normalize_email,
};
use std::collections::BTreeSet;

async fn admin_caller(state: &AppState, headers: &HeaderMap) -> Result<Caller, ApiError> {
    let caller = require_caller(state, headers).await?;
    caller.require_admin()?;
    Ok(caller)
}

async fn super_admin_caller(state: &AppState, headers: &HeaderMap) -> Result<Caller, ApiError> {
    let caller = require_caller(state, headers).await?;
    caller.require_super_admin()?;
    Ok(caller)
}

fn checked_email(raw: &str) -> Result<String, ApiError> {
    if is_plausible_email(raw) {
        Ok(normalize_email(raw))
    } else {
        Err(api_validation_error("email is not valid"))
    }
}

fn parse_role_numbers(raw: &[String]) -> Result<BTreeSet<RoleNumber>, ApiError> {
    raw.iter()
        .map(|number| RoleNumber::parse(number))
        .collect::<Result<_, _>>()
        .map_err(|err| api_validation_error(&err.to_string()))
}

fn admin_role(role: Option<Role>) -> Result<Role, ApiError> {
    match role.unwrap_or(Role::Admin) {
        Role::Student => Err(api_validation_error("admin role must be admin or super_admin")),
        role => Ok(role),
    }
}

async fn load_in_scope(
    state: &AppState,
    email: &str,
    scope: UserScope,
) -> Result<User, ApiError> {
    let email = normalize_email(email);
    state
        .store
        .get_user(&email)
        .await
        .map_err(|err| api_internal("failed to load user", &err))?
        .filter(|user| scope.includes(user))
        .ok_or_else(|| api_not_found("user not found"))
}

async fn save(state: &AppState, mut user: User) -> Result<Json<User>, ApiError> {
    user.updated_at = Utc::now();
    let user = state
        .store
        .replace_user(user)
        .await
        .map_err(|err| api_store_error("failed to update user", err))?;
    Ok(Json(user))
}

#[utoipa::path(
    get,
    path = "/api/admin/students",
    tag = "admin",
    responses(
        (status = 200, description = "Students sorted by email", body = UserListResponse),
        (status = 403, description = "Admin role required")
    )
)]
pub(crate) async fn list_students(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<UserListResponse>, ApiError> {
    admin_caller(&state, &headers).await?;
    let users = state
        .store
        .list_users(UserScope::Students)
        .await
        .map_err(|err| api_internal("failed to list students", &err))?;
    Ok(Json(UserListResponse { users }))
}

#[utoipa::path(
    post,
    path = "/api/admin/students",
    tag = "admin",
    request_body = StudentGrantRequest,
    responses(
        (status = 201, description = "Student created", body = User),
        (status = 200, description = "Existing student's access updated", body = User),
        (status = 400, description = "Invalid email or role number"),
        (status = 403, description = "Admin role required"),
        (status = 409, description = "Email belongs to an admin")
    )
)]
pub(crate) async fn grant_student(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<StudentGrantRequest>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    let caller = admin_caller(&state, &headers).await?;
    let email = checked_email(&body.email)?;
    let role_numbers = parse_role_numbers(&body.role_numbers)?;

    let existing = state
        .store
        .get_user(&email)
        .await
        .map_err(|err| api_internal("failed to load user", &err))?;
    match existing {
        Some(user) if user.is_admin() => Err(api_conflict("email belongs to an admin")),
        Some(mut user) => {
            if !body.name.trim().is_empty() {
                user.name = body.name.trim().to_string();
            }
            user.role_numbers.extend(role_numbers);
            user.access_types = body.access_types;
            user.mock_access = body.mock_access;
            user.active = true;
            let user = save(&state, user).await?;
            tracing::info!(%email, by = %caller.email(), "student access updated");
            Ok((StatusCode::OK, user))
        }
        None => {
            let mut user = User::new(&email, body.name.trim(), Role::Student, Utc::now());
            user.role_numbers = role_numbers;
            user.access_types = body.access_types;
            user.mock_access = body.mock_access;
            let user = state
                .store
                .create_user(user)
                .await
                .map_err(|err| api_store_error("failed to create student", err))?;
            tracing::info!(%email, by = %caller.email(), "student access granted");
            Ok((StatusCode::CREATED, Json(user)))
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/admin/students/{email}",
    tag = "admin",
    params(("email" = String, Path, description = "Student email")),
    responses(
        (status = 200, description = "Student record", body = User),
        (status = 403, description = "Admin role required"),
        (status = 404, description = "No such student")
    )
)]
pub(crate) async fn get_student(
    Path(email): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<User>, ApiError> {
    admin_caller(&state, &headers).await?;
    Ok(Json(load_in_scope(&state, &email, UserScope::Students).await?))
}

#[utoipa::path(
    patch,
    path = "/api/admin/students/{email}",
    tag = "admin",
    params(("email" = String, Path, description = "Student email")),
    request_body = StudentUpdateRequest,
    responses(
        (status = 200, description = "Updated student", body = User),
        (status = 400, description = "Invalid role number"),
        (status = 403, description = "Admin role required"),
        (status = 404, description = "No such student")
    )
)]
pub(crate) async fn update_student(
    Path(email): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<StudentUpdateRequest>,
) -> Result<Json<User>, ApiError> {
    admin_caller(&state, &headers).await?;
    let mut user = load_in_scope(&state, &email, UserScope::Students).await?;
    if let Some(name) = body.name {
        user.name = name.trim().to_string();
    }
    if let Some(numbers) = body.role_numbers {
        user.role_numbers = parse_role_numbers(&numbers)?;
    }
    if let Some(access_types) = body.access_types {
        user.access_types = access_types;
    }
    if let Some(mock_access) = body.mock_access {
        user.mock_access = mock_access;
    }
    if let Some(active) = body.active {
        user.active = active;
    }
    save(&state, user).await
}

#[utoipa::path(
    delete,
    path = "/api/admin/students/{email}",
    tag = "admin",
    params(("email" = String, Path, description = "Student email")),
    responses(
        (status = 200, description = "Student deactivated", body = User),
        (status = 403, description = "Admin role required"),
        (status = 404, description = "No such student")
    )
)]
pub(crate) async fn deactivate_student(
    Path(email): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<User>, ApiError> {
    let caller = admin_caller(&state, &headers).await?;
    let mut user = load_in_scope(&state, &email, UserScope::Students).await?;
    user.active = false;
    tracing::info!(email = %user.email, by = %caller.email(), "student deactivated");
    save(&state, user).await
}

#[utoipa::path(
    get,
    path = "/api/admin/admins",
    tag = "admin",
    responses(
        (status = 200, description = "Admins sorted by email", body = UserListResponse),
        (status = 403, description = "Admin role required")
    )
)]
pub(crate) async fn list_admins(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<UserListResponse>, ApiError> {
    admin_caller(&state, &headers).await?;
    let users = state
        .store
        .list_users(UserScope::Admins)
        .await
        .map_err(|err| api_internal("failed to list admins", &err))?;
    Ok(Json(UserListResponse { users }))
}

#[utoipa::path(
    post,
    path = "/api/admin/admins",
    tag = "admin",
    request_body = AdminCreateRequest,
    responses(
        (status = 201, description = "Admin created", body = User),
        (status = 400, description = "Invalid email or role"),
        (status = 403, description = "Super admin role required"),
        (status = 409, description = "Email already registered")
    )
)]
pub(crate) async fn create_admin(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<AdminCreateRequest>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    let caller = super_admin_caller(&state, &headers).await?;
    let email = checked_email(&body.email)?;
    let role = admin_role(body.role)?;

    let mut user = User::new(&email, body.name.trim(), role, Utc::now());
    user.permissions = body.permissions;
    user.access_types = AccessTypes::all();
    user.mock_access = MockAccess::all();
    let user = state
        .store
        .create_user(user)
        .await
        .map_err(|err| api_store_error("failed to create admin", err))?;
    tracing::info!(%email, %role, by = %caller.email(), "admin created");
    Ok((StatusCode::CREATED, Json(user)))
}

#[utoipa::path(
    patch,
    path = "/api/admin/admins/{email}",
    tag = "admin",
    params(("email" = String, Path, description = "Admin email")),
    request_body = AdminUpdateRequest,
    responses(
        (status = 200, description = "Updated admin", body = User),
        (status = 400, description = "Invalid role or self-demotion"),
        (status = 403, description = "Super admin role required"),
        (status = 404, description = "No such admin")
    )
)]
pub(crate) async fn update_admin(
    Path(email): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<AdminUpdateRequest>,
) -> Result<Json<User>, ApiError> {
    let caller = super_admin_caller(&state, &headers).await?;
    let mut user = load_in_scope(&state, &email, UserScope::Admins).await?;
    let is_self = user.email == caller.email();

    if let Some(role) = body.role {
        let role = admin_role(Some(role))?;
        if is_self && role != user.role {
            return Err(api_validation_error("cannot change your own role"));
        }
        user.role = role;
    }
    if let Some(active) = body.active {
        if is_self && !active {
            return Err(api_validation_error("cannot deactivate your own account"));
        }
        user.active = active;
    }
    if let Some(name) = body.name {
        user.name = name.trim().to_string();
    }
    if let Some(permissions) = body.permissions {
        user.permissions = permissions;
    }
    save(&state, user).await
}

#[utoipa::path(
    delete,
    path = "/api/admin/admins/{email}",
    tag = "admin",
    params(("email" = String, Path, description = "Admin email")),
    responses(
        (status = 200, description = "Admin deactivated", body = User),
        (status = 400, description = "Cannot deactivate yourself"),
        (status = 403, description = "Super admin role required"),
        (status = 404, description = "No such admin")
    )
)]
pub(crate) async fn deactivate_admin(
    Path(email): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<User>, ApiError> {
    let caller = super_admin_caller(&state, &headers).await?;
    let mut user = load_in_scope(&state, &email, UserScope::Admins).await?;
    if user.email == caller.email() {
        return Err(api_validation_error("cannot deactivate your own account"));
    }
    user.active = false;
    tracing::info!(email = %user.email, by = %caller.email(), "admin deactivated");
    save(&state, user).await
}

#[utoipa::path(
    post,
    path = "/api/admin/roster/import",
    tag = "admin",
    params(RosterImportParams),
    request_body = AccessControlDocument,
    responses(
        (status = 200, description = "Per-record outcome tallies", body = SyncReport),
        (status = 400, description = "Unknown role policy"),
        (status = 403, description = "Super admin role required")
    )
)]
pub(crate) async fn roster_import(
    Query(params): Query<RosterImportParams>,
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(document): Json<AccessControlDocument>,
) -> Result<Json<SyncReport>, ApiError> {
    let caller = super_admin_caller(&state, &headers).await?;
    let policy = match params.policy.as_deref() {
        Some(raw) => raw
            .parse::<RolePolicy>()
            .map_err(|message| api_validation_error(&message))?,
        None => state.role_policy,
    };
    tracing::info!(by = %caller.email(), ?policy, "roster import requested");
    let report = import_roster(state.store.as_ref(), &document, policy)
        .await
        .map_err(|err| api_internal("roster import failed", &err))?;
    Ok(Json(report))
}

#[utoipa::path(
    post,
    path = "/api/admin/roster/role-numbers",
    tag = "admin",
    request_body = BackfillRequest,
    responses(
        (status = 200, description = "Backfill tallies", body = BackfillReport),
        (status = 403, description = "Admin role required")
    )
)]
pub(crate) async fn role_number_backfill(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Option<Json<BackfillRequest>>,
) -> Result<Json<BackfillReport>, ApiError> {
    let caller = admin_caller(&state, &headers).await?;
    let roster = body.and_then(|Json(request)| request.access_control);
    tracing::info!(by = %caller.email(), with_roster = roster.is_some(), "role-number backfill requested");
    let report = backfill_role_numbers(
        state.store.as_ref(),
        &state.datasets.directory,
        roster.as_ref(),
    )
    .await
    .map_err(|err| api_internal("role-number backfill failed", &err))?;
    Ok(Json(report))
}
