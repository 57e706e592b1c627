//! Result display handlers.
//!
//! # Key invariants
//! - Students are always matched by their own email and role numbers; only
//!   admins may look up someone else via `selected` / `email`.
//! - A test tagged with a mock variant is visible only when the caller's
//!   access profile allows that variant.
//! - "Absent" is a normal answer (200, `status: absent`); an unknown test or
//!   result kind is `NOT_FOUND`.
use crate::api::error::{ApiError, api_access_denied, api_internal, api_not_found};
use crate::api::types::{LookupStatus, ResultListResponse, ResultParams, TestResultResponse};
use crate::app::AppState;
use crate::auth::gate::{Caller, require_caller};
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use prepdesk_identity::{
    ResultKind, ResultLookup, ResultQuery, StudentsDirectory, TestSheet, find_student_result,
};

fn parse_kind(raw: &str) -> Result<ResultKind, ApiError> {
    ResultKind::parse(raw).map_err(|err| api_not_found(&err.to_string()))
}

async fn build_query(
    state: &AppState,
    caller: &Caller,
    params: &ResultParams,
) -> Result<ResultQuery, ApiError> {
    let own = || {
        ResultQuery::default()
            .with_email(caller.user.email.clone())
            .with_role_numbers(caller.user.role_numbers.iter().map(|n| n.as_str().to_string()))
    };
    if !caller.is_admin() {
        return Ok(own());
    }

    let email = params
        .email
        .as_deref()
        .map(str::trim)
        .filter(|email| !email.is_empty());
    let selected = params
        .selected
        .as_deref()
        .map(str::trim)
        .filter(|selected| !selected.is_empty());
    if email.is_none() && selected.is_none() {
        return Ok(own());
    }

    let mut query = ResultQuery::default();
    if let Some(email) = email {
        query = query.with_email(email);
        let student = state
            .store
            .get_user(email)
            .await
            .map_err(|err| api_internal("failed to load student", &err))?;
        if let Some(student) = student {
            query = query.with_role_numbers(
                student
                    .role_numbers
                    .iter()
                    .map(|number| number.as_str().to_string()),
            );
        }
    }
    if let Some(selected) = selected {
        query = query.with_selected(selected);
    }
    Ok(query)
}

fn describe(
    test: &str,
    sheet: &TestSheet,
    directory: &StudentsDirectory,
    query: &ResultQuery,
) -> TestResultResponse {
    let lookup = find_student_result(&sheet.results, directory, query);
    let (status, identifier, strategy, result) = match lookup {
        ResultLookup::Found {
            identifier,
            strategy,
            result,
        } => (
            LookupStatus::Found,
            Some(identifier),
            Some(strategy),
            Some(result.clone()),
        ),
        ResultLookup::Absent => (LookupStatus::Absent, None, None, None),
    };
    TestResultResponse {
        test: test.to_string(),
        status,
        identifier,
        strategy,
        result,
        class_stats: sheet.class_stats.clone(),
        variant: sheet.variant,
    }
}

#[utoipa::path(
    get,
    path = "/api/results/{kind}",
    tag = "results",
    params(
        ("kind" = String, Path, description = "mock, full or simple"),
        ResultParams
    ),
    responses(
        (status = 200, description = "Every visible test with the caller's result", body = ResultListResponse),
        (status = 401, description = "Sign in required"),
        (status = 403, description = "No access"),
        (status = 404, description = "Unknown result kind")
    )
)]
pub(crate) async fn list_results(
    Path(kind): Path<String>,
    Query(params): Query<ResultParams>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ResultListResponse>, ApiError> {
    let kind = parse_kind(&kind)?;
    let caller = require_caller(&state, &headers).await?;
    let query = build_query(&state, &caller, &params).await?;

    let tests = match state.datasets.book(kind) {
        Some(book) => book
            .tests
            .iter()
            .filter(|(_, sheet)| {
                sheet
                    .variant
                    .is_none_or(|variant| caller.access.allows(variant))
            })
            .map(|(name, sheet)| describe(name, sheet, &state.datasets.directory, &query))
            .collect(),
        None => Vec::new(),
    };
    Ok(Json(ResultListResponse { kind, tests }))
}

#[utoipa::path(
    get,
    path = "/api/results/{kind}/{test}",
    tag = "results",
    params(
        ("kind" = String, Path, description = "mock, full or simple"),
        ("test" = String, Path, description = "Test name"),
        ResultParams
    ),
    responses(
        (status = 200, description = "The caller's result, or absent", body = TestResultResponse),
        (status = 401, description = "Sign in required"),
        (status = 403, description = "No access to this test"),
        (status = 404, description = "Unknown result kind or test")
    )
)]
pub(crate) async fn get_result(
    Path((kind, test)): Path<(String, String)>,
    Query(params): Query<ResultParams>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<TestResultResponse>, ApiError> {
    let kind = parse_kind(&kind)?;
    let caller = require_caller(&state, &headers).await?;
    let sheet = state
        .datasets
        .book(kind)
        .and_then(|book| book.test(&test))
        .ok_or_else(|| api_not_found("test not found"))?;
    if let Some(variant) = sheet.variant
        && !caller.access.allows(variant)
    {
        return Err(api_access_denied("no access to this mock series"));
    }

    let query = build_query(&state, &caller, &params).await?;
    Ok(Json(describe(
        &test,
        sheet,
        &state.datasets.directory,
        &query,
    )))
}
