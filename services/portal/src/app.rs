//! Portal HTTP application wiring.
//!
//! # Purpose
//! Builds the Axum router, configures middleware, and defines the shared
//! application state injected into handlers.
use crate::api;
use crate::api::openapi::ApiDoc;
use crate::auth;
use crate::auth::oidc::{OidcIssuer, UpstreamOidcValidator};
use crate::auth::session::SessionKeys;
use crate::config::{PortalConfig, StorageBackend};
use crate::datasets::Datasets;
use crate::observability;
use crate::store::PortalStore;
use crate::store::memory::InMemoryStore;
use crate::store::mongo::MongoStore;
use anyhow::{Context, bail};
use axum::Router;
use axum::routing::{get, post};
use prepdesk_identity::roster::RolePolicy;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing_opentelemetry::OpenTelemetrySpanExt;
use utoipa::OpenApi;

#[derive(Clone)]
pub struct AppState {
    pub environment: String,
    pub store: Arc<dyn PortalStore>,
    pub datasets: Arc<Datasets>,
    pub oidc_validator: UpstreamOidcValidator,
    /// `None` disables sign-in.
    pub oidc_issuer: Option<OidcIssuer>,
    pub session_keys: Arc<SessionKeys>,
    /// `None` disables the bootstrap endpoint.
    pub bootstrap_secret: Option<String>,
    pub role_policy: RolePolicy,
}

pub fn build_router(state: AppState) -> Router {
    let trace_layer =
        TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
            let parent = observability::trace_context_from_headers(request.headers());
            let span = tracing::info_span!(
                "http.request",
                method = %request.method(),
                uri = %request.uri(),
                version = ?request.version()
            );
            span.set_parent(parent);
            span
        });

    Router::new()
        .route("/api/health", get(api::system::health))
        .route("/api/auth/callback", post(auth::signin::callback))
        .route("/api/auth/session", get(auth::signin::session))
        .route("/api/access", get(auth::signin::access))
        .route("/api/results/:kind", get(api::results::list_results))
        .route("/api/results/:kind/:test", get(api::results::get_result))
        .route("/api/games/:game/scores", post(api::games::submit_score))
        .route("/api/games/:game/scores/me", get(api::games::my_scores))
        .route("/api/games/:game/leaderboard", get(api::games::leaderboard))
        .route(
            "/api/registrations",
            post(api::registrations::submit_registration),
        )
        .route(
            "/api/admin/registrations",
            get(api::registrations::list_registrations),
        )
        .route(
            "/api/admin/students",
            get(api::admin::list_students).post(api::admin::grant_student),
        )
        .route(
            "/api/admin/students/:email",
            get(api::admin::get_student)
                .patch(api::admin::update_student)
                .delete(api::admin::deactivate_student),
        )
        .route(
            "/api/admin/admins",
            get(api::admin::list_admins).post(api::admin::create_admin),
        )
        .route(
            "/api/admin/admins/:email",
            axum::routing::patch(api::admin::update_admin).delete(api::admin::deactivate_admin),
        )
        .route("/api/admin/roster/import", post(api::admin::roster_import))
        .route(
            "/api/admin/roster/role-numbers",
            post(api::admin::role_number_backfill),
        )
        .route(
            "/api/bootstrap/super-admin",
            post(api::bootstrap::create_super_admin),
        )
        .merge(
            utoipa_swagger_ui::SwaggerUi::new("/docs").url("/api/openapi.json", ApiDoc::openapi()),
        )
        .layer(trace_layer)
        .with_state(state)
}

/// Selects and constructs the configured store. Mongo connects lazily.
pub fn build_store(config: &PortalConfig) -> anyhow::Result<Arc<dyn PortalStore>> {
    let store: Arc<dyn PortalStore> = match config.storage {
        StorageBackend::Memory => Arc::new(InMemoryStore::new()),
        StorageBackend::Mongo => {
            let mongo = config
                .mongo
                .clone()
                .context("mongo configuration missing")?;
            Arc::new(MongoStore::new(mongo))
        }
    };
    Ok(store)
}

pub fn build_state(config: &PortalConfig) -> anyhow::Result<AppState> {
    let store = build_store(config)?;
    let datasets = Datasets::load(&config.data_dir)?;

    let oidc_issuer = match &config.oidc.issuer {
        Some(issuer) => {
            if config.oidc.audiences.is_empty() {
                bail!("PREPDESK_OIDC_AUDIENCES must be set when an OIDC issuer is configured");
            }
            Some(OidcIssuer {
                issuer: issuer.clone(),
                audiences: config.oidc.audiences.clone(),
                jwks_url: config.oidc.jwks_url.clone(),
            })
        }
        None => {
            tracing::warn!("no OIDC issuer configured; sign-in is disabled");
            None
        }
    };
    if config.session.signing_seed.is_none() {
        tracing::warn!("no session seed configured; sessions end when the process restarts");
    }
    let session_keys =
        SessionKeys::from_optional_seed(config.session.signing_seed, config.session.ttl)
            .context("build session keys")?;

    Ok(AppState {
        environment: config.environment.clone(),
        store,
        datasets: Arc::new(datasets),
        oidc_validator: UpstreamOidcValidator::new(
            Duration::from_secs(3600),
            Duration::from_secs(3600),
            60,
            config.oidc.allowed_algorithms.clone(),
        ),
        oidc_issuer,
        session_keys: Arc::new(session_keys),
        bootstrap_secret: config.bootstrap_secret.clone(),
        role_policy: config.role_policy,
    })
}
