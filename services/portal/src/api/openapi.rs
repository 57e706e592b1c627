//! OpenAPI schema aggregation for the portal API.
use crate::api::types::{
    AdminCreateRequest, AdminUpdateRequest, AuthHealth, BackfillRequest, BootstrapRequest,
    BootstrapResponse, DatabaseHealth, ErrorResponse, HealthResponse, LeaderboardResponse,
    LookupStatus, RegistrationListResponse, ResultListResponse, ScoreHistoryResponse,
    ScoreSubmission, SessionResponse, SignInRequest, SignInResponse, StudentGrantRequest,
    StudentUpdateRequest, TestResultResponse, UserListResponse,
};
use crate::api::{admin, bootstrap, games, registrations, results, system};
use crate::auth::signin;
use crate::model::{NewRegistration, Registration};
use prepdesk_identity::roster::{
    AccessControlDocument, AdminEntry, BackfillReport, RolePolicy, StudentEntry, SyncFailure,
    SyncReport,
};
use prepdesk_identity::{
    AccessProfile, AccessTypes, MatchStrategy, MockAccess, MockVariant, ResultKind, Role,
    RoleNumber, Track, User, UserInfo,
};
use prepdesk_leaderboard::{
    BestEntry, CumulativeEntry, GameKind, LeaderboardView, PlayerStats, ScoreRecord,
};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "prepdesk-portal",
        version = "v1",
        description = "PrepDesk student portal HTTP API"
    ),
    paths(
        system::health,
        signin::callback,
        signin::session,
        signin::access,
        results::list_results,
        results::get_result,
        games::submit_score,
        games::my_scores,
        games::leaderboard,
        registrations::submit_registration,
        registrations::list_registrations,
        admin::list_students,
        admin::grant_student,
        admin::get_student,
        admin::update_student,
        admin::deactivate_student,
        admin::list_admins,
        admin::create_admin,
        admin::update_admin,
        admin::deactivate_admin,
        admin::roster_import,
        admin::role_number_backfill,
        bootstrap::create_super_admin
    ),
    components(schemas(
        ErrorResponse,
        HealthResponse,
        DatabaseHealth,
        AuthHealth,
        SignInRequest,
        SignInResponse,
        SessionResponse,
        AccessProfile,
        AccessTypes,
        MockAccess,
        MockVariant,
        Role,
        RoleNumber,
        Track,
        User,
        UserInfo,
        ResultKind,
        MatchStrategy,
        LookupStatus,
        TestResultResponse,
        ResultListResponse,
        GameKind,
        LeaderboardView,
        ScoreSubmission,
        ScoreRecord,
        PlayerStats,
        ScoreHistoryResponse,
        BestEntry,
        CumulativeEntry,
        LeaderboardResponse,
        NewRegistration,
        Registration,
        RegistrationListResponse,
        UserListResponse,
        StudentGrantRequest,
        StudentUpdateRequest,
        AdminCreateRequest,
        AdminUpdateRequest,
        AccessControlDocument,
        AdminEntry,
        StudentEntry,
        RolePolicy,
        SyncReport,
        SyncFailure,
        BackfillRequest,
        BackfillReport,
        BootstrapRequest,
        BootstrapResponse
    )),
    tags(
        (name = "system", description = "Health"),
        (name = "auth", description = "Sign-in and sessions"),
        (name = "results", description = "Test results"),
        (name = "games", description = "Mini-game scores and leaderboards"),
        (name = "registrations", description = "Registration intake"),
        (name = "admin", description = "Student and admin management"),
        (name = "bootstrap", description = "First super admin")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/health",
            "/api/auth/callback",
            "/api/results/{kind}/{test}",
            "/api/games/{game}/leaderboard",
            "/api/admin/roster/import",
            "/api/bootstrap/super-admin",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
