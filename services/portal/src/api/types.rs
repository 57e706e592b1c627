//! HTTP API request/response types.
//!
//! Payloads are camelCase on the wire. Domain records (`User`, `ScoreRecord`,
//! leaderboard entries, reports) come from the library crates; this module
//! holds the envelopes around them.
use crate::model::Registration;
use prepdesk_identity::roster::AccessControlDocument;
use prepdesk_identity::{
    AccessProfile, AccessTypes, MatchStrategy, MockAccess, MockVariant, ResultKind, Role,
    TestResult, User, UserInfo,
};
use prepdesk_leaderboard::{LeaderboardView, NewScore, PlayerStats, ScoreRecord};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    pub details: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// `ok` or `degraded`.
    pub status: String,
    pub environment: String,
    pub database: DatabaseHealth,
    pub auth: AuthHealth,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseHealth {
    pub backend: String,
    pub connected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AuthHealth {
    pub sign_in_configured: bool,
    pub bootstrap_enabled: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SignInRequest {
    pub id_token: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SignInResponse {
    pub token: String,
    pub token_type: String,
    pub expires_in: u64,
    pub email: String,
    /// Absent when the account is not on the roster.
    pub user: Option<UserInfo>,
    pub access: AccessProfile,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub user: UserInfo,
    pub access: AccessProfile,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ResultParams {
    /// Admin only: look up this identifier.
    pub selected: Option<String>,
    /// Admin only: look up this student's email.
    pub email: Option<String>,
}

/// `found` or `absent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum LookupStatus {
    Found,
    Absent,
}

#[derive(Debug, Serialize, ToSchema, Clone)]
#[serde(rename_all = "camelCase")]
pub struct TestResultResponse {
    pub test: String,
    pub status: LookupStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<MatchStrategy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub result: Option<TestResult>,
    #[schema(value_type = Object)]
    pub class_stats: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant: Option<MockVariant>,
}

#[derive(Debug, Serialize, ToSchema, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ResultListResponse {
    pub kind: ResultKind,
    /// Tests gated behind a mock variant the caller lacks are left out.
    pub tests: Vec<TestResultResponse>,
}

/// Score submission. Accounting clients may send `dynamicScore` instead of
/// `score`.
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ScoreSubmission {
    #[serde(alias = "dynamicScore")]
    pub score: f64,
    #[serde(default)]
    pub questions_answered: u32,
    #[serde(default)]
    pub correct_answers: u32,
    #[serde(default)]
    pub accuracy: Option<f64>,
}

impl From<ScoreSubmission> for NewScore {
    fn from(submission: ScoreSubmission) -> Self {
        NewScore {
            score: submission.score,
            questions_answered: submission.questions_answered,
            correct_answers: submission.correct_answers,
            accuracy: submission.accuracy,
        }
    }
}

#[derive(Debug, Serialize, ToSchema, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ScoreHistoryResponse {
    pub game: String,
    pub scores: Vec<ScoreRecord>,
    pub stats: PlayerStats,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LeaderboardParams {
    /// `best` (default) or `cumulative`.
    pub view: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, ToSchema, Clone)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardResponse {
    pub game: String,
    pub view: LeaderboardView,
    /// `BestEntry` or `CumulativeEntry` rows, by view.
    #[schema(value_type = Vec<Object>)]
    pub entries: Value,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct RegistrationListResponse {
    pub registrations: Vec<Registration>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct UserListResponse {
    pub users: Vec<User>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
#[serde(rename_all = "camelCase")]
pub struct StudentGrantRequest {
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub role_numbers: Vec<String>,
    #[serde(default)]
    pub access_types: AccessTypes,
    #[serde(default)]
    pub mock_access: MockAccess,
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema, Clone)]
#[serde(rename_all = "camelCase")]
pub struct StudentUpdateRequest {
    pub name: Option<String>,
    pub role_numbers: Option<Vec<String>>,
    pub access_types: Option<AccessTypes>,
    pub mock_access: Option<MockAccess>,
    pub active: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AdminCreateRequest {
    pub email: String,
    #[serde(default)]
    pub name: String,
    /// `admin` (default) or `super_admin`.
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub permissions: Vec<String>,
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AdminUpdateRequest {
    pub name: Option<String>,
    pub role: Option<Role>,
    pub permissions: Option<Vec<String>>,
    pub active: Option<bool>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RosterImportParams {
    /// `json-wins` or `protect-super-admins`; defaults to the configured policy.
    pub policy: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema, Clone)]
#[serde(rename_all = "camelCase")]
pub struct BackfillRequest {
    /// Adds each student entry's `studentId` and `roleNumbers` to the union.
    #[serde(default)]
    pub access_control: Option<AccessControlDocument>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct BootstrapRequest {
    pub email: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct BootstrapResponse {
    pub status: String,
    pub user: User,
}
