//! Persistence traits for the portal.
//!
//! # Purpose
//! Handlers and batch commands talk to `dyn PortalStore`; the in-memory and
//! MongoDB backends implement it with the same semantics.
//!
//! # Key invariants
//! - Users are keyed by lower-cased email; `create_user` never overwrites.
//! - Score records are append-only.
//! - At most one caller ever succeeds at `create_first_super_admin`.
use crate::model::Registration;
use async_trait::async_trait;
use prepdesk_identity::User;
use prepdesk_leaderboard::{BestEntry, CumulativeEntry, GameKind, ScoreRecord};
use rand::RngCore;
use thiserror::Error;

pub mod memory;
pub mod mongo;
pub mod pool;

/// Gauge tracking the number of stored users.
pub const USERS_GAUGE: &str = "prepdesk_users_total";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Random 24-hex-character id for score and registration records.
pub fn new_record_id() -> String {
    let mut bytes = [0u8; 12];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserScope {
    Students,
    Admins,
    All,
}

impl UserScope {
    pub fn includes(&self, user: &User) -> bool {
        match self {
            Self::Students => !user.is_admin(),
            Self::Admins => user.is_admin(),
            Self::All => true,
        }
    }
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get_user(&self, email: &str) -> StoreResult<Option<User>>;
    /// Sorted by email.
    async fn list_users(&self, scope: UserScope) -> StoreResult<Vec<User>>;
    /// `Conflict` when the email is taken.
    async fn create_user(&self, user: User) -> StoreResult<User>;
    /// `NotFound` when no user has this email.
    async fn replace_user(&self, user: User) -> StoreResult<User>;
    async fn count_super_admins(&self) -> StoreResult<u64>;
    /// Creates (or promotes) the first super-admin. `Conflict` once any
    /// super-admin exists.
    async fn create_first_super_admin(&self, user: User) -> StoreResult<User>;
}

#[async_trait]
pub trait ScoreStore: Send + Sync {
    async fn insert_score(&self, record: ScoreRecord) -> StoreResult<ScoreRecord>;
    /// Newest first.
    async fn player_scores(&self, game: GameKind, email: &str) -> StoreResult<Vec<ScoreRecord>>;
    async fn best_leaderboard(
        &self,
        game: GameKind,
        limit: Option<usize>,
    ) -> StoreResult<Vec<BestEntry>>;
    async fn cumulative_leaderboard(
        &self,
        game: GameKind,
        limit: Option<usize>,
    ) -> StoreResult<Vec<CumulativeEntry>>;
}

#[async_trait]
pub trait RegistrationStore: Send + Sync {
    async fn insert_registration(&self, registration: Registration)
    -> StoreResult<Registration>;
    /// Newest first.
    async fn list_registrations(&self) -> StoreResult<Vec<Registration>>;
}

#[async_trait]
pub trait PortalStore: UserStore + ScoreStore + RegistrationStore {
    async fn health_check(&self) -> StoreResult<()>;
    fn backend_name(&self) -> &'static str;
}
