//! In-memory implementation of the portal store.
//!
//! # Purpose
//! Implements `PortalStore` entirely in memory using maps guarded by
//! `tokio::sync::RwLock`. It exists for:
//! - local development and tests (no external dependencies)
//! - demo deployments where durability is not required
//!
//! # Durability and consistency
//! - **Not durable**: all state is lost on process restart.
//! - **Single-process consistency**: write locks for mutations, read locks for
//!   reads. The first-super-admin check and insert happen under one write
//!   lock, so concurrent bootstrap calls cannot both succeed.
//!
//! # Leaderboards
//! Aggregation runs in Rust over the stored records via
//! `prepdesk_leaderboard::{best_leaderboard, cumulative_leaderboard}`.
use super::{
    PortalStore, RegistrationStore, ScoreStore, StoreError, StoreResult, USERS_GAUGE, UserScope,
    UserStore,
};
use crate::model::Registration;
use async_trait::async_trait;
use prepdesk_identity::{Role, User, normalize_email};
use prepdesk_leaderboard::{
    BestEntry, CumulativeEntry, GameKind, ScoreRecord, best_leaderboard, cumulative_leaderboard,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Clone, Default)]
pub struct InMemoryStore {
    /// Users keyed by normalized email; `BTreeMap` keeps listings sorted.
    users: Arc<RwLock<BTreeMap<String, User>>>,
    /// Append-only score records per game, in insertion order.
    scores: Arc<RwLock<HashMap<GameKind, Vec<ScoreRecord>>>>,
    registrations: Arc<RwLock<Vec<Registration>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn get_user(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(self.users.read().await.get(&normalize_email(email)).cloned())
    }

    async fn list_users(&self, scope: UserScope) -> StoreResult<Vec<User>> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .filter(|user| scope.includes(user))
            .cloned()
            .collect())
    }

    async fn create_user(&self, mut user: User) -> StoreResult<User> {
        user.email = normalize_email(&user.email);
        let mut users = self.users.write().await;
        if users.contains_key(&user.email) {
            return Err(StoreError::Conflict(format!("user {} exists", user.email)));
        }
        users.insert(user.email.clone(), user.clone());
        metrics::gauge!(USERS_GAUGE).set(users.len() as f64);
        Ok(user)
    }

    async fn replace_user(&self, mut user: User) -> StoreResult<User> {
        user.email = normalize_email(&user.email);
        let mut users = self.users.write().await;
        let Some(slot) = users.get_mut(&user.email) else {
            return Err(StoreError::NotFound(format!("user {}", user.email)));
        };
        *slot = user.clone();
        Ok(user)
    }

    async fn count_super_admins(&self) -> StoreResult<u64> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .filter(|user| user.role == Role::SuperAdmin)
            .count() as u64)
    }

    async fn create_first_super_admin(&self, mut user: User) -> StoreResult<User> {
        user.email = normalize_email(&user.email);
        user.role = Role::SuperAdmin;
        let mut users = self.users.write().await;
        if users.values().any(|existing| existing.role == Role::SuperAdmin) {
            return Err(StoreError::Conflict("a super admin already exists".into()));
        }
        let stored = match users.get(&user.email) {
            // Promote in place; keep the original creation time.
            Some(existing) => User {
                created_at: existing.created_at,
                ..user
            },
            None => user,
        };
        users.insert(stored.email.clone(), stored.clone());
        metrics::gauge!(USERS_GAUGE).set(users.len() as f64);
        Ok(stored)
    }
}

#[async_trait]
impl ScoreStore for InMemoryStore {
    async fn insert_score(&self, record: ScoreRecord) -> StoreResult<ScoreRecord> {
        self.scores
            .write()
            .await
            .entry(record.game)
            .or_default()
            .push(record.clone());
        Ok(record)
    }

    async fn player_scores(&self, game: GameKind, email: &str) -> StoreResult<Vec<ScoreRecord>> {
        let email = normalize_email(email);
        let scores = self.scores.read().await;
        let mut mine: Vec<ScoreRecord> = scores
            .get(&game)
            .map(|records| {
                records
                    .iter()
                    .filter(|record| record.player_email == email)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        mine.sort_by(|a, b| b.played_at.cmp(&a.played_at));
        Ok(mine)
    }

    async fn best_leaderboard(
        &self,
        game: GameKind,
        limit: Option<usize>,
    ) -> StoreResult<Vec<BestEntry>> {
        let scores = self.scores.read().await;
        let records = scores.get(&game).map(Vec::as_slice).unwrap_or_default();
        Ok(best_leaderboard(records, limit))
    }

    async fn cumulative_leaderboard(
        &self,
        game: GameKind,
        limit: Option<usize>,
    ) -> StoreResult<Vec<CumulativeEntry>> {
        let scores = self.scores.read().await;
        let records = scores.get(&game).map(Vec::as_slice).unwrap_or_default();
        Ok(cumulative_leaderboard(records, limit))
    }
}

#[async_trait]
impl RegistrationStore for InMemoryStore {
    async fn insert_registration(
        &self,
        registration: Registration,
    ) -> StoreResult<Registration> {
        self.registrations.write().await.push(registration.clone());
        Ok(registration)
    }

    async fn list_registrations(&self) -> StoreResult<Vec<Registration>> {
        let mut registrations = self.registrations.read().await.clone();
        registrations.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(registrations)
    }
}

#[async_trait]
impl PortalStore for InMemoryStore {
    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use prepdesk_leaderboard::NewScore;

    fn user(email: &str, role: Role) -> User {
        User::new(email, "Someone", role, Utc::now())
    }

    fn score(game: GameKind, email: &str, value: f64, minutes: i64, is_admin: bool) -> ScoreRecord {
        NewScore {
            score: value,
            questions_answered: 10,
            correct_answers: 8,
            accuracy: None,
        }
        .into_record(
            game,
            format!("{email}-{minutes}"),
            email,
            "Player",
            is_admin,
            Utc::now() + Duration::minutes(minutes),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn create_is_case_insensitive_and_conflicts() {
        let store = InMemoryStore::new();
        store.create_user(user("Rahim@Example.com", Role::Student)).await.unwrap();
        let err = store
            .create_user(user("rahim@example.com", Role::Student))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        assert!(store.get_user("RAHIM@example.com").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn replace_requires_existing_user() {
        let store = InMemoryStore::new();
        let err = store
            .replace_user(user("ghost@example.com", Role::Student))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn list_users_filters_by_scope() {
        let store = InMemoryStore::new();
        store.create_user(user("b@example.com", Role::Student)).await.unwrap();
        store.create_user(user("a@example.com", Role::Admin)).await.unwrap();
        store.create_user(user("c@example.com", Role::SuperAdmin)).await.unwrap();

        let students = store.list_users(UserScope::Students).await.unwrap();
        assert_eq!(students.len(), 1);
        let admins = store.list_users(UserScope::Admins).await.unwrap();
        let emails: Vec<_> = admins.iter().map(|u| u.email.as_str()).collect();
        assert_eq!(emails, ["a@example.com", "c@example.com"]);
        assert_eq!(store.count_super_admins().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn first_super_admin_succeeds_once_under_contention() {
        let store = InMemoryStore::new();
        let mut handles = Vec::new();
        for idx in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .create_first_super_admin(user(&format!("root{idx}@example.com"), Role::Admin))
                    .await
            }));
        }
        let mut created = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                created += 1;
            }
        }
        assert_eq!(created, 1);
        assert_eq!(store.count_super_admins().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn first_super_admin_promotes_existing_user() {
        let store = InMemoryStore::new();
        let original = store
            .create_user(user("lead@example.com", Role::Admin))
            .await
            .unwrap();
        let promoted = store
            .create_first_super_admin(user("lead@example.com", Role::Student))
            .await
            .unwrap();
        assert_eq!(promoted.role, Role::SuperAdmin);
        assert_eq!(promoted.created_at, original.created_at);
        assert_eq!(store.list_users(UserScope::All).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn scores_and_leaderboards() {
        let store = InMemoryStore::new();
        for (value, minute) in [(8.0, 0), (12.0, 1), (8.0, 2)] {
            store
                .insert_score(score(GameKind::Accounting, "p@example.com", value, minute, false))
                .await
                .unwrap();
        }
        store
            .insert_score(score(GameKind::Accounting, "boss@example.com", 99.0, 3, true))
            .await
            .unwrap();

        let mine = store
            .player_scores(GameKind::Accounting, "P@example.com")
            .await
            .unwrap();
        assert_eq!(mine.len(), 3);
        assert!(mine[0].played_at > mine[2].played_at);

        let best = store.best_leaderboard(GameKind::Accounting, None).await.unwrap();
        assert_eq!(best.len(), 1);
        assert_eq!(best[0].score, 12.0);
        assert_eq!(best[0].games_played, 3);

        let cumulative = store
            .cumulative_leaderboard(GameKind::Accounting, None)
            .await
            .unwrap();
        assert_eq!(cumulative[0].total_score, 28.0);

        assert!(store.best_leaderboard(GameKind::Math, None).await.unwrap().is_empty());
    }
}
