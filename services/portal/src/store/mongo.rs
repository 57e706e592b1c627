//! MongoDB implementation of the portal store.
//!
//! # Purpose
//! Durable backend used in production. Collections:
//! - `users`, unique index on `email`
//! - `math_scores`, `vocab_scores`, `accounting_scores` (append-only)
//! - `registrations`
//! - `bootstrap`, a single marker document guarding the first super-admin
//!
//! # Connection handling
//! The `Database` handle comes from a [`LazyPool`]: the client is built and
//! the indexes are ensured on first use, once, however many requests race.
//!
//! # Leaderboards
//! The grouping runs server-side as a `$match/$sort/$group` pipeline with
//! one row per player. Ordering and `limit` are left to the shared `finish_*`
//! step, which rounds before sorting, so both backends keep the same entries
//! when scores only tie after rounding.
use super::pool::LazyPool;
use super::{
    PortalStore, RegistrationStore, ScoreStore, StoreError, StoreResult, USERS_GAUGE, UserScope,
    UserStore,
};
use crate::config::MongoConfig;
use crate::model::Registration;
use anyhow::Context;
use async_trait::async_trait;
use bson::{Document, doc};
use futures::{FutureExt, TryStreamExt};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{ClientOptions, IndexOptions};
use mongodb::{Client, Collection, Database, IndexModel};
use prepdesk_identity::{AccessTypes, MockAccess, Role, RoleNumber, Track, User, normalize_email};
use prepdesk_leaderboard::{
    BestEntry, CumulativeEntry, GameKind, ScoreRecord, finish_best, finish_cumulative,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

const USERS: &str = "users";
const REGISTRATIONS: &str = "registrations";
const BOOTSTRAP: &str = "bootstrap";
const SUPER_ADMIN_MARKER: &str = "super-admin";
const DUPLICATE_KEY: i32 = 11000;
const APP_NAME: &str = "prepdesk-portal";

impl From<mongodb::error::Error> for StoreError {
    fn from(err: mongodb::error::Error) -> Self {
        if is_duplicate_key(&err) {
            StoreError::Conflict(err.to_string())
        } else {
            StoreError::Unexpected(err.into())
        }
    }
}

impl From<bson::de::Error> for StoreError {
    fn from(err: bson::de::Error) -> Self {
        StoreError::Unexpected(anyhow::Error::new(err).context("decode document"))
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write)) => write.code == DUPLICATE_KEY,
        ErrorKind::Command(command) => command.code == DUPLICATE_KEY,
        _ => false,
    }
}

fn score_collection(game: GameKind) -> &'static str {
    match game {
        GameKind::Math => "math_scores",
        GameKind::Vocab => "vocab_scores",
        GameKind::Accounting => "accounting_scores",
    }
}

/// Accounting stores its primary score as `dynamicScore`.
fn score_field(game: GameKind) -> &'static str {
    if game.uses_dynamic_score() {
        "dynamicScore"
    } else {
        "score"
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserDocument {
    email: String,
    name: String,
    role: Role,
    #[serde(default)]
    role_numbers: Vec<String>,
    #[serde(default)]
    access_types: AccessTypes,
    #[serde(default)]
    mock_access: MockAccess,
    #[serde(default)]
    permissions: Vec<String>,
    #[serde(default = "default_active")]
    active: bool,
    created_at: bson::DateTime,
    updated_at: bson::DateTime,
}

fn default_active() -> bool {
    true
}

impl From<&User> for UserDocument {
    fn from(user: &User) -> Self {
        Self {
            email: normalize_email(&user.email),
            name: user.name.clone(),
            role: user.role,
            role_numbers: user
                .role_numbers
                .iter()
                .map(|number| number.as_str().to_string())
                .collect(),
            access_types: user.access_types,
            mock_access: user.mock_access,
            permissions: user.permissions.clone(),
            active: user.active,
            created_at: bson::DateTime::from_chrono(user.created_at),
            updated_at: bson::DateTime::from_chrono(user.updated_at),
        }
    }
}

impl From<UserDocument> for User {
    fn from(doc: UserDocument) -> Self {
        let role_numbers: BTreeSet<RoleNumber> = doc
            .role_numbers
            .iter()
            .filter_map(|raw| match RoleNumber::parse(raw) {
                Ok(number) => Some(number),
                Err(err) => {
                    tracing::warn!(email = %doc.email, error = %err, "dropping stored role number");
                    None
                }
            })
            .collect();
        User {
            email: doc.email,
            name: doc.name,
            role: doc.role,
            role_numbers,
            access_types: doc.access_types,
            mock_access: doc.mock_access,
            permissions: doc.permissions,
            active: doc.active,
            created_at: doc.created_at.to_chrono(),
            updated_at: doc.updated_at.to_chrono(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScoreDocument {
    #[serde(rename = "_id")]
    id: String,
    player_email: String,
    #[serde(default)]
    player_name: String,
    #[serde(alias = "dynamicScore")]
    score: f64,
    #[serde(default)]
    questions_answered: i64,
    #[serde(default)]
    correct_answers: i64,
    #[serde(default)]
    accuracy: f64,
    #[serde(default)]
    is_admin: bool,
    played_at: bson::DateTime,
}

impl ScoreDocument {
    fn into_record(self, game: GameKind) -> ScoreRecord {
        ScoreRecord {
            id: self.id,
            game,
            player_email: self.player_email,
            player_name: self.player_name,
            score: self.score,
            questions_answered: clamp_count(self.questions_answered),
            correct_answers: clamp_count(self.correct_answers),
            accuracy: self.accuracy,
            is_admin: self.is_admin,
            played_at: self.played_at.to_chrono(),
        }
    }
}

fn clamp_count(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}

fn score_document(record: &ScoreRecord) -> Document {
    let field = score_field(record.game);
    doc! {
        "_id": record.id.as_str(),
        "playerEmail": record.player_email.as_str(),
        "playerName": record.player_name.as_str(),
        field: record.score,
        "questionsAnswered": i64::from(record.questions_answered),
        "correctAnswers": i64::from(record.correct_answers),
        "accuracy": record.accuracy,
        "isAdmin": record.is_admin,
        "playedAt": bson::DateTime::from_chrono(record.played_at),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BestRow {
    #[serde(rename = "_id")]
    player_email: String,
    #[serde(default)]
    player_name: String,
    score: f64,
    #[serde(default)]
    accuracy: f64,
    #[serde(default)]
    questions_answered: i64,
    #[serde(default)]
    correct_answers: i64,
    games_played: i64,
    played_at: bson::DateTime,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CumulativeRow {
    #[serde(rename = "_id")]
    player_email: String,
    #[serde(default)]
    player_name: String,
    total_score: f64,
    total_questions: i64,
    total_correct: i64,
    games_played: i64,
    #[serde(default)]
    average_accuracy: Option<f64>,
    last_played_at: bson::DateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegistrationDocument {
    #[serde(rename = "_id")]
    id: String,
    name: String,
    email: String,
    phone: String,
    track: Track,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    institution: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    created_at: bson::DateTime,
}

impl From<&Registration> for RegistrationDocument {
    fn from(registration: &Registration) -> Self {
        Self {
            id: registration.id.clone(),
            name: registration.name.clone(),
            email: registration.email.clone(),
            phone: registration.phone.clone(),
            track: registration.track,
            institution: registration.institution.clone(),
            message: registration.message.clone(),
            created_at: bson::DateTime::from_chrono(registration.created_at),
        }
    }
}

impl From<RegistrationDocument> for Registration {
    fn from(doc: RegistrationDocument) -> Self {
        Registration {
            id: doc.id,
            name: doc.name,
            email: doc.email,
            phone: doc.phone,
            track: doc.track,
            institution: doc.institution,
            message: doc.message,
            created_at: doc.created_at.to_chrono(),
        }
    }
}

pub struct MongoStore {
    pool: LazyPool<Database>,
}

impl MongoStore {
    /// Does not connect; the first operation does.
    pub fn new(config: MongoConfig) -> Self {
        Self::with_pool(LazyPool::new(move || {
            let config = config.clone();
            async move { connect(&config).await }.boxed()
        }))
    }

    pub fn with_pool(pool: LazyPool<Database>) -> Self {
        Self { pool }
    }

    async fn users(&self) -> StoreResult<Collection<UserDocument>> {
        Ok(self.pool.get().await?.collection(USERS))
    }

    async fn scores(&self, game: GameKind) -> StoreResult<Collection<Document>> {
        Ok(self.pool.get().await?.collection(score_collection(game)))
    }

    async fn registrations(&self) -> StoreResult<Collection<RegistrationDocument>> {
        Ok(self.pool.get().await?.collection(REGISTRATIONS))
    }
}

async fn connect(config: &MongoConfig) -> StoreResult<Database> {
    let mut options = ClientOptions::parse(&config.uri)
        .await
        .context("parse mongo uri")?;
    let timeout = Duration::from_millis(config.connect_timeout_ms);
    options.app_name = Some(APP_NAME.to_string());
    options.max_pool_size = Some(config.max_pool_size);
    options.connect_timeout = Some(timeout);
    options.server_selection_timeout = Some(timeout);

    let client = Client::with_options(options).context("build mongo client")?;
    let database = client.database(&config.database);
    ensure_indexes(&database).await?;

    let users = database
        .collection::<Document>(USERS)
        .count_documents(doc! {})
        .await?;
    metrics::gauge!(USERS_GAUGE).set(users as f64);
    tracing::info!(database = %config.database, "connected to mongodb");
    Ok(database)
}

async fn ensure_indexes(database: &Database) -> StoreResult<()> {
    let unique_email = IndexModel::builder()
        .keys(doc! { "email": 1 })
        .options(IndexOptions::builder().unique(true).build())
        .build();
    database
        .collection::<Document>(USERS)
        .create_index(unique_email)
        .await
        .context("create users.email index")?;

    for game in GameKind::ALL {
        let by_player = IndexModel::builder()
            .keys(doc! { "playerEmail": 1, "playedAt": -1 })
            .build();
        database
            .collection::<Document>(score_collection(game))
            .create_index(by_player)
            .await
            .with_context(|| format!("create {} index", score_collection(game)))?;
    }
    Ok(())
}

fn scope_filter(scope: UserScope) -> Document {
    match scope {
        UserScope::Students => doc! { "role": Role::Student.as_str() },
        UserScope::Admins => doc! {
            "role": { "$in": [Role::Admin.as_str(), Role::SuperAdmin.as_str()] }
        },
        UserScope::All => doc! {},
    }
}

fn best_pipeline(game: GameKind) -> Vec<Document> {
    let field = score_field(game);
    let score = format!("${field}");
    vec![
        doc! { "$match": { "isAdmin": { "$ne": true } } },
        doc! { "$sort": { field: -1, "playedAt": -1 } },
        doc! { "$group": {
            "_id": "$playerEmail",
            "playerName": { "$first": "$playerName" },
            "score": { "$first": score.as_str() },
            "accuracy": { "$first": "$accuracy" },
            "questionsAnswered": { "$first": "$questionsAnswered" },
            "correctAnswers": { "$first": "$correctAnswers" },
            "playedAt": { "$first": "$playedAt" },
            "gamesPlayed": { "$sum": 1 },
        } },
    ]
}

fn cumulative_pipeline(game: GameKind) -> Vec<Document> {
    let score = format!("${}", score_field(game));
    vec![
        doc! { "$match": { "isAdmin": { "$ne": true } } },
        doc! { "$sort": { "playedAt": -1 } },
        doc! { "$group": {
            "_id": "$playerEmail",
            "playerName": { "$first": "$playerName" },
            "totalScore": { "$sum": score.as_str() },
            "totalQuestions": { "$sum": "$questionsAnswered" },
            "totalCorrect": { "$sum": "$correctAnswers" },
            "gamesPlayed": { "$sum": 1 },
            "averageAccuracy": { "$avg": "$accuracy" },
            "lastPlayedAt": { "$first": "$playedAt" },
        } },
    ]
}

#[async_trait]
impl UserStore for MongoStore {
    async fn get_user(&self, email: &str) -> StoreResult<Option<User>> {
        let found = self
            .users()
            .await?
            .find_one(doc! { "email": normalize_email(email) })
            .await?;
        Ok(found.map(User::from))
    }

    async fn list_users(&self, scope: UserScope) -> StoreResult<Vec<User>> {
        let docs: Vec<UserDocument> = self
            .users()
            .await?
            .find(scope_filter(scope))
            .sort(doc! { "email": 1 })
            .await?
            .try_collect()
            .await?;
        Ok(docs.into_iter().map(User::from).collect())
    }

    async fn create_user(&self, user: User) -> StoreResult<User> {
        let doc = UserDocument::from(&user);
        match self.users().await?.insert_one(&doc).await {
            Ok(_) => {
                metrics::gauge!(USERS_GAUGE).increment(1.0);
                Ok(User::from(doc))
            }
            Err(err) if is_duplicate_key(&err) => {
                Err(StoreError::Conflict(format!("user {} exists", doc.email)))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn replace_user(&self, user: User) -> StoreResult<User> {
        let doc = UserDocument::from(&user);
        let result = self
            .users()
            .await?
            .replace_one(doc! { "email": doc.email.as_str() }, &doc)
            .await?;
        if result.matched_count == 0 {
            return Err(StoreError::NotFound(format!("user {}", doc.email)));
        }
        Ok(User::from(doc))
    }

    async fn count_super_admins(&self) -> StoreResult<u64> {
        Ok(self
            .users()
            .await?
            .count_documents(doc! { "role": Role::SuperAdmin.as_str() })
            .await?)
    }

    async fn create_first_super_admin(&self, mut user: User) -> StoreResult<User> {
        user.email = normalize_email(&user.email);
        user.role = Role::SuperAdmin;
        if self.count_super_admins().await? > 0 {
            return Err(StoreError::Conflict("a super admin already exists".into()));
        }

        // The marker's fixed `_id` makes the insert the single point of
        // agreement between racing bootstrap calls.
        let marker = doc! {
            "_id": SUPER_ADMIN_MARKER,
            "email": user.email.as_str(),
            "createdAt": bson::DateTime::from_chrono(user.created_at),
        };
        let markers = self.pool.get().await?.collection::<Document>(BOOTSTRAP);
        match markers.insert_one(marker).await {
            Ok(_) => {}
            Err(err) if is_duplicate_key(&err) => {
                return Err(StoreError::Conflict("bootstrap already completed".into()));
            }
            Err(err) => return Err(err.into()),
        }

        let written = match self.get_user(&user.email).await {
            Ok(Some(existing)) => {
                user.created_at = existing.created_at;
                self.replace_user(user).await
            }
            Ok(None) => self.create_user(user).await,
            Err(err) => Err(err),
        };
        if written.is_err() {
            // Without a super-admin the marker must not outlive this call.
            if let Err(err) = markers
                .delete_one(doc! { "_id": SUPER_ADMIN_MARKER })
                .await
            {
                tracing::error!(error = %err, "failed to release bootstrap marker");
            }
        }
        written
    }
}

#[async_trait]
impl ScoreStore for MongoStore {
    async fn insert_score(&self, record: ScoreRecord) -> StoreResult<ScoreRecord> {
        self.scores(record.game)
            .await?
            .insert_one(score_document(&record))
            .await?;
        Ok(record)
    }

    async fn player_scores(&self, game: GameKind, email: &str) -> StoreResult<Vec<ScoreRecord>> {
        let docs: Vec<Document> = self
            .scores(game)
            .await?
            .find(doc! { "playerEmail": normalize_email(email) })
            .sort(doc! { "playedAt": -1 })
            .await?
            .try_collect()
            .await?;
        docs.into_iter()
            .map(|doc| Ok(bson::from_document::<ScoreDocument>(doc)?.into_record(game)))
            .collect()
    }

    async fn best_leaderboard(
        &self,
        game: GameKind,
        limit: Option<usize>,
    ) -> StoreResult<Vec<BestEntry>> {
        let rows: Vec<Document> = self
            .scores(game)
            .await?
            .aggregate(best_pipeline(game))
            .await?
            .try_collect()
            .await?;
        let entries = rows
            .into_iter()
            .map(|row| {
                let row: BestRow = bson::from_document(row)?;
                Ok(BestEntry {
                    position: 0,
                    player_email: row.player_email,
                    player_name: row.player_name,
                    score: row.score,
                    accuracy: row.accuracy,
                    questions_answered: clamp_count(row.questions_answered),
                    correct_answers: clamp_count(row.correct_answers),
                    games_played: clamp_count(row.games_played),
                    played_at: row.played_at.to_chrono(),
                })
            })
            .collect::<StoreResult<Vec<_>>>()?;
        Ok(finish_best(entries, limit))
    }

    async fn cumulative_leaderboard(
        &self,
        game: GameKind,
        limit: Option<usize>,
    ) -> StoreResult<Vec<CumulativeEntry>> {
        let rows: Vec<Document> = self
            .scores(game)
            .await?
            .aggregate(cumulative_pipeline(game))
            .await?
            .try_collect()
            .await?;
        let entries = rows
            .into_iter()
            .map(|row| {
                let row: CumulativeRow = bson::from_document(row)?;
                Ok(CumulativeEntry {
                    position: 0,
                    player_email: row.player_email,
                    player_name: row.player_name,
                    total_score: row.total_score,
                    total_questions: row.total_questions.max(0) as u64,
                    total_correct: row.total_correct.max(0) as u64,
                    games_played: clamp_count(row.games_played),
                    average_accuracy: row.average_accuracy.unwrap_or(0.0),
                    last_played_at: row.last_played_at.to_chrono(),
                })
            })
            .collect::<StoreResult<Vec<_>>>()?;
        Ok(finish_cumulative(entries, limit))
    }
}

#[async_trait]
impl RegistrationStore for MongoStore {
    async fn insert_registration(
        &self,
        registration: Registration,
    ) -> StoreResult<Registration> {
        self.registrations()
            .await?
            .insert_one(RegistrationDocument::from(&registration))
            .await?;
        Ok(registration)
    }

    async fn list_registrations(&self) -> StoreResult<Vec<Registration>> {
        let docs: Vec<RegistrationDocument> = self
            .registrations()
            .await?
            .find(doc! {})
            .sort(doc! { "createdAt": -1 })
            .await?
            .try_collect()
            .await?;
        Ok(docs.into_iter().map(Registration::from).collect())
    }
}

#[async_trait]
impl PortalStore for MongoStore {
    async fn health_check(&self) -> StoreResult<()> {
        self.pool
            .get()
            .await?
            .run_command(doc! { "ping": 1 })
            .await?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "mongodb"
    }
}
