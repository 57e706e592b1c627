//! Applies roster imports and role-number backfills to a store.
//!
//! The planning lives in `prepdesk_identity::roster`; this module performs
//! the reads and writes and tallies the reports. Every per-record failure,
//! including a store error while reading or writing that record, is reported
//! and the batch continues. Only a store that cannot be reached before the
//! batch starts aborts the run.
use crate::store::{PortalStore, StoreError, StoreResult, UserScope};
use chrono::Utc;
use prepdesk_identity::StudentsDirectory;
use prepdesk_identity::roster::{
    AccessControlDocument, BackfillReport, RolePolicy, SyncAction, SyncFailure, SyncReport,
    plan_backfill, plan_entry_sync,
};

fn record_failure(email: &str, err: StoreError) -> SyncFailure {
    if matches!(err, StoreError::Unexpected(_)) {
        tracing::warn!(%email, error = %err, "store error on roster record");
    }
    SyncFailure::new(email, err)
}

pub async fn import_roster(
    store: &dyn PortalStore,
    document: &AccessControlDocument,
    policy: RolePolicy,
) -> StoreResult<SyncReport> {
    store.health_check().await?;
    let (entries, duplicates) = document.entries();
    let mut report = SyncReport {
        errors: duplicates,
        ..SyncReport::default()
    };

    for entry in &entries {
        let email = entry.email().trim().to_lowercase();
        let existing = match store.get_user(&email).await {
            Ok(existing) => existing,
            Err(err) => {
                report.errors.push(record_failure(&email, err));
                continue;
            }
        };
        match plan_entry_sync(entry, existing.as_ref(), policy, Utc::now()) {
            SyncAction::Create(user) => match store.create_user(user).await {
                Ok(_) => report.created += 1,
                Err(err) => report.errors.push(record_failure(&email, err)),
            },
            SyncAction::Update(user) => match store.replace_user(user).await {
                Ok(_) => report.updated += 1,
                Err(err) => report.errors.push(record_failure(&email, err)),
            },
            SyncAction::Skip => report.skipped += 1,
            SyncAction::Refuse(err) => report.errors.push(SyncFailure::new(email, err)),
        }
    }

    tracing::info!(
        created = report.created,
        updated = report.updated,
        skipped = report.skipped,
        errors = report.errors.len(),
        ?policy,
        "roster import finished"
    );
    Ok(report)
}

pub async fn backfill_role_numbers(
    store: &dyn PortalStore,
    directory: &StudentsDirectory,
    roster: Option<&AccessControlDocument>,
) -> StoreResult<BackfillReport> {
    let mut report = BackfillReport::default();
    for user in store.list_users(UserScope::Students).await? {
        match plan_backfill(&user, directory, roster, Utc::now()) {
            Some(updated) => match store.replace_user(updated).await {
                Ok(_) => report.updated += 1,
                Err(err) => report.errors.push(record_failure(&user.email, err)),
            },
            None => report.unchanged += 1,
        }
    }
    tracing::info!(
        updated = report.updated,
        unchanged = report.unchanged,
        errors = report.errors.len(),
        "role-number backfill finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Registration;
    use crate::store::memory::InMemoryStore;
    use crate::store::{RegistrationStore, ScoreStore, UserStore};
    use async_trait::async_trait;
    use prepdesk_identity::{DirectoryEntry, Role, RoleNumber, User};
    use prepdesk_leaderboard::{BestEntry, CumulativeEntry, GameKind, ScoreRecord};
    use serde_json::json;

    /// Memory store whose reads and writes fail for one email.
    struct FailingEmail {
        inner: InMemoryStore,
        email: &'static str,
    }

    impl FailingEmail {
        fn broken(&self, email: &str) -> StoreResult<()> {
            if email == self.email {
                Err(StoreError::Unexpected(anyhow::anyhow!(
                    "decode document: unknown variant `teacher`"
                )))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl UserStore for FailingEmail {
        async fn get_user(&self, email: &str) -> StoreResult<Option<User>> {
            self.broken(email)?;
            self.inner.get_user(email).await
        }
        async fn list_users(&self, scope: UserScope) -> StoreResult<Vec<User>> {
            self.inner.list_users(scope).await
        }
        async fn create_user(&self, user: User) -> StoreResult<User> {
            self.inner.create_user(user).await
        }
        async fn replace_user(&self, user: User) -> StoreResult<User> {
            self.broken(&user.email)?;
            self.inner.replace_user(user).await
        }
        async fn count_super_admins(&self) -> StoreResult<u64> {
            self.inner.count_super_admins().await
        }
        async fn create_first_super_admin(&self, user: User) -> StoreResult<User> {
            self.inner.create_first_super_admin(user).await
        }
    }

    #[async_trait]
    impl ScoreStore for FailingEmail {
        async fn insert_score(&self, record: ScoreRecord) -> StoreResult<ScoreRecord> {
            self.inner.insert_score(record).await
        }
        async fn player_scores(
            &self,
            game: GameKind,
            email: &str,
        ) -> StoreResult<Vec<ScoreRecord>> {
            self.inner.player_scores(game, email).await
        }
        async fn best_leaderboard(
            &self,
            game: GameKind,
            limit: Option<usize>,
        ) -> StoreResult<Vec<BestEntry>> {
            self.inner.best_leaderboard(game, limit).await
        }
        async fn cumulative_leaderboard(
            &self,
            game: GameKind,
            limit: Option<usize>,
        ) -> StoreResult<Vec<CumulativeEntry>> {
            self.inner.cumulative_leaderboard(game, limit).await
        }
    }

    #[async_trait]
    impl RegistrationStore for FailingEmail {
        async fn insert_registration(
            &self,
            registration: Registration,
        ) -> StoreResult<Registration> {
            self.inner.insert_registration(registration).await
        }
        async fn list_registrations(&self) -> StoreResult<Vec<Registration>> {
            self.inner.list_registrations().await
        }
    }

    #[async_trait]
    impl PortalStore for FailingEmail {
        async fn health_check(&self) -> StoreResult<()> {
            self.inner.health_check().await
        }
        fn backend_name(&self) -> &'static str {
            "failing-email"
        }
    }

    fn document() -> AccessControlDocument {
        serde_json::from_value(json!({
            "admins": [
                {"email": "ops@example.com", "name": "Ops", "role": "super_admin"}
            ],
            "students": [
                {"email": "rahim@example.com", "name": "Rahim", "roleNumbers": ["123456"]},
                {"email": "karim@example.com", "name": "Karim", "studentId": "7654321"},
                {"email": "not-an-email", "name": "Broken"}
            ]
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn import_creates_then_skips_on_rerun() {
        let store = InMemoryStore::new();
        let doc = document();

        let first = import_roster(&store, &doc, RolePolicy::default())
            .await
            .unwrap();
        assert_eq!(first.created, 3);
        assert_eq!(first.errors.len(), 1);

        let second = import_roster(&store, &doc, RolePolicy::default())
            .await
            .unwrap();
        assert_eq!(second.created, 0);
        assert_eq!(second.updated, 0);
        assert_eq!(second.skipped, 3);

        let karim = store.get_user("karim@example.com").await.unwrap().unwrap();
        assert!(
            karim
                .role_numbers
                .contains(&RoleNumber::parse("7654321").unwrap())
        );
    }

    #[tokio::test]
    async fn protected_super_admin_is_reported_not_demoted() {
        let store = InMemoryStore::new();
        store
            .create_user(User::new("ops@example.com", "Ops", Role::SuperAdmin, Utc::now()))
            .await
            .unwrap();
        let doc: AccessControlDocument = serde_json::from_value(json!({
            "students": [{"email": "ops@example.com", "name": "Ops"}]
        }))
        .unwrap();

        let report = import_roster(&store, &doc, RolePolicy::ProtectSuperAdmins)
            .await
            .unwrap();
        assert_eq!(report.errors.len(), 1);
        let ops = store.get_user("ops@example.com").await.unwrap().unwrap();
        assert_eq!(ops.role, Role::SuperAdmin);

        let report = import_roster(&store, &doc, RolePolicy::JsonWins)
            .await
            .unwrap();
        assert_eq!(report.updated, 1);
        let ops = store.get_user("ops@example.com").await.unwrap().unwrap();
        assert_eq!(ops.role, Role::Student);
    }

    #[tokio::test]
    async fn backfill_merges_directory_numbers_once() {
        let store = InMemoryStore::new();
        store
            .create_user(User::new("rahim@example.com", "Rahim", Role::Student, Utc::now()))
            .await
            .unwrap();
        store
            .create_user(User::new("ops@example.com", "Ops", Role::Admin, Utc::now()))
            .await
            .unwrap();
        let directory = StudentsDirectory::new(vec![DirectoryEntry {
            key: "123456".to_string(),
            id: None,
            name: "Rahim".to_string(),
            email: Some("rahim@example.com".to_string()),
        }]);

        let first = backfill_role_numbers(&store, &directory, None).await.unwrap();
        assert_eq!(first.updated, 1);
        assert_eq!(first.unchanged, 0);

        let second = backfill_role_numbers(&store, &directory, None).await.unwrap();
        assert_eq!(second.updated, 0);
        assert_eq!(second.unchanged, 1);
    }

    #[tokio::test]
    async fn store_error_on_one_record_does_not_stop_import() {
        let store = FailingEmail {
            inner: InMemoryStore::new(),
            email: "broken@example.com",
        };
        let doc: AccessControlDocument = serde_json::from_value(json!({
            "students": [
                {"email": "broken@example.com", "name": "Broken"},
                {"email": "good@example.com", "name": "Good"}
            ]
        }))
        .unwrap();

        let report = import_roster(&store, &doc, RolePolicy::default())
            .await
            .unwrap();
        assert_eq!(report.created, 1);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].email, "broken@example.com");
        assert!(report.errors[0].message.contains("unknown variant"));
        assert!(store.inner.get_user("good@example.com").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn failed_backfill_write_is_reported_and_batch_continues() {
        let store = FailingEmail {
            inner: InMemoryStore::new(),
            email: "a@example.com",
        };
        for email in ["a@example.com", "b@example.com"] {
            store
                .inner
                .create_user(User::new(email, "S", Role::Student, Utc::now()))
                .await
                .unwrap();
        }
        let directory = StudentsDirectory::new(vec![
            DirectoryEntry {
                key: "123456".to_string(),
                id: None,
                name: "A".to_string(),
                email: Some("a@example.com".to_string()),
            },
            DirectoryEntry {
                key: "654321".to_string(),
                id: None,
                name: "B".to_string(),
                email: Some("b@example.com".to_string()),
            },
        ]);

        let report = backfill_role_numbers(&store, &directory, None)
            .await
            .unwrap();
        assert_eq!(report.updated, 1);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].email, "a@example.com");
        let b = store.inner.get_user("b@example.com").await.unwrap().unwrap();
        assert!(b.role_numbers.contains(&RoleNumber::parse("654321").unwrap()));
    }
}
