#![cfg(feature = "mongo-tests")]

use chrono::{Duration, Utc};
use portal::config::MongoConfig;
use portal::model::NewRegistration;
use portal::store::mongo::MongoStore;
use portal::store::{
    PortalStore, RegistrationStore, ScoreStore, StoreError, UserScope, UserStore, new_record_id,
};
use prepdesk_identity::{Role, Track, User};
use prepdesk_leaderboard::{GameKind, NewScore};

/// Each call gets a fresh database so tests never see each other's data.
async fn mongo_store() -> Option<MongoStore> {
    mongo_store_with_database().await.map(|(store, _)| store)
}

/// The store plus a raw handle on the same database.
async fn mongo_store_with_database() -> Option<(MongoStore, mongodb::Database)> {
    let uri = match std::env::var("PREPDESK_TEST_MONGO_URI") {
        Ok(uri) => uri,
        Err(_) => {
            eprintln!("skipping mongo-tests: set PREPDESK_TEST_MONGO_URI");
            return None;
        }
    };
    let database = format!("prepdesk_test_{}", new_record_id());
    let store = MongoStore::new(MongoConfig {
        uri: uri.clone(),
        database: database.clone(),
        max_pool_size: 4,
        connect_timeout_ms: 2_000,
    });
    if let Err(err) = store.health_check().await {
        eprintln!("skipping mongo-tests: cannot reach mongodb: {err}");
        return None;
    }
    let client = mongodb::Client::with_uri_str(&uri).await.ok()?;
    Some((store, client.database(&database)))
}

fn score(email: &str, value: f64, minutes_ago: i64) -> prepdesk_leaderboard::ScoreRecord {
    NewScore {
        score: value,
        questions_answered: 10,
        correct_answers: 7,
        accuracy: None,
    }
    .into_record(
        GameKind::Math,
        new_record_id(),
        email,
        email,
        false,
        Utc::now() - Duration::minutes(minutes_ago),
    )
    .expect("record")
}

#[tokio::test]
async fn users_round_trip_and_conflict() {
    let Some(store) = mongo_store().await else {
        return;
    };
    let user = User::new("Rahim@Example.com", "Rahim", Role::Student, Utc::now());
    store.create_user(user.clone()).await.expect("create");

    let err = store.create_user(user).await.unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)));

    let mut loaded = store
        .get_user("rahim@example.com")
        .await
        .expect("get")
        .expect("present");
    loaded.active = false;
    store.replace_user(loaded).await.expect("replace");

    let students = store.list_users(UserScope::Students).await.expect("list");
    assert_eq!(students.len(), 1);
    assert!(!students[0].active);
    assert!(store.list_users(UserScope::Admins).await.expect("list").is_empty());
}

#[tokio::test]
async fn first_super_admin_is_created_once() {
    let Some(store) = mongo_store().await else {
        return;
    };
    let root = User::new("root@example.com", "Root", Role::SuperAdmin, Utc::now());
    store.create_first_super_admin(root).await.expect("bootstrap");

    let other = User::new("other@example.com", "Other", Role::SuperAdmin, Utc::now());
    let err = store.create_first_super_admin(other).await.unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)));
    assert_eq!(store.count_super_admins().await.expect("count"), 1);
}

#[tokio::test]
async fn failed_bootstrap_write_can_be_retried() {
    let Some((store, database)) = mongo_store_with_database().await else {
        return;
    };
    let users = database.collection::<bson::Document>("users");
    users
        .insert_one(bson::doc! { "email": "root@example.com", "role": "teacher" })
        .await
        .expect("insert undecodable user");

    let root = User::new("root@example.com", "Root", Role::SuperAdmin, Utc::now());
    let err = store
        .create_first_super_admin(root.clone())
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Unexpected(_)));

    users
        .delete_one(bson::doc! { "email": "root@example.com" })
        .await
        .expect("remove undecodable user");
    let created = store.create_first_super_admin(root).await.expect("retry");
    assert_eq!(created.role, Role::SuperAdmin);
    assert_eq!(store.count_super_admins().await.expect("count"), 1);
}

#[tokio::test]
async fn leaderboards_aggregate_in_the_database() {
    let Some(store) = mongo_store().await else {
        return;
    };
    store.insert_score(score("a@example.com", 8.0, 3)).await.expect("insert");
    store.insert_score(score("a@example.com", 12.0, 2)).await.expect("insert");
    store.insert_score(score("b@example.com", 15.0, 1)).await.expect("insert");

    let best = store
        .best_leaderboard(GameKind::Math, None)
        .await
        .expect("best");
    assert_eq!(best[0].player_email, "b@example.com");
    assert_eq!(best[1].score, 12.0);

    let cumulative = store
        .cumulative_leaderboard(GameKind::Math, Some(1))
        .await
        .expect("cumulative");
    assert_eq!(cumulative.len(), 1);
    assert_eq!(cumulative[0].player_email, "a@example.com");
    assert_eq!(cumulative[0].games_played, 2);

    let mine = store
        .player_scores(GameKind::Math, "a@example.com")
        .await
        .expect("mine");
    assert_eq!(mine.len(), 2);
    assert_eq!(mine[0].score, 12.0);
}

#[tokio::test]
async fn registrations_list_newest_first() {
    let Some(store) = mongo_store().await else {
        return;
    };
    for (name, minutes_ago) in [("First", 10), ("Second", 1)] {
        let registration = NewRegistration {
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
            phone: "01711000000".to_string(),
            track: Track::Fbs,
            institution: None,
            message: None,
        }
        .into_registration(new_record_id(), Utc::now() - Duration::minutes(minutes_ago))
        .expect("valid");
        store.insert_registration(registration).await.expect("insert");
    }
    let listed = store.list_registrations().await.expect("list");
    assert_eq!(listed[0].name, "Second");
    assert_eq!(listed[1].name, "First");
}
