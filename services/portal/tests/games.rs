mod common;

use axum::http::StatusCode;
use common::{TestPortal, iba_only, read_json};
use http_helpers::{authed_get, authed_json_request, json_request};
use prepdesk_identity::Role;
use serde_json::json;
use tower::ServiceExt;

#[tokio::test]
async fn accounting_scores_use_dynamic_names() {
    let portal = TestPortal::new();
    portal
        .add_student("rahim@example.com", &["123456"], iba_only())
        .await;
    let token = portal.session("rahim@example.com");
    let app = portal.app();

    for score in [8.0, 12.0, 8.0] {
        let response = app
            .clone()
            .oneshot(authed_json_request(
                "POST",
                "/api/games/accounting/scores",
                &token,
                json!({"dynamicScore": score, "questionsAnswered": 10, "correctAnswers": 8}),
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::CREATED);
        let payload = read_json(response).await;
        assert_eq!(payload["dynamicScore"], score);
        assert_eq!(payload["accuracy"], 80.0);
        assert!(payload.get("score").is_none());
    }

    let response = app
        .clone()
        .oneshot(authed_get("/api/games/accounting/scores/me", &token))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json(response).await;
    assert_eq!(payload["scores"].as_array().expect("scores").len(), 3);
    assert_eq!(payload["stats"]["gamesPlayed"], 3);
    assert_eq!(payload["stats"]["bestDynamicScore"], 12.0);
    assert_eq!(payload["stats"]["totalDynamicScore"], 28.0);

    let response = app
        .clone()
        .oneshot(authed_get("/api/games/accounting/leaderboard", &token))
        .await
        .expect("response");
    let payload = read_json(response).await;
    assert_eq!(payload["view"], "best");
    assert_eq!(payload["entries"][0]["dynamicScore"], 12.0);
    assert_eq!(payload["entries"][0]["gamesPlayed"], 3);
    assert_eq!(payload["entries"][0]["position"], 1);

    let response = app
        .oneshot(authed_get(
            "/api/games/accounting/leaderboard?view=cumulative",
            &token,
        ))
        .await
        .expect("response");
    let payload = read_json(response).await;
    assert_eq!(payload["view"], "cumulative");
    assert_eq!(payload["entries"][0]["totalDynamicScore"], 28.0);
    assert_eq!(payload["entries"][0]["gamesPlayed"], 3);
}

#[tokio::test]
async fn admin_scores_stay_off_the_leaderboard() {
    let portal = TestPortal::new();
    portal
        .add_student("rahim@example.com", &["123456"], iba_only())
        .await;
    portal.add_admin("ops@example.com", Role::Admin).await;
    let app = portal.app();

    for (email, score) in [("rahim@example.com", 40.0), ("ops@example.com", 99.0)] {
        let token = portal.session(email);
        let response = app
            .clone()
            .oneshot(authed_json_request(
                "POST",
                "/api/games/math/scores",
                &token,
                json!({"score": score, "questionsAnswered": 5, "correctAnswers": 4}),
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let token = portal.session("rahim@example.com");
    let response = app
        .oneshot(authed_get("/api/games/math/leaderboard?limit=10", &token))
        .await
        .expect("response");
    let payload = read_json(response).await;
    let entries = payload["entries"].as_array().expect("entries");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["playerEmail"], "rahim@example.com");
    assert_eq!(entries[0]["score"], 40.0);
}

#[tokio::test]
async fn invalid_submissions_and_names_are_rejected() {
    let portal = TestPortal::new();
    portal
        .add_student("rahim@example.com", &["123456"], iba_only())
        .await;
    let token = portal.session("rahim@example.com");
    let app = portal.app();

    let response = app
        .clone()
        .oneshot(authed_json_request(
            "POST",
            "/api/games/vocab/scores",
            &token,
            json!({"score": 3, "questionsAnswered": 2, "correctAnswers": 5}),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(read_json(response).await["code"], "VALIDATION_ERROR");

    let response = app
        .clone()
        .oneshot(authed_json_request(
            "POST",
            "/api/games/chess/scores",
            &token,
            json!({"score": 3}),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .clone()
        .oneshot(authed_get("/api/games/math/leaderboard?view=weekly", &token))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/games/math/scores",
            json!({"score": 3}),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
