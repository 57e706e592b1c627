//! Mini-game score handlers: submission, personal history, leaderboards.
//!
//! Accounting calls its primary score `dynamicScore`; responses for that
//! game rename `score`, `bestScore` and `totalScore` accordingly.
use crate::api::error::{
    ApiError, api_internal, api_internal_message, api_not_found, api_validation_error,
};
use crate::api::types::{
    LeaderboardParams, LeaderboardResponse, ScoreHistoryResponse, ScoreSubmission,
};
use crate::app::AppState;
use crate::auth::gate::require_caller;
use crate::observability::SCORES_SUBMITTED;
use crate::store::new_record_id;
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use chrono::Utc;
use prepdesk_leaderboard::{GameKind, LeaderboardView, NewScore, PlayerStats, ScoreRecord};
use serde::Serialize;
use serde_json::{Map, Value};

const DYNAMIC_RENAMES: [(&str, &str); 3] = [
    ("score", "dynamicScore"),
    ("bestScore", "bestDynamicScore"),
    ("totalScore", "totalDynamicScore"),
];

fn parse_game(raw: &str) -> Result<GameKind, ApiError> {
    GameKind::parse(raw).map_err(|err| api_not_found(&err.to_string()))
}

/// Serializes `payload` and applies the accounting field names when needed.
fn wire<T: Serialize>(game: GameKind, payload: &T) -> Result<Value, ApiError> {
    let value = serde_json::to_value(payload).map_err(|err| {
        tracing::error!(error = %err, "failed to serialize response");
        api_internal_message("failed to serialize response")
    })?;
    Ok(if game.uses_dynamic_score() {
        rename_score_fields(value)
    } else {
        value
    })
}

fn rename_score_fields(value: Value) -> Value {
    match value {
        Value::Object(fields) => {
            let renamed: Map<String, Value> = fields
                .into_iter()
                .map(|(key, value)| {
                    let key = DYNAMIC_RENAMES
                        .iter()
                        .find(|(from, _)| *from == key)
                        .map(|(_, to)| to.to_string())
                        .unwrap_or(key);
                    (key, rename_score_fields(value))
                })
                .collect();
            Value::Object(renamed)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(rename_score_fields).collect()),
        other => other,
    }
}

#[utoipa::path(
    post,
    path = "/api/games/{game}/scores",
    tag = "games",
    params(("game" = String, Path, description = "math, vocab or accounting")),
    request_body = ScoreSubmission,
    responses(
        (status = 201, description = "Score recorded", body = ScoreRecord),
        (status = 400, description = "Invalid submission"),
        (status = 401, description = "Sign in required"),
        (status = 404, description = "Unknown game")
    )
)]
pub(crate) async fn submit_score(
    Path(game): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<ScoreSubmission>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let game = parse_game(&game)?;
    let caller = require_caller(&state, &headers).await?;

    let record = NewScore::from(body)
        .into_record(
            game,
            new_record_id(),
            caller.email(),
            caller.user.name.clone(),
            caller.is_admin(),
            Utc::now(),
        )
        .map_err(|err| api_validation_error(&err.to_string()))?;

    let record = state
        .store
        .insert_score(record)
        .await
        .map_err(|err| api_internal("failed to record score", &err))?;
    metrics::counter!(SCORES_SUBMITTED, "game" => game.as_str()).increment(1);
    tracing::debug!(%game, email = %record.player_email, score = record.score, "score recorded");

    Ok((StatusCode::CREATED, Json(wire(game, &record)?)))
}

#[utoipa::path(
    get,
    path = "/api/games/{game}/scores/me",
    tag = "games",
    params(("game" = String, Path, description = "math, vocab or accounting")),
    responses(
        (status = 200, description = "Caller's attempts, newest first", body = ScoreHistoryResponse),
        (status = 401, description = "Sign in required"),
        (status = 404, description = "Unknown game")
    )
)]
pub(crate) async fn my_scores(
    Path(game): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let game = parse_game(&game)?;
    let caller = require_caller(&state, &headers).await?;
    let scores = state
        .store
        .player_scores(game, caller.email())
        .await
        .map_err(|err| api_internal("failed to load scores", &err))?;
    let stats = PlayerStats::from_records(&scores);
    let response = ScoreHistoryResponse {
        game: game.as_str().to_string(),
        scores,
        stats,
    };
    Ok(Json(wire(game, &response)?))
}

#[utoipa::path(
    get,
    path = "/api/games/{game}/leaderboard",
    tag = "games",
    params(
        ("game" = String, Path, description = "math, vocab or accounting"),
        LeaderboardParams
    ),
    responses(
        (status = 200, description = "Ranked entries", body = LeaderboardResponse),
        (status = 400, description = "Unknown view"),
        (status = 401, description = "Sign in required"),
        (status = 404, description = "Unknown game")
    )
)]
pub(crate) async fn leaderboard(
    Path(game): Path<String>,
    Query(params): Query<LeaderboardParams>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let game = parse_game(&game)?;
    let view = match params.view.as_deref() {
        Some(raw) => {
            LeaderboardView::parse(raw).map_err(|err| api_validation_error(&err.to_string()))?
        }
        None => LeaderboardView::default(),
    };
    require_caller(&state, &headers).await?;

    let entries = match view {
        LeaderboardView::Best => {
            let entries = state
                .store
                .best_leaderboard(game, params.limit)
                .await
                .map_err(|err| api_internal("failed to load leaderboard", &err))?;
            serde_json::to_value(entries)
        }
        LeaderboardView::Cumulative => {
            let entries = state
                .store
                .cumulative_leaderboard(game, params.limit)
                .await
                .map_err(|err| api_internal("failed to load leaderboard", &err))?;
            serde_json::to_value(entries)
        }
    }
    .map_err(|err| {
        tracing::error!(error = %err, "failed to serialize leaderboard");
        api_internal_message("failed to serialize leaderboard")
    })?;

    let response = LeaderboardResponse {
        game: game.as_str().to_string(),
        view,
        entries,
    };
    Ok(Json(wire(game, &response)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renames_nested_score_fields() {
        let renamed = rename_score_fields(json!({
            "scores": [{"score": 8.0, "accuracy": 80.0}],
            "stats": {"bestScore": 8.0, "totalScore": 8.0, "gamesPlayed": 1}
        }));
        assert_eq!(renamed["scores"][0]["dynamicScore"], json!(8.0));
        assert!(renamed["scores"][0].get("score").is_none());
        assert_eq!(renamed["stats"]["bestDynamicScore"], json!(8.0));
        assert_eq!(renamed["stats"]["totalDynamicScore"], json!(8.0));
        assert_eq!(renamed["stats"]["gamesPlayed"], json!(1));
    }

    #[test]
    fn other_games_keep_plain_names() {
        let value = wire(GameKind::Math, &json!({"score": 3})).unwrap();
        assert_eq!(value["score"], json!(3));
    }
}
