use crate::errors::{LeaderboardError, LeaderboardResult};
use crate::game::GameKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One finished play session. Records are append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScoreRecord {
    pub id: String,
    pub game: GameKind,
    pub player_email: String,
    pub player_name: String,
    pub score: f64,
    pub questions_answered: u32,
    pub correct_answers: u32,
    pub accuracy: f64,
    pub is_admin: bool,
    pub played_at: DateTime<Utc>,
}

/// Client-supplied part of a score submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewScore {
    pub score: f64,
    #[serde(default)]
    pub questions_answered: u32,
    #[serde(default)]
    pub correct_answers: u32,
    #[serde(default)]
    pub accuracy: Option<f64>,
}

pub fn derive_accuracy(correct: u32, questions: u32) -> f64 {
    if questions == 0 {
        0.0
    } else {
        f64::from(correct) / f64::from(questions) * 100.0
    }
}

impl NewScore {
    pub fn validate(&self) -> LeaderboardResult<()> {
        if !self.score.is_finite() {
            return Err(LeaderboardError::NonFiniteScore);
        }
        if self.correct_answers > self.questions_answered {
            return Err(LeaderboardError::InconsistentCounts {
                correct: self.correct_answers,
                questions: self.questions_answered,
            });
        }
        if let Some(accuracy) = self.accuracy
            && !(0.0..=100.0).contains(&accuracy)
        {
            return Err(LeaderboardError::InvalidAccuracy(accuracy));
        }
        Ok(())
    }

    pub fn into_record(
        self,
        game: GameKind,
        id: impl Into<String>,
        player_email: &str,
        player_name: impl Into<String>,
        is_admin: bool,
        played_at: DateTime<Utc>,
    ) -> LeaderboardResult<ScoreRecord> {
        self.validate()?;
        let accuracy = self
            .accuracy
            .unwrap_or_else(|| derive_accuracy(self.correct_answers, self.questions_answered));
        Ok(ScoreRecord {
            id: id.into(),
            game,
            player_email: player_email.trim().to_lowercase(),
            player_name: player_name.into(),
            score: self.score,
            questions_answered: self.questions_answered,
            correct_answers: self.correct_answers,
            accuracy,
            is_admin,
            played_at,
        })
    }
}
