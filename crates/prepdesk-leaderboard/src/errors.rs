use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum LeaderboardError {
    #[error("unknown game: {0}")]
    UnknownGame(String),
    #[error("unknown leaderboard view: {0}")]
    UnknownView(String),
    #[error("score must be a finite number")]
    NonFiniteScore,
    #[error("correct answers ({correct}) exceed questions answered ({questions})")]
    InconsistentCounts { correct: u32, questions: u32 },
    #[error("accuracy must be between 0 and 100, got {0}")]
    InvalidAccuracy(f64),
}

pub type LeaderboardResult<T> = Result<T, LeaderboardError>;
