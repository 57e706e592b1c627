//! Score records and leaderboard aggregation for the PrepDesk mini-games.
//!
//! # Purpose
//! Every play session appends one [`ScoreRecord`]. Leaderboards are computed
//! from those records in two views: each player's best attempt, and each
//! player's cumulative totals. The document-store backend groups rows in the
//! database and hands them to the same finishing step used in memory, so both
//! backends sort, round and rank identically.
//!
//! # Key invariants
//! - Admin records never appear on a leaderboard.
//! - Scores are rounded to 2 decimals and percentages to 1 decimal on output.
//! - Positions are tie-aware: equal ranking keys share a position and the next
//!   distinct entry takes its 1-based index.
//!
//! # Examples
//! ```rust
//! use chrono::Utc;
//! use prepdesk_leaderboard::{GameKind, NewScore, best_leaderboard, cumulative_leaderboard};
//!
//! let records: Vec<_> = [8.0, 12.0, 8.0]
//!     .into_iter()
//!     .enumerate()
//!     .map(|(idx, score)| {
//!         NewScore { score, questions_answered: 10, correct_answers: 8, accuracy: None }
//!             .into_record(GameKind::Accounting, format!("r{idx}"), "a@example.com", "A", false, Utc::now())
//!             .expect("valid score")
//!     })
//!     .collect();
//!
//! assert_eq!(best_leaderboard(&records, None)[0].score, 12.0);
//! let totals = cumulative_leaderboard(&records, None);
//! assert_eq!(totals[0].total_score, 28.0);
//! assert_eq!(totals[0].games_played, 3);
//! ```

mod aggregate;
mod errors;
mod game;
mod rank;
mod record;

pub use aggregate::{
    BestEntry, CumulativeEntry, PlayerStats, best_leaderboard, best_per_player,
    cumulative_leaderboard, cumulative_per_player, finish_best, finish_cumulative,
};
pub use errors::{LeaderboardError, LeaderboardResult};
pub use game::{GameKind, LeaderboardView};
pub use rank::{assign_positions, round_to};
pub use record::{NewScore, ScoreRecord, derive_accuracy};
