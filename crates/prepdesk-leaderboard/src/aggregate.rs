//! Best and cumulative leaderboard views.
//!
//! `*_per_player` group raw records; `finish_*` sorts, rounds and ranks rows
//! however they were grouped. The document store groups server-side and only
//! calls `finish_*`.
use crate::rank::{assign_positions, round_to};
use crate::record::ScoreRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BestEntry {
    pub position: u32,
    pub player_email: String,
    pub player_name: String,
    pub score: f64,
    pub accuracy: f64,
    pub questions_answered: u32,
    pub correct_answers: u32,
    pub games_played: u32,
    pub played_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CumulativeEntry {
    pub position: u32,
    pub player_email: String,
    pub player_name: String,
    pub total_score: f64,
    pub total_questions: u64,
    pub total_correct: u64,
    pub games_played: u32,
    pub average_accuracy: f64,
    pub last_played_at: DateTime<Utc>,
}

/// A single player's totals for the "my scores" view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlayerStats {
    pub games_played: u32,
    pub best_score: Option<f64>,
    pub total_score: f64,
    pub average_accuracy: f64,
    pub last_played_at: Option<DateTime<Utc>>,
}

impl PlayerStats {
    pub fn from_records(records: &[ScoreRecord]) -> Self {
        let games_played = records.len() as u32;
        let best_score = records
            .iter()
            .map(|record| record.score)
            .max_by(f64::total_cmp)
            .map(|score| round_to(score, 2));
        let total_score: f64 = records.iter().map(|record| record.score).sum();
        let accuracy_sum: f64 = records.iter().map(|record| record.accuracy).sum();
        let average_accuracy = if games_played == 0 {
            0.0
        } else {
            accuracy_sum / f64::from(games_played)
        };
        Self {
            games_played,
            best_score,
            total_score: round_to(total_score, 2),
            average_accuracy: round_to(average_accuracy, 1),
            last_played_at: records.iter().map(|record| record.played_at).max(),
        }
    }
}

fn beats(candidate: &ScoreRecord, current: &ScoreRecord) -> bool {
    match candidate.score.total_cmp(&current.score) {
        Ordering::Greater => true,
        Ordering::Less => false,
        Ordering::Equal => candidate.played_at > current.played_at,
    }
}

/// Highest attempt per player, most recent attempt breaking ties. Admin
/// records are dropped. Output is unsorted.
pub fn best_per_player(records: &[ScoreRecord]) -> Vec<BestEntry> {
    let mut best: HashMap<&str, (&ScoreRecord, u32)> = HashMap::new();
    for record in records.iter().filter(|record| !record.is_admin) {
        best.entry(record.player_email.as_str())
            .and_modify(|(current, played)| {
                *played += 1;
                if beats(record, *current) {
                    *current = record;
                }
            })
            .or_insert((record, 1));
    }

    best.into_values()
        .map(|(record, games_played)| BestEntry {
            position: 0,
            player_email: record.player_email.clone(),
            player_name: record.player_name.clone(),
            score: record.score,
            accuracy: record.accuracy,
            questions_answered: record.questions_answered,
            correct_answers: record.correct_answers,
            games_played,
            played_at: record.played_at,
        })
        .collect()
}

struct Totals<'a> {
    latest: &'a ScoreRecord,
    score: f64,
    questions: u64,
    correct: u64,
    accuracy: f64,
    games: u32,
}

/// Per-player totals over non-admin records. Output is unsorted.
pub fn cumulative_per_player(records: &[ScoreRecord]) -> Vec<CumulativeEntry> {
    let mut totals: HashMap<&str, Totals<'_>> = HashMap::new();
    for record in records.iter().filter(|record| !record.is_admin) {
        let entry = totals
            .entry(record.player_email.as_str())
            .or_insert_with(|| Totals {
                latest: record,
                score: 0.0,
                questions: 0,
                correct: 0,
                accuracy: 0.0,
                games: 0,
            });
        if record.played_at > entry.latest.played_at {
            entry.latest = record;
        }
        entry.score += record.score;
        entry.questions += u64::from(record.questions_answered);
        entry.correct += u64::from(record.correct_answers);
        entry.accuracy += record.accuracy;
        entry.games += 1;
    }

    totals
        .into_values()
        .map(|totals| CumulativeEntry {
            position: 0,
            player_email: totals.latest.player_email.clone(),
            player_name: totals.latest.player_name.clone(),
            total_score: totals.score,
            total_questions: totals.questions,
            total_correct: totals.correct,
            games_played: totals.games,
            average_accuracy: totals.accuracy / f64::from(totals.games),
            last_played_at: totals.latest.played_at,
        })
        .collect()
}

/// Rounds, sorts by score desc then recency, ranks on score, truncates.
pub fn finish_best(mut entries: Vec<BestEntry>, limit: Option<usize>) -> Vec<BestEntry> {
    for entry in &mut entries {
        entry.score = round_to(entry.score, 2);
        entry.accuracy = round_to(entry.accuracy, 1);
    }
    entries.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then(b.played_at.cmp(&a.played_at))
            .then_with(|| a.player_email.cmp(&b.player_email))
    });
    assign_positions(&mut entries, |entry| entry.score, |entry, pos| entry.position = pos);
    if let Some(limit) = limit {
        entries.truncate(limit);
    }
    entries
}

/// Rounds, sorts by total desc then average accuracy then games played,
/// ranks on that triple, truncates.
pub fn finish_cumulative(
    mut entries: Vec<CumulativeEntry>,
    limit: Option<usize>,
) -> Vec<CumulativeEntry> {
    for entry in &mut entries {
        entry.total_score = round_to(entry.total_score, 2);
        entry.average_accuracy = round_to(entry.average_accuracy, 1);
    }
    entries.sort_by(|a, b| {
        b.total_score
            .total_cmp(&a.total_score)
            .then(b.average_accuracy.total_cmp(&a.average_accuracy))
            .then(b.games_played.cmp(&a.games_played))
            .then_with(|| a.player_email.cmp(&b.player_email))
    });
    assign_positions(
        &mut entries,
        |entry| (entry.total_score, entry.average_accuracy, entry.games_played),
        |entry, pos| entry.position = pos,
    );
    if let Some(limit) = limit {
        entries.truncate(limit);
    }
    entries
}

pub fn best_leaderboard(records: &[ScoreRecord], limit: Option<usize>) -> Vec<BestEntry> {
    finish_best(best_per_player(records), limit)
}

pub fn cumulative_leaderboard(
    records: &[ScoreRecord],
    limit: Option<usize>,
) -> Vec<CumulativeEntry> {
    finish_cumulative(cumulative_per_player(records), limit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::GameKind;
    use chrono::{Duration, TimeZone};

    fn at(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    fn record(email: &str, score: f64, minutes: i64) -> ScoreRecord {
        ScoreRecord {
            id: format!("{email}-{minutes}"),
            game: GameKind::Math,
            player_email: email.to_string(),
            player_name: email.split('@').next().unwrap_or_default().to_string(),
            score,
            questions_answered: 10,
            correct_answers: 7,
            accuracy: 70.0,
            is_admin: false,
            played_at: at(minutes),
        }
    }

    #[test]
    fn accounting_example_best_and_totals() {
        let records = vec![
            record("a@example.com", 8.0, 1),
            record("a@example.com", 12.0, 2),
            record("a@example.com", 8.0, 3),
        ];

        let best = best_leaderboard(&records, None);
        assert_eq!(best.len(), 1);
        assert_eq!(best[0].score, 12.0);
        assert_eq!(best[0].games_played, 3);
        assert_eq!(best[0].played_at, at(2));

        let cumulative = cumulative_leaderboard(&records, None);
        assert_eq!(cumulative[0].total_score, 28.0);
        assert_eq!(cumulative[0].games_played, 3);
        assert_eq!(cumulative[0].total_questions, 30);
        assert_eq!(cumulative[0].last_played_at, at(3));
    }

    #[test]
    fn equal_best_attempts_prefer_most_recent() {
        let mut early = record("a@example.com", 10.0, 1);
        early.accuracy = 50.0;
        let mut late = record("a@example.com", 10.0, 5);
        late.accuracy = 90.0;

        let best = best_leaderboard(&[early, late], None);
        assert_eq!(best[0].accuracy, 90.0);
        assert_eq!(best[0].played_at, at(5));
    }

    #[test]
    fn admins_are_excluded() {
        let mut admin = record("ops@example.com", 999.0, 1);
        admin.is_admin = true;
        let records = vec![admin, record("a@example.com", 5.0, 2)];

        let best = best_leaderboard(&records, None);
        let cumulative = cumulative_leaderboard(&records, None);
        assert_eq!(best.len(), 1);
        assert_eq!(best[0].player_email, "a@example.com");
        assert_eq!(cumulative.len(), 1);
        assert_eq!(cumulative[0].total_score, 5.0);
    }

    #[test]
    fn best_ties_share_positions_and_order_by_recency() {
        let records = vec![
            record("a@example.com", 10.0, 1),
            record("b@example.com", 10.0, 4),
            record("c@example.com", 7.5, 2),
        ];
        let best = best_leaderboard(&records, None);
        let order: Vec<(&str, u32)> = best
            .iter()
            .map(|e| (e.player_email.as_str(), e.position))
            .collect();
        assert_eq!(
            order,
            vec![("b@example.com", 1), ("a@example.com", 1), ("c@example.com", 3)]
        );
    }

    #[test]
    fn cumulative_tiebreaks_on_accuracy_then_games() {
        let mut sharp = record("sharp@example.com", 20.0, 1);
        sharp.accuracy = 95.0;
        let mut steady_one = record("steady@example.com", 10.0, 2);
        steady_one.accuracy = 80.0;
        let mut steady_two = record("steady@example.com", 10.0, 3);
        steady_two.accuracy = 80.0;
        let mut fresh = record("fresh@example.com", 20.0, 4);
        fresh.accuracy = 80.0;

        let board = cumulative_leaderboard(&[sharp, steady_one, steady_two, fresh], None);
        let emails: Vec<&str> = board.iter().map(|e| e.player_email.as_str()).collect();
        assert_eq!(
            emails,
            vec!["sharp@example.com", "steady@example.com", "fresh@example.com"]
        );
        let positions: Vec<u32> = board.iter().map(|e| e.position).collect();
        assert_eq!(positions, vec![1, 2, 3]);
    }

    #[test]
    fn rounding_and_limit() {
        let mut odd = record("a@example.com", 1.0 / 3.0, 1);
        odd.accuracy = 66.666;
        let records = vec![odd, record("b@example.com", 0.1, 2), record("c@example.com", 0.2, 3)];

        let best = best_leaderboard(&records, Some(2));
        assert_eq!(best.len(), 2);
        assert_eq!(best[0].score, 0.33);
        assert_eq!(best[0].accuracy, 66.7);

        let cumulative = cumulative_leaderboard(&records, Some(1));
        assert_eq!(cumulative.len(), 1);
        assert_eq!(cumulative[0].average_accuracy, 66.7);
    }

    #[test]
    fn limit_applies_after_rounding() {
        // Unrounded, a@ leads; rounded, both tie at 10.0 and the later attempt wins.
        let records = vec![
            record("a@example.com", 10.004, 1),
            record("b@example.com", 10.001, 2),
        ];
        let mut rows = best_per_player(&records);
        rows.sort_by(|x, y| y.score.total_cmp(&x.score));

        let top = finish_best(rows, Some(1));
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].player_email, "b@example.com");
        assert_eq!(top[0].score, 10.0);
        assert_eq!(top[0].position, 1);
    }

    #[test]
    fn player_stats_summarize_history() {
        let records = vec![record("a@example.com", 8.0, 1), record("a@example.com", 12.0, 2)];
        let stats = PlayerStats::from_records(&records);
        assert_eq!(stats.games_played, 2);
        assert_eq!(stats.best_score, Some(12.0));
        assert_eq!(stats.total_score, 20.0);
        assert_eq!(stats.last_played_at, Some(at(2)));

        let empty = PlayerStats::from_records(&[]);
        assert_eq!(empty.best_score, None);
        assert_eq!(empty.average_accuracy, 0.0);
    }
}
