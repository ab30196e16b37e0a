//! Progress statistics and leaderboards derived from exam results.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::model::{ExamResult, Source, UserId};
use crate::scoring::round_to_tenth;

/// How many recent exams the score evolution keeps.
pub const SCORE_EVOLUTION_LEN: usize = 10;

/// Name shown for users without a display name.
pub const ANONYMOUS_NAME: &str = "Anonymous";

/// One point of the score-over-time chart.
#[derive(Debug, Clone, PartialEq)]
pub struct ScorePoint {
    pub date: DateTime<Utc>,
    pub grade: f64,
    pub source: Source,
}

/// Per-user progress for a course (optionally a single source).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UserStats {
    pub total_exams: usize,
    pub passed_exams: usize,
    pub failed_exams: usize,
    pub average_grade: f64,
    pub total_questions_answered: u64,
    pub total_correct_answers: u64,
    pub unique_questions_seen: usize,
    pub total_questions_in_pool: usize,
    /// Most recent exams, oldest first.
    pub score_evolution: Vec<ScorePoint>,
    /// Percentage of passed exams, rounded to an integer.
    pub pass_rate: u32,
}

impl UserStats {
    /// Aggregate a user's exam results.
    ///
    /// `results` may come in any order; the score evolution is built from the
    /// most recent ones.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_results(
        results: &[ExamResult],
        unique_questions_seen: usize,
        total_questions_in_pool: usize,
    ) -> Self {
        let total_exams = results.len();
        let passed_exams = results.iter().filter(|r| r.passed()).count();
        let average_grade = if total_exams == 0 {
            0.0
        } else {
            let sum: f64 = results.iter().map(|r| r.grade.as_f64()).sum();
            round_to_tenth(sum / total_exams as f64)
        };

        let mut recent: Vec<&ExamResult> = results.iter().collect();
        recent.sort_by_key(|r| std::cmp::Reverse((r.created_at, r.id)));
        recent.truncate(SCORE_EVOLUTION_LEN);
        let score_evolution = recent
            .into_iter()
            .rev()
            .map(|r| ScorePoint {
                date: r.created_at,
                grade: r.grade.as_f64(),
                source: r.source,
            })
            .collect();

        Self {
            total_exams,
            passed_exams,
            failed_exams: total_exams - passed_exams,
            average_grade,
            total_questions_answered: results.iter().map(|r| u64::from(r.total_questions)).sum(),
            total_correct_answers: results.iter().map(|r| u64::from(r.correct_count)).sum(),
            unique_questions_seen,
            total_questions_in_pool,
            score_evolution,
            pass_rate: percentage(passed_exams, total_exams),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LeaderboardEntry {
    pub user_id: UserId,
    pub user_name: String,
    pub average_grade: f64,
    pub total_exams: usize,
    pub pass_rate: u32,
}

/// Rank users by average grade, then by number of exams taken.
///
/// `names` maps users to display names; missing or blank names show as
/// [`ANONYMOUS_NAME`].
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn leaderboard(
    results: &[ExamResult],
    names: &HashMap<UserId, String>,
    limit: usize,
) -> Vec<LeaderboardEntry> {
    let mut grouped: HashMap<UserId, (f64, usize, usize)> = HashMap::new();
    for result in results {
        let entry = grouped.entry(result.user_id).or_insert((0.0, 0, 0));
        entry.0 += result.grade.as_f64();
        entry.1 += 1;
        if result.passed() {
            entry.2 += 1;
        }
    }

    let mut board: Vec<LeaderboardEntry> = grouped
        .into_iter()
        .map(|(user_id, (sum, exams, passed))| LeaderboardEntry {
            user_id,
            user_name: names
                .get(&user_id)
                .filter(|n| !n.trim().is_empty())
                .cloned()
                .unwrap_or_else(|| ANONYMOUS_NAME.to_string()),
            average_grade: round_to_tenth(sum / exams as f64),
            total_exams: exams,
            pass_rate: percentage(passed, exams),
        })
        .collect();

    board.sort_by(|a, b| {
        b.average_grade
            .total_cmp(&a.average_grade)
            .then(b.total_exams.cmp(&a.total_exams))
            .then(a.user_id.cmp(&b.user_id))
    });
    board.truncate(limit);
    board
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
fn percentage(part: usize, whole: usize) -> u32 {
    if whole == 0 {
        return 0;
    }
    ((part as f64 / whole as f64) * 100.0).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CourseId, ExamResultId};
    use crate::scoring::Grade;
    use crate::time::fixed_now;
    use chrono::Duration;

    fn result(id: u64, user: u64, tenths: u16, minutes: i64) -> ExamResult {
        ExamResult {
            id: ExamResultId::new(id),
            user_id: UserId::new(user),
            course_id: CourseId::new(1),
            source: Source::Previous,
            grade: Grade::from_tenths(tenths),
            total_questions: 15,
            correct_count: 5,
            created_at: fixed_now() + Duration::minutes(minutes),
        }
    }

    #[test]
    fn empty_results_give_zeroed_stats() {
        let stats = UserStats::from_results(&[], 0, 40);
        assert_eq!(stats.total_exams, 0);
        assert_eq!(stats.average_grade, 0.0);
        assert_eq!(stats.pass_rate, 0);
        assert_eq!(stats.total_questions_in_pool, 40);
        assert!(stats.score_evolution.is_empty());
    }

    #[test]
    fn stats_count_passes_and_average() {
        let results = vec![result(1, 1, 100, 0), result(2, 1, 95, 1), result(3, 1, 154, 2)];
        let stats = UserStats::from_results(&results, 30, 100);

        assert_eq!(stats.total_exams, 3);
        assert_eq!(stats.passed_exams, 2);
        assert_eq!(stats.failed_exams, 1);
        // (10.0 + 9.5 + 15.4) / 3 = 11.633..
        assert_eq!(stats.average_grade, 11.6);
        assert_eq!(stats.pass_rate, 67);
        assert_eq!(stats.total_questions_answered, 45);
        assert_eq!(stats.total_correct_answers, 15);
        assert_eq!(stats.unique_questions_seen, 30);
    }

    #[test]
    fn evolution_keeps_last_ten_oldest_first() {
        let results: Vec<_> = (0..12)
            .map(|i| result(i, 1, u16::try_from(i * 10).unwrap(), i64::try_from(i).unwrap()))
            .rev()
            .collect();
        let stats = UserStats::from_results(&results, 0, 0);

        assert_eq!(stats.score_evolution.len(), SCORE_EVOLUTION_LEN);
        assert_eq!(stats.score_evolution[0].grade, 2.0);
        assert_eq!(stats.score_evolution[9].grade, 11.0);
    }

    #[test]
    fn leaderboard_sorts_by_average_then_volume() {
        let results = vec![
            result(1, 1, 120, 0),
            result(2, 2, 120, 0),
            result(3, 2, 120, 1),
            result(4, 3, 180, 0),
            result(5, 3, 40, 1),
        ];
        let mut names = HashMap::new();
        names.insert(UserId::new(1), "Ana".to_string());
        names.insert(UserId::new(2), "  ".to_string());

        let board = leaderboard(&results, &names, 10);
        assert_eq!(board.len(), 3);
        assert_eq!(board[0].user_id, UserId::new(2));
        assert_eq!(board[0].user_name, ANONYMOUS_NAME);
        assert_eq!(board[0].total_exams, 2);
        assert_eq!(board[1].user_name, "Ana");
        assert_eq!(board[2].user_id, UserId::new(3));
        assert_eq!(board[2].average_grade, 11.0);
        assert_eq!(board[2].pass_rate, 50);
    }

    #[test]
    fn leaderboard_respects_limit() {
        let results: Vec<_> = (1..=5).map(|u| result(u, u, 100, 0)).collect();
        assert_eq!(leaderboard(&results, &HashMap::new(), 2).len(), 2);
    }
}
