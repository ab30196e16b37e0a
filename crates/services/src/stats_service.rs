use std::collections::BTreeSet;
use std::sync::Arc;

use exam_core::model::{CourseId, Source, UserId};
use exam_core::stats::{LeaderboardEntry, UserStats, leaderboard};
use storage::repository::{ExamRepository, QuestionRepository, UserRepository, user_names};

use crate::error::StatsError;

/// How many users a leaderboard shows by default.
pub const DEFAULT_LEADERBOARD_LIMIT: usize = 20;

/// Read-only progress reports over stored exam results.
#[derive(Clone)]
pub struct StatsService {
    users: Arc<dyn UserRepository>,
    questions: Arc<dyn QuestionRepository>,
    exams: Arc<dyn ExamRepository>,
}

impl StatsService {
    #[must_use]
    pub fn new(
        users: Arc<dyn UserRepository>,
        questions: Arc<dyn QuestionRepository>,
        exams: Arc<dyn ExamRepository>,
    ) -> Self {
        Self {
            users,
            questions,
            exams,
        }
    }

    /// Progress of one user in a course, optionally for a single source.
    ///
    /// # Errors
    ///
    /// Returns `StatsError::Storage` if repository access fails.
    pub async fn user_stats(
        &self,
        user_id: UserId,
        course_id: CourseId,
        source: Option<Source>,
    ) -> Result<UserStats, StatsError> {
        let results = self
            .exams
            .results_for_user(user_id, course_id, source)
            .await?;
        let unique_seen = self
            .exams
            .answered_question_ids(course_id, user_id, source)
            .await?
            .len();

        let sources: &[Source] = match &source {
            Some(s) => std::slice::from_ref(s),
            None => &Source::ALL,
        };
        let mut pool_size = 0;
        for s in sources {
            pool_size += self.questions.question_count(course_id, *s).await?;
        }

        Ok(UserStats::from_results(&results, unique_seen, pool_size))
    }

    /// Users ranked by average grade, optionally narrowed to a course and source.
    ///
    /// # Errors
    ///
    /// Returns `StatsError::Storage` if repository access fails.
    pub async fn leaderboard(
        &self,
        course_id: Option<CourseId>,
        source: Option<Source>,
        limit: usize,
    ) -> Result<Vec<LeaderboardEntry>, StatsError> {
        let results = self.exams.results_for_course(course_id, source).await?;
        let user_ids: Vec<UserId> = results
            .iter()
            .map(|r| r.user_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let names = user_names(self.users.as_ref(), &user_ids).await?;
        Ok(leaderboard(&results, &names, limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use exam_core::Grade;
    use exam_core::model::{Answer, AnswerWeight, ExamAnswer, QuestionId, User, UserRole};
    use exam_core::stats::ANONYMOUS_NAME;
    use exam_core::time::fixed_now;
    use storage::repository::{
        CourseRepository, InMemoryRepository, NewCourse, NewExamResult, NewQuestion,
    };

    async fn record(
        repo: &InMemoryRepository,
        user: u64,
        course_id: CourseId,
        source: Source,
        tenths: u16,
        questions: &[QuestionId],
    ) {
        let id = repo
            .append_result(&NewExamResult {
                user_id: UserId::new(user),
                course_id,
                source,
                grade: Grade::from_tenths(tenths),
                total_questions: u32::try_from(questions.len()).unwrap(),
                correct_count: 1,
                created_at: fixed_now(),
            })
            .await
            .unwrap();
        let rows: Vec<_> = questions.iter().map(|q| ExamAnswer::unanswered(*q)).collect();
        repo.append_answers(id, &rows).await.unwrap();
    }

    async fn setup() -> (InMemoryRepository, CourseId, Vec<QuestionId>) {
        let repo = InMemoryRepository::new();
        let course_id = repo
            .insert_course(&NewCourse {
                title: "Anatomy".into(),
                description: None,
            })
            .await
            .unwrap();
        let mut ids = Vec::new();
        for (i, source) in [Source::Ai, Source::Ai, Source::Ai, Source::Kahoots]
            .into_iter()
            .enumerate()
        {
            let id = repo
                .insert_question(&NewQuestion {
                    course_id,
                    source,
                    text: format!("Q{i}"),
                    answers: vec![
                        Answer::new("a", AnswerWeight::FullyCorrect),
                        Answer::new("b", AnswerWeight::FullyIncorrect),
                    ],
                    theme: None,
                    explanation: None,
                })
                .await
                .unwrap();
            ids.push(id);
        }
        (repo, course_id, ids)
    }

    fn service(repo: &InMemoryRepository) -> StatsService {
        StatsService::new(
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
        )
    }

    #[tokio::test]
    async fn user_stats_aggregate_results_and_pool() {
        let (repo, course_id, q) = setup().await;
        record(&repo, 1, course_id, Source::Ai, 120, &q[0..2]).await;
        record(&repo, 1, course_id, Source::Ai, 80, &q[1..3]).await;
        record(&repo, 1, course_id, Source::Kahoots, 200, &q[3..4]).await;

        let all = service(&repo).user_stats(UserId::new(1), course_id, None).await.unwrap();
        assert_eq!(all.total_exams, 3);
        assert_eq!(all.passed_exams, 2);
        assert_eq!(all.unique_questions_seen, 4);
        assert_eq!(all.total_questions_in_pool, 4);
        assert_eq!(all.total_questions_answered, 5);

        let ai = service(&repo)
            .user_stats(UserId::new(1), course_id, Some(Source::Ai))
            .await
            .unwrap();
        assert_eq!(ai.total_exams, 2);
        assert_eq!(ai.average_grade, 10.0);
        assert_eq!(ai.pass_rate, 50);
        assert_eq!(ai.unique_questions_seen, 3);
        assert_eq!(ai.total_questions_in_pool, 3);
    }

    #[tokio::test]
    async fn user_without_exams_gets_empty_stats() {
        let (repo, course_id, _) = setup().await;
        let stats = service(&repo).user_stats(UserId::new(5), course_id, None).await.unwrap();
        assert_eq!(stats.total_exams, 0);
        assert_eq!(stats.unique_questions_seen, 0);
        assert_eq!(stats.total_questions_in_pool, 4);
    }

    #[tokio::test]
    async fn leaderboard_uses_stored_names() {
        let (repo, course_id, q) = setup().await;
        repo.upsert_user(&User::new(UserId::new(1), Some("Ana".into()), UserRole::Student))
            .await
            .unwrap();
        record(&repo, 1, course_id, Source::Ai, 150, &q[0..1]).await;
        record(&repo, 2, course_id, Source::Ai, 170, &q[0..1]).await;
        record(&repo, 3, course_id, Source::Kahoots, 90, &q[3..4]).await;

        let board = service(&repo)
            .leaderboard(Some(course_id), None, DEFAULT_LEADERBOARD_LIMIT)
            .await
            .unwrap();
        assert_eq!(board.len(), 3);
        assert_eq!(board[0].user_name, ANONYMOUS_NAME);
        assert_eq!(board[1].user_name, "Ana");

        let ai_only = service(&repo)
            .leaderboard(Some(course_id), Some(Source::Ai), 1)
            .await
            .unwrap();
        assert_eq!(ai_only.len(), 1);
        assert_eq!(ai_only[0].user_id, UserId::new(2));
    }
}
