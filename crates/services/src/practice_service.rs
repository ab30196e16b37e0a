use std::sync::{Arc, Mutex, PoisonError};

use exam_core::model::{CourseId, ExamResultId, ExamSession, History, Source, UserId};
use exam_core::{QuestionSelector, RngShuffler, ScoreResult, SelectionRequest, StudyMode};
use rand::SeedableRng;
use rand::rngs::StdRng;
use storage::repository::{CourseRepository, ExamRepository, NewExamResult, QuestionRepository};

use crate::Clock;
use crate::config::PracticeConfig;
use crate::error::PracticeError;

/// What a caller asks for when starting an exam.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExamRequest {
    pub course_id: CourseId,
    pub source: Source,
    pub mode: StudyMode,
    pub theme: Option<String>,
    /// Needed for the history-driven modes; anonymous exams fall back to random.
    pub user_id: Option<UserId>,
}

impl ExamRequest {
    #[must_use]
    pub fn new(course_id: CourseId, source: Source) -> Self {
        Self {
            course_id,
            source,
            mode: StudyMode::All,
            theme: None,
            user_id: None,
        }
    }

    #[must_use]
    pub fn with_mode(mut self, mode: StudyMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn with_theme(mut self, theme: impl Into<String>) -> Self {
        self.theme = Some(theme.into());
        self
    }

    #[must_use]
    pub fn for_user(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }
}

/// Result of recording a finished exam.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExamOutcome {
    pub result_id: ExamResultId,
    pub score: ScoreResult,
    /// False when the summary was stored but its per-question rows were not.
    pub answers_recorded: bool,
}

/// Builds exams from stored pools and records their results.
pub struct PracticeService {
    clock: Clock,
    config: PracticeConfig,
    seeded: Option<Mutex<StdRng>>,
    courses: Arc<dyn CourseRepository>,
    questions: Arc<dyn QuestionRepository>,
    exams: Arc<dyn ExamRepository>,
}

impl PracticeService {
    #[must_use]
    pub fn new(
        clock: Clock,
        courses: Arc<dyn CourseRepository>,
        questions: Arc<dyn QuestionRepository>,
        exams: Arc<dyn ExamRepository>,
    ) -> Self {
        Self {
            clock,
            config: PracticeConfig::default(),
            seeded: None,
            courses,
            questions,
            exams,
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: PracticeConfig) -> Self {
        self.seeded = config.seed.map(|seed| Mutex::new(StdRng::seed_from_u64(seed)));
        self.config = config;
        self
    }

    /// Make every shuffle reproducible from `seed`.
    #[must_use]
    pub fn with_seed(self, seed: u64) -> Self {
        let config = PracticeConfig {
            seed: Some(seed),
            ..self.config
        };
        self.with_config(config)
    }

    #[must_use]
    pub fn config(&self) -> PracticeConfig {
        self.config
    }

    /// Select questions for a new exam.
    ///
    /// An empty pool (or a theme nobody uses) yields an empty session rather
    /// than an error.
    ///
    /// # Errors
    ///
    /// Returns `PracticeError::UnknownCourse` if the course does not exist.
    /// Returns `PracticeError::Storage` if repository access fails.
    pub async fn start_exam(&self, request: &ExamRequest) -> Result<ExamSession, PracticeError> {
        if self.courses.get_course(request.course_id).await?.is_none() {
            return Err(PracticeError::UnknownCourse(request.course_id));
        }

        let pool = self
            .questions
            .questions(request.course_id, request.source)
            .await?;
        let history = self.history_for(request).await?;

        let selection_request = SelectionRequest {
            count: self.config.question_count,
            mode: request.mode,
            theme: request.theme.clone(),
        };

        let selection = match &self.seeded {
            Some(rng) => {
                let mut rng = rng.lock().unwrap_or_else(PoisonError::into_inner);
                QuestionSelector::new(RngShuffler::new(&mut *rng)).select(
                    &pool,
                    &selection_request,
                    &history,
                )
            }
            None => QuestionSelector::new(RngShuffler::thread()).select(
                &pool,
                &selection_request,
                &history,
            ),
        };

        tracing::debug!(
            course = %request.course_id,
            source = %request.source,
            mode = %request.mode,
            pool = pool.len(),
            priority = selection.priority_selected,
            fallback = selection.fallback_selected,
            "selected exam questions"
        );

        Ok(ExamSession::new(
            request.course_id,
            request.source,
            selection.into_questions(),
            self.clock.now(),
        ))
    }

    async fn history_for(&self, request: &ExamRequest) -> Result<History, PracticeError> {
        let Some(user_id) = request.user_id else {
            return Ok(History::empty());
        };
        let history = match request.mode {
            StudyMode::Unseen => History::new(
                self.exams
                    .seen_question_ids(request.course_id, user_id)
                    .await?,
                Default::default(),
            ),
            StudyMode::Wrong => History::new(
                Default::default(),
                self.exams
                    .wrong_question_ids(request.course_id, user_id, Some(request.source))
                    .await?,
            ),
            StudyMode::All | StudyMode::Theme => History::empty(),
        };
        Ok(history)
    }

    /// Grade a session and store it for `user_id`.
    ///
    /// The summary is written first and its failure is returned. The
    /// per-question rows follow; if they fail the outcome still succeeds with
    /// `answers_recorded` set to false.
    ///
    /// # Errors
    ///
    /// Returns `PracticeError::EmptyExam` for a session without questions.
    /// Returns `PracticeError::Storage` if the summary cannot be stored.
    pub async fn finish_exam(
        &self,
        session: &ExamSession,
        user_id: UserId,
    ) -> Result<ExamOutcome, PracticeError> {
        if session.is_empty() {
            return Err(PracticeError::EmptyExam);
        }

        let score = session.score();
        let summary = NewExamResult {
            user_id,
            course_id: session.course_id(),
            source: session.source(),
            grade: score.grade,
            total_questions: u32::try_from(session.total_questions()).unwrap_or(u32::MAX),
            correct_count: u32::try_from(score.correct_count).unwrap_or(u32::MAX),
            created_at: self.clock.now(),
        };
        let result_id = self.exams.append_result(&summary).await?;
        tracing::info!(
            result = %result_id,
            user = %user_id,
            course = %session.course_id(),
            grade = %score.grade,
            "recorded exam result"
        );

        let answers_recorded = match self
            .exams
            .append_answers(result_id, &session.recorded_answers())
            .await
        {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(result = %result_id, error = %err, "failed to record exam answers");
                false
            }
        };

        Ok(ExamOutcome {
            result_id,
            score,
            answers_recorded,
        })
    }

    /// Distinct themes of a pool, sorted.
    ///
    /// # Errors
    ///
    /// Returns `PracticeError::Storage` if repository access fails.
    pub async fn themes(
        &self,
        course_id: CourseId,
        source: Source,
    ) -> Result<Vec<String>, PracticeError> {
        Ok(self.questions.themes(course_id, source).await?)
    }

    /// Number of questions in a pool.
    ///
    /// # Errors
    ///
    /// Returns `PracticeError::Storage` if repository access fails.
    pub async fn pool_size(&self, course_id: CourseId, source: Source) -> Result<usize, PracticeError> {
        Ok(self.questions.question_count(course_id, source).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashSet;

    use async_trait::async_trait;
    use exam_core::model::{Answer, AnswerWeight, ExamAnswer, ExamResult, QuestionId};
    use exam_core::time::fixed_now;
    use storage::repository::{InMemoryRepository, NewCourse, NewQuestion, StorageError};

    async fn seeded_repo(questions: usize) -> (InMemoryRepository, CourseId) {
        let repo = InMemoryRepository::new();
        let course_id = repo
            .insert_course(&NewCourse {
                title: "Anatomy".into(),
                description: None,
            })
            .await
            .unwrap();
        for i in 0..questions {
            repo.insert_question(&NewQuestion {
                course_id,
                source: Source::Previous,
                text: format!("Q{i}"),
                answers: vec![
                    Answer::new("right", AnswerWeight::FullyCorrect),
                    Answer::new("wrong", AnswerWeight::FullyIncorrect),
                ],
                theme: Some(if i % 2 == 0 { "Even" } else { "Odd" }.into()),
                explanation: None,
            })
            .await
            .unwrap();
        }
        (repo, course_id)
    }

    fn service(repo: &InMemoryRepository) -> PracticeService {
        PracticeService::new(
            Clock::fixed(fixed_now()),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
        )
    }

    #[tokio::test]
    async fn start_exam_respects_configured_count() {
        let (repo, course_id) = seeded_repo(20).await;
        let service = service(&repo).with_config(PracticeConfig {
            question_count: 5,
            seed: Some(3),
        });

        let exam = service
            .start_exam(&ExamRequest::new(course_id, Source::Previous))
            .await
            .unwrap();
        assert_eq!(exam.total_questions(), 5);
        assert_eq!(exam.started_at(), fixed_now());
    }

    #[tokio::test]
    async fn unknown_course_is_rejected() {
        let repo = InMemoryRepository::new();
        let err = service(&repo)
            .start_exam(&ExamRequest::new(CourseId::new(4), Source::Ai))
            .await
            .unwrap_err();
        assert!(matches!(err, PracticeError::UnknownCourse(_)));
    }

    #[tokio::test]
    async fn same_seed_gives_same_exam() {
        let (repo, course_id) = seeded_repo(20).await;
        let request = ExamRequest::new(course_id, Source::Previous);
        let ids = |exam: ExamSession| exam.questions().iter().map(|q| q.id()).collect::<Vec<_>>();

        let a = service(&repo).with_seed(11).start_exam(&request).await.unwrap();
        let b = service(&repo).with_seed(11).start_exam(&request).await.unwrap();
        assert_eq!(ids(a), ids(b));
    }

    #[tokio::test]
    async fn theme_filter_limits_pool() {
        let (repo, course_id) = seeded_repo(10).await;
        let exam = service(&repo)
            .start_exam(&ExamRequest::new(course_id, Source::Previous).with_theme("Odd"))
            .await
            .unwrap();
        assert_eq!(exam.total_questions(), 5);
        assert!(exam.questions().iter().all(|q| q.theme() == Some("Odd")));

        let none = service(&repo)
            .start_exam(&ExamRequest::new(course_id, Source::Previous).with_theme("Missing"))
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn pool_overview_lists_size_and_themes() {
        let (repo, course_id) = seeded_repo(7).await;
        let service = service(&repo);
        assert_eq!(service.pool_size(course_id, Source::Previous).await.unwrap(), 7);
        assert_eq!(service.pool_size(course_id, Source::Ai).await.unwrap(), 0);
        assert_eq!(
            service.themes(course_id, Source::Previous).await.unwrap(),
            vec!["Even", "Odd"]
        );
    }

    #[tokio::test]
    async fn unseen_mode_prefers_new_questions() {
        let (repo, course_id) = seeded_repo(20).await;
        let user = UserId::new(1);
        let service = service(&repo).with_config(PracticeConfig {
            question_count: 15,
            seed: Some(5),
        });

        let first = service
            .start_exam(&ExamRequest::new(course_id, Source::Previous).for_user(user))
            .await
            .unwrap();
        service.finish_exam(&first, user).await.unwrap();
        let seen: HashSet<QuestionId> = first.questions().iter().map(|q| q.id()).collect();

        let second = service
            .start_exam(
                &ExamRequest::new(course_id, Source::Previous)
                    .with_mode(StudyMode::Unseen)
                    .for_user(user),
            )
            .await
            .unwrap();
        assert_eq!(second.total_questions(), 15);
        let fresh = second
            .questions()
            .iter()
            .filter(|q| !seen.contains(&q.id()))
            .count();
        assert_eq!(fresh, 5);
        assert!(
            second.questions()[..5]
                .iter()
                .all(|q| !seen.contains(&q.id()))
        );
    }

    #[tokio::test]
    async fn finish_exam_records_summary_and_answers() {
        let (repo, course_id) = seeded_repo(4).await;
        let service = service(&repo).with_seed(1);
        let mut exam = service
            .start_exam(&ExamRequest::new(course_id, Source::Previous))
            .await
            .unwrap();

        let first = exam.questions()[0].clone();
        let right = first
            .answers()
            .iter()
            .position(|a| a.weight.is_correct())
            .unwrap();
        exam.answer(first.id(), right).unwrap();

        let outcome = service.finish_exam(&exam, UserId::new(9)).await.unwrap();
        assert!(outcome.answers_recorded);
        assert_eq!(outcome.score.correct_count, 1);
        // one ++ out of four questions: 20 * 1 / 4
        assert_eq!(outcome.score.grade.to_string(), "5.0");

        let rows = repo.answers_for_result(outcome.result_id).await.unwrap();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows.iter().filter(|r| !r.is_answered()).count(), 3);

        let wrong = repo
            .wrong_question_ids(course_id, UserId::new(9), Some(Source::Previous))
            .await
            .unwrap();
        assert_eq!(wrong.len(), 3);
        assert!(!wrong.contains(&first.id()));
    }

    #[tokio::test]
    async fn finishing_empty_exam_fails() {
        let (repo, course_id) = seeded_repo(0).await;
        let service = service(&repo);
        let exam = service
            .start_exam(&ExamRequest::new(course_id, Source::Previous))
            .await
            .unwrap();
        assert!(exam.is_empty());
        let err = service.finish_exam(&exam, UserId::new(1)).await.unwrap_err();
        assert!(matches!(err, PracticeError::EmptyExam));
    }

    /// Stores summaries but refuses detail rows.
    struct FlakyAnswers(InMemoryRepository);

    #[async_trait]
    impl ExamRepository for FlakyAnswers {
        async fn append_result(&self, result: &NewExamResult) -> Result<ExamResultId, StorageError> {
            self.0.append_result(result).await
        }

        async fn append_answers(
            &self,
            _result_id: ExamResultId,
            _answers: &[ExamAnswer],
        ) -> Result<(), StorageError> {
            Err(StorageError::Connection("detail rows unavailable".into()))
        }

        async fn results_for_user(
            &self,
            user_id: UserId,
            course_id: CourseId,
            source: Option<Source>,
        ) -> Result<Vec<ExamResult>, StorageError> {
            self.0.results_for_user(user_id, course_id, source).await
        }

        async fn results_for_course(
            &self,
            course_id: Option<CourseId>,
            source: Option<Source>,
        ) -> Result<Vec<ExamResult>, StorageError> {
            self.0.results_for_course(course_id, source).await
        }

        async fn answers_for_result(
            &self,
            result_id: ExamResultId,
        ) -> Result<Vec<ExamAnswer>, StorageError> {
            self.0.answers_for_result(result_id).await
        }

        async fn answered_question_ids(
            &self,
            course_id: CourseId,
            user_id: UserId,
            source: Option<Source>,
        ) -> Result<HashSet<QuestionId>, StorageError> {
            self.0.answered_question_ids(course_id, user_id, source).await
        }

        async fn seen_question_ids(
            &self,
            course_id: CourseId,
            user_id: UserId,
        ) -> Result<HashSet<QuestionId>, StorageError> {
            self.0.seen_question_ids(course_id, user_id).await
        }

        async fn wrong_question_ids(
            &self,
            course_id: CourseId,
            user_id: UserId,
            source: Option<Source>,
        ) -> Result<HashSet<QuestionId>, StorageError> {
            self.0.wrong_question_ids(course_id, user_id, source).await
        }
    }

    #[tokio::test]
    async fn detail_row_failure_does_not_fail_the_exam() {
        let (repo, course_id) = seeded_repo(3).await;
        let service = PracticeService::new(
            Clock::fixed(fixed_now()),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
            Arc::new(FlakyAnswers(repo.clone())),
        );
        let exam = service
            .start_exam(&ExamRequest::new(course_id, Source::Previous))
            .await
            .unwrap();

        let outcome = service.finish_exam(&exam, UserId::new(2)).await.unwrap();
        assert!(!outcome.answers_recorded);
        let stored = repo
            .results_for_user(UserId::new(2), course_id, None)
            .await
            .unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, outcome.result_id);
    }
}
