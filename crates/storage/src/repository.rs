use async_trait::async_trait;
use chrono::{DateTime, Utc};
use exam_core::Grade;
use exam_core::model::{
    Answer, Course, CourseId, ExamAnswer, ExamResult, ExamResultId, Question, QuestionId, Source,
    User, UserId,
};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

//
// ─── RECORDS ───────────────────────────────────────────────────────────────────
//

/// A course that has not been assigned an id yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCourse {
    pub title: String,
    pub description: Option<String>,
}

/// A question about to be imported into a pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewQuestion {
    pub course_id: CourseId,
    pub source: Source,
    pub text: String,
    pub answers: Vec<Answer>,
    pub theme: Option<String>,
    pub explanation: Option<String>,
}

impl NewQuestion {
    #[must_use]
    pub fn assign_id(self, id: QuestionId) -> Question {
        Question::from_persisted(
            id,
            self.course_id,
            self.source,
            self.text,
            self.answers,
            self.theme,
            self.explanation,
        )
    }
}

/// Summary row written when an exam is finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewExamResult {
    pub user_id: UserId,
    pub course_id: CourseId,
    pub source: Source,
    pub grade: Grade,
    pub total_questions: u32,
    pub correct_count: u32,
    pub created_at: DateTime<Utc>,
}

impl NewExamResult {
    #[must_use]
    pub fn assign_id(self, id: ExamResultId) -> ExamResult {
        ExamResult {
            id,
            user_id: self.user_id,
            course_id: self.course_id,
            source: self.source,
            grade: self.grade,
            total_questions: self.total_questions,
            correct_count: self.correct_count,
            created_at: self.created_at,
        }
    }
}

//
// ─── CONTRACTS ─────────────────────────────────────────────────────────────────
//

#[async_trait]
pub trait CourseRepository: Send + Sync {
    /// Create a course and return its id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the course cannot be stored.
    async fn insert_course(&self, course: &NewCourse) -> Result<CourseId, StorageError>;

    /// Persist or update a course with a known id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the course cannot be stored.
    async fn upsert_course(&self, course: &Course) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get_course(&self, id: CourseId) -> Result<Option<Course>, StorageError>;

    /// All courses, sorted by title.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_courses(&self) -> Result<Vec<Course>, StorageError>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the user cannot be stored.
    async fn upsert_user(&self, user: &User) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get_user(&self, id: UserId) -> Result<Option<User>, StorageError>;

    /// Fetch the users that exist among `ids`; unknown ids are skipped.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get_users(&self, ids: &[UserId]) -> Result<Vec<User>, StorageError>;
}

#[async_trait]
pub trait QuestionRepository: Send + Sync {
    /// Add a question to a course pool and return its id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the course does not exist, or other storage errors.
    async fn insert_question(&self, question: &NewQuestion) -> Result<QuestionId, StorageError>;

    /// Every question of a course+source pool, in creation order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn questions(
        &self,
        course_id: CourseId,
        source: Source,
    ) -> Result<Vec<Question>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn question_count(&self, course_id: CourseId, source: Source)
    -> Result<usize, StorageError>;

    /// Distinct, non-empty theme tags of a pool, sorted.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn themes(&self, course_id: CourseId, source: Source) -> Result<Vec<String>, StorageError>;
}

#[async_trait]
pub trait ExamRepository: Send + Sync {
    /// Write an exam summary and return its id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the summary cannot be stored.
    async fn append_result(&self, result: &NewExamResult) -> Result<ExamResultId, StorageError>;

    /// Attach per-question answer rows to a stored exam.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the exam does not exist, or other storage errors.
    async fn append_answers(
        &self,
        result_id: ExamResultId,
        answers: &[ExamAnswer],
    ) -> Result<(), StorageError>;

    /// A user's exams for a course, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn results_for_user(
        &self,
        user_id: UserId,
        course_id: CourseId,
        source: Option<Source>,
    ) -> Result<Vec<ExamResult>, StorageError>;

    /// Exams of every user, optionally narrowed to a course and/or source.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn results_for_course(
        &self,
        course_id: Option<CourseId>,
        source: Option<Source>,
    ) -> Result<Vec<ExamResult>, StorageError>;

    /// Answer rows of a stored exam, in the order they were written.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn answers_for_result(
        &self,
        result_id: ExamResultId,
    ) -> Result<Vec<ExamAnswer>, StorageError>;

    /// Distinct questions the user has answered in the course, optionally
    /// only in exams of one source.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn answered_question_ids(
        &self,
        course_id: CourseId,
        user_id: UserId,
        source: Option<Source>,
    ) -> Result<HashSet<QuestionId>, StorageError>;

    /// Questions the user has been shown in any exam of the course.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn seen_question_ids(
        &self,
        course_id: CourseId,
        user_id: UserId,
    ) -> Result<HashSet<QuestionId>, StorageError>;

    /// Questions the user has answered `--` at least once.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn wrong_question_ids(
        &self,
        course_id: CourseId,
        user_id: UserId,
        source: Option<Source>,
    ) -> Result<HashSet<QuestionId>, StorageError>;
}

//
// ─── IN-MEMORY ─────────────────────────────────────────────────────────────────
//

#[derive(Default)]
struct MemoryState {
    courses: BTreeMap<CourseId, Course>,
    users: BTreeMap<UserId, User>,
    questions: BTreeMap<QuestionId, Question>,
    results: BTreeMap<ExamResultId, ExamResult>,
    answers: Vec<(ExamResultId, ExamAnswer)>,
}

impl MemoryState {
    fn answers_of_user(
        &self,
        course_id: CourseId,
        user_id: UserId,
        source: Option<Source>,
    ) -> impl Iterator<Item = &ExamAnswer> {
        self.answers.iter().filter_map(move |(rid, answer)| {
            let result = self.results.get(rid)?;
            let matches = result.user_id == user_id
                && result.course_id == course_id
                && source.is_none_or(|s| result.source == s);
            matches.then_some(answer)
        })
    }
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StorageError> {
        self.state
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }
}

fn next_key<K: Copy, V>(map: &BTreeMap<K, V>, value: impl Fn(K) -> u64) -> u64 {
    map.keys().next_back().map_or(1, |k| value(*k) + 1)
}

#[async_trait]
impl CourseRepository for InMemoryRepository {
    async fn insert_course(&self, course: &NewCourse) -> Result<CourseId, StorageError> {
        let mut guard = self.lock()?;
        let id = CourseId::new(next_key(&guard.courses, |k| k.value()));
        let course = Course::new(id, course.title.clone(), course.description.clone())
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        guard.courses.insert(id, course);
        Ok(id)
    }

    async fn upsert_course(&self, course: &Course) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        guard.courses.insert(course.id(), course.clone());
        Ok(())
    }

    async fn get_course(&self, id: CourseId) -> Result<Option<Course>, StorageError> {
        let guard = self.lock()?;
        Ok(guard.courses.get(&id).cloned())
    }

    async fn list_courses(&self) -> Result<Vec<Course>, StorageError> {
        let guard = self.lock()?;
        let mut courses: Vec<Course> = guard.courses.values().cloned().collect();
        courses.sort_by(|a, b| a.title().cmp(b.title()).then(a.id().cmp(&b.id())));
        Ok(courses)
    }
}

#[async_trait]
impl UserRepository for InMemoryRepository {
    async fn upsert_user(&self, user: &User) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        guard.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, StorageError> {
        let guard = self.lock()?;
        Ok(guard.users.get(&id).cloned())
    }

    async fn get_users(&self, ids: &[UserId]) -> Result<Vec<User>, StorageError> {
        let guard = self.lock()?;
        Ok(ids.iter().filter_map(|id| guard.users.get(id).cloned()).collect())
    }
}

#[async_trait]
impl QuestionRepository for InMemoryRepository {
    async fn insert_question(&self, question: &NewQuestion) -> Result<QuestionId, StorageError> {
        let mut guard = self.lock()?;
        if !guard.courses.contains_key(&question.course_id) {
            return Err(StorageError::NotFound);
        }
        let id = QuestionId::new(next_key(&guard.questions, |k| k.value()));
        guard.questions.insert(id, question.clone().assign_id(id));
        Ok(id)
    }

    async fn questions(
        &self,
        course_id: CourseId,
        source: Source,
    ) -> Result<Vec<Question>, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .questions
            .values()
            .filter(|q| q.course_id() == course_id && q.source() == source)
            .cloned()
            .collect())
    }

    async fn question_count(
        &self,
        course_id: CourseId,
        source: Source,
    ) -> Result<usize, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .questions
            .values()
            .filter(|q| q.course_id() == course_id && q.source() == source)
            .count())
    }

    async fn themes(&self, course_id: CourseId, source: Source) -> Result<Vec<String>, StorageError> {
        let guard = self.lock()?;
        let themes: BTreeSet<String> = guard
            .questions
            .values()
            .filter(|q| q.course_id() == course_id && q.source() == source)
            .filter_map(|q| q.theme().map(str::to_string))
            .collect();
        Ok(themes.into_iter().collect())
    }
}

#[async_trait]
impl ExamRepository for InMemoryRepository {
    async fn append_result(&self, result: &NewExamResult) -> Result<ExamResultId, StorageError> {
        let mut guard = self.lock()?;
        let id = ExamResultId::new(next_key(&guard.results, |k| k.value()));
        guard.results.insert(id, result.clone().assign_id(id));
        Ok(id)
    }

    async fn append_answers(
        &self,
        result_id: ExamResultId,
        answers: &[ExamAnswer],
    ) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        if !guard.results.contains_key(&result_id) {
            return Err(StorageError::NotFound);
        }
        guard
            .answers
            .extend(answers.iter().cloned().map(|a| (result_id, a)));
        Ok(())
    }

    async fn results_for_user(
        &self,
        user_id: UserId,
        course_id: CourseId,
        source: Option<Source>,
    ) -> Result<Vec<ExamResult>, StorageError> {
        let guard = self.lock()?;
        let mut results: Vec<ExamResult> = guard
            .results
            .values()
            .filter(|r| r.user_id == user_id && r.course_id == course_id)
            .filter(|r| source.is_none_or(|s| r.source == s))
            .cloned()
            .collect();
        results.sort_by_key(|r| std::cmp::Reverse((r.created_at, r.id)));
        Ok(results)
    }

    async fn results_for_course(
        &self,
        course_id: Option<CourseId>,
        source: Option<Source>,
    ) -> Result<Vec<ExamResult>, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .results
            .values()
            .filter(|r| course_id.is_none_or(|c| r.course_id == c))
            .filter(|r| source.is_none_or(|s| r.source == s))
            .cloned()
            .collect())
    }

    async fn answers_for_result(
        &self,
        result_id: ExamResultId,
    ) -> Result<Vec<ExamAnswer>, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .answers
            .iter()
            .filter(|(rid, _)| *rid == result_id)
            .map(|(_, a)| a.clone())
            .collect())
    }

    async fn answered_question_ids(
        &self,
        course_id: CourseId,
        user_id: UserId,
        source: Option<Source>,
    ) -> Result<HashSet<QuestionId>, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .answers_of_user(course_id, user_id, source)
            .map(|a| a.question_id)
            .collect())
    }

    async fn seen_question_ids(
        &self,
        course_id: CourseId,
        user_id: UserId,
    ) -> Result<HashSet<QuestionId>, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .answers_of_user(course_id, user_id, None)
            .map(|a| a.question_id)
            .collect())
    }

    async fn wrong_question_ids(
        &self,
        course_id: CourseId,
        user_id: UserId,
        source: Option<Source>,
    ) -> Result<HashSet<QuestionId>, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .answers_of_user(course_id, user_id, source)
            .filter(|a| a.weight == exam_core::model::AnswerWeight::FullyIncorrect)
            .map(|a| a.question_id)
            .collect())
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub courses: Arc<dyn CourseRepository>,
    pub users: Arc<dyn UserRepository>,
    pub questions: Arc<dyn QuestionRepository>,
    pub exams: Arc<dyn ExamRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        Self {
            courses: Arc::new(repo.clone()),
            users: Arc::new(repo.clone()),
            questions: Arc::new(repo.clone()),
            exams: Arc::new(repo),
        }
    }
}

/// Map user ids to display names, skipping users without one.
///
/// # Errors
///
/// Returns `StorageError` on backend failures.
pub async fn user_names(
    users: &dyn UserRepository,
    ids: &[UserId],
) -> Result<HashMap<UserId, String>, StorageError> {
    Ok(users
        .get_users(ids)
        .await?
        .into_iter()
        .filter_map(|u| u.name.map(|name| (u.id, name)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use exam_core::model::{AnswerWeight, UserRole};
    use exam_core::time::fixed_now;

    fn new_question(course_id: CourseId, source: Source, theme: Option<&str>) -> NewQuestion {
        NewQuestion {
            course_id,
            source,
            text: "Q".into(),
            answers: vec![
                Answer::new("yes", AnswerWeight::FullyCorrect),
                Answer::new("no", AnswerWeight::FullyIncorrect),
            ],
            theme: theme.map(str::to_string),
            explanation: None,
        }
    }

    fn new_result(user: u64, course_id: CourseId, source: Source, minutes: i64) -> NewExamResult {
        NewExamResult {
            user_id: UserId::new(user),
            course_id,
            source,
            grade: Grade::from_tenths(120),
            total_questions: 2,
            correct_count: 1,
            created_at: fixed_now() + chrono::Duration::minutes(minutes),
        }
    }

    async fn course(repo: &InMemoryRepository, title: &str) -> CourseId {
        repo.insert_course(&NewCourse {
            title: title.into(),
            description: None,
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn questions_are_scoped_by_course_and_source() {
        let repo = InMemoryRepository::new();
        let c1 = course(&repo, "Anatomy").await;
        let c2 = course(&repo, "Biology").await;
        repo.insert_question(&new_question(c1, Source::Ai, Some("Heart"))).await.unwrap();
        repo.insert_question(&new_question(c1, Source::Ai, Some("Bones"))).await.unwrap();
        repo.insert_question(&new_question(c1, Source::Ai, Some("Heart"))).await.unwrap();
        repo.insert_question(&new_question(c1, Source::Kahoots, None)).await.unwrap();
        repo.insert_question(&new_question(c2, Source::Ai, None)).await.unwrap();

        assert_eq!(repo.questions(c1, Source::Ai).await.unwrap().len(), 3);
        assert_eq!(repo.question_count(c1, Source::Kahoots).await.unwrap(), 1);
        assert_eq!(
            repo.themes(c1, Source::Ai).await.unwrap(),
            vec!["Bones".to_string(), "Heart".to_string()]
        );
        assert!(repo.themes(c2, Source::Ai).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn inserting_into_missing_course_fails() {
        let repo = InMemoryRepository::new();
        let err = repo
            .insert_question(&new_question(CourseId::new(9), Source::Ai, None))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound));
    }

    #[tokio::test]
    async fn history_tracks_seen_and_wrong() {
        let repo = InMemoryRepository::new();
        let c = course(&repo, "Anatomy").await;
        let q1 = repo.insert_question(&new_question(c, Source::Ai, None)).await.unwrap();
        let q2 = repo.insert_question(&new_question(c, Source::Ai, None)).await.unwrap();
        let q3 = repo.insert_question(&new_question(c, Source::Previous, None)).await.unwrap();

        let r1 = repo.append_result(&new_result(1, c, Source::Ai, 0)).await.unwrap();
        repo.append_answers(
            r1,
            &[
                ExamAnswer::answered(q1, "yes", AnswerWeight::FullyCorrect),
                ExamAnswer::unanswered(q2),
            ],
        )
        .await
        .unwrap();
        let r2 = repo.append_result(&new_result(1, c, Source::Previous, 1)).await.unwrap();
        repo.append_answers(r2, &[ExamAnswer::answered(q3, "no", AnswerWeight::FullyIncorrect)])
            .await
            .unwrap();
        let other = repo.append_result(&new_result(2, c, Source::Ai, 2)).await.unwrap();
        repo.append_answers(other, &[ExamAnswer::unanswered(q1)]).await.unwrap();

        let user = UserId::new(1);
        let seen = repo.seen_question_ids(c, user).await.unwrap();
        assert_eq!(seen, [q1, q2, q3].into_iter().collect());

        let wrong_all = repo.wrong_question_ids(c, user, None).await.unwrap();
        assert_eq!(wrong_all, [q2, q3].into_iter().collect());
        let wrong_ai = repo.wrong_question_ids(c, user, Some(Source::Ai)).await.unwrap();
        assert_eq!(wrong_ai, [q2].into_iter().collect());

        let results = repo.results_for_user(user, c, None).await.unwrap();
        assert_eq!(results.iter().map(|r| r.id).collect::<Vec<_>>(), vec![r2, r1]);
        assert_eq!(repo.results_for_course(Some(c), Some(Source::Ai)).await.unwrap().len(), 2);
        assert_eq!(repo.answers_for_result(r1).await.unwrap().len(), 2);
        assert_eq!(
            repo.answered_question_ids(c, user, Some(Source::Ai)).await.unwrap(),
            [q1, q2].into_iter().collect()
        );
        assert_eq!(repo.answered_question_ids(c, user, None).await.unwrap().len(), 3);
        assert!(
            repo.answered_question_ids(c, UserId::new(9), None)
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn answers_require_existing_result() {
        let repo = InMemoryRepository::new();
        let err = repo
            .append_answers(ExamResultId::new(5), &[ExamAnswer::unanswered(QuestionId::new(1))])
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound));
    }

    #[tokio::test]
    async fn user_names_skip_missing() {
        let repo = InMemoryRepository::new();
        repo.upsert_user(&User::new(UserId::new(1), Some("Ana".into()), UserRole::Student))
            .await
            .unwrap();
        repo.upsert_user(&User::new(UserId::new(2), None, UserRole::Admin))
            .await
            .unwrap();

        let names = user_names(&repo, &[UserId::new(1), UserId::new(2), UserId::new(3)])
            .await
            .unwrap();
        assert_eq!(names.len(), 1);
        assert_eq!(names.get(&UserId::new(1)).map(String::as_str), Some("Ana"));
    }

    #[tokio::test]
    async fn courses_list_sorted_by_title() {
        let repo = InMemoryRepository::new();
        course(&repo, "Zoology").await;
        course(&repo, "Anatomy").await;
        let titles: Vec<_> = repo
            .list_courses()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.title().to_string())
            .collect();
        assert_eq!(titles, vec!["Anatomy", "Zoology"]);
    }
}
