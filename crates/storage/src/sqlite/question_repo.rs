use chrono::Utc;
use exam_core::model::{CourseId, Question, QuestionId, Source};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{answers_to_json, conn, id_to_i64, map_question_row, question_id_from_i64, ser};
use crate::repository::{NewQuestion, QuestionRepository, StorageError};

#[async_trait::async_trait]
impl QuestionRepository for SqliteRepository {
    async fn insert_question(&self, question: &NewQuestion) -> Result<QuestionId, StorageError> {
        let course_id = id_to_i64("course_id", question.course_id.value())?;
        let exists = sqlx::query("SELECT 1 FROM courses WHERE id = ?1")
            .bind(course_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;
        if exists.is_none() {
            return Err(StorageError::NotFound);
        }

        let theme = question
            .theme
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty());

        let res = sqlx::query(
            r"
            INSERT INTO questions (course_id, source, text, answers, theme, explanation, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ",
        )
        .bind(course_id)
        .bind(question.source.as_str())
        .bind(&question.text)
        .bind(answers_to_json(&question.answers)?)
        .bind(theme)
        .bind(question.explanation.as_deref())
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        question_id_from_i64(res.last_insert_rowid())
    }

    async fn questions(
        &self,
        course_id: CourseId,
        source: Source,
    ) -> Result<Vec<Question>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, course_id, source, text, answers, theme, explanation
            FROM questions
            WHERE course_id = ?1 AND source = ?2
            ORDER BY id ASC
            ",
        )
        .bind(id_to_i64("course_id", course_id.value())?)
        .bind(source.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_question_row).collect()
    }

    async fn question_count(
        &self,
        course_id: CourseId,
        source: Source,
    ) -> Result<usize, StorageError> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS n FROM questions WHERE course_id = ?1 AND source = ?2",
        )
        .bind(id_to_i64("course_id", course_id.value())?)
        .bind(source.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(conn)?;

        let n: i64 = row.try_get("n").map_err(ser)?;
        usize::try_from(n).map_err(|_| StorageError::Serialization(format!("invalid count: {n}")))
    }

    async fn themes(&self, course_id: CourseId, source: Source) -> Result<Vec<String>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT DISTINCT theme
            FROM questions
            WHERE course_id = ?1 AND source = ?2 AND theme IS NOT NULL AND theme <> ''
            ORDER BY theme ASC
            ",
        )
        .bind(id_to_i64("course_id", course_id.value())?)
        .bind(source.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("theme").map_err(ser))
            .collect()
    }
}
