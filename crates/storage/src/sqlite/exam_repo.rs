use std::collections::HashSet;

use exam_core::model::{CourseId, ExamAnswer, ExamResult, ExamResultId, QuestionId, Source, UserId};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{
    conn, exam_result_id_from_i64, id_to_i64, map_answer_row, map_result_row,
    question_id_from_i64, ser,
};
use crate::repository::{ExamRepository, NewExamResult, StorageError};

const RESULT_COLUMNS: &str =
    "id, user_id, course_id, source, grade_tenths, total_questions, correct_count, created_at";

#[async_trait::async_trait]
impl ExamRepository for SqliteRepository {
    async fn append_result(&self, result: &NewExamResult) -> Result<ExamResultId, StorageError> {
        let res = sqlx::query(
            r"
            INSERT INTO exam_results
                (user_id, course_id, source, grade_tenths, total_questions, correct_count, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ",
        )
        .bind(id_to_i64("user_id", result.user_id.value())?)
        .bind(id_to_i64("course_id", result.course_id.value())?)
        .bind(result.source.as_str())
        .bind(i64::from(result.grade.tenths()))
        .bind(i64::from(result.total_questions))
        .bind(i64::from(result.correct_count))
        .bind(result.created_at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        exam_result_id_from_i64(res.last_insert_rowid())
    }

    async fn append_answers(
        &self,
        result_id: ExamResultId,
        answers: &[ExamAnswer],
    ) -> Result<(), StorageError> {
        let rid = id_to_i64("exam_result_id", result_id.value())?;
        let mut tx = self.pool.begin().await.map_err(conn)?;

        let exists = sqlx::query("SELECT 1 FROM exam_results WHERE id = ?1")
            .bind(rid)
            .fetch_optional(&mut *tx)
            .await
            .map_err(conn)?;
        if exists.is_none() {
            return Err(StorageError::NotFound);
        }

        for answer in answers {
            sqlx::query(
                r"
                INSERT INTO exam_answers (exam_result_id, question_id, selected_text, answer_value)
                VALUES (?1, ?2, ?3, ?4)
                ",
            )
            .bind(rid)
            .bind(id_to_i64("question_id", answer.question_id.value())?)
            .bind(answer.selected_text.as_deref())
            .bind(answer.weight.as_str())
            .execute(&mut *tx)
            .await
            .map_err(conn)?;
        }

        tx.commit().await.map_err(conn)?;
        Ok(())
    }

    async fn results_for_user(
        &self,
        user_id: UserId,
        course_id: CourseId,
        source: Option<Source>,
    ) -> Result<Vec<ExamResult>, StorageError> {
        let sql = format!(
            r"
            SELECT {RESULT_COLUMNS}
            FROM exam_results
            WHERE user_id = ?1 AND course_id = ?2 AND (?3 IS NULL OR source = ?3)
            ORDER BY created_at DESC, id DESC
            "
        );
        let rows = sqlx::query(&sql)
            .bind(id_to_i64("user_id", user_id.value())?)
            .bind(id_to_i64("course_id", course_id.value())?)
            .bind(source.map(Source::as_str))
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;

        rows.iter().map(map_result_row).collect()
    }

    async fn results_for_course(
        &self,
        course_id: Option<CourseId>,
        source: Option<Source>,
    ) -> Result<Vec<ExamResult>, StorageError> {
        let sql = format!(
            r"
            SELECT {RESULT_COLUMNS}
            FROM exam_results
            WHERE (?1 IS NULL OR course_id = ?1) AND (?2 IS NULL OR source = ?2)
            ORDER BY id ASC
            "
        );
        let course_id = course_id
            .map(|c| id_to_i64("course_id", c.value()))
            .transpose()?;
        let rows = sqlx::query(&sql)
            .bind(course_id)
            .bind(source.map(Source::as_str))
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;

        rows.iter().map(map_result_row).collect()
    }

    async fn answers_for_result(
        &self,
        result_id: ExamResultId,
    ) -> Result<Vec<ExamAnswer>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT question_id, selected_text, answer_value
            FROM exam_answers
            WHERE exam_result_id = ?1
            ORDER BY id ASC
            ",
        )
        .bind(id_to_i64("exam_result_id", result_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_answer_row).collect()
    }

    async fn answered_question_ids(
        &self,
        course_id: CourseId,
        user_id: UserId,
        source: Option<Source>,
    ) -> Result<HashSet<QuestionId>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT DISTINCT a.question_id
            FROM exam_answers a
            JOIN exam_results r ON r.id = a.exam_result_id
            WHERE r.course_id = ?1
              AND r.user_id = ?2
              AND (?3 IS NULL OR r.source = ?3)
            ",
        )
        .bind(id_to_i64("course_id", course_id.value())?)
        .bind(id_to_i64("user_id", user_id.value())?)
        .bind(source.map(Source::as_str))
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        collect_question_ids(&rows)
    }

    async fn seen_question_ids(
        &self,
        course_id: CourseId,
        user_id: UserId,
    ) -> Result<HashSet<QuestionId>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT DISTINCT a.question_id
            FROM exam_answers a
            JOIN exam_results r ON r.id = a.exam_result_id
            WHERE r.course_id = ?1 AND r.user_id = ?2
            ",
        )
        .bind(id_to_i64("course_id", course_id.value())?)
        .bind(id_to_i64("user_id", user_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        collect_question_ids(&rows)
    }

    async fn wrong_question_ids(
        &self,
        course_id: CourseId,
        user_id: UserId,
        source: Option<Source>,
    ) -> Result<HashSet<QuestionId>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT DISTINCT a.question_id
            FROM exam_answers a
            JOIN exam_results r ON r.id = a.exam_result_id
            WHERE r.course_id = ?1
              AND r.user_id = ?2
              AND (?3 IS NULL OR r.source = ?3)
              AND a.answer_value = '--'
            ",
        )
        .bind(id_to_i64("course_id", course_id.value())?)
        .bind(id_to_i64("user_id", user_id.value())?)
        .bind(source.map(Source::as_str))
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        collect_question_ids(&rows)
    }
}

fn collect_question_ids(rows: &[sqlx::sqlite::SqliteRow]) -> Result<HashSet<QuestionId>, StorageError> {
    rows.iter()
        .map(|row| question_id_from_i64(row.try_get("question_id").map_err(ser)?))
        .collect()
}
