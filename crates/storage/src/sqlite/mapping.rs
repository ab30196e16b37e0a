use exam_core::Grade;
use exam_core::model::{
    Answer, AnswerWeight, CourseId, ExamAnswer, ExamResult, ExamResultId, Question, QuestionId,
    Source, UserId,
};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

pub(crate) fn id_to_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

pub(crate) fn course_id_from_i64(v: i64) -> Result<CourseId, StorageError> {
    Ok(CourseId::new(i64_to_u64("course_id", v)?))
}

pub(crate) fn question_id_from_i64(v: i64) -> Result<QuestionId, StorageError> {
    Ok(QuestionId::new(i64_to_u64("question_id", v)?))
}

pub(crate) fn user_id_from_i64(v: i64) -> Result<UserId, StorageError> {
    Ok(UserId::new(i64_to_u64("user_id", v)?))
}

pub(crate) fn exam_result_id_from_i64(v: i64) -> Result<ExamResultId, StorageError> {
    Ok(ExamResultId::new(i64_to_u64("exam_result_id", v)?))
}

pub(crate) fn parse_source(s: &str) -> Result<Source, StorageError> {
    s.parse::<Source>().map_err(ser)
}

/// Answers are stored as a JSON array of `{"text", "value"}` objects.
pub(crate) fn answers_to_json(answers: &[Answer]) -> Result<String, StorageError> {
    serde_json::to_string(answers).map_err(ser)
}

pub(crate) fn answers_from_json(raw: &str) -> Result<Vec<Answer>, StorageError> {
    serde_json::from_str(raw).map_err(ser)
}

fn u32_from_row(row: &SqliteRow, field: &'static str) -> Result<u32, StorageError> {
    let v: i64 = row.try_get(field).map_err(ser)?;
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn map_question_row(row: &SqliteRow) -> Result<Question, StorageError> {
    let source: String = row.try_get("source").map_err(ser)?;
    let answers: String = row.try_get("answers").map_err(ser)?;

    Ok(Question::from_persisted(
        question_id_from_i64(row.try_get("id").map_err(ser)?)?,
        course_id_from_i64(row.try_get("course_id").map_err(ser)?)?,
        parse_source(&source)?,
        row.try_get::<String, _>("text").map_err(ser)?,
        answers_from_json(&answers)?,
        row.try_get::<Option<String>, _>("theme").map_err(ser)?,
        row.try_get::<Option<String>, _>("explanation").map_err(ser)?,
    ))
}

pub(crate) fn map_result_row(row: &SqliteRow) -> Result<ExamResult, StorageError> {
    let source: String = row.try_get("source").map_err(ser)?;
    let tenths: i64 = row.try_get("grade_tenths").map_err(ser)?;
    let tenths = u16::try_from(tenths)
        .map_err(|_| StorageError::Serialization(format!("invalid grade: {tenths}")))?;

    Ok(ExamResult {
        id: exam_result_id_from_i64(row.try_get("id").map_err(ser)?)?,
        user_id: user_id_from_i64(row.try_get("user_id").map_err(ser)?)?,
        course_id: course_id_from_i64(row.try_get("course_id").map_err(ser)?)?,
        source: parse_source(&source)?,
        grade: Grade::from_tenths(tenths),
        total_questions: u32_from_row(row, "total_questions")?,
        correct_count: u32_from_row(row, "correct_count")?,
        created_at: row.try_get("created_at").map_err(ser)?,
    })
}

pub(crate) fn map_answer_row(row: &SqliteRow) -> Result<ExamAnswer, StorageError> {
    let value: String = row.try_get("answer_value").map_err(ser)?;
    Ok(ExamAnswer {
        question_id: question_id_from_i64(row.try_get("question_id").map_err(ser)?)?,
        selected_text: row.try_get("selected_text").map_err(ser)?,
        weight: AnswerWeight::parse(&value),
    })
}

/// Appends `?n, ?n+1, ...` placeholders for an `IN (...)` list starting at `first`.
pub(crate) fn push_placeholders(sql: &mut String, first: usize, count: usize) {
    for i in 0..count {
        if i > 0 {
            sql.push_str(", ");
        }
        sql.push('?');
        sql.push_str(&(first + i).to_string());
    }
}
