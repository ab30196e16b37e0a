use chrono::{DateTime, Utc};

use crate::model::ids::{CourseId, ExamResultId, QuestionId, UserId};
use crate::model::question::{AnswerWeight, Source};
use crate::scoring::Grade;

/// Persisted summary of a finished exam.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExamResult {
    pub id: ExamResultId,
    pub user_id: UserId,
    pub course_id: CourseId,
    pub source: Source,
    pub grade: Grade,
    pub total_questions: u32,
    pub correct_count: u32,
    pub created_at: DateTime<Utc>,
}

impl ExamResult {
    #[must_use]
    pub fn passed(&self) -> bool {
        self.grade.is_passing()
    }
}

/// What the user picked for one question of an exam.
///
/// `selected_text` is `None` when the question was left unanswered; such rows
/// carry weight `--` so they count towards the user's wrong history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExamAnswer {
    pub question_id: QuestionId,
    pub selected_text: Option<String>,
    pub weight: AnswerWeight,
}

impl ExamAnswer {
    #[must_use]
    pub fn answered(question_id: QuestionId, text: impl Into<String>, weight: AnswerWeight) -> Self {
        Self {
            question_id,
            selected_text: Some(text.into()),
            weight,
        }
    }

    #[must_use]
    pub fn unanswered(question_id: QuestionId) -> Self {
        Self {
            question_id,
            selected_text: None,
            weight: AnswerWeight::FullyIncorrect,
        }
    }

    #[must_use]
    pub fn is_answered(&self) -> bool {
        self.selected_text.is_some()
    }
}
