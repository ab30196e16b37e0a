use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

use crate::model::exam::ExamAnswer;
use crate::model::ids::{CourseId, QuestionId};
use crate::model::question::{Answer, Question, Source};
use crate::scoring::{ScoreResult, ScoringVariant, compute_score};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ExamSessionError {
    #[error("question {0} is not part of this exam")]
    UnknownQuestion(QuestionId),

    #[error("answer index {index} out of range for question {question_id} ({len} answers)")]
    AnswerOutOfRange {
        question_id: QuestionId,
        index: usize,
        len: usize,
    },
}

/// Aggregated view of exam progress, useful for UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExamProgress {
    pub total: usize,
    pub answered: usize,
    pub remaining: usize,
    pub is_complete: bool,
}

/// An in-progress exam: the selected questions plus the user's current picks.
///
/// Each question holds at most one answer; answering again replaces the
/// previous choice. An exam with no questions is valid and simply empty.
#[derive(Clone)]
pub struct ExamSession {
    course_id: CourseId,
    source: Source,
    questions: Vec<Question>,
    answers: HashMap<QuestionId, Answer>,
    started_at: DateTime<Utc>,
}

impl ExamSession {
    #[must_use]
    pub fn new(
        course_id: CourseId,
        source: Source,
        questions: Vec<Question>,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            course_id,
            source,
            questions,
            answers: HashMap::new(),
            started_at,
        }
    }

    #[must_use]
    pub fn course_id(&self) -> CourseId {
        self.course_id
    }

    #[must_use]
    pub fn source(&self) -> Source {
        self.source
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn question(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }

    #[must_use]
    pub fn total_questions(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// Record the answer at `answer_index` for the given question.
    ///
    /// # Errors
    ///
    /// Returns `ExamSessionError::UnknownQuestion` if the question is not in the exam,
    /// or `ExamSessionError::AnswerOutOfRange` if the index has no answer.
    pub fn answer(
        &mut self,
        question_id: QuestionId,
        answer_index: usize,
    ) -> Result<&Answer, ExamSessionError> {
        let question = self
            .questions
            .iter()
            .find(|q| q.id() == question_id)
            .ok_or(ExamSessionError::UnknownQuestion(question_id))?;
        let answer = question.answers().get(answer_index).cloned().ok_or(
            ExamSessionError::AnswerOutOfRange {
                question_id,
                index: answer_index,
                len: question.answers().len(),
            },
        )?;

        Ok(self.answers.entry(question_id).insert_entry(answer).into_mut())
    }

    /// Drop the recorded answer for a question, if any.
    pub fn clear_answer(&mut self, question_id: QuestionId) -> Option<Answer> {
        self.answers.remove(&question_id)
    }

    #[must_use]
    pub fn answer_for(&self, question_id: QuestionId) -> Option<&Answer> {
        self.answers.get(&question_id)
    }

    #[must_use]
    pub fn is_answered(&self, question_id: QuestionId) -> bool {
        self.answers.contains_key(&question_id)
    }

    #[must_use]
    pub fn answered_count(&self) -> usize {
        self.answers.len()
    }

    #[must_use]
    pub fn progress(&self) -> ExamProgress {
        let total = self.total_questions();
        let answered = self.answered_count();
        ExamProgress {
            total,
            answered,
            remaining: total.saturating_sub(answered),
            is_complete: total > 0 && answered == total,
        }
    }

    /// Answered questions paired with their chosen answer, in exam order.
    pub fn answered_pairs(&self) -> impl Iterator<Item = (&Question, &Answer)> {
        self.questions
            .iter()
            .filter_map(|q| self.answers.get(&q.id()).map(|a| (q, a)))
    }

    #[must_use]
    pub fn scoring_variant(&self) -> ScoringVariant {
        ScoringVariant::for_source(self.source)
    }

    /// Grade the exam with the scheme matching its source.
    #[must_use]
    pub fn score(&self) -> ScoreResult {
        compute_score(
            self.answered_pairs(),
            self.total_questions(),
            self.scoring_variant(),
        )
    }

    /// One row per question in exam order, unanswered ones included.
    #[must_use]
    pub fn recorded_answers(&self) -> Vec<ExamAnswer> {
        self.questions
            .iter()
            .map(|q| match self.answers.get(&q.id()) {
                Some(a) => ExamAnswer::answered(q.id(), a.text.clone(), a.weight.clone()),
                None => ExamAnswer::unanswered(q.id()),
            })
            .collect()
    }
}

impl fmt::Debug for ExamSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExamSession")
            .field("course_id", &self.course_id)
            .field("source", &self.source)
            .field("questions_len", &self.questions.len())
            .field("answered", &self.answers.len())
            .field("started_at", &self.started_at)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AnswerWeight;
    use crate::time::fixed_now;

    fn question(id: u64) -> Question {
        Question::from_persisted(
            QuestionId::new(id),
            CourseId::new(1),
            Source::Previous,
            format!("Q{id}"),
            vec![
                Answer::new("right", AnswerWeight::FullyCorrect),
                Answer::new("close", AnswerWeight::PartiallyCorrect),
                Answer::new("wrong", AnswerWeight::FullyIncorrect),
            ],
            None,
            None,
        )
    }

    fn session(source: Source, n: u64) -> ExamSession {
        ExamSession::new(
            CourseId::new(1),
            source,
            (1..=n).map(question).collect(),
            fixed_now(),
        )
    }

    #[test]
    fn re_answering_replaces_previous_choice() {
        let mut exam = session(Source::Previous, 2);
        let first = exam.answer(QuestionId::new(1), 2).unwrap();
        assert_eq!(first.text, "wrong");
        let second = exam.answer(QuestionId::new(1), 0).unwrap();
        assert_eq!(second.text, "right");

        assert_eq!(exam.answered_count(), 1);
        assert_eq!(
            exam.answer_for(QuestionId::new(1)).unwrap().weight,
            AnswerWeight::FullyCorrect
        );
    }

    #[test]
    fn answering_unknown_question_fails() {
        let mut exam = session(Source::Previous, 1);
        let err = exam.answer(QuestionId::new(9), 0).unwrap_err();
        assert_eq!(err, ExamSessionError::UnknownQuestion(QuestionId::new(9)));
    }

    #[test]
    fn answer_index_out_of_range_fails() {
        let mut exam = session(Source::Previous, 1);
        let err = exam.answer(QuestionId::new(1), 3).unwrap_err();
        assert!(matches!(err, ExamSessionError::AnswerOutOfRange { len: 3, .. }));
        assert!(!exam.is_answered(QuestionId::new(1)));
    }

    #[test]
    fn progress_tracks_answers() {
        let mut exam = session(Source::Ai, 3);
        exam.answer(QuestionId::new(2), 1).unwrap();
        let progress = exam.progress();
        assert_eq!(progress.total, 3);
        assert_eq!(progress.answered, 1);
        assert_eq!(progress.remaining, 2);
        assert!(!progress.is_complete);

        exam.clear_answer(QuestionId::new(2));
        assert_eq!(exam.progress().answered, 0);
    }

    #[test]
    fn score_uses_source_variant() {
        let mut weighted = session(Source::Previous, 2);
        weighted.answer(QuestionId::new(1), 0).unwrap();
        weighted.answer(QuestionId::new(2), 2).unwrap();
        assert_eq!(weighted.score().grade.as_f64(), 0.0);

        let mut simple = session(Source::Kahoots, 2);
        simple.answer(QuestionId::new(1), 0).unwrap();
        simple.answer(QuestionId::new(2), 2).unwrap();
        let result = simple.score();
        assert_eq!(result.grade.as_f64(), 10.0);
        assert_eq!(result.correct_count, 1);
    }

    #[test]
    fn recorded_answers_mark_unanswered_as_wrong() {
        let mut exam = session(Source::Previous, 2);
        exam.answer(QuestionId::new(2), 1).unwrap();

        let rows = exam.recorded_answers();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].question_id, QuestionId::new(1));
        assert!(!rows[0].is_answered());
        assert_eq!(rows[0].weight, AnswerWeight::FullyIncorrect);
        assert_eq!(rows[1].selected_text.as_deref(), Some("close"));
    }

    #[test]
    fn empty_exam_is_valid() {
        let exam = session(Source::Ai, 0);
        assert!(exam.is_empty());
        assert_eq!(exam.score().grade.as_f64(), 0.0);
        assert!(!exam.progress().is_complete);
    }
}
