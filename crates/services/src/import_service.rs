//! Bulk question import from JSON.
//!
//! Two payload shapes are accepted: a bare array of questions, or a quiz
//! export object with a `questions` array and an optional
//! `kahoot_info.theme` applied to questions that carry no theme of their own.

use std::fmt;
use std::sync::Arc;

use exam_core::model::{Answer, AnswerWeight, CourseId, QuestionError, Source, validate_content};
use serde::Deserialize;
use storage::repository::{CourseRepository, NewQuestion, QuestionRepository};

use crate::error::ImportError;

/// One validation problem, numbered from 1 as a person reading the file would.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportIssue {
    pub question: usize,
    pub answer: Option<usize>,
    pub message: String,
}

impl ImportIssue {
    fn question(question: usize, message: impl Into<String>) -> Self {
        Self {
            question,
            answer: None,
            message: message.into(),
        }
    }

    fn answer(question: usize, answer: usize, message: impl Into<String>) -> Self {
        Self {
            question,
            answer: Some(answer),
            message: message.into(),
        }
    }
}

impl fmt::Display for ImportIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.answer {
            Some(answer) => write!(
                f,
                "question {}, answer {}: {}",
                self.question, answer, self.message
            ),
            None => write!(f, "question {}: {}", self.question, self.message),
        }
    }
}

/// A validated question, not yet bound to a course or source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedQuestion {
    pub text: String,
    pub answers: Vec<Answer>,
    pub theme: Option<String>,
    pub explanation: Option<String>,
}

/// Questions that passed validation and can be written.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ImportBatch {
    pub questions: Vec<ImportedQuestion>,
}

impl ImportBatch {
    #[must_use]
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ImportReport {
    pub created: usize,
    /// Per-question storage failures, numbered from 1.
    pub errors: Vec<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawPayload {
    List(Vec<serde_json::Value>),
    Export {
        questions: Vec<serde_json::Value>,
        #[serde(default)]
        kahoot_info: Option<RawQuizInfo>,
    },
}

#[derive(Deserialize, Default)]
struct RawQuizInfo {
    #[serde(default)]
    theme: Option<String>,
}

#[derive(Deserialize, Default)]
struct RawQuestion {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    answers: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    theme: Option<String>,
    #[serde(default)]
    explanation: Option<String>,
}

#[derive(Deserialize, Default)]
struct RawAnswer {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    value: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn content_issue(number: usize, answer_numbers: &[usize], error: QuestionError) -> ImportIssue {
    let answer_number = |index: usize| answer_numbers.get(index).copied().unwrap_or(index + 1);
    match error {
        QuestionError::EmptyText => ImportIssue::question(number, "text is missing"),
        QuestionError::TooFewAnswers(count) => ImportIssue::question(
            number,
            format!("needs at least 2 answers, got {count}"),
        ),
        QuestionError::EmptyAnswerText { index } => {
            ImportIssue::answer(number, answer_number(index), "text is missing")
        }
        QuestionError::InvalidWeight { index, raw } if raw.is_empty() => {
            ImportIssue::answer(number, answer_number(index), "value is missing")
        }
        QuestionError::InvalidWeight { index, raw } => ImportIssue::answer(
            number,
            answer_number(index),
            format!("invalid value {raw:?}, expected one of ++ + - --"),
        ),
        QuestionError::NoCorrectAnswer => ImportIssue::question(number, "no answer is marked ++"),
        other => ImportIssue::question(number, other.to_string()),
    }
}

fn validate_question(
    number: usize,
    raw: serde_json::Value,
    default_theme: Option<&str>,
    issues: &mut Vec<ImportIssue>,
) -> Option<ImportedQuestion> {
    let Ok(raw) = serde_json::from_value::<RawQuestion>(raw) else {
        issues.push(ImportIssue::question(number, "must be an object"));
        return None;
    };
    let before = issues.len();

    let text = non_blank(raw.text).unwrap_or_default();
    let mut answers = Vec::new();
    let mut answer_numbers = Vec::new();
    for (i, value) in raw.answers.unwrap_or_default().into_iter().enumerate() {
        let Ok(raw_answer) = serde_json::from_value::<RawAnswer>(value) else {
            issues.push(ImportIssue::answer(number, i + 1, "must be an object"));
            continue;
        };
        let symbol = raw_answer.value.unwrap_or_default();
        answers.push(Answer::new(
            non_blank(raw_answer.text).unwrap_or_default(),
            AnswerWeight::parse(symbol.trim()),
        ));
        answer_numbers.push(i + 1);
    }

    if let Err(errors) = validate_content(&text, &answers) {
        issues.extend(
            errors
                .into_iter()
                .map(|error| content_issue(number, &answer_numbers, error)),
        );
    }

    if issues.len() > before {
        return None;
    }
    Some(ImportedQuestion {
        text,
        answers,
        theme: non_blank(raw.theme).or_else(|| default_theme.map(str::to_string)),
        explanation: non_blank(raw.explanation),
    })
}

/// Validates question files and writes them into a course pool.
#[derive(Clone)]
pub struct ImportService {
    courses: Arc<dyn CourseRepository>,
    questions: Arc<dyn QuestionRepository>,
}

impl ImportService {
    #[must_use]
    pub fn new(courses: Arc<dyn CourseRepository>, questions: Arc<dyn QuestionRepository>) -> Self {
        Self { courses, questions }
    }

    /// Parse and validate an import payload.
    ///
    /// Every question is checked before returning, so the error lists all
    /// problems at once.
    ///
    /// # Errors
    ///
    /// Returns `ImportError::Json` for malformed JSON, `ImportError::UnexpectedShape`
    /// for a payload of the wrong shape, `ImportError::Empty` when there are no
    /// questions, and `ImportError::Invalid` with every validation issue.
    pub fn parse(json: &str) -> Result<ImportBatch, ImportError> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        let payload: RawPayload =
            serde_json::from_value(value).map_err(|_| ImportError::UnexpectedShape)?;

        let (raw_questions, default_theme) = match payload {
            RawPayload::List(questions) => (questions, None),
            RawPayload::Export {
                questions,
                kahoot_info,
            } => (questions, non_blank(kahoot_info.unwrap_or_default().theme)),
        };
        if raw_questions.is_empty() {
            return Err(ImportError::Empty);
        }

        let mut issues = Vec::new();
        let questions: Vec<ImportedQuestion> = raw_questions
            .into_iter()
            .enumerate()
            .filter_map(|(i, raw)| {
                validate_question(i + 1, raw, default_theme.as_deref(), &mut issues)
            })
            .collect();

        if issues.is_empty() {
            Ok(ImportBatch { questions })
        } else {
            Err(ImportError::Invalid(issues))
        }
    }

    /// Write a validated batch into `course_id`'s `source` pool.
    ///
    /// Individual insert failures are collected in the report and do not stop
    /// the remaining questions.
    ///
    /// # Errors
    ///
    /// Returns `ImportError::UnknownCourse` if the course does not exist, or
    /// `ImportError::Storage` if the course lookup fails.
    pub async fn import(
        &self,
        course_id: CourseId,
        source: Source,
        batch: ImportBatch,
    ) -> Result<ImportReport, ImportError> {
        if self.courses.get_course(course_id).await?.is_none() {
            return Err(ImportError::UnknownCourse(course_id));
        }

        let mut report = ImportReport::default();
        for (i, question) in batch.questions.into_iter().enumerate() {
            let record = NewQuestion {
                course_id,
                source,
                text: question.text,
                answers: question.answers,
                theme: question.theme,
                explanation: question.explanation,
            };
            match self.questions.insert_question(&record).await {
                Ok(_) => report.created += 1,
                Err(err) => {
                    tracing::warn!(question = i + 1, error = %err, "failed to import question");
                    report.errors.push(format!("question {}: {err}", i + 1));
                }
            }
        }

        tracing::info!(
            course = %course_id,
            source = %source,
            created = report.created,
            failed = report.errors.len(),
            "imported questions"
        );
        Ok(report)
    }

    /// Parse `json` and import it in one step.
    ///
    /// # Errors
    ///
    /// Returns any error from [`ImportService::parse`] or [`ImportService::import`].
    pub async fn import_json(
        &self,
        course_id: CourseId,
        source: Source,
        json: &str,
    ) -> Result<ImportReport, ImportError> {
        let batch = Self::parse(json)?;
        self.import(course_id, source, batch).await
    }
}
