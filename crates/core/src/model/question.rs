use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::ids::{CourseId, QuestionId};

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question text cannot be empty")]
    EmptyText,

    #[error("question must have at least 2 answers, got {0}")]
    TooFewAnswers(usize),

    #[error("answer {index} text cannot be empty")]
    EmptyAnswerText { index: usize },

    #[error("answer {index} has an invalid weight: {raw:?}")]
    InvalidWeight { index: usize, raw: String },

    #[error("no answer is marked as fully correct (++)")]
    NoCorrectAnswer,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown question source: {0}")]
pub struct ParseSourceError(pub String);

//
// ─── SOURCE ───────────────────────────────────────────────────────────────────
//

/// Where a question pool comes from.
///
/// The source also decides how an exam over that pool is graded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// Questions from previous exam papers.
    Previous,
    /// Machine-generated practice questions.
    Ai,
    /// Quick-fire quiz questions, graded without penalties.
    Kahoots,
}

impl Source {
    pub const ALL: [Source; 3] = [Source::Previous, Source::Ai, Source::Kahoots];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Source::Previous => "previous",
            Source::Ai => "ai",
            Source::Kahoots => "kahoots",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Source {
    type Err = ParseSourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "previous" => Ok(Source::Previous),
            "ai" => Ok(Source::Ai),
            "kahoots" => Ok(Source::Kahoots),
            other => Err(ParseSourceError(other.to_string())),
        }
    }
}

//
// ─── ANSWER WEIGHT ────────────────────────────────────────────────────────────
//

/// Four-level weight tag attached to every answer choice.
///
/// Anything outside the four symbols is kept as `Unknown` so that bad data
/// read back from storage degrades to a zero-point answer instead of failing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AnswerWeight {
    /// `++`
    FullyCorrect,
    /// `+`
    PartiallyCorrect,
    /// `-`
    PartiallyIncorrect,
    /// `--`
    FullyIncorrect,
    Unknown(String),
}

impl AnswerWeight {
    /// Parses a weight symbol. Never fails.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw {
            "++" => Self::FullyCorrect,
            "+" => Self::PartiallyCorrect,
            "-" => Self::PartiallyIncorrect,
            "--" => Self::FullyIncorrect,
            other => Self::Unknown(other.to_string()),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::FullyCorrect => "++",
            Self::PartiallyCorrect => "+",
            Self::PartiallyIncorrect => "-",
            Self::FullyIncorrect => "--",
            Self::Unknown(raw) => raw.as_str(),
        }
    }

    /// Point contribution in hundredths of a point (`++` = 100).
    #[must_use]
    pub fn points_hundredths(&self) -> i64 {
        match self {
            Self::FullyCorrect => 100,
            Self::PartiallyCorrect => 33,
            Self::PartiallyIncorrect => -33,
            Self::FullyIncorrect => -100,
            Self::Unknown(_) => 0,
        }
    }

    #[must_use]
    pub fn is_correct(&self) -> bool {
        matches!(self, Self::FullyCorrect)
    }

    #[must_use]
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown(_))
    }
}

impl From<String> for AnswerWeight {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<AnswerWeight> for String {
    fn from(weight: AnswerWeight) -> Self {
        weight.as_str().to_string()
    }
}

impl fmt::Display for AnswerWeight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//
// ─── ANSWER ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    #[serde(rename = "value")]
    pub weight: AnswerWeight,
}

impl Answer {
    #[must_use]
    pub fn new(text: impl Into<String>, weight: AnswerWeight) -> Self {
        Self {
            text: text.into(),
            weight,
        }
    }
}

//
// ─── QUESTION ─────────────────────────────────────────────────────────────────
//

/// A multiple-choice question belonging to a course and source pool.
///
/// Questions are never mutated once created; the selector hands out copies
/// with their answers reordered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    id: QuestionId,
    course_id: CourseId,
    source: Source,
    text: String,
    answers: Vec<Answer>,
    theme: Option<String>,
    explanation: Option<String>,
}

impl Question {
    /// Rehydrate a question from storage without re-validating it.
    #[must_use]
    pub fn from_persisted(
        id: QuestionId,
        course_id: CourseId,
        source: Source,
        text: String,
        answers: Vec<Answer>,
        theme: Option<String>,
        explanation: Option<String>,
    ) -> Self {
        Self {
            id,
            course_id,
            source,
            text,
            answers,
            theme: theme.filter(|t| !t.is_empty()),
            explanation,
        }
    }

    #[must_use]
    pub fn id(&self) -> QuestionId {
        self.id
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
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn answers(&self) -> &[Answer] {
        &self.answers
    }

    #[must_use]
    pub fn theme(&self) -> Option<&str> {
        self.theme.as_deref()
    }

    #[must_use]
    pub fn explanation(&self) -> Option<&str> {
        self.explanation.as_deref()
    }

    /// First fully-correct answer, if the question has one.
    #[must_use]
    pub fn correct_answer(&self) -> Option<&Answer> {
        self.answers.iter().find(|a| a.weight.is_correct())
    }

    pub(crate) fn answers_mut(&mut self) -> &mut [Answer] {
        &mut self.answers
    }
}

/// Checks the content rules enforced at import time.
///
/// Every violation is reported, in reading order: question text, answer count,
/// each answer's text then weight, and finally the missing `++`. Answer indexes
/// are zero-based.
///
/// # Errors
///
/// Returns all `QuestionError`s found, never an empty list.
pub fn validate_content(text: &str, answers: &[Answer]) -> Result<(), Vec<QuestionError>> {
    let mut errors = Vec::new();
    if text.trim().is_empty() {
        errors.push(QuestionError::EmptyText);
    }
    if answers.len() < 2 {
        errors.push(QuestionError::TooFewAnswers(answers.len()));
    }
    for (index, answer) in answers.iter().enumerate() {
        if answer.text.trim().is_empty() {
            errors.push(QuestionError::EmptyAnswerText { index });
        }
        if let AnswerWeight::Unknown(raw) = &answer.weight {
            errors.push(QuestionError::InvalidWeight {
                index,
                raw: raw.clone(),
            });
        }
    }
    if !answers.is_empty() && !answers.iter().any(|a| a.weight.is_correct()) {
        errors.push(QuestionError::NoCorrectAnswer);
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}
