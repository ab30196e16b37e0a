//! Picks a bounded, randomized practice set from a question pool.
//!
//! Selection is policy-priority sampling: the pool is split into a priority
//! set and a fallback set according to the study mode, the priority set is
//! sampled first and the fallback set only tops up what is missing.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::{History, Question};
use crate::shuffle::{RngShuffler, Shuffler};

/// Number of questions in a standard practice exam.
pub const DEFAULT_QUESTION_COUNT: usize = 15;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown study mode: {0}")]
pub struct ParseStudyModeError(pub String);

/// Which questions a practice exam should favour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StudyMode {
    /// Pure random over the pool.
    #[default]
    All,
    /// Questions the user has never been shown come first.
    Unseen,
    /// Questions the user has answered `--` come first.
    Wrong,
    /// Pure random over a single theme.
    Theme,
}

impl StudyMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            StudyMode::All => "all",
            StudyMode::Unseen => "unseen",
            StudyMode::Wrong => "wrong",
            StudyMode::Theme => "theme",
        }
    }

    /// Whether this mode needs the user's history to partition the pool.
    #[must_use]
    pub fn uses_history(self) -> bool {
        matches!(self, StudyMode::Unseen | StudyMode::Wrong)
    }
}

impl fmt::Display for StudyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StudyMode {
    type Err = ParseStudyModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(StudyMode::All),
            "unseen" => Ok(StudyMode::Unseen),
            "wrong" => Ok(StudyMode::Wrong),
            "theme" => Ok(StudyMode::Theme),
            other => Err(ParseStudyModeError(other.to_string())),
        }
    }
}

/// Parameters of a single selection.
///
/// `theme` is an exact, case-sensitive pre-filter applied before the mode
/// partitions the pool, whatever the mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionRequest {
    pub count: usize,
    pub mode: StudyMode,
    pub theme: Option<String>,
}

impl SelectionRequest {
    #[must_use]
    pub fn new(count: usize, mode: StudyMode) -> Self {
        Self {
            count,
            mode,
            theme: None,
        }
    }

    #[must_use]
    pub fn with_theme(mut self, theme: impl Into<String>) -> Self {
        self.theme = Some(theme.into());
        self
    }
}

impl Default for SelectionRequest {
    fn default() -> Self {
        Self::new(DEFAULT_QUESTION_COUNT, StudyMode::All)
    }
}

/// Outcome of a selection. Priority picks always precede fallback picks.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub questions: Vec<Question>,
    pub priority_selected: usize,
    pub fallback_selected: usize,
}

impl Selection {
    #[must_use]
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    #[must_use]
    pub fn into_questions(self) -> Vec<Question> {
        self.questions
    }
}

/// Selects practice questions using an injected shuffle strategy.
pub struct QuestionSelector<S> {
    shuffler: S,
}

impl<S: Shuffler> QuestionSelector<S> {
    #[must_use]
    pub fn new(shuffler: S) -> Self {
        Self { shuffler }
    }

    /// Select up to `request.count` questions from `pool`.
    ///
    /// Returns `min(count, available)` questions, never duplicates an id and
    /// never fails: an empty pool, an unknown theme or a zero count all give
    /// an empty selection. Every returned question has its answers shuffled.
    pub fn select(
        &mut self,
        pool: &[Question],
        request: &SelectionRequest,
        history: &History,
    ) -> Selection {
        if request.count == 0 {
            return Selection {
                questions: Vec::new(),
                priority_selected: 0,
                fallback_selected: 0,
            };
        }

        let mut ids = HashSet::with_capacity(pool.len());
        let candidates: Vec<&Question> = pool
            .iter()
            .filter(|q| match request.theme.as_deref() {
                Some(theme) => q.theme() == Some(theme),
                None => true,
            })
            .filter(|q| ids.insert(q.id()))
            .collect();

        let (mut priority, mut fallback): (Vec<&Question>, Vec<&Question>) = match request.mode {
            StudyMode::All | StudyMode::Theme => (candidates, Vec::new()),
            StudyMode::Unseen => candidates.into_iter().partition(|q| !history.has_seen(q.id())),
            StudyMode::Wrong => candidates.into_iter().partition(|q| history.got_wrong(q.id())),
        };

        self.shuffler.shuffle(&mut priority);
        priority.truncate(request.count);
        let priority_selected = priority.len();

        let remaining = request.count - priority_selected;
        let mut fallback_selected = 0;
        if remaining > 0 && !fallback.is_empty() {
            self.shuffler.shuffle(&mut fallback);
            fallback.truncate(remaining);
            fallback_selected = fallback.len();
            priority.extend(fallback);
        }

        let questions = priority
            .into_iter()
            .map(|q| {
                let mut picked = q.clone();
                self.shuffler.shuffle(picked.answers_mut());
                picked
            })
            .collect();

        Selection {
            questions,
            priority_selected,
            fallback_selected,
        }
    }
}

/// Select questions with the thread-local RNG.
#[must_use]
pub fn select_questions(
    pool: &[Question],
    count: usize,
    mode: StudyMode,
    theme: Option<&str>,
    history: &History,
) -> Vec<Question> {
    let request = SelectionRequest {
        count,
        mode,
        theme: theme.map(str::to_string),
    };
    QuestionSelector::new(RngShuffler::thread())
        .select(pool, &request, history)
        .into_questions()
}
