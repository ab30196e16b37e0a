use std::collections::HashSet;

use crate::model::ids::QuestionId;

/// A user's past exposure to a question pool, as reported by storage.
///
/// `seen` holds every question the user has been shown; `wrong` holds the
/// questions they have answered `--` at least once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct History {
    pub seen: HashSet<QuestionId>,
    pub wrong: HashSet<QuestionId>,
}

impl History {
    #[must_use]
    pub fn new(seen: HashSet<QuestionId>, wrong: HashSet<QuestionId>) -> Self {
        Self { seen, wrong }
    }

    /// History of a user who has never taken an exam.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn has_seen(&self, id: QuestionId) -> bool {
        self.seen.contains(&id)
    }

    #[must_use]
    pub fn got_wrong(&self, id: QuestionId) -> bool {
        self.wrong.contains(&id)
    }
}
