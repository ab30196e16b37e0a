#![forbid(unsafe_code)]

//! Question selection and exam scoring for the practice engine.
//!
//! Everything in this crate is synchronous and free of I/O: callers fetch
//! pools and history from storage first, then hand them to the selector,
//! and grade the collected answers with the score engine afterwards.

pub mod model;
pub mod scoring;
pub mod selector;
pub mod shuffle;
pub mod stats;
pub mod time;

pub use scoring::{Grade, ScoreResult, ScoringVariant, compute_score};
pub use selector::{
    DEFAULT_QUESTION_COUNT, QuestionSelector, Selection, SelectionRequest, StudyMode,
    select_questions,
};
pub use shuffle::{IdentityShuffler, RngShuffler, Shuffler};
pub use time::Clock;
