//! Practice settings read from the environment.

use exam_core::DEFAULT_QUESTION_COUNT;

use crate::error::ConfigError;

pub const QUESTION_COUNT_VAR: &str = "EXAM_QUESTION_COUNT";
pub const SEED_VAR: &str = "EXAM_SEED";

/// Knobs for building exams.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PracticeConfig {
    /// Questions per exam.
    pub question_count: usize,
    /// Fixed RNG seed; `None` uses the thread RNG.
    pub seed: Option<u64>,
}

impl Default for PracticeConfig {
    fn default() -> Self {
        Self {
            question_count: DEFAULT_QUESTION_COUNT,
            seed: None,
        }
    }
}

impl PracticeConfig {
    /// Read `EXAM_QUESTION_COUNT` and `EXAM_SEED`, falling back to defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidNumber` if a variable is set but not a number.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`PracticeConfig::from_env`], reading values through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidNumber` if a value is set but not a number.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(raw) = lookup(QUESTION_COUNT_VAR) {
            config.question_count = parse_number(QUESTION_COUNT_VAR, &raw)?;
        }
        if let Some(raw) = lookup(SEED_VAR) {
            config.seed = Some(parse_number(SEED_VAR, &raw)?);
        }
        Ok(config)
    }
}

fn parse_number<T: std::str::FromStr>(var: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidNumber {
        var,
        value: raw.to_string(),
    })
}
