//! Exam grading on the 0–20 scale.
//!
//! Grades are computed exactly in integer hundredths of a point and rounded
//! half-up to one decimal after scaling, so boundary cases such as 6.65 always
//! land on 6.7 regardless of floating-point representation.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::{Answer, Question, Source};

/// Highest grade on the scale, in tenths.
const MAX_TENTHS: u16 = 200;

/// Grade at or above which an exam counts as passed, in tenths.
const PASS_TENTHS: u16 = 100;

//
// ─── GRADE ─────────────────────────────────────────────────────────────────────
//

/// A grade in [0, 20] with one decimal of precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Grade(u16);

impl Grade {
    pub const ZERO: Grade = Grade(0);
    pub const MAX: Grade = Grade(MAX_TENTHS);

    /// Builds a grade from tenths of a point, clamping to the 20-point ceiling.
    #[must_use]
    pub fn from_tenths(tenths: u16) -> Self {
        Self(tenths.min(MAX_TENTHS))
    }

    /// Builds a grade from a real value, rounding half-up to one decimal and
    /// clamping to [0, 20]. Non-finite values become zero.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn from_f64(value: f64) -> Self {
        if !value.is_finite() || value <= 0.0 {
            return Self::ZERO;
        }
        let tenths = (value * 10.0).round().min(f64::from(MAX_TENTHS));
        Self(tenths as u16)
    }

    #[must_use]
    pub fn tenths(self) -> u16 {
        self.0
    }

    #[must_use]
    pub fn as_f64(self) -> f64 {
        f64::from(self.0) / 10.0
    }

    #[must_use]
    pub fn is_passing(self) -> bool {
        self.0 >= PASS_TENTHS
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.0 / 10, self.0 % 10)
    }
}

//
// ─── VARIANT ───────────────────────────────────────────────────────────────────
//

/// How answers are turned into a grade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoringVariant {
    /// Partial credit with penalties: `++` +1, `+` +0.33, `-` −0.33, `--` −1.
    Weighted,
    /// Only fully-correct answers count; wrong picks cost nothing.
    Simple,
}

impl ScoringVariant {
    /// Grading scheme used for exams drawn from the given source.
    #[must_use]
    pub fn for_source(source: Source) -> Self {
        match source {
            Source::Previous | Source::Ai => Self::Weighted,
            Source::Kahoots => Self::Simple,
        }
    }
}

//
// ─── RESULT ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreResult {
    pub grade: Grade,
    /// Number of `++` answers, whatever the variant.
    pub correct_count: usize,
}

impl ScoreResult {
    /// True when every one of `total_questions` was answered `++`.
    #[must_use]
    pub fn is_perfect(&self, total_questions: usize) -> bool {
        total_questions > 0 && self.correct_count == total_questions
    }

    #[must_use]
    pub fn passed(&self) -> bool {
        self.grade.is_passing()
    }
}

//
// ─── ENGINE ────────────────────────────────────────────────────────────────────
//

/// Computes the grade for a set of (question, chosen answer) pairs.
///
/// Unanswered questions are simply absent from `answers`: they add no points
/// but still count in `total_questions`. A zero denominator yields grade 0.
pub fn compute_score<'a, I>(answers: I, total_questions: usize, variant: ScoringVariant) -> ScoreResult
where
    I: IntoIterator<Item = (&'a Question, &'a Answer)>,
{
    let mut sum_hundredths: i64 = 0;
    let mut correct_count = 0_usize;

    for (_question, answer) in answers {
        sum_hundredths += answer.weight.points_hundredths();
        if answer.weight.is_correct() {
            correct_count += 1;
        }
    }

    let Ok(total) = i64::try_from(total_questions) else {
        return ScoreResult {
            grade: Grade::ZERO,
            correct_count,
        };
    };
    if total == 0 {
        return ScoreResult {
            grade: Grade::ZERO,
            correct_count,
        };
    }

    // grade * 10 == points / total * 200
    let tenths_numerator = match variant {
        ScoringVariant::Weighted => sum_hundredths * 2,
        ScoringVariant::Simple => {
            i64::try_from(correct_count).unwrap_or(i64::MAX / 400) * 200
        }
    };

    ScoreResult {
        grade: Grade::from_tenths(round_half_up_tenths(tenths_numerator, total)),
        correct_count,
    }
}

/// `round(numerator / denominator)` half-up, floored at zero and saturated to the
/// grade ceiling. `denominator` must be positive.
fn round_half_up_tenths(numerator: i64, denominator: i64) -> u16 {
    if numerator <= 0 {
        return 0;
    }
    let rounded = (2 * numerator + denominator) / (2 * denominator);
    u16::try_from(rounded).map_or(MAX_TENTHS, |t| t.min(MAX_TENTHS))
}

/// Rounds a non-negative average to one decimal, half-up.
#[must_use]
pub fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
