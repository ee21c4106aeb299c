// src/core/scoring.rs
//
// Pure mastery-scoring engine. No I/O, no clock access: everything the
// formula needs is passed in by the caller.

use std::fmt;

use crate::models::mastery::MasteryLevel;

/// Canonical scoring constants. The whole system reads these; nothing else
/// hard-codes weights or thresholds.
pub const WEIGHT_ACCURACY: f64 = 0.6;
pub const WEIGHT_TIME: f64 = 0.2;
pub const WEIGHT_CONSISTENCY: f64 = 0.2;

/// Consistency rewards repeated practice: BASE + attempts * BONUS, capped at 100.
pub const BASE_CONSISTENCY: f64 = 70.0;
pub const PER_ATTEMPT_BONUS: f64 = 5.0;

/// Level bands: Low < MEDIUM_FLOOR <= Medium < HIGH_FLOOR <= High.
pub const LEVEL_MEDIUM_FLOOR: i64 = 40;
pub const LEVEL_HIGH_FLOOR: i64 = 75;

/// Raised when the raw inputs cannot produce a meaningful score.
/// Callers log it and substitute [`zeroed`] instead of failing the session.
#[derive(Debug, PartialEq, Eq)]
pub enum ScoringError {
    InvalidInput(&'static str),
}

impl fmt::Display for ScoringError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScoringError::InvalidInput(msg) => write!(f, "invalid scoring input: {}", msg),
        }
    }
}

impl std::error::Error for ScoringError {}

/// Sub-metrics and final score of one graded submission.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreBreakdown {
    pub accuracy: f64,
    pub time_efficiency: f64,
    pub consistency: f64,
    pub final_score: i64,
    pub level: MasteryLevel,
    /// Total attempts including this one; persisted on the mastery record.
    pub attempts: i64,
}

/// Maps a final score to its level band. Total over 0-100, no gaps or overlaps.
pub fn level_for(final_score: i64) -> MasteryLevel {
    if final_score < LEVEL_MEDIUM_FLOOR {
        MasteryLevel::Low
    } else if final_score < LEVEL_HIGH_FLOOR {
        MasteryLevel::Medium
    } else {
        MasteryLevel::High
    }
}

/// Computes the mastery score for a single submission.
///
/// * `accuracy` = 100 * correct / total
/// * `time_efficiency` = 100 * max(0, (limit - taken) / limit)
/// * `consistency` = min(100, BASE + attempts * BONUS), attempts = prior + 1
/// * `final_score` = round(0.6 * accuracy + 0.2 * time_efficiency + 0.2 * consistency)
pub fn score(
    correct_count: u32,
    total_questions: u32,
    time_taken_sec: i64,
    time_limit_sec: i64,
    prior_attempts: i64,
) -> Result<ScoreBreakdown, ScoringError> {
    if total_questions == 0 {
        return Err(ScoringError::InvalidInput("total_questions is zero"));
    }
    if correct_count > total_questions {
        return Err(ScoringError::InvalidInput(
            "correct_count exceeds total_questions",
        ));
    }
    if time_limit_sec <= 0 {
        return Err(ScoringError::InvalidInput("time_limit_sec is non-positive"));
    }
    if time_taken_sec < 0 {
        return Err(ScoringError::InvalidInput("time_taken_sec is negative"));
    }

    let accuracy = 100.0 * f64::from(correct_count) / f64::from(total_questions);

    let spare = (time_limit_sec - time_taken_sec) as f64 / time_limit_sec as f64;
    let time_efficiency = 100.0 * spare.max(0.0);

    let attempts = prior_attempts.max(0) + 1;
    let consistency = (BASE_CONSISTENCY + attempts as f64 * PER_ATTEMPT_BONUS).min(100.0);

    let final_score = (accuracy * WEIGHT_ACCURACY
        + time_efficiency * WEIGHT_TIME
        + consistency * WEIGHT_CONSISTENCY)
        .round() as i64;

    Ok(ScoreBreakdown {
        accuracy,
        time_efficiency,
        consistency,
        final_score,
        level: level_for(final_score),
        attempts,
    })
}

/// Safe default used when [`score`] rejects its inputs: the submission still
/// completes, graded as a zero.
pub fn zeroed(prior_attempts: i64) -> ScoreBreakdown {
    ScoreBreakdown {
        accuracy: 0.0,
        time_efficiency: 0.0,
        consistency: 0.0,
        final_score: 0,
        level: MasteryLevel::Low,
        attempts: prior_attempts.max(0) + 1,
    }
}
