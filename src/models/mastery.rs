// src/models/mastery.rs

use serde::{Deserialize, Serialize};

/// Discrete banding of a mastery score, used for feedback selection and UI styling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MasteryLevel {
    Low,
    Medium,
    High,
}

impl MasteryLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            MasteryLevel::Low => "Low",
            MasteryLevel::Medium => "Medium",
            MasteryLevel::High => "High",
        }
    }
}

/// Decodes the TEXT column written by `MasteryStore::save`.
impl TryFrom<String> for MasteryLevel {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "Low" => Ok(MasteryLevel::Low),
            "Medium" => Ok(MasteryLevel::Medium),
            "High" => Ok(MasteryLevel::High),
            other => Err(format!("unknown mastery level '{}'", other)),
        }
    }
}

/// Represents one row of the 'mastery_records' table.
///
/// One record per (student, topic); created on the first submission and
/// overwritten (never deleted) on every subsequent one. `attempts` only grows,
/// `last_updated` strictly increases, and `score` always reflects the latest
/// submission — history is not averaged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MasteryRecord {
    pub topic_id: String,

    /// Mastery score of the latest submission, 0-100.
    pub score: i64,

    pub level: MasteryLevel,

    pub attempts: i64,

    pub last_updated: chrono::DateTime<chrono::Utc>,
}

/// Outcome of a graded quiz submission, immutable once computed.
#[derive(Debug, Clone, Serialize)]
pub struct QuizResult {
    pub accuracy: f64,
    pub time_efficiency: f64,
    pub consistency: f64,
    pub final_score: i64,
    pub level: MasteryLevel,
    pub feedback: String,
    pub next_step: String,
}

/// Aggregated view of a student's own progress.
#[derive(Debug, Serialize)]
pub struct StudentDashboard {
    pub records: Vec<MasteryRecord>,
    pub average_score: i64,
    pub topics_attempted: usize,
    pub last_activity: Option<chrono::DateTime<chrono::Utc>>,
}

/// One row of the teacher's class analytics view.
#[derive(Debug, Serialize)]
pub struct ClassAnalyticsEntry {
    pub student_id: i64,
    pub name: String,
    pub average_score: i64,
    pub total_attempts: i64,
    pub weakest_topic: Option<String>,
    pub last_activity: Option<chrono::DateTime<chrono::Utc>>,
    pub at_risk: bool,
}
