// src/models/quiz.rs

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::core::session::{QuizSession, SessionStatus};
use crate::models::question::PublicQuestion;

/// DTO for starting a quiz on a topic.
#[derive(Debug, Deserialize, Validate)]
pub struct StartQuizRequest {
    #[validate(length(min = 1, max = 64))]
    pub topic_id: String,
}

/// DTO returned when a quiz starts: the session handle plus the questions
/// with their correct answers stripped.
#[derive(Debug, Serialize)]
pub struct StartQuizResponse {
    pub session_id: Uuid,
    pub topic_id: String,
    pub time_limit_sec: i64,
    pub questions: Vec<PublicQuestion>,
}

/// DTO for recording an answer on the current question.
#[derive(Debug, Deserialize)]
pub struct SelectOptionRequest {
    pub option: usize,
}

/// Progress snapshot of an active session, safe to show the client.
#[derive(Debug, Serialize)]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub current_index: usize,
    pub total_questions: usize,
    pub answered: usize,
    pub time_remaining: i64,
}

impl From<&QuizSession> for SessionSnapshot {
    fn from(s: &QuizSession) -> Self {
        Self {
            status: s.status(),
            current_index: s.current_index(),
            total_questions: s.questions().len(),
            answered: s.answered_count(),
            time_remaining: s.time_remaining(),
        }
    }
}
