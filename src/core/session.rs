// src/core/session.rs
//
// In-progress quiz session as a pure state machine. The HTTP layer and the
// countdown task drive it; it never touches the clock, the database, or the
// network itself.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;
use sqlx::types::Json;

use crate::models::question::Question;

/// Lifecycle of one quiz attempt: Loading -> InProgress -> Submitting -> Completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Loading,
    InProgress,
    Submitting,
    Completed,
}

#[derive(Debug, PartialEq, Eq)]
pub enum SessionError {
    /// Operation requires the session to be in progress.
    NotInProgress,
    /// Selected option index is outside the question's option list.
    OptionOutOfRange,
    /// Cannot advance past a question without a recorded answer.
    Unanswered,
    /// Submission was already triggered (by the user or the countdown).
    AlreadySubmitted,
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            SessionError::NotInProgress => "quiz session is not in progress",
            SessionError::OptionOutOfRange => "selected option does not exist",
            SessionError::Unanswered => "current question has no recorded answer",
            SessionError::AlreadySubmitted => "quiz was already submitted",
        };
        write!(f, "{}", msg)
    }
}

impl std::error::Error for SessionError {}

/// Outcome of one countdown tick.
#[derive(Debug, PartialEq, Eq)]
pub enum Tick {
    /// Still in progress; seconds left.
    Remaining(i64),
    /// The countdown just hit zero. Reported exactly once.
    Expired,
    /// The session left `InProgress`; the tick driver should stop.
    Halted,
}

/// Raw numbers handed to the scoring engine once submission begins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradeSheet {
    pub correct_count: u32,
    pub total_questions: u32,
    pub time_taken_sec: i64,
    pub time_limit_sec: i64,
}

#[derive(Debug, Clone)]
pub struct QuizSession {
    topic_id: String,
    student_id: i64,
    questions: Vec<Question>,
    current_index: usize,
    /// Sparse map: question index -> selected option index.
    answers: HashMap<usize, usize>,
    time_limit_sec: i64,
    time_remaining: i64,
    status: SessionStatus,
}

impl QuizSession {
    /// Creates a session in `Loading`; call [`begin`](Self::begin) once the
    /// question list for the topic is available.
    pub fn new(topic_id: impl Into<String>, student_id: i64, time_limit_sec: i64) -> Self {
        let time_limit_sec = time_limit_sec.max(1);
        Self {
            topic_id: topic_id.into(),
            student_id,
            questions: Vec::new(),
            current_index: 0,
            answers: HashMap::new(),
            time_limit_sec,
            time_remaining: time_limit_sec,
            status: SessionStatus::Loading,
        }
    }

    /// Transitions `Loading -> InProgress`. An empty question list falls back
    /// to a synthetic placeholder set of `fallback_count` questions rather
    /// than failing the session.
    pub fn begin(&mut self, questions: Vec<Question>, fallback_count: usize) {
        if self.status != SessionStatus::Loading {
            return;
        }
        self.questions = if questions.is_empty() {
            placeholder_questions(&self.topic_id, fallback_count.max(1))
        } else {
            questions
        };
        self.status = SessionStatus::InProgress;
    }

    pub fn topic_id(&self) -> &str {
        &self.topic_id
    }

    pub fn student_id(&self) -> i64 {
        self.student_id
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn time_remaining(&self) -> i64 {
        self.time_remaining
    }

    pub fn time_limit_sec(&self) -> i64 {
        self.time_limit_sec
    }

    pub fn answered_count(&self) -> usize {
        self.answers.len()
    }

    /// Records (or overwrites) the answer for the current question.
    /// Does not advance.
    pub fn select_option(&mut self, option: usize) -> Result<(), SessionError> {
        if self.status != SessionStatus::InProgress {
            return Err(SessionError::NotInProgress);
        }
        let question = &self.questions[self.current_index];
        if option >= question.options.0.len() {
            return Err(SessionError::OptionOutOfRange);
        }
        self.answers.insert(self.current_index, option);
        Ok(())
    }

    /// Moves to the next question. Requires an answer for the current one and
    /// clamps at the last question.
    pub fn advance(&mut self) -> Result<usize, SessionError> {
        if self.status != SessionStatus::InProgress {
            return Err(SessionError::NotInProgress);
        }
        if !self.answers.contains_key(&self.current_index) {
            return Err(SessionError::Unanswered);
        }
        if self.current_index + 1 < self.questions.len() {
            self.current_index += 1;
        }
        Ok(self.current_index)
    }

    /// Moves to the previous question, clamping at zero.
    pub fn retreat(&mut self) -> Result<usize, SessionError> {
        if self.status != SessionStatus::InProgress {
            return Err(SessionError::NotInProgress);
        }
        self.current_index = self.current_index.saturating_sub(1);
        Ok(self.current_index)
    }

    /// Advances the countdown by one second. Only ticks while `InProgress`;
    /// expiry is reported exactly once so the auto-submit cannot double-fire.
    pub fn tick(&mut self) -> Tick {
        if self.status != SessionStatus::InProgress || self.time_remaining == 0 {
            return Tick::Halted;
        }
        self.time_remaining -= 1;
        if self.time_remaining == 0 {
            Tick::Expired
        } else {
            Tick::Remaining(self.time_remaining)
        }
    }

    /// Transitions `InProgress -> Submitting` and grades the answer set.
    /// Succeeds at most once per session; the manual and timeout submit paths
    /// both go through here, so whichever fires second gets
    /// [`SessionError::AlreadySubmitted`].
    pub fn begin_submit(&mut self) -> Result<GradeSheet, SessionError> {
        match self.status {
            SessionStatus::InProgress => {}
            SessionStatus::Submitting | SessionStatus::Completed => {
                return Err(SessionError::AlreadySubmitted);
            }
            SessionStatus::Loading => return Err(SessionError::NotInProgress),
        }
        self.status = SessionStatus::Submitting;

        let correct_count = self
            .questions
            .iter()
            .enumerate()
            .filter(|(idx, q)| {
                self.answers.get(idx) == Some(&(q.correct_answer as usize))
            })
            .count() as u32;

        Ok(GradeSheet {
            correct_count,
            total_questions: self.questions.len() as u32,
            time_taken_sec: self.time_limit_sec - self.time_remaining,
            time_limit_sec: self.time_limit_sec,
        })
    }

    /// Rolls `Submitting` back to `InProgress` after a failed submission
    /// pipeline, so the attempt can be submitted again. Completed sessions
    /// stay terminal.
    pub fn abort_submit(&mut self) {
        if self.status == SessionStatus::Submitting {
            self.status = SessionStatus::InProgress;
        }
    }

    /// Marks the session terminal once scoring and persistence finished.
    pub fn complete(&mut self) {
        if self.status == SessionStatus::Submitting {
            self.status = SessionStatus::Completed;
        }
    }
}

/// Fixed synthetic question set used when a topic has no seeded questions.
fn placeholder_questions(topic_id: &str, count: usize) -> Vec<Question> {
    (0..count)
        .map(|i| Question {
            // Negative ids so placeholders can never collide with seeded rows.
            id: -(i as i64 + 1),
            topic_id: topic_id.to_string(),
            content: format!("General assessment question {}", i + 1),
            options: Json(vec![
                "Alpha".to_string(),
                "Beta".to_string(),
                "Gamma".to_string(),
                "Delta".to_string(),
            ]),
            correct_answer: 0,
        })
        .collect()
}
