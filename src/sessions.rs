// src/sessions.rs
//
// In-process registry of active quiz sessions plus the orchestration around
// them: the per-session countdown task and the submission pipeline
// (grade -> score -> feedback -> persist).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use tokio::task::AbortHandle;
use uuid::Uuid;

use crate::core::scoring::{self, ScoreBreakdown};
use crate::core::session::{GradeSheet, QuizSession, SessionStatus, Tick};
use crate::error::AppError;
use crate::models::mastery::{MasteryRecord, QuizResult};
use crate::services::feedback::{self, Feedback};
use crate::state::AppState;
use crate::store::MasteryStore;

/// What fired the submission. The manual path also releases the countdown
/// task; the timeout path is already inside it and just lets it run out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitTrigger {
    Manual,
    Timeout,
}

struct ActiveSession {
    machine: QuizSession,
    timer: Option<AbortHandle>,
}

/// Shared map of session id -> active session. Sessions are single-user and
/// short-lived; entries are removed once the session completes.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    inner: Arc<Mutex<HashMap<Uuid, ActiveSession>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<Uuid, ActiveSession>>, AppError> {
        self.inner
            .lock()
            .map_err(|_| AppError::InternalServerError("session registry poisoned".to_string()))
    }

    pub fn insert(&self, id: Uuid, machine: QuizSession) -> Result<(), AppError> {
        self.lock()?.insert(
            id,
            ActiveSession {
                machine,
                timer: None,
            },
        );
        Ok(())
    }

    pub fn attach_timer(&self, id: &Uuid, timer: AbortHandle) -> Result<(), AppError> {
        if let Some(entry) = self.lock()?.get_mut(id) {
            entry.timer = Some(timer);
        }
        Ok(())
    }

    /// Runs `f` against the state machine, enforcing that the session exists
    /// and belongs to `student_id`. Missing and foreign sessions are
    /// indistinguishable to the caller.
    pub fn with_machine<R>(
        &self,
        id: &Uuid,
        student_id: i64,
        f: impl FnOnce(&mut QuizSession) -> Result<R, AppError>,
    ) -> Result<R, AppError> {
        let mut guard = self.lock()?;
        let entry = guard
            .get_mut(id)
            .filter(|e| e.machine.student_id() == student_id)
            .ok_or_else(|| AppError::NotFound("Quiz session not found".to_string()))?;
        f(&mut entry.machine)
    }

    /// One countdown tick; `None` when the session no longer exists.
    fn tick(&self, id: &Uuid) -> Option<Tick> {
        let mut guard = self.inner.lock().ok()?;
        guard.get_mut(id).map(|e| e.machine.tick())
    }

    /// Flips the machine into `Submitting` and hands back everything the
    /// pipeline needs. `student_id` is `None` on the timeout path, which
    /// bypasses the ownership check.
    fn begin_submit(
        &self,
        id: &Uuid,
        student_id: Option<i64>,
    ) -> Result<(GradeSheet, String, i64, Option<AbortHandle>), AppError> {
        let mut guard = self.lock()?;
        let entry = guard
            .get_mut(id)
            .filter(|e| student_id.is_none_or(|s| e.machine.student_id() == s))
            .ok_or_else(|| AppError::NotFound("Quiz session not found".to_string()))?;

        let sheet = entry.machine.begin_submit()?;
        let topic_id = entry.machine.topic_id().to_string();
        let owner = entry.machine.student_id();
        let timer = entry.timer.take();
        Ok((sheet, topic_id, owner, timer))
    }

    /// Rolls a failed submission back to `InProgress` so the attempt can be
    /// submitted again instead of sticking in `Submitting`.
    fn rollback_submit(&self, id: &Uuid) -> Result<(), AppError> {
        if let Some(entry) = self.lock()?.get_mut(id) {
            entry.machine.abort_submit();
        }
        Ok(())
    }

    /// Completes and removes the session. Returns false when the session is
    /// gone or no longer in `Submitting`, in which case the caller must
    /// discard its results.
    fn complete(&self, id: &Uuid) -> Result<bool, AppError> {
        let mut guard = self.lock()?;
        match guard.get_mut(id) {
            Some(entry) if entry.machine.status() == SessionStatus::Submitting => {
                entry.machine.complete();
                guard.remove(id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Drops any unfinished sessions a student still has, releasing their
    /// countdown tasks. Starting a new quiz abandons the old one.
    pub fn abandon_for_student(&self, student_id: i64) -> Result<(), AppError> {
        let mut guard = self.lock()?;
        let stale: Vec<Uuid> = guard
            .iter()
            .filter(|(_, e)| {
                e.machine.student_id() == student_id
                    && e.machine.status() != SessionStatus::Submitting
            })
            .map(|(id, _)| *id)
            .collect();
        for id in stale {
            if let Some(entry) = guard.remove(&id) {
                if let Some(timer) = entry.timer {
                    timer.abort();
                }
            }
        }
        Ok(())
    }
}

/// Spawns the per-session countdown: one tick per wall-clock second while the
/// session is in progress. When the countdown expires it fires the auto-submit
/// exactly once, then the task ends on every path.
pub fn spawn_countdown(state: AppState, session_id: Uuid) -> AbortHandle {
    let handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(1));
        // The first tick resolves immediately; consume it so the countdown
        // starts a full second after the quiz begins.
        interval.tick().await;
        loop {
            interval.tick().await;
            match state.sessions.tick(&session_id) {
                Some(Tick::Remaining(_)) => continue,
                Some(Tick::Expired) => {
                    if let Err(e) =
                        finalize(&state, session_id, None, SubmitTrigger::Timeout).await
                    {
                        tracing::warn!("Timeout submission for {} failed: {}", session_id, e);
                    }
                    break;
                }
                // Halted or session removed: the driver has nothing left to do.
                _ => break,
            }
        }
    });
    handle.abort_handle()
}

/// The submission pipeline shared by the manual and timeout paths.
///
/// Scoring and persistence finish (or fall back) before the result is
/// returned; if the session somehow left `Submitting` in the meantime, the
/// result is discarded. A pipeline failure rolls the session back to
/// `InProgress` so the submission can be retried rather than leaking an
/// entry stuck in `Submitting`.
pub async fn finalize(
    state: &AppState,
    session_id: Uuid,
    student_id: Option<i64>,
    trigger: SubmitTrigger,
) -> Result<QuizResult, AppError> {
    let (sheet, topic_id, owner, timer) = state.sessions.begin_submit(&session_id, student_id)?;

    // The countdown task is only released here on the manual path; on the
    // timeout path we are running inside it and it ends on its own.
    if trigger == SubmitTrigger::Manual {
        if let Some(timer) = timer {
            timer.abort();
        }
    }

    let (breakdown, fb) = match grade_and_persist(state, &sheet, &topic_id, owner).await {
        Ok(out) => out,
        Err(e) => {
            state.sessions.rollback_submit(&session_id)?;
            // Re-arm the countdown we released above. On the timeout path the
            // clock already ran out; the session stays submittable by hand
            // until a new quiz abandons it.
            if trigger == SubmitTrigger::Manual {
                let timer = spawn_countdown(state.clone(), session_id);
                state.sessions.attach_timer(&session_id, timer)?;
            }
            return Err(e);
        }
    };

    if !state.sessions.complete(&session_id)? {
        tracing::warn!(
            "Session {} left Submitting during finalization; discarding result",
            session_id
        );
        return Err(AppError::Conflict(
            "Quiz session is no longer active".to_string(),
        ));
    }

    Ok(QuizResult {
        accuracy: breakdown.accuracy,
        time_efficiency: breakdown.time_efficiency,
        consistency: breakdown.consistency,
        final_score: breakdown.final_score,
        level: breakdown.level,
        feedback: fb.feedback,
        next_step: fb.next_step,
    })
}

/// Fallible middle of the pipeline: score the grade sheet, attach feedback,
/// upsert the mastery record. Kept separate so `finalize` can roll the
/// session back when any of the database steps fail.
async fn grade_and_persist(
    state: &AppState,
    sheet: &GradeSheet,
    topic_id: &str,
    owner: i64,
) -> Result<(ScoreBreakdown, Feedback), AppError> {
    let store = MasteryStore::new(state.pool.clone());
    let prior_attempts = store
        .find(owner, topic_id)
        .await?
        .map(|r| r.attempts)
        .unwrap_or(0);

    let breakdown = match scoring::score(
        sheet.correct_count,
        sheet.total_questions,
        sheet.time_taken_sec,
        sheet.time_limit_sec,
        prior_attempts,
    ) {
        Ok(b) => b,
        Err(e) => {
            tracing::warn!(
                "Scoring rejected submission for topic {}: {}. Grading as zero.",
                topic_id,
                e
            );
            scoring::zeroed(prior_attempts)
        }
    };

    let topic_name = sqlx::query_scalar::<_, String>("SELECT name FROM topics WHERE id = ?1")
        .bind(topic_id)
        .fetch_optional(&state.pool)
        .await?
        .unwrap_or_else(|| topic_id.to_string());

    // At most one external attempt per submission; any failure falls back to
    // the local templates so the student never sees an error here.
    let fb = match state.feedback.generate(&topic_name, &breakdown).await {
        Ok(fb) => fb,
        Err(e) => {
            tracing::warn!("Feedback generation failed, using local template: {}", e);
            feedback::fallback(&topic_name, &breakdown)
        }
    };

    let record = MasteryRecord {
        topic_id: topic_id.to_string(),
        score: breakdown.final_score,
        level: breakdown.level,
        attempts: breakdown.attempts,
        last_updated: Utc::now(),
    };
    store.save(owner, &record).await?;

    Ok((breakdown, fb))
}
