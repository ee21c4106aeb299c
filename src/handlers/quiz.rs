// src/handlers/quiz.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    core::session::QuizSession,
    error::AppError,
    models::{
        question::{PublicQuestion, Question},
        quiz::{SelectOptionRequest, SessionSnapshot, StartQuizRequest, StartQuizResponse},
    },
    sessions::{self, SubmitTrigger},
    state::AppState,
    utils::jwt::Claims,
};

/// Starts a quiz session on a topic.
///
/// Draws a random question set for the topic; a topic with no seeded
/// questions still starts, backed by the synthetic placeholder set. The
/// response hides correct answers behind the public DTO.
pub async fn start_quiz(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<StartQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let student_id = claims.sub.parse::<i64>().unwrap_or(0);

    let topic_exists =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM topics WHERE id = ?1")
            .bind(&payload.topic_id)
            .fetch_one(&state.pool)
            .await?;
    if topic_exists == 0 {
        return Err(AppError::NotFound(format!(
            "Topic '{}' not found",
            payload.topic_id
        )));
    }

    let questions = sqlx::query_as::<_, Question>(
        r#"
        SELECT id, topic_id, content, options, correct_answer
        FROM questions
        WHERE topic_id = ?1
        ORDER BY RANDOM()
        LIMIT ?2
        "#,
    )
    .bind(&payload.topic_id)
    .bind(i64::from(state.config.question_count))
    .fetch_all(&state.pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to fetch questions: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    let mut machine = QuizSession::new(
        &payload.topic_id,
        student_id,
        state.config.quiz_time_limit_secs,
    );
    machine.begin(questions, state.config.question_count as usize);

    let public: Vec<PublicQuestion> = machine.questions().iter().map(PublicQuestion::from).collect();
    let time_limit_sec = machine.time_limit_sec();

    // A fresh quiz abandons any session the student left hanging.
    state.sessions.abandon_for_student(student_id)?;

    let session_id = Uuid::new_v4();
    state.sessions.insert(session_id, machine)?;

    let timer = sessions::spawn_countdown(state.clone(), session_id);
    state.sessions.attach_timer(&session_id, timer)?;

    Ok(Json(StartQuizResponse {
        session_id,
        topic_id: payload.topic_id,
        time_limit_sec,
        questions: public,
    }))
}

/// Records (or overwrites) the answer for the session's current question.
pub async fn select_option(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(session_id): Path<Uuid>,
    Json(payload): Json<SelectOptionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let student_id = claims.sub.parse::<i64>().unwrap_or(0);

    let snapshot = state.sessions.with_machine(&session_id, student_id, |m| {
        m.select_option(payload.option)?;
        Ok(SessionSnapshot::from(&*m))
    })?;

    Ok(Json(snapshot))
}

/// Moves to the next question; requires the current one to be answered.
pub async fn advance(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let student_id = claims.sub.parse::<i64>().unwrap_or(0);

    let snapshot = state.sessions.with_machine(&session_id, student_id, |m| {
        m.advance()?;
        Ok(SessionSnapshot::from(&*m))
    })?;

    Ok(Json(snapshot))
}

/// Moves back to the previous question.
pub async fn retreat(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let student_id = claims.sub.parse::<i64>().unwrap_or(0);

    let snapshot = state.sessions.with_machine(&session_id, student_id, |m| {
        m.retreat()?;
        Ok(SessionSnapshot::from(&*m))
    })?;

    Ok(Json(snapshot))
}

/// Progress snapshot of an active session.
pub async fn session_snapshot(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let student_id = claims.sub.parse::<i64>().unwrap_or(0);

    let snapshot = state
        .sessions
        .with_machine(&session_id, student_id, |m| Ok(SessionSnapshot::from(&*m)))?;

    Ok(Json(snapshot))
}

/// Submits the quiz: grades the answers, computes the mastery score, attaches
/// feedback, and upserts the student's mastery record. Racing the countdown's
/// auto-submit yields a 409 for whichever trigger fires second.
pub async fn submit_quiz(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let student_id = claims.sub.parse::<i64>().unwrap_or(0);

    let result =
        sessions::finalize(&state, session_id, Some(student_id), SubmitTrigger::Manual).await?;

    Ok(Json(result))
}
