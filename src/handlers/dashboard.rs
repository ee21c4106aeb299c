// src/handlers/dashboard.rs

use axum::{Extension, Json, extract::State, response::IntoResponse};
use sqlx::SqlitePool;

use crate::{
    core::scoring,
    error::AppError,
    models::mastery::{ClassAnalyticsEntry, StudentDashboard},
    store::MasteryStore,
    utils::jwt::Claims,
};

/// Helper struct for the per-student aggregation query.
#[derive(sqlx::FromRow)]
struct ClassRow {
    student_id: i64,
    name: String,
    average_score: i64,
    total_attempts: i64,
    weakest_topic: Option<String>,
    last_activity: Option<chrono::DateTime<chrono::Utc>>,
}

/// The current student's mastery records plus derived summary numbers.
///
/// Students with no submissions get an empty record list and zeroed summary;
/// no placeholder history is fabricated.
pub async fn student_dashboard(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let student_id = claims.sub.parse::<i64>().unwrap_or(0);

    let records = MasteryStore::new(pool).records_for(student_id).await?;

    let average_score = if records.is_empty() {
        0
    } else {
        let total: i64 = records.iter().map(|r| r.score).sum();
        (total as f64 / records.len() as f64).round() as i64
    };
    let last_activity = records.iter().map(|r| r.last_updated).max();

    Ok(Json(StudentDashboard {
        topics_attempted: records.len(),
        average_score,
        last_activity,
        records,
    }))
}

/// Aggregate class analytics for teachers: average score, total attempts, and
/// weakest topic per student, computed from real records. Students who never
/// submitted a quiz do not appear.
pub async fn class_analytics(
    State(pool): State<SqlitePool>,
) -> Result<impl IntoResponse, AppError> {
    let rows = sqlx::query_as::<_, ClassRow>(
        r#"
        SELECT
            u.id AS student_id,
            u.name AS name,
            CAST(ROUND(AVG(m.score)) AS INTEGER) AS average_score,
            SUM(m.attempts) AS total_attempts,
            (
                SELECT t.name
                FROM mastery_records mr
                LEFT JOIN topics t ON t.id = mr.topic_id
                WHERE mr.student_id = u.id
                ORDER BY mr.score ASC
                LIMIT 1
            ) AS weakest_topic,
            MAX(m.last_updated) AS last_activity
        FROM users u
        JOIN mastery_records m ON m.student_id = u.id
        WHERE u.role = 'student'
        GROUP BY u.id, u.name
        ORDER BY average_score ASC
        "#,
    )
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to aggregate class analytics: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    let entries: Vec<ClassAnalyticsEntry> = rows
        .into_iter()
        .map(|r| ClassAnalyticsEntry {
            // At risk when the running average sits in the Low band.
            at_risk: r.average_score < scoring::LEVEL_MEDIUM_FLOOR,
            student_id: r.student_id,
            name: r.name,
            average_score: r.average_score,
            total_attempts: r.total_attempts,
            weakest_topic: r.weakest_topic,
            last_activity: r.last_activity,
        })
        .collect();

    Ok(Json(entries))
}
