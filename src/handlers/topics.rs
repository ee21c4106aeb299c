// src/handlers/topics.rs

use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use sqlx::SqlitePool;

use crate::{
    error::AppError,
    models::topic::{LearningPath, Topic},
};

#[derive(Debug, Deserialize)]
pub struct TopicListParams {
    pub path_id: Option<String>,
}

/// Lists the learning paths (static reference data).
pub async fn list_paths(State(pool): State<SqlitePool>) -> Result<impl IntoResponse, AppError> {
    let paths = sqlx::query_as::<_, LearningPath>(
        "SELECT id, name, description FROM learning_paths ORDER BY name",
    )
    .fetch_all(&pool)
    .await?;

    Ok(Json(paths))
}

/// Lists topics, optionally filtered by learning path.
pub async fn list_topics(
    State(pool): State<SqlitePool>,
    Query(params): Query<TopicListParams>,
) -> Result<impl IntoResponse, AppError> {
    let topics = match params.path_id {
        Some(path_id) => {
            sqlx::query_as::<_, Topic>(
                r#"
                SELECT id, path_id, name, description, exam_focus
                FROM topics
                WHERE path_id = ?1
                ORDER BY name
                "#,
            )
            .bind(path_id)
            .fetch_all(&pool)
            .await?
        }
        None => {
            sqlx::query_as::<_, Topic>(
                "SELECT id, path_id, name, description, exam_focus FROM topics ORDER BY name",
            )
            .fetch_all(&pool)
            .await?
        }
    };

    Ok(Json(topics))
}

/// Fetches a single topic by id.
pub async fn get_topic(
    State(pool): State<SqlitePool>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let topic = sqlx::query_as::<_, Topic>(
        "SELECT id, path_id, name, description, exam_focus FROM topics WHERE id = ?1",
    )
    .bind(&id)
    .fetch_optional(&pool)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Topic '{}' not found", id)))?;

    Ok(Json(topic))
}
