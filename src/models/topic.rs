// src/models/topic.rs

use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};

/// Represents the 'learning_paths' table: static reference data grouping topics.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct LearningPath {
    pub id: String,
    pub name: String,
    pub description: String,
}

/// Represents the 'topics' table. Read-only to the core; seeded at startup.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Topic {
    pub id: String,

    /// Parent learning path.
    pub path_id: String,

    pub name: String,
    pub description: String,

    /// Exam focus tags (e.g., ["GATE", "ESE"]).
    /// Stored as a JSON array in the database.
    pub exam_focus: Json<Vec<String>>,
}
