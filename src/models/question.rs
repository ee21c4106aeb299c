// src/models/question.rs

use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};

/// Represents the 'questions' table in the database.
///
/// Invariant: `0 <= correct_answer < options.len()`, enforced by the schema
/// (CHECK constraint) and by the seed data.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,

    pub topic_id: String,

    /// The text content of the question.
    pub content: String,

    /// The four answer options.
    /// Stored as a JSON array in the database.
    pub options: Json<Vec<String>>,

    /// Index of the correct option (0-3).
    pub correct_answer: i64,
}

/// DTO for sending questions to the client (excludes the correct answer).
#[derive(Debug, Clone, Serialize)]
pub struct PublicQuestion {
    pub id: i64,
    pub content: String,
    pub options: Vec<String>,
}

impl From<&Question> for PublicQuestion {
    fn from(q: &Question) -> Self {
        Self {
            id: q.id,
            content: q.content.clone(),
            options: q.options.0.clone(),
        }
    }
}
