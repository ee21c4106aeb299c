// src/store.rs

use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::{FromRow, SqlitePool};

use crate::error::AppError;
use crate::models::mastery::{MasteryLevel, MasteryRecord};

/// Persistence for per-student, per-topic mastery records.
///
/// Reads never synthesize placeholder history: a student with no submissions
/// gets an empty collection, and a row that no longer decodes (hand-edited
/// database, schema drift) is skipped as if it were absent rather than
/// failing the whole read. Writes upsert by (student_id, topic_id), so the
/// latest submission replaces the prior score while `attempts` only grows.
#[derive(Clone)]
pub struct MasteryStore {
    pool: SqlitePool,
}

/// Raw row shape. `level` and `last_updated` stay TEXT until
/// [`decode`](RecordRow::decode) so one bad value poisons one row, not the
/// whole query.
#[derive(FromRow)]
struct RecordRow {
    topic_id: String,
    score: i64,
    level: String,
    attempts: i64,
    last_updated: String,
}

impl RecordRow {
    fn decode(self) -> Option<MasteryRecord> {
        let level = MasteryLevel::try_from(self.level).ok()?;
        let last_updated = parse_timestamp(&self.last_updated)?;
        Some(MasteryRecord {
            topic_id: self.topic_id,
            score: self.score,
            level,
            attempts: self.attempts,
            last_updated,
        })
    }
}

/// Accepts the timestamp shapes SQLite ends up holding: RFC 3339, the
/// space-separated offset form, and a naive datetime read as UTC.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    None
}

impl MasteryStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// All records for a student, empty if none exist. Undecodable rows are
    /// logged and skipped.
    pub async fn records_for(&self, student_id: i64) -> Result<Vec<MasteryRecord>, AppError> {
        let rows = sqlx::query_as::<_, RecordRow>(
            r#"
            SELECT topic_id, score, level, attempts, last_updated
            FROM mastery_records
            WHERE student_id = ?1
            ORDER BY topic_id
            "#,
        )
        .bind(student_id)
        .fetch_all(&self.pool)
        .await?;

        let records = rows
            .into_iter()
            .filter_map(|row| {
                let topic_id = row.topic_id.clone();
                let decoded = row.decode();
                if decoded.is_none() {
                    tracing::warn!(
                        "Skipping undecodable mastery record for student {} topic {}",
                        student_id,
                        topic_id
                    );
                }
                decoded
            })
            .collect();

        Ok(records)
    }

    /// The record for one (student, topic) pair, if any. An undecodable row
    /// reads as absent.
    pub async fn find(
        &self,
        student_id: i64,
        topic_id: &str,
    ) -> Result<Option<MasteryRecord>, AppError> {
        let row = sqlx::query_as::<_, RecordRow>(
            r#"
            SELECT topic_id, score, level, attempts, last_updated
            FROM mastery_records
            WHERE student_id = ?1 AND topic_id = ?2
            "#,
        )
        .bind(student_id)
        .bind(topic_id)
        .fetch_optional(&self.pool)
        .await?;

        let record = row.and_then(|r| {
            let decoded = r.decode();
            if decoded.is_none() {
                tracing::warn!(
                    "Treating undecodable mastery record for student {} topic {} as absent",
                    student_id,
                    topic_id
                );
            }
            decoded
        });

        Ok(record)
    }

    /// Upserts the record for (student, topic). `MAX` on attempts keeps the
    /// counter monotonic even if a stale write slips in.
    pub async fn save(&self, student_id: i64, record: &MasteryRecord) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO mastery_records (student_id, topic_id, score, level, attempts, last_updated)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(student_id, topic_id) DO UPDATE SET
                score = excluded.score,
                level = excluded.level,
                attempts = MAX(excluded.attempts, mastery_records.attempts),
                last_updated = excluded.last_updated
            "#,
        )
        .bind(student_id)
        .bind(&record.topic_id)
        .bind(record.score)
        .bind(record.level.as_str())
        .bind(record.attempts)
        .bind(record.last_updated)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to upsert mastery record: {:?}", e);
            AppError::from(e)
        })?;

        Ok(())
    }
}
