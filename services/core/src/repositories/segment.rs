//! Audio segment repository

use anyhow::Result;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::AudioSegment;

const SEGMENT_COLUMNS: &str =
    "id, session_id, device_id, ordinal, storage_key, duration_seconds, size_bytes, received_at";

/// Repository for audio segment metadata
#[derive(Clone)]
pub struct SegmentRepository {
    pool: PgPool,
}

impl SegmentRepository {
    /// Create a new segment repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a segment row. When an ordinal is present, the partial unique
    /// index on (session_id, ordinal) turns a concurrent duplicate into a
    /// conflict; None means the caller should fetch the existing row.
    pub async fn insert(
        &self,
        session_id: Uuid,
        device_id: &str,
        ordinal: Option<i32>,
        storage_key: &str,
        duration_seconds: Option<f64>,
        size_bytes: Option<i64>,
    ) -> Result<Option<AudioSegment>> {
        let segment = sqlx::query_as::<_, AudioSegment>(&format!(
            r#"
            INSERT INTO audio_segments
                (session_id, device_id, ordinal, storage_key, duration_seconds, size_bytes)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (session_id, ordinal) WHERE ordinal IS NOT NULL DO NOTHING
            RETURNING {SEGMENT_COLUMNS}
            "#
        ))
        .bind(session_id)
        .bind(device_id)
        .bind(ordinal)
        .bind(storage_key)
        .bind(duration_seconds)
        .bind(size_bytes)
        .fetch_optional(&self.pool)
        .await?;

        Ok(segment)
    }

    /// Find a segment by its idempotency key
    pub async fn find_by_session_ordinal(
        &self,
        session_id: Uuid,
        ordinal: i32,
    ) -> Result<Option<AudioSegment>> {
        let segment = sqlx::query_as::<_, AudioSegment>(&format!(
            r#"
            SELECT {SEGMENT_COLUMNS}
            FROM audio_segments
            WHERE session_id = $1 AND ordinal = $2
            "#
        ))
        .bind(session_id)
        .bind(ordinal)
        .fetch_optional(&self.pool)
        .await?;

        Ok(segment)
    }

    /// Count segments recorded for a session
    pub async fn count_for_session(&self, session_id: Uuid) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM audio_segments WHERE session_id = $1")
                .bind(session_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }

    /// List the storage keys of a session's segments, for object cleanup
    pub async fn list_keys_for_session(&self, session_id: Uuid) -> Result<Vec<String>> {
        let keys: Vec<String> =
            sqlx::query_scalar("SELECT storage_key FROM audio_segments WHERE session_id = $1")
                .bind(session_id)
                .fetch_all(&self.pool)
                .await?;

        Ok(keys)
    }
}
