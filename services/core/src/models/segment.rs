//! Audio segment model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One ordinal chunk of a monitoring session's audio. The (session, ordinal)
/// pair is the idempotency key for retried uploads.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AudioSegment {
    pub id: Uuid,
    pub session_id: Uuid,
    pub device_id: String,
    pub ordinal: Option<i32>,
    pub storage_key: String,
    pub duration_seconds: Option<f64>,
    pub size_bytes: Option<i64>,
    pub received_at: DateTime<Utc>,
}
