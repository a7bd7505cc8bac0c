//! Monitoring session repository

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::models::MonitoringSession;

const SESSION_COLUMNS: &str = "id, identity_id, device_id, status, window_start, window_end, \
     origin, sealed_reason, created_at, updated_at";

/// Repository for monitoring sessions
#[derive(Clone)]
pub struct MonitoringRepository {
    pool: PgPool,
}

impl MonitoringRepository {
    /// Create a new monitoring repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert an active session. The partial unique index on
    /// (identity_id, device_id) WHERE status = 'ativa' makes a concurrent
    /// duplicate start collapse onto the existing row; a conflict returns
    /// None and the caller fetches the existing session.
    pub async fn insert_active(
        &self,
        identity_id: Uuid,
        device_id: &str,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
        origin: &str,
    ) -> Result<Option<MonitoringSession>> {
        let session = sqlx::query_as::<_, MonitoringSession>(&format!(
            r#"
            INSERT INTO monitoring_sessions
                (identity_id, device_id, status, window_start, window_end, origin)
            VALUES ($1, $2, 'ativa', $3, $4, $5)
            ON CONFLICT (identity_id, device_id) WHERE status = 'ativa' DO NOTHING
            RETURNING {SESSION_COLUMNS}
            "#
        ))
        .bind(identity_id)
        .bind(device_id)
        .bind(window_start)
        .bind(window_end)
        .bind(origin)
        .fetch_optional(&self.pool)
        .await?;

        Ok(session)
    }

    /// Find the active session for (identity, device)
    pub async fn find_active(
        &self,
        identity_id: Uuid,
        device_id: &str,
    ) -> Result<Option<MonitoringSession>> {
        let session = sqlx::query_as::<_, MonitoringSession>(&format!(
            r#"
            SELECT {SESSION_COLUMNS}
            FROM monitoring_sessions
            WHERE identity_id = $1 AND device_id = $2 AND status = 'ativa'
            "#
        ))
        .bind(identity_id)
        .bind(device_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(session)
    }

    /// Find the active session for an identity on any device
    pub async fn find_active_any_device(
        &self,
        identity_id: Uuid,
    ) -> Result<Option<MonitoringSession>> {
        let session = sqlx::query_as::<_, MonitoringSession>(&format!(
            r#"
            SELECT {SESSION_COLUMNS}
            FROM monitoring_sessions
            WHERE identity_id = $1 AND status = 'ativa'
            ORDER BY created_at DESC
            LIMIT 1
            "#
        ))
        .bind(identity_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(session)
    }

    /// Fetch a session by id
    pub async fn find_by_id(&self, session_id: Uuid) -> Result<Option<MonitoringSession>> {
        let session = sqlx::query_as::<_, MonitoringSession>(&format!(
            r#"
            SELECT {SESSION_COLUMNS}
            FROM monitoring_sessions
            WHERE id = $1
            "#
        ))
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(session)
    }

    /// Seal one session to `aguardando_finalizacao`. Matches only while
    /// `ativa`, so a repeated seal is a no-op returning None.
    pub async fn seal(
        &self,
        session_id: Uuid,
        reason: &str,
    ) -> Result<Option<MonitoringSession>> {
        let session = sqlx::query_as::<_, MonitoringSession>(&format!(
            r#"
            UPDATE monitoring_sessions
            SET status = 'aguardando_finalizacao', sealed_reason = $2, updated_at = now()
            WHERE id = $1 AND status = 'ativa'
            RETURNING {SESSION_COLUMNS}
            "#
        ))
        .bind(session_id)
        .bind(reason)
        .fetch_optional(&self.pool)
        .await?;

        Ok(session)
    }

    /// Seal every active session for an identity, returning how many sealed
    pub async fn seal_active_for_identity(&self, identity_id: Uuid, reason: &str) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE monitoring_sessions
            SET status = 'aguardando_finalizacao', sealed_reason = $2, updated_at = now()
            WHERE identity_id = $1 AND status = 'ativa'
            "#,
        )
        .bind(identity_id)
        .bind(reason)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            info!(
                "Sealed {} monitoring session(s) for identity {} ({})",
                result.rows_affected(),
                identity_id,
                reason
            );
        }

        Ok(result.rows_affected())
    }

    /// Delete a session outright. Segment rows cascade.
    pub async fn delete(&self, session_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM monitoring_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }
}
