//! Panic alert repository

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::PanicAlert;

const ALERT_COLUMNS: &str = "id, identity_id, device_id, status, protocol_code, trigger_type, \
     tracking_code, latitude, longitude, created_at, cancelled_at, cancel_reason, \
     cancel_elapsed_seconds, escalated, guardians_notified, window_sealed";

/// Repository for panic alerts and their tracking links
#[derive(Clone)]
pub struct AlertRepository {
    pool: PgPool,
}

impl AlertRepository {
    /// Create a new alert repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert an active alert. The partial unique index on
    /// (identity_id) WHERE status = 'ativo' makes concurrent triggers
    /// collapse onto one row; a conflict returns None and the caller
    /// fetches the existing alert.
    #[allow(clippy::too_many_arguments)]
    pub async fn insert_active(
        &self,
        identity_id: Uuid,
        device_id: &str,
        protocol_code: &str,
        trigger_type: &str,
        tracking_code: &str,
        latitude: Option<f64>,
        longitude: Option<f64>,
    ) -> Result<Option<PanicAlert>> {
        let alert = sqlx::query_as::<_, PanicAlert>(&format!(
            r#"
            INSERT INTO panic_alerts
                (identity_id, device_id, status, protocol_code, trigger_type,
                 tracking_code, latitude, longitude)
            VALUES ($1, $2, 'ativo', $3, $4, $5, $6, $7)
            ON CONFLICT (identity_id) WHERE status = 'ativo' DO NOTHING
            RETURNING {ALERT_COLUMNS}
            "#
        ))
        .bind(identity_id)
        .bind(device_id)
        .bind(protocol_code)
        .bind(trigger_type)
        .bind(tracking_code)
        .bind(latitude)
        .bind(longitude)
        .fetch_optional(&self.pool)
        .await?;

        Ok(alert)
    }

    /// Find the identity's currently active alert, if any
    pub async fn find_active(&self, identity_id: Uuid) -> Result<Option<PanicAlert>> {
        let alert = sqlx::query_as::<_, PanicAlert>(&format!(
            r#"
            SELECT {ALERT_COLUMNS}
            FROM panic_alerts
            WHERE identity_id = $1 AND status = 'ativo'
            "#
        ))
        .bind(identity_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(alert)
    }

    /// Cancel an alert. Matches only while `ativo`, so a second cancel
    /// (or a stale retry) finds nothing and returns None.
    pub async fn cancel(
        &self,
        alert_id: Uuid,
        cancelled_at: DateTime<Utc>,
        reason: Option<&str>,
        elapsed_seconds: i64,
        escalated: bool,
        window_sealed: bool,
    ) -> Result<Option<PanicAlert>> {
        let alert = sqlx::query_as::<_, PanicAlert>(&format!(
            r#"
            UPDATE panic_alerts
            SET status = 'cancelado',
                cancelled_at = $2,
                cancel_reason = $3,
                cancel_elapsed_seconds = $4,
                escalated = $5,
                window_sealed = $6
            WHERE id = $1 AND status = 'ativo'
            RETURNING {ALERT_COLUMNS}
            "#
        ))
        .bind(alert_id)
        .bind(cancelled_at)
        .bind(reason)
        .bind(elapsed_seconds)
        .bind(escalated)
        .bind(window_sealed)
        .fetch_optional(&self.pool)
        .await?;

        Ok(alert)
    }

    /// Flag that guardian notification was handed to the dispatcher
    pub async fn set_guardians_notified(&self, alert_id: Uuid) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE panic_alerts
            SET guardians_notified = TRUE
            WHERE id = $1
            "#,
        )
        .bind(alert_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Flag that the cancel sealed a monitoring window
    pub async fn set_window_sealed(&self, alert_id: Uuid) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE panic_alerts
            SET window_sealed = TRUE
            WHERE id = $1
            "#,
        )
        .bind(alert_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Create the public tracking link for an alert
    pub async fn insert_tracking_link(
        &self,
        identity_id: Uuid,
        alert_id: Uuid,
        code: &str,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO tracking_links (identity_id, alert_id, code)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(identity_id)
        .bind(alert_id)
        .bind(code)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Deactivate every active tracking link for an identity
    pub async fn deactivate_tracking_links(&self, identity_id: Uuid) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE tracking_links
            SET active = FALSE
            WHERE identity_id = $1 AND active = TRUE
            "#,
        )
        .bind(identity_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
