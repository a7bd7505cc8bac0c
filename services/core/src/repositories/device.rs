//! Device liveness repository

use anyhow::Result;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::DeviceStatus;

/// Repository for per-device liveness records
#[derive(Clone)]
pub struct DeviceRepository {
    pool: PgPool,
}

impl DeviceRepository {
    /// Create a new device repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Upsert the liveness record reported by a heartbeat
    pub async fn upsert_status(
        &self,
        device_id: &str,
        identity_id: Uuid,
        battery_percent: Option<i32>,
        connectivity: Option<&str>,
        monitoring: bool,
        recording: bool,
    ) -> Result<DeviceStatus> {
        let status = sqlx::query_as::<_, DeviceStatus>(
            r#"
            INSERT INTO device_status
                (device_id, identity_id, battery_percent, connectivity, monitoring, recording)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (device_id) DO UPDATE
            SET identity_id = EXCLUDED.identity_id,
                battery_percent = EXCLUDED.battery_percent,
                connectivity = EXCLUDED.connectivity,
                monitoring = EXCLUDED.monitoring,
                recording = EXCLUDED.recording,
                updated_at = now()
            RETURNING device_id, identity_id, battery_percent, connectivity,
                      monitoring, recording, updated_at
            "#,
        )
        .bind(device_id)
        .bind(identity_id)
        .bind(battery_percent)
        .bind(connectivity)
        .bind(monitoring)
        .bind(recording)
        .fetch_one(&self.pool)
        .await?;

        Ok(status)
    }
}
