//! Location sample repository

use anyhow::Result;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::LocationSample;

const SAMPLE_COLUMNS: &str = "id, identity_id, device_id, alert_id, latitude, longitude, \
     accuracy, speed, heading, captured_at";

/// Repository for GPS samples
#[derive(Clone)]
pub struct LocationRepository {
    pool: PgPool,
}

impl LocationRepository {
    /// Create a new location repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a sample, optionally linked to the active alert
    #[allow(clippy::too_many_arguments)]
    pub async fn insert(
        &self,
        identity_id: Uuid,
        device_id: &str,
        alert_id: Option<Uuid>,
        latitude: f64,
        longitude: f64,
        accuracy: Option<f64>,
        speed: Option<f64>,
        heading: Option<f64>,
    ) -> Result<LocationSample> {
        let sample = sqlx::query_as::<_, LocationSample>(&format!(
            r#"
            INSERT INTO location_samples
                (identity_id, device_id, alert_id, latitude, longitude,
                 accuracy, speed, heading)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {SAMPLE_COLUMNS}
            "#
        ))
        .bind(identity_id)
        .bind(device_id)
        .bind(alert_id)
        .bind(latitude)
        .bind(longitude)
        .bind(accuracy)
        .bind(speed)
        .bind(heading)
        .fetch_one(&self.pool)
        .await?;

        Ok(sample)
    }

    /// Most recent sample for an identity
    pub async fn latest_for_identity(&self, identity_id: Uuid) -> Result<Option<LocationSample>> {
        let sample = sqlx::query_as::<_, LocationSample>(&format!(
            r#"
            SELECT {SAMPLE_COLUMNS}
            FROM location_samples
            WHERE identity_id = $1
            ORDER BY captured_at DESC
            LIMIT 1
            "#
        ))
        .bind(identity_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(sample)
    }
}
