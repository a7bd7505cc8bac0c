//! Weekly schedule repository

use anyhow::Result;
use sqlx::{PgPool, Row};
use uuid::Uuid;

/// A stored schedule entry: weekday 0–6 (Monday = 0) plus HH:MM bounds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleEntry {
    pub weekday: i16,
    pub start_time: String,
    pub end_time: String,
}

/// Repository for the weekly monitoring schedule
#[derive(Clone)]
pub struct ScheduleRepository {
    pool: PgPool,
}

impl ScheduleRepository {
    /// Create a new schedule repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Replace the whole schedule for an identity in one transaction
    pub async fn replace_for_identity(
        &self,
        identity_id: Uuid,
        entries: &[ScheduleEntry],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM weekly_schedules WHERE identity_id = $1")
            .bind(identity_id)
            .execute(&mut *tx)
            .await?;

        for entry in entries {
            sqlx::query(
                r#"
                INSERT INTO weekly_schedules (identity_id, weekday, start_time, end_time)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(identity_id)
            .bind(entry.weekday)
            .bind(&entry.start_time)
            .bind(&entry.end_time)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Entries for one weekday, ordered by start time
    pub async fn list_for_day(
        &self,
        identity_id: Uuid,
        weekday: i16,
    ) -> Result<Vec<ScheduleEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT weekday, start_time, end_time
            FROM weekly_schedules
            WHERE identity_id = $1 AND weekday = $2
            ORDER BY start_time
            "#,
        )
        .bind(identity_id)
        .bind(weekday)
        .fetch_all(&self.pool)
        .await?;

        let entries = rows
            .into_iter()
            .map(|row| ScheduleEntry {
                weekday: row.get("weekday"),
                start_time: row.get("start_time"),
                end_time: row.get("end_time"),
            })
            .collect();

        Ok(entries)
    }
}
