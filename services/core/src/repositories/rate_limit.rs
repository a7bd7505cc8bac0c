//! Rate limit attempt repository

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

/// Append-only store of rate-limit attempts, read via sliding-window counts
#[derive(Clone)]
pub struct RateLimitRepository {
    pool: PgPool,
}

impl RateLimitRepository {
    /// Create a new rate limit repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Count attempts for (identifier, action) since the window start
    pub async fn count_since(
        &self,
        identifier: &str,
        action: &str,
        since: DateTime<Utc>,
    ) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM rate_limit_attempts
            WHERE identifier = $1 AND action = $2 AND attempted_at >= $3
            "#,
        )
        .bind(identifier)
        .bind(action)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    /// Append one attempt record
    pub async fn record(&self, identifier: &str, action: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO rate_limit_attempts (identifier, action)
            VALUES ($1, $2)
            "#,
        )
        .bind(identifier)
        .bind(action)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
