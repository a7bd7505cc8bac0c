//! Audit trail repository

use anyhow::Result;
use sqlx::PgPool;
use uuid::Uuid;

/// Repository for the internal audit trail. Coercion events land here with
/// the `coercion` flag set and nowhere else.
#[derive(Clone)]
pub struct AuditRepository {
    pool: PgPool,
}

impl AuditRepository {
    /// Create a new audit repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Record an audit event
    pub async fn record(
        &self,
        identity_id: Uuid,
        action: &str,
        coercion: bool,
        details: serde_json::Value,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_events (identity_id, action, coercion, details)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(identity_id)
        .bind(action)
        .bind(coercion)
        .bind(details)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
