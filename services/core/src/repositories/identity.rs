//! Identity repository for database operations

use anyhow::Result;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::models::Identity;

/// Identity repository
#[derive(Clone)]
pub struct IdentityRepository {
    pool: PgPool,
}

impl IdentityRepository {
    /// Create a new identity repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find an identity by ID
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Identity>> {
        let identity = sqlx::query_as::<_, Identity>(
            r#"
            SELECT id, account_code, phone, password_hash, duress_password_hash,
                   status, created_at, updated_at
            FROM identities
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(identity)
    }

    /// Find an identity by its account code
    pub async fn find_by_account_code(&self, account_code: &str) -> Result<Option<Identity>> {
        let identity = sqlx::query_as::<_, Identity>(
            r#"
            SELECT id, account_code, phone, password_hash, duress_password_hash,
                   status, created_at, updated_at
            FROM identities
            WHERE account_code = $1
            "#,
        )
        .bind(account_code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(identity)
    }

    /// Replace the stored normal-password hash
    pub async fn update_password_hash(&self, id: Uuid, password_hash: &str) -> Result<()> {
        info!("Updating password hash for identity: {}", id);

        sqlx::query(
            r#"
            UPDATE identities
            SET password_hash = $2, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(password_hash)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Replace the stored duress-password hash
    pub async fn update_duress_hash(&self, id: Uuid, duress_hash: &str) -> Result<()> {
        info!("Updating duress hash for identity: {}", id);

        sqlx::query(
            r#"
            UPDATE identities
            SET duress_password_hash = $2, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(duress_hash)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
