//! Session and refresh credential repository

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::{RefreshCredential, Session};

/// Repository for access sessions and the refresh rotation chain
#[derive(Clone)]
pub struct SessionRepository {
    pool: PgPool,
}

impl SessionRepository {
    /// Create a new session repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a new access session
    pub async fn insert_session(
        &self,
        identity_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<Session> {
        let session = sqlx::query_as::<_, Session>(
            r#"
            INSERT INTO sessions (identity_id, token_hash, expires_at)
            VALUES ($1, $2, $3)
            RETURNING id, identity_id, token_hash, expires_at, revoked_at, created_at
            "#,
        )
        .bind(identity_id)
        .bind(token_hash)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(session)
    }

    /// Look up a session by its token digest
    pub async fn find_session_by_hash(&self, token_hash: &str) -> Result<Option<Session>> {
        let session = sqlx::query_as::<_, Session>(
            r#"
            SELECT id, identity_id, token_hash, expires_at, revoked_at, created_at
            FROM sessions
            WHERE token_hash = $1
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(session)
    }

    /// Revoke a session by token digest. Idempotent: an already-revoked or
    /// unknown token is not an error.
    pub async fn revoke_session_by_hash(&self, token_hash: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE sessions
            SET revoked_at = now()
            WHERE token_hash = $1 AND revoked_at IS NULL
            "#,
        )
        .bind(token_hash)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Revoke every live session for an identity
    pub async fn revoke_sessions_for_identity(&self, identity_id: Uuid) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE sessions
            SET revoked_at = now()
            WHERE identity_id = $1 AND revoked_at IS NULL
            "#,
        )
        .bind(identity_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Insert a new refresh credential
    pub async fn insert_refresh(
        &self,
        identity_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<RefreshCredential> {
        let credential = sqlx::query_as::<_, RefreshCredential>(
            r#"
            INSERT INTO refresh_credentials (identity_id, token_hash, expires_at)
            VALUES ($1, $2, $3)
            RETURNING id, identity_id, token_hash, expires_at, revoked_at, replaced_by, created_at
            "#,
        )
        .bind(identity_id)
        .bind(token_hash)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(credential)
    }

    /// Look up a refresh credential by its token digest
    pub async fn find_refresh_by_hash(&self, token_hash: &str) -> Result<Option<RefreshCredential>> {
        let credential = sqlx::query_as::<_, RefreshCredential>(
            r#"
            SELECT id, identity_id, token_hash, expires_at, revoked_at, replaced_by, created_at
            FROM refresh_credentials
            WHERE token_hash = $1
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(credential)
    }

    /// Mark a refresh credential rotated, pointing it at its successor.
    /// Only succeeds while the credential is still unrevoked, so concurrent
    /// rotations of the same token cannot both win.
    pub async fn mark_rotated(&self, credential_id: Uuid, replaced_by: Uuid) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE refresh_credentials
            SET revoked_at = now(), replaced_by = $2
            WHERE id = $1 AND revoked_at IS NULL
            "#,
        )
        .bind(credential_id)
        .bind(replaced_by)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Revoke a credential and every descendant in its rotation chain.
    /// Used when an already-rotated token resurfaces, which signals theft.
    pub async fn revoke_descendant_chain(&self, start_id: Uuid) -> Result<u64> {
        let mut revoked = 0u64;
        let mut current = Some(start_id);

        while let Some(id) = current {
            let row: Option<(Option<Uuid>,)> = sqlx::query_as(
                r#"
                UPDATE refresh_credentials
                SET revoked_at = COALESCE(revoked_at, now())
                WHERE id = $1
                RETURNING replaced_by
                "#,
            )
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

            match row {
                Some((next,)) => {
                    revoked += 1;
                    current = next;
                }
                None => {
                    warn!("Refresh chain walk hit missing credential: {}", id);
                    current = None;
                }
            }
        }

        info!("Revoked {} credentials in refresh chain", revoked);
        Ok(revoked)
    }
}
