//! Token vault: opaque session and refresh credential lifecycle
//!
//! Raw tokens are high-entropy random values handed to the client exactly
//! once; only their SHA-256 digests are persisted. Refresh credentials are
//! single-use and form a linked rotation chain through `replaced_by`.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use sha2::{Digest, Sha256};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::models::{IssuedTokens, RefreshCredential};
use crate::repositories::SessionRepository;

/// Token vault configuration
#[derive(Debug, Clone)]
pub struct TokenConfig {
    /// Access session lifetime in hours
    pub session_ttl_hours: i64,
    /// Refresh credential lifetime in days
    pub refresh_ttl_days: i64,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            session_ttl_hours: 24,
            refresh_ttl_days: 30,
        }
    }
}

impl TokenConfig {
    /// Create a TokenConfig from environment variables, with defaults
    pub fn from_env() -> Self {
        let session_ttl_hours = std::env::var("SESSION_TTL_HOURS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(24);

        let refresh_ttl_days = std::env::var("REFRESH_TTL_DAYS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(30);

        Self {
            session_ttl_hours,
            refresh_ttl_days,
        }
    }
}

/// Classification of a presented refresh credential
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    Fresh,
    AlreadyRotated,
    Expired,
}

/// Classify a credential row against the current time
pub fn classify_refresh(credential: &RefreshCredential, now: DateTime<Utc>) -> RefreshState {
    if credential.revoked_at.is_some() || credential.replaced_by.is_some() {
        RefreshState::AlreadyRotated
    } else if credential.expires_at <= now {
        RefreshState::Expired
    } else {
        RefreshState::Fresh
    }
}

/// Generate a raw opaque token: 32 random bytes, hex encoded
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::thread_rng().r#gen();
    hex::encode(bytes)
}

/// SHA-256 digest of a raw token, hex encoded. This is the only form that
/// ever touches the database.
pub fn hash_token(raw: &str) -> String {
    hex::encode(Sha256::digest(raw.as_bytes()))
}

/// Token vault service
#[derive(Clone)]
pub struct TokenVault {
    sessions: SessionRepository,
    config: TokenConfig,
}

impl TokenVault {
    /// Create a new token vault
    pub fn new(sessions: SessionRepository, config: TokenConfig) -> Self {
        Self { sessions, config }
    }

    /// Issue a fresh session + refresh credential pair for an identity
    pub async fn issue(&self, identity_id: Uuid) -> ApiResult<IssuedTokens> {
        let now = Utc::now();
        let access_token = generate_token();
        let refresh_token = generate_token();

        let access_expires_at = now + Duration::hours(self.config.session_ttl_hours);
        let refresh_expires_at = now + Duration::days(self.config.refresh_ttl_days);

        let session = self
            .sessions
            .insert_session(identity_id, &hash_token(&access_token), access_expires_at)
            .await?;

        self.sessions
            .insert_refresh(identity_id, &hash_token(&refresh_token), refresh_expires_at)
            .await?;

        info!("Issued session {} for identity {}", session.id, identity_id);

        Ok(IssuedTokens {
            session_id: session.id,
            access_token,
            access_expires_at,
            refresh_token,
            refresh_expires_at,
        })
    }

    /// Validate a raw session token, returning the bound identity id
    pub async fn validate(&self, raw_token: &str) -> ApiResult<Uuid> {
        let session = self
            .sessions
            .find_session_by_hash(&hash_token(raw_token))
            .await?
            .ok_or(ApiError::SessionInvalid)?;

        if !session.is_valid_at(Utc::now()) {
            return Err(ApiError::SessionInvalid);
        }

        Ok(session.identity_id)
    }

    /// Revoke a raw session token. Idempotent.
    pub async fn revoke(&self, raw_token: &str) -> ApiResult<()> {
        self.sessions
            .revoke_session_by_hash(&hash_token(raw_token))
            .await?;

        Ok(())
    }

    /// Rotate a refresh credential. Each credential is single-use: reuse of
    /// an already-rotated token is treated as theft, revoking the whole
    /// descendant chain and every live session for the identity.
    pub async fn rotate(&self, raw_refresh: &str) -> ApiResult<IssuedTokens> {
        let now = Utc::now();
        let credential = self
            .sessions
            .find_refresh_by_hash(&hash_token(raw_refresh))
            .await?
            .ok_or(ApiError::RefreshInvalid)?;

        match classify_refresh(&credential, now) {
            RefreshState::AlreadyRotated => {
                warn!(
                    "Rotated refresh credential {} presented again; revoking chain",
                    credential.id
                );
                self.sessions.revoke_descendant_chain(credential.id).await?;
                self.sessions
                    .revoke_sessions_for_identity(credential.identity_id)
                    .await?;
                Err(ApiError::RefreshInvalid)
            }
            RefreshState::Expired => Err(ApiError::RefreshInvalid),
            RefreshState::Fresh => {
                let access_token = generate_token();
                let refresh_token = generate_token();
                let access_expires_at = now + Duration::hours(self.config.session_ttl_hours);
                let refresh_expires_at = now + Duration::days(self.config.refresh_ttl_days);

                let session = self
                    .sessions
                    .insert_session(
                        credential.identity_id,
                        &hash_token(&access_token),
                        access_expires_at,
                    )
                    .await?;

                let replacement = self
                    .sessions
                    .insert_refresh(
                        credential.identity_id,
                        &hash_token(&refresh_token),
                        refresh_expires_at,
                    )
                    .await?;

                let won = self
                    .sessions
                    .mark_rotated(credential.id, replacement.id)
                    .await?;

                if !won {
                    // A concurrent rotation claimed this credential first.
                    warn!(
                        "Lost rotation race on refresh credential {}; revoking chain",
                        credential.id
                    );
                    self.sessions.revoke_descendant_chain(replacement.id).await?;
                    self.sessions.revoke_descendant_chain(credential.id).await?;
                    self.sessions
                        .revoke_sessions_for_identity(credential.identity_id)
                        .await?;
                    return Err(ApiError::RefreshInvalid);
                }

                Ok(IssuedTokens {
                    session_id: session.id,
                    access_token,
                    access_expires_at,
                    refresh_token,
                    refresh_expires_at,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credential(
        revoked: bool,
        replaced: bool,
        expires_in_secs: i64,
    ) -> RefreshCredential {
        let now = Utc::now();
        RefreshCredential {
            id: Uuid::new_v4(),
            identity_id: Uuid::new_v4(),
            token_hash: hash_token("raw"),
            expires_at: now + Duration::seconds(expires_in_secs),
            revoked_at: revoked.then_some(now),
            replaced_by: replaced.then(Uuid::new_v4),
            created_at: now,
        }
    }

    #[test]
    fn fresh_credential_classifies_fresh() {
        let c = credential(false, false, 3600);
        assert_eq!(classify_refresh(&c, Utc::now()), RefreshState::Fresh);
    }

    #[test]
    fn revoked_credential_is_already_rotated() {
        let c = credential(true, false, 3600);
        assert_eq!(classify_refresh(&c, Utc::now()), RefreshState::AlreadyRotated);
    }

    #[test]
    fn replaced_credential_is_already_rotated() {
        let c = credential(false, true, 3600);
        assert_eq!(classify_refresh(&c, Utc::now()), RefreshState::AlreadyRotated);
    }

    #[test]
    fn expired_credential_is_expired() {
        let c = credential(false, false, -1);
        assert_eq!(classify_refresh(&c, Utc::now()), RefreshState::Expired);
    }

    #[test]
    fn generated_tokens_are_distinct_and_long() {
        let a = generate_token();
        let b = generate_token();
        assert_ne!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn token_hash_is_stable_and_not_the_raw_value() {
        let raw = generate_token();
        assert_eq!(hash_token(&raw), hash_token(&raw));
        assert_ne!(hash_token(&raw), raw);
        assert_eq!(hash_token(&raw).len(), 64);
    }
}
