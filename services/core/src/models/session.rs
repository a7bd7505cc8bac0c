//! Session and refresh credential models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// An access session. Only the SHA-256 digest of the raw token is stored;
/// the raw value is returned once at issuance and never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Session {
    pub id: Uuid,
    pub identity_id: Uuid,
    #[serde(skip_serializing)]
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// A session is usable while unrevoked and before expiry.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.revoked_at.is_none() && self.expires_at > now
    }
}

/// A single-use refresh credential. Rotation revokes the row and points
/// `replaced_by` at its successor, forming a linked chain.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RefreshCredential {
    pub id: Uuid,
    pub identity_id: Uuid,
    #[serde(skip_serializing)]
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub replaced_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Raw token pair handed to the client exactly once.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedTokens {
    pub session_id: Uuid,
    pub access_token: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_token: String,
    pub refresh_expires_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn session(expires_in: Duration, revoked: bool) -> Session {
        let now = Utc::now();
        Session {
            id: Uuid::new_v4(),
            identity_id: Uuid::new_v4(),
            token_hash: "abc".to_string(),
            expires_at: now + expires_in,
            revoked_at: revoked.then_some(now),
            created_at: now,
        }
    }

    #[test]
    fn unexpired_unrevoked_session_is_valid() {
        assert!(session(Duration::hours(1), false).is_valid_at(Utc::now()));
    }

    #[test]
    fn expired_session_is_invalid() {
        assert!(!session(Duration::seconds(-1), false).is_valid_at(Utc::now()));
    }

    #[test]
    fn revoked_session_is_invalid() {
        assert!(!session(Duration::hours(1), true).is_valid_at(Utc::now()));
    }
}
