//! Duress-aware authentication
//!
//! Each identity carries two independently stored password hashes. A match
//! against the duress hash authenticates successfully but tags the result,
//! and every sensitive mutation routes through a single policy keyed by that
//! tag: under duress the call reports the identical success while performing
//! no change, with the true outcome recorded only in the audit trail.

use anyhow::Result;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use serde_json::json;
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::models::Identity;
use crate::repositories::{AuditRepository, IdentityRepository};
use crate::validation::validate_password;

/// Tagged authentication result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    /// Normal-password match
    Normal,
    /// Duress-password match: the caller is under observation
    Duress,
}

/// What a sensitive mutation does under each authentication tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationPolicy {
    /// Execute the change and audit it as real
    Execute,
    /// Report success, perform no change, audit as coercion
    FakeSuccess,
}

impl MutationPolicy {
    /// The single policy table keyed by the authentication tag
    pub fn for_outcome(outcome: AuthOutcome) -> Self {
        match outcome {
            AuthOutcome::Normal => MutationPolicy::Execute,
            AuthOutcome::Duress => MutationPolicy::FakeSuccess,
        }
    }
}

/// Hash a password with argon2
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut rand::thread_rng());
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?
        .to_string();

    Ok(hash)
}

/// Verify a password against a stored argon2 hash
pub fn verify_password(password: &str, stored_hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(stored_hash)
        .map_err(|e| anyhow::anyhow!("Failed to parse password hash: {}", e))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Check a password against both stored hashes, yielding the tagged outcome
pub fn classify_credential(identity: &Identity, password: &str) -> Result<Option<AuthOutcome>> {
    // Both hashes are always checked so a failure does not reveal which
    // field was wrong.
    let normal_match = verify_password(password, &identity.password_hash)?;
    let duress_match = match &identity.duress_password_hash {
        Some(hash) => verify_password(password, hash)?,
        None => false,
    };

    if normal_match {
        Ok(Some(AuthOutcome::Normal))
    } else if duress_match {
        Ok(Some(AuthOutcome::Duress))
    } else {
        Ok(None)
    }
}

/// Duress-aware authenticator service
#[derive(Clone)]
pub struct Authenticator {
    identities: IdentityRepository,
    audit: AuditRepository,
}

impl Authenticator {
    /// Create a new authenticator
    pub fn new(identities: IdentityRepository, audit: AuditRepository) -> Self {
        Self { identities, audit }
    }

    /// Authenticate an account code + password pair. Unknown accounts,
    /// inactive accounts, and wrong passwords all fail identically.
    pub async fn authenticate(
        &self,
        account_code: &str,
        password: &str,
    ) -> ApiResult<(Identity, AuthOutcome)> {
        let identity = self
            .identities
            .find_by_account_code(account_code)
            .await?
            .ok_or(ApiError::AuthFailed)?;

        if !identity.is_active() {
            return Err(ApiError::AuthFailed);
        }

        let outcome = classify_credential(&identity, password)?.ok_or(ApiError::AuthFailed)?;

        if outcome == AuthOutcome::Duress {
            // Silent record; the login response is indistinguishable from a
            // normal one.
            self.audit
                .record(identity.id, "login", true, json!({ "tag": "duress" }))
                .await?;
        }

        Ok((identity, outcome))
    }

    /// Change the normal password. Under duress this reports success while
    /// leaving the stored hash untouched.
    pub async fn change_password(
        &self,
        identity: &Identity,
        outcome: AuthOutcome,
        new_password: &str,
    ) -> ApiResult<()> {
        validate_password(new_password).map_err(ApiError::Validation)?;

        match MutationPolicy::for_outcome(outcome) {
            MutationPolicy::Execute => {
                let new_hash = hash_password(new_password)?;
                self.identities
                    .update_password_hash(identity.id, &new_hash)
                    .await?;
                self.audit
                    .record(identity.id, "change_password", false, json!({}))
                    .await?;
                info!("Password changed for identity {}", identity.id);
            }
            MutationPolicy::FakeSuccess => {
                self.audit
                    .record(identity.id, "change_password", true, json!({}))
                    .await?;
            }
        }

        Ok(())
    }

    /// Set or replace the duress password. The new value must differ from
    /// the current normal password. Under duress this reports success while
    /// performing no change.
    pub async fn set_duress_password(
        &self,
        identity: &Identity,
        outcome: AuthOutcome,
        duress_password: &str,
    ) -> ApiResult<()> {
        validate_password(duress_password).map_err(ApiError::Validation)?;

        if verify_password(duress_password, &identity.password_hash)? {
            return Err(ApiError::Validation(
                "Senha de coacao deve ser diferente da senha normal".to_string(),
            ));
        }

        match MutationPolicy::for_outcome(outcome) {
            MutationPolicy::Execute => {
                let new_hash = hash_password(duress_password)?;
                self.identities
                    .update_duress_hash(identity.id, &new_hash)
                    .await?;
                self.audit
                    .record(identity.id, "set_duress_password", false, json!({}))
                    .await?;
                info!("Duress password set for identity {}", identity.id);
            }
            MutationPolicy::FakeSuccess => {
                self.audit
                    .record(identity.id, "set_duress_password", true, json!({}))
                    .await?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn identity(password: &str, duress: Option<&str>) -> Identity {
        Identity {
            id: Uuid::new_v4(),
            account_code: "AC-1".to_string(),
            phone: None,
            password_hash: hash_password(password).unwrap(),
            duress_password_hash: duress.map(|d| hash_password(d).unwrap()),
            status: "ativo".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn normal_password_tags_normal() {
        let id = identity("Correct-h0rse!", Some("Duress-h0rse!"));
        let outcome = classify_credential(&id, "Correct-h0rse!").unwrap();
        assert_eq!(outcome, Some(AuthOutcome::Normal));
    }

    #[test]
    fn duress_password_tags_duress() {
        let id = identity("Correct-h0rse!", Some("Duress-h0rse!"));
        let outcome = classify_credential(&id, "Duress-h0rse!").unwrap();
        assert_eq!(outcome, Some(AuthOutcome::Duress));
    }

    #[test]
    fn wrong_password_matches_nothing() {
        let id = identity("Correct-h0rse!", Some("Duress-h0rse!"));
        let outcome = classify_credential(&id, "Wrong-h0rse!").unwrap();
        assert_eq!(outcome, None);
    }

    #[test]
    fn missing_duress_hash_never_tags_duress() {
        let id = identity("Correct-h0rse!", None);
        assert_eq!(
            classify_credential(&id, "Duress-h0rse!").unwrap(),
            None
        );
    }

    #[test]
    fn policy_table_routes_by_tag() {
        assert_eq!(
            MutationPolicy::for_outcome(AuthOutcome::Normal),
            MutationPolicy::Execute
        );
        assert_eq!(
            MutationPolicy::for_outcome(AuthOutcome::Duress),
            MutationPolicy::FakeSuccess
        );
    }

    #[test]
    fn hash_roundtrip_verifies() {
        let hash = hash_password("Segura-123!").unwrap();
        assert!(verify_password("Segura-123!", &hash).unwrap());
        assert!(!verify_password("Errada-123!", &hash).unwrap());
    }
}
