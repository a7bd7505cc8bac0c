//! Credential resolution for action requests
//!
//! Two credential modes exist and are kept distinct at every call site: a
//! session token, and the weaker legacy mode where a device presents only
//! its bare account identifier. Actions opt into the legacy mode
//! explicitly; everything else requires a session.

use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::models::Identity;
use crate::repositories::IdentityRepository;
use crate::tokens::TokenVault;

/// How the caller authenticated
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    /// Opaque session token
    Session(String),
    /// Legacy device mode: bare account identifier, no secret. Weaker by
    /// construction; only device-originated telemetry actions accept it.
    LegacyDevice(Uuid),
}

impl Credential {
    /// Build a credential from the optional request fields. A session token
    /// always wins over a bare identifier.
    pub fn from_parts(
        session_token: Option<String>,
        account_id: Option<Uuid>,
    ) -> ApiResult<Self> {
        match (session_token, account_id) {
            (Some(token), _) if !token.is_empty() => Ok(Credential::Session(token)),
            (_, Some(id)) => Ok(Credential::LegacyDevice(id)),
            _ => Err(ApiError::AuthFailed),
        }
    }

    /// Resolve the credential to an identity. `allow_legacy` is the explicit
    /// opt-in for the weaker mode.
    pub async fn resolve(
        &self,
        vault: &TokenVault,
        identities: &IdentityRepository,
        allow_legacy: bool,
    ) -> ApiResult<Identity> {
        match self {
            Credential::Session(token) => {
                let identity_id = vault.validate(token).await?;
                let identity = identities
                    .find_by_id(identity_id)
                    .await?
                    .ok_or(ApiError::SessionInvalid)?;
                if !identity.is_active() {
                    return Err(ApiError::SessionInvalid);
                }
                Ok(identity)
            }
            Credential::LegacyDevice(account_id) => {
                if !allow_legacy {
                    return Err(ApiError::AuthFailed);
                }
                let identity = identities
                    .find_by_id(*account_id)
                    .await?
                    .ok_or(ApiError::AuthFailed)?;
                if !identity.is_active() {
                    return Err(ApiError::AuthFailed);
                }
                Ok(identity)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_token_wins_over_account_id() {
        let cred = Credential::from_parts(Some("tok".to_string()), Some(Uuid::new_v4())).unwrap();
        assert!(matches!(cred, Credential::Session(_)));
    }

    #[test]
    fn bare_account_id_is_legacy_mode() {
        let id = Uuid::new_v4();
        let cred = Credential::from_parts(None, Some(id)).unwrap();
        assert_eq!(cred, Credential::LegacyDevice(id));
    }

    #[test]
    fn empty_token_falls_through_to_account_id() {
        let id = Uuid::new_v4();
        let cred = Credential::from_parts(Some(String::new()), Some(id)).unwrap();
        assert_eq!(cred, Credential::LegacyDevice(id));
    }

    #[test]
    fn no_credential_fails_uniformly() {
        assert!(Credential::from_parts(None, None).is_err());
    }
}
