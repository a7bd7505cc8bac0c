//! Identity model and related functionality

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A protected account. Carries two independently stored password hashes:
/// the normal one and an optional duress one that must differ from it.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Identity {
    pub id: Uuid,
    pub account_code: String,
    pub phone: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[serde(skip_serializing)]
    pub duress_password_hash: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Identity {
    /// Whether the account may authenticate at all.
    pub fn is_active(&self) -> bool {
        self.status == "ativo"
    }

    /// Phone number with everything but the last four digits masked,
    /// for dispatch contexts that must not leak the full number.
    pub fn masked_phone(&self) -> Option<String> {
        self.phone.as_ref().map(|p| {
            let digits: String = p.chars().filter(|c| c.is_ascii_digit()).collect();
            if digits.len() <= 4 {
                "*".repeat(digits.len())
            } else {
                format!("{}{}", "*".repeat(digits.len() - 4), &digits[digits.len() - 4..])
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity_with_phone(phone: Option<&str>) -> Identity {
        Identity {
            id: Uuid::new_v4(),
            account_code: "AC-1".to_string(),
            phone: phone.map(String::from),
            password_hash: "hash".to_string(),
            duress_password_hash: None,
            status: "ativo".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn masks_all_but_last_four_digits() {
        let identity = identity_with_phone(Some("+55 11 91234-5678"));
        assert_eq!(identity.masked_phone().unwrap(), "*********5678");
    }

    #[test]
    fn masks_short_numbers_entirely() {
        let identity = identity_with_phone(Some("123"));
        assert_eq!(identity.masked_phone().unwrap(), "***");
    }

    #[test]
    fn no_phone_yields_none() {
        assert!(identity_with_phone(None).masked_phone().is_none());
    }
}
