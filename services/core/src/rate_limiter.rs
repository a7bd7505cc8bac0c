//! Rate limiter for login and sensitive-mutation actions
//!
//! Sliding-window count over append-only attempt rows. The gate runs before
//! any credential comparison, and every check appends an attempt record
//! whether it passes or not.

use chrono::{Duration, Utc};
use tracing::warn;

use crate::error::{ApiError, ApiResult};
use crate::repositories::RateLimitRepository;

/// Rate limiter configuration
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Maximum number of attempts allowed inside the window
    pub max_attempts: i64,
    /// Sliding window length in seconds
    pub window_seconds: i64,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            window_seconds: 300, // 5 minutes
        }
    }
}

impl RateLimiterConfig {
    /// Create a RateLimiterConfig from environment variables, with defaults
    pub fn from_env() -> Self {
        let max_attempts = std::env::var("RATE_LIMIT_MAX_ATTEMPTS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5);

        let window_seconds = std::env::var("RATE_LIMIT_WINDOW_SECONDS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(300);

        Self {
            max_attempts,
            window_seconds,
        }
    }
}

/// Actions gated by the limiter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitedAction {
    Login,
    ChangePassword,
    SetDuressPassword,
}

impl LimitedAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            LimitedAction::Login => "login",
            LimitedAction::ChangePassword => "change_password",
            LimitedAction::SetDuressPassword => "set_duress_password",
        }
    }
}

/// Sliding-window rate limiter
#[derive(Clone)]
pub struct RateLimiter {
    attempts: RateLimitRepository,
    config: RateLimiterConfig,
}

impl RateLimiter {
    /// Create a new rate limiter
    pub fn new(attempts: RateLimitRepository, config: RateLimiterConfig) -> Self {
        Self { attempts, config }
    }

    /// Gate one attempt for (identifier, action). The first `max_attempts`
    /// attempts inside the window pass; the next fails `RateLimited`.
    pub async fn check(&self, identifier: &str, action: LimitedAction) -> ApiResult<()> {
        let since = Utc::now() - Duration::seconds(self.config.window_seconds);
        let prior = self
            .attempts
            .count_since(identifier, action.as_str(), since)
            .await?;

        // The attempt is recorded regardless of the verdict.
        self.attempts.record(identifier, action.as_str()).await?;

        if prior >= self.config.max_attempts {
            warn!(
                "Rate limit hit for {} on {} ({} attempts in window)",
                identifier,
                action.as_str(),
                prior
            );
            return Err(ApiError::RateLimited);
        }

        Ok(())
    }

    /// Get the rate limiter configuration
    pub fn config(&self) -> &RateLimiterConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = RateLimiterConfig::default();
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.window_seconds, 300);
    }

    #[test]
    fn action_names_are_stable() {
        assert_eq!(LimitedAction::Login.as_str(), "login");
        assert_eq!(LimitedAction::ChangePassword.as_str(), "change_password");
        assert_eq!(
            LimitedAction::SetDuressPassword.as_str(),
            "set_duress_password"
        );
    }
}
