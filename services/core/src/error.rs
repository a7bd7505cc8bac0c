//! Custom error types for the coordination core

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Error surface of the action endpoint. Authentication failures are
/// deliberately uniform: callers can never tell an unknown account from a
/// wrong credential.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Request rejected before any mutation
    #[error("Validation error: {0}")]
    Validation(String),

    /// Uniform authentication failure
    #[error("Authentication failed")]
    AuthFailed,

    /// Session token absent, revoked, or past expiry
    #[error("Session invalid")]
    SessionInvalid,

    /// Refresh token unknown, expired, or already rotated
    #[error("Refresh invalid")]
    RefreshInvalid,

    /// Action needs an active monitoring session
    #[error("Active monitoring session required")]
    SessionRequired,

    /// Ownership or state conflict
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Target record does not exist (or is no longer in the required state)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Sliding-window limit exceeded; terminal for this call
    #[error("Rate limited")]
    RateLimited,

    /// Storage or internal failure
    #[error("Internal error")]
    Internal(#[from] anyhow::Error),
}

impl From<sqlx::Error> for ApiError {
    fn from(e: sqlx::Error) -> Self {
        ApiError::Internal(e.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::AuthFailed => (StatusCode::UNAUTHORIZED, "Credenciais invalidas".to_string()),
            ApiError::SessionInvalid => (StatusCode::UNAUTHORIZED, "Sessao invalida".to_string()),
            ApiError::RefreshInvalid => (StatusCode::UNAUTHORIZED, "Refresh invalido".to_string()),
            ApiError::SessionRequired => (
                StatusCode::FORBIDDEN,
                "Sessao de monitoramento ativa necessaria".to_string(),
            ),
            ApiError::Conflict(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                "Limite de tentativas excedido".to_string(),
            ),
            ApiError::Internal(e) => {
                error!("Internal error: {:#}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Erro interno".to_string(),
                )
            }
        };

        let body = Json(json!({
            "sucesso": false,
            "erro": message,
        }));

        (status, body).into_response()
    }
}

/// Type alias for handler results
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        let cases = [
            (
                ApiError::Validation("x".into()).into_response().status(),
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiError::AuthFailed.into_response().status(),
                StatusCode::UNAUTHORIZED,
            ),
            (
                ApiError::SessionInvalid.into_response().status(),
                StatusCode::UNAUTHORIZED,
            ),
            (
                ApiError::SessionRequired.into_response().status(),
                StatusCode::FORBIDDEN,
            ),
            (
                ApiError::NotFound("x".into()).into_response().status(),
                StatusCode::NOT_FOUND,
            ),
            (
                ApiError::RateLimited.into_response().status(),
                StatusCode::TOO_MANY_REQUESTS,
            ),
        ];

        for (got, want) in cases {
            assert_eq!(got, want);
        }
    }

    #[test]
    fn auth_failures_share_one_message() {
        // Account enumeration resistance: unknown account and wrong password
        // must be indistinguishable in the response.
        let a = format!("{}", ApiError::AuthFailed);
        assert_eq!(a, "Authentication failed");
    }
}
