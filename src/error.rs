use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::{error, warn};

use crate::auth::{
    extractors::AuthError, jwt::TokenError, password::PasswordError, refresh::RefreshError,
    types::UserId,
};

/// Error type returned by every HTTP handler.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Malformed input. Never retried.
    #[error("{0}")]
    Validation(String),

    /// Bad credentials or a missing, invalid, expired, or revoked token.
    #[error("{0}")]
    Authentication(String),

    /// Valid identity acting on somebody else's resource.
    #[error("user {actor} may not act on a resource owned by {owner}")]
    Forbidden { actor: UserId, owner: UserId },

    /// Endpoint switched off by deployment settings.
    #[error("{0}")]
    Restricted(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Authentication(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden { .. } | ApiError::Restricted(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::Forbidden { actor, owner } => {
                warn!(%actor, %owner, "forbidden: resource owned by another user");
                "Forbidden".to_string()
            }
            ApiError::Internal(e) => {
                error!(error = ?e, "internal error");
                "Something went wrong".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::Token(TokenError::Signing(msg)) => {
                ApiError::Internal(anyhow::anyhow!("jwt signing failed: {msg}"))
            }
            AuthError::Token(TokenError::Malformed(_)) => {
                ApiError::Authentication("Malformed token".into())
            }
            other => ApiError::Authentication(other.to_string()),
        }
    }
}

impl From<TokenError> for ApiError {
    fn from(e: TokenError) -> Self {
        AuthError::Token(e).into()
    }
}

impl From<RefreshError> for ApiError {
    fn from(e: RefreshError) -> Self {
        match e {
            RefreshError::NotFound | RefreshError::ExpiredOrRevoked => {
                ApiError::Authentication("Invalid refresh token".into())
            }
            RefreshError::Store(e) => ApiError::Internal(e),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        ApiError::Validation(e.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(e: PathRejection) -> Self {
        ApiError::Validation(e.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(e: QueryRejection) -> Self {
        ApiError::Validation(e.body_text())
    }
}

impl From<PasswordError> for ApiError {
    fn from(e: PasswordError) -> Self {
        ApiError::Internal(e.into())
    }
}
