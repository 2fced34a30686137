use async_trait::async_trait;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use tracing::warn;

use super::{
    jwt::{JwtKeys, TokenError},
    types::UserId,
};
use crate::error::ApiError;

const BEARER_PREFIX: &str = "Bearer ";
const API_KEY_PREFIX: &str = "ApiKey ";

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("authorization header not set")]
    MissingToken,
    #[error("authorization header uses the wrong scheme")]
    MalformedHeader,
    #[error(transparent)]
    Token(#[from] TokenError),
}

fn authorization_with_prefix<'a>(headers: &'a HeaderMap, prefix: &str) -> Result<&'a str, AuthError> {
    let auth = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .ok_or(AuthError::MissingToken)?;

    auth.strip_prefix(prefix).ok_or(AuthError::MalformedHeader)
}

/// Token carried in `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    authorization_with_prefix(headers, BEARER_PREFIX)
}

/// Key carried in `Authorization: ApiKey <key>`.
pub fn api_key(headers: &HeaderMap) -> Result<&str, AuthError> {
    authorization_with_prefix(headers, API_KEY_PREFIX)
}

/// Bearer extraction followed by session token validation.
pub fn authorize(headers: &HeaderMap, keys: &JwtKeys) -> Result<UserId, AuthError> {
    let token = bearer_token(headers)?;
    Ok(keys.validate(token)?)
}

/// Extracts and validates the session token, yielding the caller's id.
pub struct AuthUser(pub UserId);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        match authorize(&parts.headers, &keys) {
            Ok(user_id) => Ok(AuthUser(user_id)),
            Err(e) => {
                warn!(error = %e, "request authorization failed");
                Err(e.into())
            }
        }
    }
}
