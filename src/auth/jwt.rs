use std::time::Duration;

use axum::extract::FromRef;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use crate::{
    auth::types::{SessionToken, UserId},
    config::{JwtConfig, TOKEN_ISSUER},
    state::AppState,
};

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token signature does not verify")]
    Signature,
    #[error("token has expired")]
    Expired,
    #[error("malformed token: {0}")]
    Malformed(String),
    #[error("failed to sign token: {0}")]
    Signing(String),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            ErrorKind::InvalidSignature => TokenError::Signature,
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Malformed(e.to_string()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub iss: String,
    pub sub: String,
    pub iat: u64,
    pub exp: u64,
}

/// HS256 signing material plus the session policy it is applied with.
#[derive(Clone)]
pub struct JwtKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub issuer: String,
    pub access_ttl: Duration,
    pub leeway: Duration,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        let JwtConfig {
            secret,
            issuer,
            access_ttl_seconds,
            leeway_seconds,
            ..
        } = &state.config.jwt;
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            issuer: issuer.clone(),
            access_ttl: Duration::from_secs(*access_ttl_seconds),
            leeway: Duration::from_secs(*leeway_seconds),
        }
    }
}

fn unix_seconds(at: OffsetDateTime) -> Result<u64, TokenError> {
    u64::try_from(at.unix_timestamp())
        .map_err(|_| TokenError::Signing(format!("timestamp {at} precedes the unix epoch")))
}

impl JwtKeys {
    /// Keys for `secret` with the default one hour session and exact expiry.
    pub fn from_secret(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            issuer: TOKEN_ISSUER.into(),
            access_ttl: Duration::from_secs(60 * 60),
            leeway: Duration::ZERO,
        }
    }

    pub fn issue(&self, user_id: UserId, ttl: Duration) -> Result<SessionToken, TokenError> {
        let now = OffsetDateTime::now_utc();
        let exp = i64::try_from(ttl.as_secs())
            .ok()
            .and_then(|secs| now.checked_add(TimeDuration::seconds(secs)))
            .ok_or_else(|| TokenError::Signing(format!("ttl of {}s is out of range", ttl.as_secs())))?;
        let claims = Claims {
            iss: self.issuer.clone(),
            sub: user_id.to_string(),
            iat: unix_seconds(now)?,
            exp: unix_seconds(exp)?,
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))?;
        debug!(user_id = %user_id, ttl_secs = ttl.as_secs(), "jwt signed");
        Ok(SessionToken::new(token))
    }

    pub fn issue_session(&self, user_id: UserId) -> Result<SessionToken, TokenError> {
        self.issue(user_id, self.access_ttl)
    }

    pub fn validate(&self, token: &str) -> Result<UserId, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = self.leeway.as_secs();
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);

        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        let user_id = Uuid::parse_str(&data.claims.sub)
            .map(UserId)
            .map_err(|_| TokenError::Malformed("subject is not a user id".into()))?;
        debug!(user_id = %user_id, "jwt verified");
        Ok(user_id)
    }
}
