//! Opaque refresh tokens: 32 random bytes, hex encoded, stored server-side.
//!
//! A token stays valid until it expires or is revoked; exchanging it does not
//! rotate it, and a user may hold any number of live tokens at once.

use std::sync::Arc;

use axum::extract::FromRef;
use rand::{rngs::OsRng, RngCore};
use time::{Duration, OffsetDateTime};
use tracing::{debug, info, warn};

use crate::{
    auth::{
        repo::RefreshTokenRepo,
        repo_types::RefreshTokenRecord,
        types::{RefreshToken, UserId},
    },
    state::AppState,
};

const TOKEN_BYTES: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum RefreshError {
    #[error("refresh token not found")]
    NotFound,
    #[error("refresh token expired or revoked")]
    ExpiredOrRevoked,
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

#[derive(Clone)]
pub struct RefreshTokens {
    repo: Arc<dyn RefreshTokenRepo>,
    ttl: Duration,
}

impl FromRef<AppState> for RefreshTokens {
    fn from_ref(state: &AppState) -> Self {
        Self::new(
            state.refresh_tokens.clone(),
            Duration::days(state.config.jwt.refresh_ttl_days as i64),
        )
    }
}

pub fn generate_token() -> RefreshToken {
    let mut key = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut key);
    RefreshToken::new(hex::encode(key))
}

impl RefreshTokens {
    pub fn new(repo: Arc<dyn RefreshTokenRepo>, ttl: Duration) -> Self {
        Self { repo, ttl }
    }

    pub async fn issue(&self, user_id: UserId) -> Result<RefreshToken, RefreshError> {
        let token = generate_token();
        let now = OffsetDateTime::now_utc();
        let record = RefreshTokenRecord {
            token: token.as_str().to_owned(),
            user_id,
            created_at: now,
            updated_at: now,
            expires_at: now + self.ttl,
            revoked_at: None,
        };
        self.repo.insert(&record).await?;
        debug!(user_id = %user_id, expires_at = %record.expires_at, "refresh token issued");
        Ok(token)
    }

    pub async fn exchange(&self, token: &RefreshToken) -> Result<UserId, RefreshError> {
        let record = self
            .repo
            .find(token.as_str())
            .await?
            .ok_or(RefreshError::NotFound)?;

        if !record.is_usable_at(OffsetDateTime::now_utc()) {
            warn!(
                user_id = %record.user_id,
                revoked = record.revoked_at.is_some(),
                "refresh token no longer usable"
            );
            return Err(RefreshError::ExpiredOrRevoked);
        }
        Ok(record.user_id)
    }

    pub async fn revoke(&self, token: &RefreshToken) -> Result<(), RefreshError> {
        if !self.repo.revoke(token.as_str(), OffsetDateTime::now_utc()).await? {
            return Err(RefreshError::NotFound);
        }
        info!("refresh token revoked");
        Ok(())
    }
}
