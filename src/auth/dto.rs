use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::{
    repo_types::User,
    types::{RefreshToken, SessionToken, UserId},
};

/// Request body for registration, login and credential updates.
#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// Public part of the user returned to the client.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: UserId,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    pub email: String,
    pub is_chirpy_red: bool,
}

impl From<User> for PublicUser {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            created_at: u.created_at,
            updated_at: u.updated_at,
            email: u.email,
            is_chirpy_red: u.is_chirpy_red,
        }
    }
}

/// Response returned after login.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    #[serde(flatten)]
    pub user: PublicUser,
    pub token: SessionToken,
    pub refresh_token: RefreshToken,
}

/// Response returned after a refresh token exchange.
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: SessionToken,
}
