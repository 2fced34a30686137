use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;

use crate::auth::{
    repo_types::{RefreshTokenRecord, User},
    types::UserId,
};

/// Another account already holds the email. Repositories return it inside
/// `anyhow::Error` so callers can `downcast_ref` it.
#[derive(Debug, thiserror::Error)]
#[error("email already registered")]
pub struct EmailTaken;

fn email_conflict(e: sqlx::Error, action: &'static str) -> anyhow::Error {
    match e.as_database_error() {
        Some(db) if db.is_unique_violation() => EmailTaken.into(),
        _ => anyhow::Error::new(e).context(action),
    }
}

#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn create(&self, email: &str, password_hash: &str) -> anyhow::Result<User>;
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    async fn find_by_id(&self, id: UserId) -> anyhow::Result<Option<User>>;
    /// `None` when the user no longer exists.
    async fn update_credentials(
        &self,
        id: UserId,
        email: &str,
        password_hash: &str,
    ) -> anyhow::Result<Option<User>>;
    /// Returns whether the user existed.
    async fn upgrade_to_chirpy_red(&self, id: UserId) -> anyhow::Result<bool>;
    /// Removes every user; chirps and refresh tokens go with them.
    async fn delete_all(&self) -> anyhow::Result<u64>;
}

#[async_trait]
pub trait RefreshTokenRepo: Send + Sync {
    async fn insert(&self, record: &RefreshTokenRecord) -> anyhow::Result<()>;
    async fn find(&self, token: &str) -> anyhow::Result<Option<RefreshTokenRecord>>;
    /// Stamps `revoked_at` unless already set. Returns whether the token exists.
    async fn revoke(&self, token: &str, at: OffsetDateTime) -> anyhow::Result<bool>;
}

#[derive(Clone)]
pub struct PgUsers {
    db: PgPool,
}

impl PgUsers {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserRepo for PgUsers {
    async fn create(&self, email: &str, password_hash: &str) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, email, password_hash)
            VALUES ($1, $2, $3)
            RETURNING id, email, password_hash, is_chirpy_red, created_at, updated_at
            "#,
        )
        .bind(UserId::new())
        .bind(email)
        .bind(password_hash)
        .fetch_one(&self.db)
        .await
        .map_err(|e| email_conflict(e, "insert user"))?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, is_chirpy_red, created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .context("find user by email")?;
        Ok(user)
    }

    async fn find_by_id(&self, id: UserId) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, is_chirpy_red, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("find user by id")?;
        Ok(user)
    }

    async fn update_credentials(
        &self,
        id: UserId,
        email: &str,
        password_hash: &str,
    ) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
               SET email = $2, password_hash = $3, updated_at = now()
             WHERE id = $1
            RETURNING id, email, password_hash, is_chirpy_red, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(email)
        .bind(password_hash)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| email_conflict(e, "update user credentials"))?;
        Ok(user)
    }

    async fn upgrade_to_chirpy_red(&self, id: UserId) -> anyhow::Result<bool> {
        let res = sqlx::query(
            r#"
            UPDATE users
               SET is_chirpy_red = TRUE, updated_at = now()
             WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.db)
        .await
        .context("upgrade user")?;
        Ok(res.rows_affected() > 0)
    }

    async fn delete_all(&self) -> anyhow::Result<u64> {
        let res = sqlx::query("DELETE FROM users")
            .execute(&self.db)
            .await
            .context("delete all users")?;
        Ok(res.rows_affected())
    }
}

#[derive(Clone)]
pub struct PgRefreshTokens {
    db: PgPool,
}

impl PgRefreshTokens {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl RefreshTokenRepo for PgRefreshTokens {
    async fn insert(&self, record: &RefreshTokenRecord) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (token, user_id, created_at, updated_at, expires_at, revoked_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&record.token)
        .bind(record.user_id)
        .bind(record.created_at)
        .bind(record.updated_at)
        .bind(record.expires_at)
        .bind(record.revoked_at)
        .execute(&self.db)
        .await
        .context("insert refresh token")?;
        Ok(())
    }

    async fn find(&self, token: &str) -> anyhow::Result<Option<RefreshTokenRecord>> {
        let record = sqlx::query_as::<_, RefreshTokenRecord>(
            r#"
            SELECT token, user_id, created_at, updated_at, expires_at, revoked_at
            FROM refresh_tokens
            WHERE token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(&self.db)
        .await
        .context("find refresh token")?;
        Ok(record)
    }

    async fn revoke(&self, token: &str, at: OffsetDateTime) -> anyhow::Result<bool> {
        let res = sqlx::query(
            r#"
            UPDATE refresh_tokens
               SET revoked_at = COALESCE(revoked_at, $2), updated_at = $2
             WHERE token = $1
            "#,
        )
        .bind(token)
        .bind(at)
        .execute(&self.db)
        .await
        .context("revoke refresh token")?;
        Ok(res.rows_affected() > 0)
    }
}
