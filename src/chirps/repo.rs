use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::repo_types::{Chirp, SortOrder};
use crate::auth::types::UserId;

#[async_trait]
pub trait ChirpRepo: Send + Sync {
    async fn create(&self, body: &str, user_id: UserId) -> anyhow::Result<Chirp>;
    /// All chirps by creation time, optionally restricted to one author.
    async fn list(&self, author: Option<UserId>, order: SortOrder) -> anyhow::Result<Vec<Chirp>>;
    async fn get(&self, id: Uuid) -> anyhow::Result<Option<Chirp>>;
    /// Returns whether a row was removed.
    async fn delete(&self, id: Uuid) -> anyhow::Result<bool>;
}

#[derive(Clone)]
pub struct PgChirps {
    db: PgPool,
}

impl PgChirps {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ChirpRepo for PgChirps {
    async fn create(&self, body: &str, user_id: UserId) -> anyhow::Result<Chirp> {
        let chirp = sqlx::query_as::<_, Chirp>(
            r#"
            INSERT INTO chirps (id, body, user_id)
            VALUES ($1, $2, $3)
            RETURNING id, created_at, updated_at, body, user_id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(body)
        .bind(user_id)
        .fetch_one(&self.db)
        .await
        .context("insert chirp")?;
        Ok(chirp)
    }

    async fn list(&self, author: Option<UserId>, order: SortOrder) -> anyhow::Result<Vec<Chirp>> {
        // ORDER BY direction cannot be bound as a parameter.
        let sql = match order {
            SortOrder::Asc => {
                r#"
                SELECT id, created_at, updated_at, body, user_id
                  FROM chirps
                 WHERE ($1::uuid IS NULL OR user_id = $1)
                 ORDER BY created_at ASC
                "#
            }
            SortOrder::Desc => {
                r#"
                SELECT id, created_at, updated_at, body, user_id
                  FROM chirps
                 WHERE ($1::uuid IS NULL OR user_id = $1)
                 ORDER BY created_at DESC
                "#
            }
        };
        let rows = sqlx::query_as::<_, Chirp>(sql)
            .bind(author)
            .fetch_all(&self.db)
            .await
            .context("list chirps")?;
        Ok(rows)
    }

    async fn get(&self, id: Uuid) -> anyhow::Result<Option<Chirp>> {
        let chirp = sqlx::query_as::<_, Chirp>(
            r#"
            SELECT id, created_at, updated_at, body, user_id
              FROM chirps
             WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("get chirp")?;
        Ok(chirp)
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM chirps WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .context("delete chirp")?;
        Ok(res.rows_affected() > 0)
    }
}
