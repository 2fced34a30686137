//! In-memory repositories and request helpers for handler tests.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request},
    response::Response,
};
use serde_json::Value;
use time::OffsetDateTime;
use tower::ServiceExt;
use uuid::Uuid;

use crate::{
    app::build_app,
    auth::{
        repo::{EmailTaken, RefreshTokenRepo, UserRepo},
        repo_types::{RefreshTokenRecord, User},
        types::UserId,
    },
    chirps::{
        repo::ChirpRepo,
        repo_types::{Chirp, SortOrder},
    },
    state::AppState,
};

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    chirps: Vec<Chirp>,
    refresh_tokens: Vec<RefreshTokenRecord>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn users(&self) -> MemoryUsers {
        MemoryUsers(self.clone())
    }

    pub fn chirps(&self) -> MemoryChirps {
        MemoryChirps(self.clone())
    }

    pub fn refresh_tokens(&self) -> MemoryRefreshTokens {
        MemoryRefreshTokens(self.clone())
    }

    fn lock(&self) -> anyhow::Result<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|e| anyhow::anyhow!("memory store poisoned: {e}"))
    }
}

pub struct MemoryUsers(MemoryStore);

#[async_trait]
impl UserRepo for MemoryUsers {
    async fn create(&self, email: &str, password_hash: &str) -> anyhow::Result<User> {
        let mut t = self.0.lock()?;
        if t.users.iter().any(|u| u.email == email) {
            return Err(EmailTaken.into());
        }
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: UserId::new(),
            email: email.to_owned(),
            password_hash: password_hash.to_owned(),
            is_chirpy_red: false,
            created_at: now,
            updated_at: now,
        };
        t.users.push(user.clone());
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        Ok(self.0.lock()?.users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: UserId) -> anyhow::Result<Option<User>> {
        Ok(self.0.lock()?.users.iter().find(|u| u.id == id).cloned())
    }

    async fn update_credentials(
        &self,
        id: UserId,
        email: &str,
        password_hash: &str,
    ) -> anyhow::Result<Option<User>> {
        let mut t = self.0.lock()?;
        if t.users.iter().any(|u| u.email == email && u.id != id) {
            return Err(EmailTaken.into());
        }
        Ok(t.users.iter_mut().find(|u| u.id == id).map(|u| {
            u.email = email.to_owned();
            u.password_hash = password_hash.to_owned();
            u.updated_at = OffsetDateTime::now_utc();
            u.clone()
        }))
    }

    async fn upgrade_to_chirpy_red(&self, id: UserId) -> anyhow::Result<bool> {
        let mut t = self.0.lock()?;
        Ok(t.users
            .iter_mut()
            .find(|u| u.id == id)
            .map(|u| u.is_chirpy_red = true)
            .is_some())
    }

    async fn delete_all(&self) -> anyhow::Result<u64> {
        let mut t = self.0.lock()?;
        let removed = t.users.len() as u64;
        // Mirrors ON DELETE CASCADE.
        t.users.clear();
        t.chirps.clear();
        t.refresh_tokens.clear();
        Ok(removed)
    }
}

pub struct MemoryChirps(MemoryStore);

#[async_trait]
impl ChirpRepo for MemoryChirps {
    async fn create(&self, body: &str, user_id: UserId) -> anyhow::Result<Chirp> {
        let now = OffsetDateTime::now_utc();
        let chirp = Chirp {
            id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            body: body.to_owned(),
            user_id,
        };
        self.0.lock()?.chirps.push(chirp.clone());
        Ok(chirp)
    }

    async fn list(&self, author: Option<UserId>, order: SortOrder) -> anyhow::Result<Vec<Chirp>> {
        let t = self.0.lock()?;
        let mut rows: Vec<Chirp> = t
            .chirps
            .iter()
            .filter(|c| author.map_or(true, |a| c.user_id == a))
            .cloned()
            .collect();
        rows.sort_by_key(|c| c.created_at);
        if order == SortOrder::Desc {
            rows.reverse();
        }
        Ok(rows)
    }

    async fn get(&self, id: Uuid) -> anyhow::Result<Option<Chirp>> {
        Ok(self.0.lock()?.chirps.iter().find(|c| c.id == id).cloned())
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
        let mut t = self.0.lock()?;
        let before = t.chirps.len();
        t.chirps.retain(|c| c.id != id);
        Ok(t.chirps.len() != before)
    }
}

#[derive(Default)]
pub struct MemoryRefreshTokens(MemoryStore);

#[async_trait]
impl RefreshTokenRepo for MemoryRefreshTokens {
    async fn insert(&self, record: &RefreshTokenRecord) -> anyhow::Result<()> {
        self.0.lock()?.refresh_tokens.push(record.clone());
        Ok(())
    }

    async fn find(&self, token: &str) -> anyhow::Result<Option<RefreshTokenRecord>> {
        Ok(self
            .0
            .lock()?
            .refresh_tokens
            .iter()
            .find(|r| r.token == token)
            .cloned())
    }

    async fn revoke(&self, token: &str, at: OffsetDateTime) -> anyhow::Result<bool> {
        let mut t = self.0.lock()?;
        Ok(t.refresh_tokens
            .iter_mut()
            .find(|r| r.token == token)
            .map(|r| {
                r.revoked_at.get_or_insert(at);
                r.updated_at = at;
            })
            .is_some())
    }
}

/// Runs one request through the full router.
pub async fn send(
    state: &AppState,
    method: Method,
    uri: &str,
    authorization: Option<&str>,
    json: Option<Value>,
) -> Response {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(auth) = authorization {
        builder = builder.header(header::AUTHORIZATION, auth);
    }
    let body = match json {
        Some(v) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(v.to_string())
        }
        None => Body::empty(),
    };
    build_app(state.clone())
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap()
}

pub async fn body_text(res: Response) -> String {
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(res: Response) -> Value {
    let text = body_text(res).await;
    if text.is_empty() {
        return Value::Null;
    }
    serde_json::from_str(&text).unwrap()
}
