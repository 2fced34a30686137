use anyhow::Context;
use axum::{
    extract::{FromRef, State},
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{Credentials, LoginResponse, PublicUser, TokenResponse},
        extractors::{bearer_token, AuthUser},
        jwt::JwtKeys,
        password::{hash_password, verify_password},
        refresh::RefreshTokens,
        repo::EmailTaken,
        types::RefreshToken,
    },
    error::{ApiError, ApiResult},
    extract::AppJson,
    state::AppState,
};

const BAD_CREDENTIALS: &str = "Incorrect email or password";
const EMAIL_REGISTERED: &str = "Email already registered";

lazy_static! {
    /// Verified against when the email is unknown, so both login failures
    /// cost one Argon2 verification.
    static ref DUMMY_HASH: String =
        hash_password("chirpy-unknown-account").expect("argon2 hashes a fixed password");
}

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/api/users", post(register).put(update_user))
        .route("/api/login", post(login))
        .route("/api/refresh", post(refresh))
        .route("/api/revoke", post(revoke))
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex =
            Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email regex compiles");
    }
    EMAIL_RE.is_match(email)
}

/// Trims and lower-cases the email, then checks the shape of both fields.
fn normalize(mut payload: Credentials) -> ApiResult<Credentials> {
    payload.email = payload.email.trim().to_lowercase();
    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(ApiError::Validation("Invalid email".into()));
    }
    if payload.password.is_empty() {
        return Err(ApiError::Validation("Password is required".into()));
    }
    Ok(payload)
}

fn conflict_on_taken_email(e: anyhow::Error) -> ApiError {
    if e.is::<EmailTaken>() {
        ApiError::Conflict(EMAIL_REGISTERED.into())
    } else {
        ApiError::Internal(e)
    }
}

// Argon2 is CPU-bound; keep it off the async workers.
async fn hash_blocking(password: String) -> ApiResult<String> {
    let hash = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .context("password hashing task")??;
    Ok(hash)
}

async fn verify_blocking(password: String, hash: String) -> ApiResult<bool> {
    let ok = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .context("password verification task")??;
    Ok(ok)
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    AppJson(payload): AppJson<Credentials>,
) -> ApiResult<(StatusCode, Json<PublicUser>)> {
    let payload = normalize(payload)?;

    if state.users.find_by_email(&payload.email).await?.is_some() {
        warn!(email = %payload.email, "email already registered");
        return Err(ApiError::Conflict(EMAIL_REGISTERED.into()));
    }

    let hash = hash_blocking(payload.password).await?;
    let user = state
        .users
        .create(&payload.email, &hash)
        .await
        .map_err(conflict_on_taken_email)?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok((StatusCode::CREATED, Json(user.into())))
}

#[instrument(skip(state, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppJson(payload): AppJson<Credentials>,
) -> ApiResult<Json<PublicUser>> {
    let payload = normalize(payload)?;

    if let Some(existing) = state.users.find_by_email(&payload.email).await? {
        if existing.id != user_id {
            warn!(%user_id, email = %payload.email, "email taken by another user");
            return Err(ApiError::Conflict(EMAIL_REGISTERED.into()));
        }
    }

    let hash = hash_blocking(payload.password).await?;
    let user = state
        .users
        .update_credentials(user_id, &payload.email, &hash)
        .await
        .map_err(conflict_on_taken_email)?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    info!(%user_id, "user credentials updated");
    Ok(Json(user.into()))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<Credentials>,
) -> ApiResult<Json<LoginResponse>> {
    let payload = normalize(payload)?;

    let found = state.users.find_by_email(&payload.email).await?;
    let hash = found
        .as_ref()
        .map_or_else(|| DUMMY_HASH.clone(), |u| u.password_hash.clone());
    let matches = verify_blocking(payload.password, hash).await?;

    let user = match found {
        Some(user) if matches => user,
        Some(user) => {
            warn!(user_id = %user.id, "login invalid password");
            return Err(ApiError::Authentication(BAD_CREDENTIALS.into()));
        }
        None => {
            warn!(email = %payload.email, "login unknown email");
            return Err(ApiError::Authentication(BAD_CREDENTIALS.into()));
        }
    };

    let token = JwtKeys::from_ref(&state).issue_session(user.id)?;
    let refresh_token = RefreshTokens::from_ref(&state).issue(user.id).await?;

    info!(user_id = %user.id, "user logged in");
    Ok(Json(LoginResponse {
        user: user.into(),
        token,
        refresh_token,
    }))
}

#[instrument(skip(state, headers))]
pub async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<TokenResponse>> {
    let presented = RefreshToken::new(bearer_token(&headers)?);
    let user_id = RefreshTokens::from_ref(&state).exchange(&presented).await?;
    if state.users.find_by_id(user_id).await?.is_none() {
        warn!(%user_id, "refresh token outlived its user");
        return Err(ApiError::Authentication("Invalid refresh token".into()));
    }
    let token = JwtKeys::from_ref(&state).issue_session(user_id)?;
    info!(%user_id, "session refreshed");
    Ok(Json(TokenResponse { token }))
}

#[instrument(skip(state, headers))]
pub async fn revoke(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<StatusCode> {
    let presented = RefreshToken::new(bearer_token(&headers)?);
    RefreshTokens::from_ref(&state).revoke(&presented).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{body_json, send};
    use axum::http::Method;
    use serde_json::{json, Value};

    async fn register_user(state: &AppState, email: &str, password: &str) -> Value {
        let res = send(
            state,
            Method::POST,
            "/api/users",
            None,
            Some(json!({ "email": email, "password": password })),
        )
        .await;
        assert_eq!(res.status(), StatusCode::CREATED);
        body_json(res).await
    }

    async fn login_user(state: &AppState, email: &str, password: &str) -> (StatusCode, Value) {
        let res = send(
            state,
            Method::POST,
            "/api/login",
            None,
            Some(json!({ "email": email, "password": password })),
        )
        .await;
        let status = res.status();
        (status, body_json(res).await)
    }

    #[test]
    fn email_validation() {
        assert!(is_valid_email("walt@breakingbad.com"));
        assert!(!is_valid_email("walt"));
        assert!(!is_valid_email("walt @bb.com"));
    }

    #[tokio::test]
    async fn register_hides_password_and_normalizes_email() {
        let state = AppState::fake();
        let user = register_user(&state, "  Walt@BreakingBad.com ", "04234").await;
        assert_eq!(user["email"], "walt@breakingbad.com");
        assert_eq!(user["is_chirpy_red"], false);
        assert!(user.get("password").is_none());
        assert!(user.get("password_hash").is_none());

        let stored = state
            .users
            .find_by_email("walt@breakingbad.com")
            .await
            .unwrap()
            .unwrap();
        assert_ne!(stored.password_hash, "04234");
    }

    #[tokio::test]
    async fn duplicate_registration_conflicts() {
        let state = AppState::fake();
        register_user(&state, "saul@bettercall.com", "pw").await;
        let res = send(
            &state,
            Method::POST,
            "/api/users",
            None,
            Some(json!({ "email": "saul@bettercall.com", "password": "pw2" })),
        )
        .await;
        assert_eq!(res.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn login_returns_usable_tokens() {
        let state = AppState::fake();
        let user = register_user(&state, "walt@breakingbad.com", "04234").await;
        let (status, body) = login_user(&state, "walt@breakingbad.com", "04234").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], user["id"]);

        let token = body["token"].as_str().unwrap();
        let resolved = JwtKeys::from_ref(&state).validate(token).unwrap();
        assert_eq!(resolved.to_string(), user["id"].as_str().unwrap());
        assert_eq!(body["refresh_token"].as_str().unwrap().len(), 64);
    }

    #[tokio::test]
    async fn unknown_user_and_wrong_password_look_the_same() {
        let state = AppState::fake();
        register_user(&state, "walt@breakingbad.com", "04234").await;

        let (s1, b1) = login_user(&state, "walt@breakingbad.com", "wrong").await;
        let (s2, b2) = login_user(&state, "jesse@breakingbad.com", "04234").await;
        assert_eq!(s1, StatusCode::UNAUTHORIZED);
        assert_eq!(s2, StatusCode::UNAUTHORIZED);
        assert_eq!(b1, b2);
    }

    #[tokio::test]
    async fn refresh_then_revoke_flow() {
        let state = AppState::fake();
        register_user(&state, "walt@breakingbad.com", "04234").await;
        let (_, body) = login_user(&state, "walt@breakingbad.com", "04234").await;
        let refresh_header = format!("Bearer {}", body["refresh_token"].as_str().unwrap());

        let res = send(&state, Method::POST, "/api/refresh", Some(&refresh_header), None).await;
        assert_eq!(res.status(), StatusCode::OK);
        let fresh = body_json(res).await;
        let resolved = JwtKeys::from_ref(&state)
            .validate(fresh["token"].as_str().unwrap())
            .unwrap();
        assert_eq!(resolved.to_string(), body["id"].as_str().unwrap());

        let res = send(&state, Method::POST, "/api/revoke", Some(&refresh_header), None).await;
        assert_eq!(res.status(), StatusCode::NO_CONTENT);
        let res = send(&state, Method::POST, "/api/revoke", Some(&refresh_header), None).await;
        assert_eq!(res.status(), StatusCode::NO_CONTENT);

        let res = send(&state, Method::POST, "/api/refresh", Some(&refresh_header), None).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn refresh_rejects_session_tokens_and_missing_header() {
        let state = AppState::fake();
        register_user(&state, "walt@breakingbad.com", "04234").await;
        let (_, body) = login_user(&state, "walt@breakingbad.com", "04234").await;
        let session_header = format!("Bearer {}", body["token"].as_str().unwrap());

        let res = send(&state, Method::POST, "/api/refresh", Some(&session_header), None).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        let res = send(&state, Method::POST, "/api/refresh", None, None).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn update_user_changes_credentials() {
        let state = AppState::fake();
        register_user(&state, "walt@breakingbad.com", "04234").await;
        let (_, body) = login_user(&state, "walt@breakingbad.com", "04234").await;
        let auth = format!("Bearer {}", body["token"].as_str().unwrap());

        let res = send(
            &state,
            Method::PUT,
            "/api/users",
            Some(&auth),
            Some(json!({ "email": "heisenberg@breakingbad.com", "password": "losPollos" })),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body_json(res).await["email"], "heisenberg@breakingbad.com");

        let (old, _) = login_user(&state, "walt@breakingbad.com", "04234").await;
        assert_eq!(old, StatusCode::UNAUTHORIZED);
        let (new, _) = login_user(&state, "heisenberg@breakingbad.com", "losPollos").await;
        assert_eq!(new, StatusCode::OK);
    }

    #[tokio::test]
    async fn update_user_requires_session() {
        let state = AppState::fake();
        let res = send(
            &state,
            Method::PUT,
            "/api/users",
            None,
            Some(json!({ "email": "a@b.co", "password": "x" })),
        )
        .await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn unknown_account_hash_costs_the_same_as_a_real_one() {
        use argon2::password_hash::PasswordHash;

        let real = hash_password("04234").unwrap();
        let real = PasswordHash::new(&real).unwrap();
        let dummy = PasswordHash::new(&DUMMY_HASH).unwrap();
        assert_eq!(dummy.algorithm, real.algorithm);
        assert_eq!(dummy.version, real.version);
        assert_eq!(dummy.params.to_string(), real.params.to_string());
    }

    #[tokio::test]
    async fn unknown_email_login_still_runs_argon2() {
        use std::time::Instant;

        let state = AppState::fake();
        register_user(&state, "walt@breakingbad.com", "04234").await;
        lazy_static::initialize(&DUMMY_HASH);

        let started = Instant::now();
        let (status, _) = login_user(&state, "walt@breakingbad.com", "wrong").await;
        let wrong_password = started.elapsed();
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let started = Instant::now();
        let (status, _) = login_user(&state, "jesse@breakingbad.com", "04234").await;
        let unknown_email = started.elapsed();
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        assert!(
            unknown_email * 10 >= wrong_password,
            "unknown={unknown_email:?} wrong={wrong_password:?}"
        );
    }

    #[test]
    fn taken_email_maps_to_conflict() {
        let err = conflict_on_taken_email(EmailTaken.into());
        assert_eq!(err.status(), StatusCode::CONFLICT);
        let err = conflict_on_taken_email(anyhow::anyhow!("connection reset"));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn repo_level_duplicate_is_reported_as_email_taken() {
        let state = AppState::fake();
        state.users.create("saul@bettercall.com", "h1").await.unwrap();
        let err = state
            .users
            .create("saul@bettercall.com", "h2")
            .await
            .unwrap_err();
        assert!(err.is::<EmailTaken>(), "{err:?}");
    }

    #[tokio::test]
    async fn update_to_anothers_email_conflicts() {
        let state = AppState::fake();
        register_user(&state, "walt@breakingbad.com", "04234").await;
        register_user(&state, "jesse@breakingbad.com", "yo").await;
        let (_, body) = login_user(&state, "jesse@breakingbad.com", "yo").await;
        let auth = format!("Bearer {}", body["token"].as_str().unwrap());

        let res = send(
            &state,
            Method::PUT,
            "/api/users",
            Some(&auth),
            Some(json!({ "email": "walt@breakingbad.com", "password": "yo" })),
        )
        .await;
        assert_eq!(res.status(), StatusCode::CONFLICT);
        assert_eq!(body_json(res).await["error"], EMAIL_REGISTERED);
    }

    #[tokio::test]
    async fn refresh_for_deleted_user_is_rejected() {
        let state = AppState::fake();
        let orphan = RefreshTokens::from_ref(&state)
            .issue(crate::auth::types::UserId::new())
            .await
            .unwrap();
        let header = format!("Bearer {}", orphan.as_str());
        let res = send(&state, Method::POST, "/api/refresh", Some(&header), None).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(res).await["error"], "Invalid refresh token");
    }

    #[tokio::test]
    async fn incomplete_credentials_get_the_json_envelope() {
        let state = AppState::fake();
        let res = send(
            &state,
            Method::POST,
            "/api/login",
            None,
            Some(json!({ "email": "walt@breakingbad.com" })),
        )
        .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert!(body_json(res).await["error"].is_string());
    }
}
