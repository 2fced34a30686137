use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    dto::{CreateChirpRequest, ListChirpsQuery, MAX_CHIRP_CHARS},
    filter::filter_body,
    repo_types::Chirp,
};
use crate::{
    auth::{extractors::AuthUser, types::UserId},
    error::{ApiError, ApiResult},
    extract::{AppJson, AppPath, AppQuery},
    state::AppState,
};

pub fn chirp_routes() -> Router<AppState> {
    Router::new()
        .route("/api/chirps", get(list_chirps).post(create_chirp))
        .route("/api/chirps/:id", get(get_chirp).delete(delete_chirp))
}

/// Length check on the raw body, before any masking.
pub fn validate_body(body: &str) -> ApiResult<()> {
    if body.chars().count() > MAX_CHIRP_CHARS {
        return Err(ApiError::Validation("Chirp is too long".into()));
    }
    Ok(())
}

#[instrument(skip(state, payload))]
pub async fn create_chirp(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppJson(payload): AppJson<CreateChirpRequest>,
) -> ApiResult<(StatusCode, Json<Chirp>)> {
    validate_body(&payload.body)?;

    if let Some(claimed) = payload.user_id {
        if claimed != user_id {
            return Err(ApiError::Forbidden {
                actor: user_id,
                owner: claimed,
            });
        }
    }

    let body = filter_body(&payload.body);
    let chirp = state.chirps.create(&body, user_id).await?;
    info!(chirp_id = %chirp.id, %user_id, "chirp created");
    Ok((StatusCode::CREATED, Json(chirp)))
}

#[instrument(skip(state))]
pub async fn list_chirps(
    State(state): State<AppState>,
    AppQuery(q): AppQuery<ListChirpsQuery>,
) -> ApiResult<Json<Vec<Chirp>>> {
    let chirps = state
        .chirps
        .list(q.author_id.map(UserId), q.sort)
        .await?;
    Ok(Json(chirps))
}

#[instrument(skip(state))]
pub async fn get_chirp(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
) -> ApiResult<Json<Chirp>> {
    state
        .chirps
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Chirp not found".into()))
}

#[instrument(skip(state))]
pub async fn delete_chirp(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> ApiResult<StatusCode> {
    let chirp = state
        .chirps
        .get(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Chirp not found".into()))?;

    if chirp.user_id != user_id {
        return Err(ApiError::Forbidden {
            actor: user_id,
            owner: chirp.user_id,
        });
    }

    if !state.chirps.delete(id).await? {
        warn!(chirp_id = %id, "chirp vanished before delete");
        return Err(ApiError::NotFound("Chirp not found".into()));
    }
    info!(chirp_id = %id, %user_id, "chirp deleted");
    Ok(StatusCode::NO_CONTENT)
}
