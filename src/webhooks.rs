use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
    Router,
};
use serde::Deserialize;
use tracing::{info, instrument, warn};

use crate::{
    auth::{extractors::api_key, types::UserId},
    error::{ApiError, ApiResult},
    state::AppState,
};

const USER_UPGRADED: &str = "user.upgraded";

#[derive(Debug, Deserialize)]
pub struct WebhookData {
    pub user_id: UserId,
}

#[derive(Debug, Deserialize)]
pub struct PolkaWebhook {
    pub event: String,
    pub data: WebhookData,
}

pub fn webhook_routes() -> Router<AppState> {
    Router::new().route("/api/polka/webhooks", post(polka_webhook))
}

/// Payment provider callback. Only `user.upgraded` has an effect; other
/// events are acknowledged and ignored. The key is checked before the body
/// is parsed.
#[instrument(skip(state, headers, body))]
pub async fn polka_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<StatusCode> {
    let presented = api_key(&headers)?;
    match state.config.polka_key.as_deref() {
        Some(expected) if expected == presented => {}
        _ => {
            warn!("webhook with unknown api key");
            return Err(ApiError::Authentication("Invalid API key".into()));
        }
    }

    let payload: PolkaWebhook = serde_json::from_slice(&body)
        .map_err(|e| ApiError::Validation(format!("Invalid webhook payload: {e}")))?;

    if payload.event != USER_UPGRADED {
        return Ok(StatusCode::NO_CONTENT);
    }

    let user_id = payload.data.user_id;
    if !state.users.upgrade_to_chirpy_red(user_id).await? {
        return Err(ApiError::NotFound("User not found".into()));
    }
    info!(%user_id, "user upgraded to chirpy red");
    Ok(StatusCode::NO_CONTENT)
}
