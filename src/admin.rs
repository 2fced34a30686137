use axum::{
    extract::State,
    response::Html,
    routing::{get, post},
    Router,
};
use tracing::{info, instrument, warn};

use crate::{
    config::Platform,
    error::{ApiError, ApiResult},
    state::AppState,
};

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/metrics", get(metrics))
        .route("/admin/reset", post(reset))
}

pub async fn metrics(State(state): State<AppState>) -> Html<String> {
    Html(format!(
        "<html>\n  <body>\n    <h1>Welcome, Chirpy Admin</h1>\n    <p>Chirpy has been visited {} times!</p>\n  </body>\n</html>\n",
        state.metrics.hits()
    ))
}

/// Zeroes the hit counter and wipes every user. Dev deployments only.
#[instrument(skip(state))]
pub async fn reset(State(state): State<AppState>) -> ApiResult<&'static str> {
    if state.config.platform != Platform::Dev {
        warn!("reset attempted outside dev platform");
        return Err(ApiError::Restricted(
            "Reset is only allowed in dev environment".into(),
        ));
    }

    state.metrics.reset();
    let removed = state.users.delete_all().await?;
    info!(removed_users = removed, "state reset");
    Ok("Counter reset to 0")
}
