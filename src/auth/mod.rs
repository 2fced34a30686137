use crate::state::AppState;
use axum::Router;

pub mod dto;
pub mod extractors;
pub mod handlers;
pub mod jwt;
pub mod password;
pub mod refresh;
pub mod repo;
pub mod repo_types;
pub mod types;

pub fn router() -> Router<AppState> {
    handlers::auth_routes()
}
