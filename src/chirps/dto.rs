use serde::Deserialize;
use uuid::Uuid;

use super::repo_types::SortOrder;
use crate::auth::types::UserId;

pub const MAX_CHIRP_CHARS: usize = 140;

#[derive(Debug, Deserialize)]
pub struct CreateChirpRequest {
    pub body: String,
    /// Optional claimed author; must match the token's subject when present.
    #[serde(default)]
    pub user_id: Option<UserId>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListChirpsQuery {
    pub author_id: Option<Uuid>,
    #[serde(default)]
    pub sort: SortOrder,
}
