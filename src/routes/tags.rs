use axum::{
    extract::{Query, State},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use crate::auth::AuthUser;
use crate::error::AppError;
use crate::journal::{JournalError, TagStore};
use crate::AppState;

const DEFAULT_LIMIT: i64 = 100;
const MAX_LIMIT: i64 = 500;

#[derive(Debug, Default, Deserialize)]
pub struct TagQuery {
    /// Prefix match on the tag name.
    search: Option<String>,
    limit: Option<i64>,
}

fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}

pub fn router() -> Router<AppState> {
    Router::new().route("/tags", get(list_tags))
}

// Tags are global, not scoped to the caller.
async fn list_tags(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
    Query(query): Query<TagQuery>,
) -> Result<impl IntoResponse, AppError> {
    let prefix = query
        .search
        .as_deref()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty());

    let (tags, total) = state
        .store
        .search_tags(prefix.as_deref(), clamp_limit(query.limit))
        .await
        .map_err(JournalError::from)?;

    Ok(Json(json!({ "data": tags, "total": total })))
}
